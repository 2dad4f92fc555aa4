//! The error taxonomy for the schema core, in the manner `feed-rs` hand-rolls
//! `ParseFeedError` rather than reaching for an error-derive crate.

use std::fmt;

use crate::xml::XmlError;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while building or reading a schema-directed
/// document.
#[derive(Debug)]
pub enum Error {
    /// A `Schema` was asked to act as a document root but never declared a
    /// `document_tag()`.
    SchemaIncomplete { type_name: &'static str },

    /// The root start-element's name did not match the document's declared
    /// tag.
    SchemaMismatch { expected: &'static str, found: String },

    /// A start-element's tag has no corresponding descriptor on its parent.
    UnexpectedElement { parent: &'static str, tag: String },

    /// An end-element's tag did not match the tag on top of the parse stack.
    MalformedEvents { expected: String, found: String },

    /// A descriptor was declared with incompatible flags (`required` and
    /// `multiple` together), or two descriptors on the same schema claimed
    /// the same child tag.
    ArgumentError(String),

    /// The type-erased internal setter detected that a node's recorded
    /// schema did not match the expected one. Unreachable from the public
    /// generic API; see SPEC_FULL.md §4.1.
    TypeMismatch { expected: &'static str, found: &'static str },

    /// A repeated-child view was indexed past its final length.
    IndexOutOfRange { index: usize, len: usize },

    /// The underlying XML was not well-formed, or input ran out in the
    /// middle of an open element.
    Xml(XmlError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SchemaIncomplete { type_name } => {
                write!(f, "{} is used as a document root but declares no document_tag()", type_name)
            }
            Error::SchemaMismatch { expected, found } => {
                write!(f, "expected root element <{}>, found <{}>", expected, found)
            }
            Error::UnexpectedElement { parent, tag } => {
                write!(f, "<{}> has no descriptor for child element <{}>", parent, tag)
            }
            Error::MalformedEvents { expected, found } => {
                write!(f, "end tag </{}> does not match open element <{}>", found, expected)
            }
            Error::ArgumentError(msg) => write!(f, "{}", msg),
            Error::TypeMismatch { expected, found } => {
                write!(f, "expected an element of kind {}, found {}", expected, found)
            }
            Error::IndexOutOfRange { index, len } => {
                write!(f, "index {} out of range for a sequence of length {}", index, len)
            }
            Error::Xml(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<XmlError> for Error {
    fn from(e: XmlError) -> Self {
        Error::Xml(e)
    }
}
