//! A lazy, schema-directed pull-DOM parser for XML.
//!
//! Declare the shape of the documents you expect as typed *element schemas*
//! — named children, repeated children, text-only children, and direct text
//! content — and read them back as ordinary method calls. The parser only
//! consumes as much of the input as answering your next read requires; it
//! never builds the whole tree up front.
//!
//! It uses [quick-xml](https://crates.io/crates/quick-xml) — a light-weight,
//! streaming XML parser — as the underlying event source, wrapped in an
//! incremental reader that can be fed one text fragment at a time.
//!
//! # Usage
//!
//! Implement [`schema::Schema`] for a zero-sized marker type per element
//! kind, then wrap the generic [`schema::Element`] accessors in small named
//! methods:
//!
//! ```
//! use xmlorm::error::Result;
//! use xmlorm::schema::{Descriptor, Document, Element, Schema};
//!
//! struct Person;
//! impl Schema for Person {
//!     fn document_tag() -> Option<&'static str> {
//!         Some("person")
//!     }
//!     fn descriptors() -> Vec<Descriptor> {
//!         vec![
//!             Descriptor::required_text("name", "name").unwrap(),
//!             Descriptor::required_child::<Dob>("dob", "dob").unwrap(),
//!         ]
//!     }
//! }
//!
//! struct Dob;
//! impl Schema for Dob {
//!     fn descriptors() -> Vec<Descriptor> {
//!         vec![Descriptor::content("value")]
//!     }
//! }
//!
//! impl Element<Person> {
//!     fn name(&self) -> Result<Option<String>> {
//!         self.text("name")
//!     }
//!     fn dob(&self) -> Result<Option<Element<Dob>>> {
//!         self.child("dob")
//!     }
//! }
//!
//! let xml = vec!["<person><name>Hong Minhee</name><dob>1988-08-04</dob></person>".to_owned()];
//! let person = Document::<Person>::parse(xml.into_iter()).unwrap();
//! assert_eq!(person.name().unwrap().as_deref(), Some("Hong Minhee"));
//! assert_eq!(person.dob().unwrap().unwrap().content().unwrap().as_deref(), Some("1988-08-04"));
//! ```
//!
//! # Scope
//!
//! This crate is the parsing core only: the schema model, the streaming
//! event handler, and the demand-driven pump. Concrete document formats
//! (feed formats, sitemaps, config schemas, …), packaging/distribution
//! metadata, a repository registry, and writing trees back out to XML are
//! all left to applications built on top of it.

#![forbid(unsafe_code)]

pub mod chunks;
pub mod error;
pub mod schema;

mod xml;

pub use chunks::ChunkProducer;
pub use error::{Error, Result};
pub use schema::{Children, Descriptor, Document, Element, Schema, Texts};
