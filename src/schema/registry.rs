//! The schema registry (§4.2): for each element kind, the derived index
//! `{child tag -> (attribute name, descriptor)}` plus at most one content
//! descriptor, built once and cached on the type.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::schema::descriptor::{ChildDescriptor, Descriptor, DescriptorKind, TextDescriptor};

/// Declares one element kind: its document-root tag (if any) and the
/// descriptors that make up its schema.
///
/// Implemented by a zero-sized marker type per element kind (`struct
/// Person;`, `struct Url;`, …) and used as the generic parameter of
/// [`crate::schema::Element`]. This is the declarative half of the schema;
/// the other half is a set of named accessor methods on `Element<Self>` that
/// call through to the generic engine (see SPEC_FULL.md §9).
pub trait Schema: 'static {
    /// The root tag required when this kind is parsed as a document.
    /// `None` for kinds that only ever appear as a child element —
    /// attempting to use such a kind as a `Document` root fails with
    /// `SchemaIncomplete` (§7).
    fn document_tag() -> Option<&'static str> {
        None
    }

    /// The descriptors declared for this kind. Called exactly once per
    /// process per concrete `Self` (see [`schema_of`]).
    fn descriptors() -> Vec<Descriptor>;
}

/// A child-tag descriptor, without its content counterpart (which is
/// indexed separately — see [`ElementSchema::content`]).
pub(crate) enum TagDescriptor {
    Child(ChildDescriptor),
    Text(TextDescriptor),
}

/// The built, cached index for one element kind.
pub(crate) struct ElementSchema {
    pub(crate) type_name: &'static str,
    pub(crate) document_tag: Option<&'static str>,
    pub(crate) child_tags: HashMap<&'static str, (&'static str, TagDescriptor)>,
    pub(crate) content: Option<&'static str>,
}

impl ElementSchema {
    fn build(type_name: &'static str, document_tag: Option<&'static str>, declared: Vec<Descriptor>) -> Result<ElementSchema> {
        let mut child_tags = HashMap::new();
        let mut content = None;

        for descriptor in declared {
            match descriptor.kind {
                DescriptorKind::Content => {
                    if content.is_some() {
                        return Err(Error::ArgumentError(format!("{} declares more than one content descriptor", type_name)));
                    }
                    content = Some(descriptor.attr);
                }
                DescriptorKind::Child(child) => {
                    if child_tags.contains_key(child.tag) {
                        return Err(Error::ArgumentError(format!("{} declares child tag {:?} more than once", type_name, child.tag)));
                    }
                    child_tags.insert(child.tag, (descriptor.attr, TagDescriptor::Child(child)));
                }
                DescriptorKind::Text(text) => {
                    if child_tags.contains_key(text.tag) {
                        return Err(Error::ArgumentError(format!("{} declares child tag {:?} more than once", type_name, text.tag)));
                    }
                    child_tags.insert(text.tag, (descriptor.attr, TagDescriptor::Text(text)));
                }
            }
        }

        Ok(ElementSchema { type_name, document_tag, child_tags, content })
    }
}

/// Returns the cached schema index for `K`, building it on first use.
///
/// The `static` below is declared inside a function generic over `K`: Rust
/// monomorphizes one instance of it per concrete `K`, which is exactly the
/// "cached on the class" behavior §4.2 asks for, without a global
/// type-keyed table.
///
/// A schema that fails to build (duplicate child tag, duplicate content
/// descriptor) caches that failure rather than the index; every call for
/// that `K` returns `Err(Error::ArgumentError(_))` instead of panicking
/// (§7: `ArgumentError` is recovered at construction, not an abort).
pub(crate) fn schema_of<K: Schema>() -> Result<&'static ElementSchema> {
    static CACHE: OnceLock<std::result::Result<ElementSchema, String>> = OnceLock::new();
    CACHE
        .get_or_init(|| {
            let type_name = std::any::type_name::<K>();
            ElementSchema::build(type_name, K::document_tag(), K::descriptors()).map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|msg| Error::ArgumentError(msg.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_child_tag_is_rejected() {
        struct Leaf;
        impl Schema for Leaf {
            fn descriptors() -> Vec<Descriptor> {
                vec![]
            }
        }

        let descriptors = vec![
            Descriptor::child::<Leaf>("first", "dup").unwrap(),
            Descriptor::text("second", "dup").unwrap(),
        ];
        let result = ElementSchema::build("Dup", None, descriptors);
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_content_descriptor_is_rejected() {
        let descriptors = vec![Descriptor::content("a"), Descriptor::content("b")];
        let result = ElementSchema::build("Dup", None, descriptors);
        assert!(result.is_err());
    }

    #[test]
    fn test_well_formed_schema_indexes_child_tags_and_content() {
        struct Leaf;
        impl Schema for Leaf {
            fn descriptors() -> Vec<Descriptor> {
                vec![]
            }
        }

        let descriptors = vec![
            Descriptor::child::<Leaf>("one", "one").unwrap(),
            Descriptor::texts("many", "many").unwrap(),
            Descriptor::content("body"),
        ];
        let schema = ElementSchema::build("Ok", Some("ok"), descriptors).unwrap();
        assert_eq!(schema.document_tag, Some("ok"));
        assert!(schema.child_tags.contains_key("one"));
        assert!(schema.child_tags.contains_key("many"));
        assert_eq!(schema.content, Some("body"));
    }

    #[test]
    fn test_schema_of_returns_argument_error_instead_of_panicking() {
        struct Leaf;
        impl Schema for Leaf {
            fn descriptors() -> Vec<Descriptor> {
                vec![]
            }
        }
        struct Dup;
        impl Schema for Dup {
            fn descriptors() -> Vec<Descriptor> {
                vec![Descriptor::child::<Leaf>("first", "dup").unwrap(), Descriptor::text("second", "dup").unwrap()]
            }
        }

        // Calling this through `schema_of` (rather than `ElementSchema::build`
        // directly) is what previously panicked; it must surface as a
        // catchable `Err`, and do so consistently across repeated calls
        // since the failure itself is cached.
        assert!(matches!(schema_of::<Dup>(), Err(Error::ArgumentError(_))));
        assert!(matches!(schema_of::<Dup>(), Err(Error::ArgumentError(_))));
    }
}
