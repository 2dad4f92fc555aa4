//! The descriptor family (§2.2, §4.1): the small closed set of ways an
//! element schema can declare a child.
//!
//! A [`Descriptor`] is what user code builds, inside a `Schema::descriptors()`
//! impl, to declare one attribute. Internally it carries a [`DescriptorKind`]
//! — the tagged union the redesign notes ask for, with `Content` folded into
//! the same closed sum as `Child` and `Text` even though the registry (see
//! `schema::registry`) indexes it separately because it carries no child tag
//! of its own.

use crate::error::{Error, Result};
use crate::schema::registry::ElementSchema;
use crate::schema::Schema;

/// A nested element, single or repeated.
pub(crate) struct ChildDescriptor {
    pub(crate) tag: &'static str,
    // Recorded but not enforced: schema validation beyond well-formedness
    // relative to declared children is out of scope (see SPEC_FULL.md §1
    // Non-goals), matching libearth's own `Descriptor.required`, which the
    // reference implementation stores and never checks either.
    #[allow(dead_code)]
    pub(crate) required: bool,
    pub(crate) multiple: bool,
    // Kept for diagnostics (e.g. a future `TypeMismatch` message naming the
    // declared type); not read by the engine today.
    #[allow(dead_code)]
    pub(crate) child_type_name: &'static str,
    pub(crate) child_schema: fn() -> Result<&'static ElementSchema>,
}

/// A nested element whose only payload is character data.
pub(crate) struct TextDescriptor {
    pub(crate) tag: &'static str,
    #[allow(dead_code)]
    pub(crate) required: bool,
    pub(crate) multiple: bool,
}

/// The tagged union of descriptor kinds. `Content` is not keyed by a tag —
/// it describes the element's own text, not a named child — so the registry
/// still indexes it in a separate slot, but it is declared through this same
/// closed sum rather than as an unrelated type (see SPEC_FULL.md §9).
pub(crate) enum DescriptorKind {
    Child(ChildDescriptor),
    Text(TextDescriptor),
    Content,
}

/// One declared attribute of an element schema: the Rust-attribute name it
/// will be read back through, paired with the kind of thing it describes.
pub struct Descriptor {
    pub(crate) attr: &'static str,
    pub(crate) kind: DescriptorKind,
}

impl Descriptor {
    /// Declares a single, optional nested element of kind `C`.
    pub fn child<C: Schema>(attr: &'static str, tag: &'static str) -> Result<Descriptor> {
        Self::child_with_flags::<C>(attr, tag, false, false)
    }

    /// Declares a required nested element of kind `C`.
    pub fn required_child<C: Schema>(attr: &'static str, tag: &'static str) -> Result<Descriptor> {
        Self::child_with_flags::<C>(attr, tag, true, false)
    }

    /// Declares a repeated nested element of kind `C`.
    pub fn children<C: Schema>(attr: &'static str, tag: &'static str) -> Result<Descriptor> {
        Self::child_with_flags::<C>(attr, tag, false, true)
    }

    fn child_with_flags<C: Schema>(attr: &'static str, tag: &'static str, required: bool, multiple: bool) -> Result<Descriptor> {
        if required && multiple {
            return Err(Error::ArgumentError(format!("descriptor {:?} cannot be both required and multiple", attr)));
        }
        Ok(Descriptor {
            attr,
            kind: DescriptorKind::Child(ChildDescriptor {
                tag,
                required,
                multiple,
                child_type_name: std::any::type_name::<C>(),
                child_schema: crate::schema::registry::schema_of::<C>,
            }),
        })
    }

    /// Declares a single, optional text-only nested element.
    pub fn text(attr: &'static str, tag: &'static str) -> Result<Descriptor> {
        Self::text_with_flags(attr, tag, false, false)
    }

    /// Declares a required text-only nested element.
    pub fn required_text(attr: &'static str, tag: &'static str) -> Result<Descriptor> {
        Self::text_with_flags(attr, tag, true, false)
    }

    /// Declares a repeated text-only nested element.
    pub fn texts(attr: &'static str, tag: &'static str) -> Result<Descriptor> {
        Self::text_with_flags(attr, tag, false, true)
    }

    fn text_with_flags(attr: &'static str, tag: &'static str, required: bool, multiple: bool) -> Result<Descriptor> {
        if required && multiple {
            return Err(Error::ArgumentError(format!("descriptor {:?} cannot be both required and multiple", attr)));
        }
        Ok(Descriptor { attr, kind: DescriptorKind::Text(TextDescriptor { tag, required, multiple }) })
    }

    /// Declares the element's own direct text content. At most one per
    /// schema (§3 "at most one per element type").
    pub fn content(attr: &'static str) -> Descriptor {
        Descriptor { attr, kind: DescriptorKind::Content }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf;
    impl Schema for Leaf {
        fn descriptors() -> Vec<Descriptor> {
            Vec::new()
        }
    }

    #[test]
    fn test_required_and_multiple_is_rejected() {
        assert!(Descriptor::child_with_flags::<Leaf>("x", "x", true, true).is_err());
        assert!(Descriptor::text_with_flags("x", "x", true, true).is_err());
    }

    #[test]
    fn test_plain_child_is_accepted() {
        assert!(Descriptor::child::<Leaf>("leaf", "leaf").is_ok());
        assert!(Descriptor::required_child::<Leaf>("leaf", "leaf").is_ok());
        assert!(Descriptor::children::<Leaf>("leaf", "leaf").is_ok());
    }
}
