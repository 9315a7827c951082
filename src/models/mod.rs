//! Domain models for schema documents and their graph elements.

mod document;
mod element;

pub use document::{DocumentSnapshot, FieldEdit};
pub use element::{
    display_value, is_excluded_key, Element, ElementKind, ElementList, Fields, EXCLUDED_KEYS,
};
