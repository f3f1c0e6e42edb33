// src/fields/mod.rs
//! Field enumeration and labelling.

pub mod catalog;
pub mod label;

pub use catalog::{catalog, controls, is_fillable_control, FieldDescriptor, FieldKind, EEO_PATTERNS};
pub use label::resolve_identifier;
