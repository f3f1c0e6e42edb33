// src/fill/mod.rs
pub mod executor;
pub mod result;

pub use executor::{visual_order, FillExecutor, FillOptions};
pub use result::{FailedField, FieldRef, FillResult, FilledField, SkippedField};
