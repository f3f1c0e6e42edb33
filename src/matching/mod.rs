// src/matching/mod.rs
//! Field to profile-attribute matching.

pub mod matcher;
pub mod synonyms;

pub use matcher::{FieldMapping, FieldMatch, ProfileMatcher};
pub use synonyms::synonyms_for;
