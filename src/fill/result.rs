// src/fill/result.rs
use crate::dom::NodeId;
use crate::fields::{FieldDescriptor, FieldKind};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Serializable reference to a field of the page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRef {
    pub node: NodeId,
    pub identifier: String,
    pub name: String,
    pub id: String,
    pub kind: FieldKind,
}

impl From<&FieldDescriptor> for FieldRef {
    fn from(field: &FieldDescriptor) -> Self {
        Self {
            node: field.node,
            identifier: field.identifier.clone(),
            name: field.name.clone(),
            id: field.id.clone(),
            kind: field.kind.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilledField {
    #[serde(flatten)]
    pub field: FieldRef,
    pub key: String,
    pub value: String,
    pub confidence: f64,
    /// Read-back matched what was written; `None` when validation was off
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated: Option<bool>,
    /// Constraint validation passed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedField {
    #[serde(flatten)]
    pub field: FieldRef,
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedField {
    #[serde(flatten)]
    pub field: FieldRef,
    pub reason: String,
}

/// Outcome of one fill pass. Every field lands in at most one bucket.
#[derive(Debug, Clone, Serialize)]
pub struct FillResult {
    pub filled: Vec<FilledField>,
    pub failed: Vec<FailedField>,
    pub skipped: Vec<SkippedField>,
    pub file_uploads: Vec<FieldRef>,
    pub total_fields: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl FillResult {
    pub fn new() -> Self {
        Self {
            filled: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            file_uploads: Vec::new(),
            total_fields: 0,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn finish(&mut self) {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        self.duration_ms = elapsed.num_milliseconds().max(0) as u64;
    }

    pub fn is_empty(&self) -> bool {
        self.filled.is_empty()
            && self.failed.is_empty()
            && self.skipped.is_empty()
            && self.file_uploads.is_empty()
    }

    /// Name of the bucket holding `node`, if any
    pub fn bucket_of(&self, node: NodeId) -> Option<&'static str> {
        if self.filled.iter().any(|f| f.field.node == node) {
            Some("filled")
        } else if self.failed.iter().any(|f| f.field.node == node) {
            Some("failed")
        } else if self.skipped.iter().any(|f| f.field.node == node) {
            Some("skipped")
        } else if self.file_uploads.iter().any(|f| f.node == node) {
            Some("file_uploads")
        } else {
            None
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for FillResult {
    fn default() -> Self {
        Self::new()
    }
}
