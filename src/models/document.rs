//! Document snapshots and field edits exchanged with the schema backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ElementList;

/// The authoritative document as returned by upload, reload, or field edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    /// Display name of the schema.
    pub name: String,
    /// Base element list shown when the document is (re)loaded.
    pub parsed_schema: ElementList,
    /// Raw document (the events array) for editing and download.
    pub schema_json: Value,
}

/// An edit submitted from the side panel: set `key` of element `id` to `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEdit {
    pub id: String,
    pub key: String,
    pub value: String,
}

impl FieldEdit {
    pub fn new(id: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}
