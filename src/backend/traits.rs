//! Traits at the boundary to the schema backend.
//!
//! - [`SubtreeFetcher`] - Lazy sub-tree lookup used by expand
//! - [`DocumentEndpoint`] - Upload, reload and field-edit round trips
//! - [`SchemaBackend`] - Both of the above, as one handle

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;
use crate::models::{DocumentSnapshot, ElementList, FieldEdit};

/// Retrieves the elements connected below a node.
#[async_trait]
pub trait SubtreeFetcher: Send + Sync {
    /// Fetches the sub-tree of `node_id`.
    ///
    /// An empty list is a valid answer (leaf node). Errors are recoverable:
    /// the caller logs them and leaves the view unchanged.
    async fn fetch_subtree(&self, node_id: &str) -> Result<ElementList, AppError>;
}

/// Produces authoritative document snapshots.
#[async_trait]
pub trait DocumentEndpoint: Send + Sync {
    /// Uploads a document file (`{"events": [...]}`) and returns its snapshot.
    async fn upload(&self, file_name: &str, contents: Vec<u8>) -> Result<DocumentSnapshot, AppError>;

    /// Re-parses an edited raw document (the bare events array).
    async fn reload(&self, schema_json: &Value) -> Result<DocumentSnapshot, AppError>;

    /// Applies a single field edit and returns the updated snapshot.
    async fn update_field(&self, edit: &FieldEdit) -> Result<DocumentSnapshot, AppError>;
}

/// A backend serving both sub-trees and documents.
pub trait SchemaBackend: SubtreeFetcher + DocumentEndpoint {}

impl<T: SubtreeFetcher + DocumentEndpoint> SchemaBackend for T {}
