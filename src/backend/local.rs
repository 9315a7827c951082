//! In-process schema backend.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::traits::{DocumentEndpoint, SubtreeFetcher};
use crate::error::AppError;
use crate::models::{DocumentSnapshot, ElementList, FieldEdit};
use crate::schema::{apply_edit, SchemaGraph};

/// Parses documents locally and answers sub-tree lookups from the last
/// successfully loaded document.
#[derive(Default)]
pub struct LocalBackend {
    loaded: RwLock<Option<Loaded>>,
}

struct Loaded {
    graph: SchemaGraph,
    events: Value,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `events`, and on success makes it the current document.
    async fn load(&self, events: Value) -> Result<DocumentSnapshot, AppError> {
        let list = events
            .as_array()
            .ok_or_else(|| AppError::Schema("document must be an array of events".to_string()))?;
        let graph = SchemaGraph::parse(list)?;
        let name = list
            .first()
            .and_then(|e| e.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::missing_key("name", "first event"))?
            .to_string();
        let parsed_schema = graph.base_tree()?;

        tracing::info!(
            name = %name,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Loaded schema document"
        );
        let snapshot = DocumentSnapshot {
            name,
            parsed_schema,
            schema_json: events.clone(),
        };
        *self.loaded.write().await = Some(Loaded { graph, events });
        Ok(snapshot)
    }
}

#[async_trait]
impl SubtreeFetcher for LocalBackend {
    async fn fetch_subtree(&self, node_id: &str) -> Result<ElementList, AppError> {
        let loaded = self.loaded.read().await;
        let loaded = loaded.as_ref().ok_or(AppError::NotLoaded)?;
        loaded.graph.subtree(node_id)
    }
}

#[async_trait]
impl DocumentEndpoint for LocalBackend {
    async fn upload(&self, file_name: &str, contents: Vec<u8>) -> Result<DocumentSnapshot, AppError> {
        let mut document: Value = serde_json::from_slice(&contents)?;
        let events = document
            .get_mut("events")
            .map(Value::take)
            .ok_or_else(|| AppError::missing_key("events", format!("file '{file_name}'")))?;
        self.load(events).await
    }

    async fn reload(&self, schema_json: &Value) -> Result<DocumentSnapshot, AppError> {
        self.load(schema_json.clone()).await
    }

    async fn update_field(&self, edit: &FieldEdit) -> Result<DocumentSnapshot, AppError> {
        let mut events = {
            let loaded = self.loaded.read().await;
            loaded.as_ref().ok_or(AppError::NotLoaded)?.events.clone()
        };
        apply_edit(&mut events, edit)?;
        self.load(events).await
    }
}
