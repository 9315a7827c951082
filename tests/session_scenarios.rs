//! End-to-end scenarios for the graph view, driven through the public API.
//!
//! The synchronizer is exercised directly for the structural properties, and
//! through the engine with an in-memory backend for the asynchronous flows.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use curate::backend::{Backend, DocumentEndpoint, SubtreeFetcher};
use curate::config::Config;
use curate::error::AppError;
use curate::models::{DocumentSnapshot, Element, ElementList, FieldEdit, EXCLUDED_KEYS};
use curate::services::{Engine, EngineEvent, EngineHandle};
use curate::view::{ExpandOutcome, GraphView, MenuAction, Synchronizer};

// ============================================================================
// Fixtures
// ============================================================================

fn base() -> ElementList {
    let mut root = Element::node("root", "Root", "root", "diamond");
    root.data.insert("comment".into(), json!("top of the schema"));
    root.data.insert("children_gate".into(), json!("or"));
    ElementList {
        nodes: vec![
            root,
            Element::node("A", "A", "parent", "diamond"),
            Element::node("B", "B", "parent", "diamond"),
        ],
        edges: vec![
            Element::edge("root", "A", "step_child"),
            Element::edge("root", "B", "step_child"),
        ],
    }
}

fn subtree(parent: &str, children: &[&str]) -> ElementList {
    ElementList {
        nodes: children
            .iter()
            .map(|c| Element::node(c, c, "child", "ellipse"))
            .collect(),
        edges: children
            .iter()
            .map(|c| Element::edge(parent, c, "step_child"))
            .collect(),
    }
}

fn ids(sync: &Synchronizer) -> Vec<String> {
    sync.view().elements().map(|e| e.id().to_string()).collect()
}

fn loaded() -> Synchronizer {
    let mut sync: Synchronizer = Synchronizer::default();
    sync.reload(&base()).unwrap();
    sync
}

fn expand(sync: &mut Synchronizer, node: &str, result: Result<ElementList, AppError>) -> ExpandOutcome {
    let ticket = sync.request_expand(node).unwrap();
    sync.apply_expand(&ticket, result)
}

/// In-memory backend with canned sub-trees and optional response delays.
#[derive(Default)]
struct FixtureBackend {
    subtrees: HashMap<String, ElementList>,
    delays: HashMap<String, Duration>,
    failing: Vec<String>,
}

impl FixtureBackend {
    fn with_subtree(mut self, parent: &str, children: &[&str]) -> Self {
        self.subtrees
            .insert(parent.to_string(), subtree(parent, children));
        self
    }

    fn with_delay(mut self, node: &str, millis: u64) -> Self {
        self.delays
            .insert(node.to_string(), Duration::from_millis(millis));
        self
    }
}

#[async_trait]
impl SubtreeFetcher for FixtureBackend {
    async fn fetch_subtree(&self, node_id: &str) -> Result<ElementList, AppError> {
        if let Some(delay) = self.delays.get(node_id) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.iter().any(|f| f == node_id) {
            return Err(AppError::SubtreeUnavailable(node_id.to_string()));
        }
        Ok(self.subtrees.get(node_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl DocumentEndpoint for FixtureBackend {
    async fn upload(&self, _file_name: &str, _contents: Vec<u8>) -> Result<DocumentSnapshot, AppError> {
        Ok(DocumentSnapshot {
            name: "Events/1/Outbreak".to_string(),
            parsed_schema: base(),
            schema_json: json!([{"@id": "root"}]),
        })
    }

    async fn reload(&self, schema_json: &Value) -> Result<DocumentSnapshot, AppError> {
        Ok(DocumentSnapshot {
            name: "Events/1/Outbreak".to_string(),
            parsed_schema: base(),
            schema_json: schema_json.clone(),
        })
    }

    async fn update_field(&self, edit: &FieldEdit) -> Result<DocumentSnapshot, AppError> {
        Err(AppError::Backend {
            status: 500,
            title: format!("KeyError: '{}'", edit.key),
        })
    }
}

async fn engine(backend: FixtureBackend) -> EngineHandle {
    let handle = Engine::new(Backend::new(backend), &Config::default()).spawn();
    handle.upload("schema.json", b"{}".to_vec()).await.unwrap();
    handle.settle().await.unwrap();
    handle
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_reload_is_idempotent() {
    let mut once: Synchronizer = Synchronizer::default();
    once.reload(&base()).unwrap();

    let mut twice = loaded();
    twice.reload(&base()).unwrap();

    assert_eq!(once.view().to_list(), twice.view().to_list());
    assert_eq!(ids(&once), ids(&twice));
}

#[test]
fn test_single_active_subtree() {
    let mut sync = loaded();
    expand(&mut sync, "A", Ok(subtree("A", &["A1", "A2"])));
    expand(&mut sync, "B", Ok(subtree("B", &["B1"])));
    expand(&mut sync, "A", Ok(subtree("A", &["A1", "A2"])));

    assert!(sync.view().contains("A1"));
    assert!(!sync.view().contains("B1"));
    assert_eq!(sync.view().len(), 5 + 4);
}

#[test]
fn test_removal_slot_holds_one() {
    let mut sync = loaded();
    sync.remove_element("root_A");
    sync.remove_element("root_B");

    sync.restore_last();
    assert!(sync.view().contains("root_B"));
    assert!(!sync.view().contains("root_A"));
    assert!(sync.restore_last().is_none());
}

#[test]
fn test_restore_is_exact() {
    let mut sync = loaded();
    let before = sync.view().to_list();
    let order = ids(&sync);

    sync.remove_element("A");
    sync.restore_last();

    assert_eq!(sync.view().to_list(), before);
    assert_eq!(ids(&sync), order);
}

#[test]
fn test_selection_never_exposes_internal_keys() {
    let mut sync = loaded();
    for id in ids(&sync) {
        let selection = sync.context_tap(Some(id.as_str())).unwrap().unwrap();
        for entry in &selection.entries {
            assert!(
                !EXCLUDED_KEYS.contains(&entry.key.as_str()),
                "{id} exposed {}",
                entry.key
            );
        }
    }
}

#[test]
fn test_undo_disabled_until_removal() {
    let mut sync = loaded();
    let undo = |sync: &Synchronizer| {
        sync.menu(None)
            .into_iter()
            .find(|i| i.action == MenuAction::Undo)
            .map(|i| i.enabled)
    };
    assert_eq!(undo(&sync), Some(false));
    assert!(sync.invoke(MenuAction::Undo, None).is_none());

    sync.remove_element("B");
    assert_eq!(undo(&sync), Some(true));

    sync.reload(&base()).unwrap();
    assert_eq!(undo(&sync), Some(false));
}

#[test]
fn test_undo_does_not_recover_edges_skipped_while_removed() {
    let mut sync = loaded();
    sync.remove_element("A");

    let mut outlinked = subtree("B", &["B1"]);
    outlinked.edges.push(Element::edge("B1", "A", "child_outlink"));
    expand(&mut sync, "B", Ok(outlinked));
    assert!(sync.view().contains("B_B1"));
    assert!(!sync.view().contains("B1_A"));

    sync.restore_last();
    assert!(sync.view().contains("A"));
    assert!(sync.view().contains("root_A"));
    assert!(!sync.view().contains("B1_A"));
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_scenario_select_and_clear() {
    let mut sync = loaded();
    let list = sync.view().to_list();
    assert_eq!(list.nodes.len(), 3);
    assert_eq!(list.edges.len(), 2);

    let selection = sync.context_tap(Some("root")).unwrap().unwrap();
    let keys: Vec<&str> = selection.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["comment", "children_gate"]);

    let runs = sync.layout_runs();
    assert!(sync.context_tap(None).unwrap().is_none());
    assert!(sync.sidebar().selection().is_none());
    assert_eq!(sync.layout_runs(), runs + 1);
}

#[test]
fn test_scenario_expand_without_data() {
    let mut sync = loaded();
    let before = ids(&sync);

    let outcome = expand(&mut sync, "A", Ok(ElementList::default()));

    assert_eq!(outcome, ExpandOutcome::Empty);
    assert_eq!(ids(&sync), before);
    assert!(!sync.has_subtree());
}

#[test]
fn test_scenario_second_expand_retracts_first() {
    let mut sync = loaded();
    expand(&mut sync, "A", Ok(subtree("A", &["A1", "A2"])));
    assert!(sync.view().contains("A2"));

    let outcome = expand(&mut sync, "B", Ok(subtree("B", &["B1", "B2"])));
    assert!(matches!(outcome, ExpandOutcome::Merged { collapsed: true, .. }));

    let mut expected = ids(&loaded());
    expected.extend(["B1", "B2", "B_B1", "B_B2"].map(String::from));
    assert_eq!(ids(&sync), expected);
}

// ============================================================================
// Engine flows
// ============================================================================

#[tokio::test]
async fn test_engine_out_of_order_responses_keep_one_subtree() {
    let backend = FixtureBackend::default()
        .with_subtree("A", &["A1"])
        .with_subtree("B", &["B1"])
        .with_delay("A", 50);
    let handle = engine(backend).await;

    // A is requested first but answers last
    assert!(handle.tap(Some("A")).await.unwrap());
    assert!(handle.tap(Some("B")).await.unwrap());
    handle.settle().await.unwrap();

    let state = handle.state().await.unwrap();
    assert_eq!(state.view.expanded.as_deref(), Some("A"));
    let node_ids: Vec<&str> = state.view.elements.nodes.iter().map(|n| n.id()).collect();
    assert!(node_ids.contains(&"A1"));
    assert!(!node_ids.contains(&"B1"));
}

#[tokio::test]
async fn test_engine_discards_response_from_before_reload() {
    let backend = FixtureBackend::default()
        .with_subtree("A", &["A1"])
        .with_delay("A", 50);
    let handle = engine(backend).await;
    let mut events = handle.subscribe();

    handle.tap(Some("A")).await.unwrap();
    handle.refresh().await.unwrap();
    handle.settle().await.unwrap();

    let state = handle.state().await.unwrap();
    assert_eq!(state.view.generation, 2);
    assert!(!state.view.has_subtree);

    let mut stale = false;
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::Expanded { outcome, .. } = event {
            stale |= outcome == ExpandOutcome::Stale;
        }
    }
    assert!(stale);
}

#[tokio::test]
async fn test_engine_fetch_failure_is_silent() {
    let backend = FixtureBackend {
        failing: vec!["A".to_string()],
        ..FixtureBackend::default()
    };
    let handle = engine(backend).await;
    let before = handle.state().await.unwrap().view.elements;
    let mut events = handle.subscribe();

    handle.tap(Some("A")).await.unwrap();
    handle.settle().await.unwrap();

    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, EngineEvent::Notify { .. }));
        if let EngineEvent::Expanded { outcome, .. } = event {
            failed |= outcome == ExpandOutcome::Failed;
        }
    }
    assert!(failed);
    let state = handle.state().await.unwrap();
    assert!(!state.view.has_subtree);
    assert_eq!(state.view.elements, before);
}

#[tokio::test]
async fn test_engine_field_edit_failure_notifies_with_title() {
    let handle = engine(FixtureBackend::default()).await;
    let mut events = handle.subscribe();

    handle
        .edit(FieldEdit::new("A", "children_gate", "and"))
        .await
        .unwrap();
    handle.settle().await.unwrap();

    let mut message = None;
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::Notify { notification } = event {
            message = Some(notification.message);
        }
    }
    assert_eq!(
        message.as_deref(),
        Some(curate::error::MISSING_CHILDREN_GATE_HINT)
    );
    assert_eq!(handle.state().await.unwrap().view.generation, 1);
}
