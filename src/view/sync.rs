//! The graph view synchronizer.
//!
//! The [`Synchronizer`] is the only writer of the view. It reconciles the
//! view with two sources:
//!
//! - full reloads from the authoritative document snapshot, which replace the
//!   view wholesale and reset all transient state
//! - sub-trees fetched on demand, which are merged additively on top
//!
//! Expansion is split in two halves so the fetch can run elsewhere:
//! [`Synchronizer::request_expand`] validates the node and issues an
//! [`ExpandTicket`]; [`Synchronizer::apply_expand`] merges the response.
//! All state checks that decide how a response is merged happen in the
//! second half, against the state at arrival time.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use super::canvas::{Canvas, GraphView};
use super::history::{Removal, RemovalSlot};
use super::layout::{LayoutReport, LayoutRunner, Positions};
use super::menu::{context_menu, MenuAction, MenuItem, MenuState};
use super::selection::{Selection, SidebarBridge};
use super::viewport::Viewport;
use crate::error::AppError;
use crate::models::{Element, ElementList};

/// Proof that an expand was requested for a node present in the view.
///
/// Carries the reload generation current at request time; a response for
/// an older generation is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandTicket {
    pub node_id: String,
    pub generation: u64,
}

/// What [`Synchronizer::apply_expand`] did with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ExpandOutcome {
    /// New elements were merged.
    Merged { added: usize, collapsed: bool },
    /// The node has nothing below it.
    Empty,
    /// A full reload happened after the request, or the node is gone.
    Stale,
    /// The fetch failed; the view is unchanged.
    Failed,
}

/// Whether a sub-tree is currently merged into the view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Expansion {
    has_subtree: bool,
    expanded: Option<String>,
}

/// Read-only summary of the synchronizer state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub generation: u64,
    pub has_subtree: bool,
    pub expanded: Option<String>,
    pub can_undo: bool,
    pub selection: Option<Selection>,
    pub elements: ElementList,
}

/// Owns the view and every piece of state derived from it.
pub struct Synchronizer<V: GraphView = Canvas> {
    view: V,
    top_tree: Arc<Vec<Element>>,
    top_ids: HashSet<String>,
    expansion: Expansion,
    slot: RemovalSlot,
    generation: u64,
    layout: LayoutRunner,
    sidebar: SidebarBridge,
}

impl Default for Synchronizer<Canvas> {
    fn default() -> Self {
        Self::new(Canvas::new(), LayoutRunner::default())
    }
}

impl<V: GraphView> Synchronizer<V> {
    pub fn new(view: V, layout: LayoutRunner) -> Self {
        Self {
            view,
            top_tree: Arc::new(Vec::new()),
            top_ids: HashSet::new(),
            expansion: Expansion::default(),
            slot: RemovalSlot::default(),
            generation: 0,
            layout,
            sidebar: SidebarBridge::default(),
        }
    }

    // ========================================================================
    // Reload
    // ========================================================================

    /// Replaces the view with `snapshot`.
    ///
    /// The snapshot is validated before anything changes: every element
    /// needs an id and every edge needs both endpoints among the nodes.
    /// Repeated ids keep their first occurrence. On success the expansion
    /// state and the removal slot are reset, the generation advances, and
    /// layout runs.
    pub fn reload(&mut self, snapshot: &ElementList) -> Result<LayoutReport, AppError> {
        let elements = normalize(snapshot)?;
        self.top_ids = elements.iter().map(|e| e.id().to_string()).collect();
        self.top_tree = Arc::new(elements);
        self.generation += 1;
        self.reset_to_top_tree();

        tracing::info!(
            generation = self.generation,
            elements = self.view.len(),
            "Reloaded view"
        );
        Ok(self.run_layout())
    }

    /// Rebuilds the view from the top tree. Does not advance the generation.
    fn reset_to_top_tree(&mut self) {
        self.view.clear();
        for element in self.top_tree.iter() {
            self.view.add(element.clone());
        }
        self.expansion = Expansion::default();
        self.slot.clear();
    }

    // ========================================================================
    // Expand
    // ========================================================================

    /// Validates an expand of `node_id` and tags it with the current generation.
    pub fn request_expand(&self, node_id: &str) -> Result<ExpandTicket, AppError> {
        let element = self
            .view
            .get(node_id)
            .ok_or_else(|| AppError::ElementNotFound(node_id.to_string()))?;
        if !element.is_node() {
            return Err(AppError::NotANode(node_id.to_string()));
        }
        Ok(ExpandTicket {
            node_id: node_id.to_string(),
            generation: self.generation,
        })
    }

    /// Merges the response to an expand request.
    ///
    /// If a sub-tree is already open and the node belongs to the top tree,
    /// the view is first collapsed back to the top tree, so at most one
    /// sub-tree is ever open. Expanding a node inside an open sub-tree merges
    /// on top of it.
    pub fn apply_expand(
        &mut self,
        ticket: &ExpandTicket,
        result: Result<ElementList, AppError>,
    ) -> ExpandOutcome {
        let node_id = ticket.node_id.as_str();
        if ticket.generation != self.generation {
            tracing::debug!(
                node_id,
                requested = ticket.generation,
                current = self.generation,
                "Discarding sub-tree from an earlier reload"
            );
            return ExpandOutcome::Stale;
        }

        let subtree = match result {
            Ok(subtree) => subtree,
            Err(e) => {
                tracing::warn!(node_id, error = %e, "Sub-tree fetch failed");
                return ExpandOutcome::Failed;
            }
        };
        if subtree.is_empty() {
            tracing::debug!(node_id, "Node has no sub-tree");
            return ExpandOutcome::Empty;
        }

        let collapse = self.expansion.has_subtree && self.in_top_tree(node_id);
        if !collapse && !self.view.contains(node_id) {
            tracing::debug!(node_id, "Discarding sub-tree of a node no longer in view");
            return ExpandOutcome::Stale;
        }
        if collapse {
            tracing::debug!(node_id, "Collapsing open sub-tree");
            self.reset_to_top_tree();
        }

        let added = self.merge(&subtree);
        self.expansion = Expansion {
            has_subtree: true,
            expanded: Some(node_id.to_string()),
        };
        tracing::debug!(node_id, added, collapse, "Merged sub-tree");
        self.run_layout();
        ExpandOutcome::Merged {
            added,
            collapsed: collapse,
        }
    }

    /// Adds elements not already present. Nodes go first so edges can
    /// attach; edges whose endpoints are still missing are skipped.
    fn merge(&mut self, subtree: &ElementList) -> usize {
        let mut added = 0;
        for element in subtree.flatten() {
            if element.id().is_empty() {
                tracing::warn!("Skipping sub-tree element without id");
                continue;
            }
            if element.is_edge() {
                let attached = [element.source(), element.target()]
                    .into_iter()
                    .all(|end| end.is_some_and(|id| self.view.contains(id)));
                if !attached {
                    tracing::debug!(edge = element.id(), "Skipping edge with missing endpoint");
                    continue;
                }
            }
            if self.view.add(element) {
                added += 1;
            }
        }
        added
    }

    // ========================================================================
    // Remove / restore
    // ========================================================================

    /// Removes an element (a node takes its incident edges along) into the
    /// removal slot, replacing whatever the slot held. Missing ids are a no-op.
    pub fn remove_element(&mut self, id: &str) -> Option<LayoutReport> {
        let Some(removal) = Removal::take(&mut self.view, id) else {
            tracing::debug!(id, "Nothing to remove");
            return None;
        };
        tracing::debug!(id, removed = removal.len(), "Removed element");
        self.slot.store(removal);
        Some(self.run_layout())
    }

    /// Restores the last removal. An empty slot is a no-op.
    pub fn restore_last(&mut self) -> Option<LayoutReport> {
        let removal = self.slot.take()?;
        let restored = removal.restore(&mut self.view);
        tracing::debug!(restored, "Restored last removal");
        Some(self.run_layout())
    }

    // ========================================================================
    // Layout
    // ========================================================================

    /// Lays out the whole view and fits the viewport.
    pub fn run_layout(&mut self) -> LayoutReport {
        self.layout.run(&self.view)
    }

    // ========================================================================
    // Interaction
    // ========================================================================

    /// Primary click. Background and edges do nothing; a node starts an expand.
    pub fn tap(&self, target: Option<&str>) -> Result<Option<ExpandTicket>, AppError> {
        let Some(id) = target else {
            return Ok(None);
        };
        let element = self
            .view
            .get(id)
            .ok_or_else(|| AppError::ElementNotFound(id.to_string()))?;
        if element.is_edge() {
            return Ok(None);
        }
        self.request_expand(id).map(Some)
    }

    /// Secondary click. An element opens the side panel on its fields; the
    /// background closes it and re-runs layout.
    pub fn context_tap(&mut self, target: Option<&str>) -> Result<Option<Selection>, AppError> {
        match target {
            Some(id) => {
                let element = self
                    .view
                    .get(id)
                    .ok_or_else(|| AppError::ElementNotFound(id.to_string()))?;
                Ok(self.sidebar.surface(Some(element)).cloned())
            }
            None => {
                self.sidebar.clear();
                self.run_layout();
                Ok(None)
            }
        }
    }

    /// Context menu for `target` (background when `None`).
    pub fn menu(&self, target: Option<&str>) -> Vec<MenuItem> {
        let state = MenuState {
            target: target.and_then(|id| self.view.get(id)).map(|e| e.kind),
            can_undo: !self.slot.is_empty(),
        };
        context_menu(&state)
    }

    /// Runs a menu action. Disabled actions are a no-op.
    pub fn invoke(&mut self, action: MenuAction, target: Option<&str>) -> Option<LayoutReport> {
        match action {
            MenuAction::Remove => target.and_then(|id| self.remove_element(id)),
            MenuAction::Undo => self.restore_last(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_subtree(&self) -> bool {
        self.expansion.has_subtree
    }

    pub fn expanded_node(&self) -> Option<&str> {
        self.expansion.expanded.as_deref()
    }

    pub fn can_undo(&self) -> bool {
        !self.slot.is_empty()
    }

    pub fn in_top_tree(&self, id: &str) -> bool {
        self.top_ids.contains(id)
    }

    /// The elements of the last full reload.
    pub fn top_tree(&self) -> Arc<Vec<Element>> {
        Arc::clone(&self.top_tree)
    }

    pub fn sidebar(&self) -> &SidebarBridge {
        &self.sidebar
    }

    pub fn positions(&self) -> &Positions {
        self.layout.positions()
    }

    pub fn viewport(&self) -> &Viewport {
        self.layout.viewport()
    }

    pub fn layout_runs(&self) -> u64 {
        self.layout.runs()
    }

    pub fn last_layout(&self) -> Option<&LayoutReport> {
        self.layout.last_report()
    }

    pub fn state(&self) -> ViewState {
        ViewState {
            generation: self.generation,
            has_subtree: self.expansion.has_subtree,
            expanded: self.expansion.expanded.clone(),
            can_undo: self.can_undo(),
            selection: self.sidebar.selection().cloned(),
            elements: self.view.to_list(),
        }
    }
}

/// Flattens and validates a snapshot.
fn normalize(snapshot: &ElementList) -> Result<Vec<Element>, AppError> {
    let mut seen = HashSet::new();
    let mut elements = Vec::with_capacity(snapshot.len());
    for element in snapshot.flatten() {
        let id = element.id();
        if id.is_empty() {
            return Err(AppError::MalformedSnapshot(format!(
                "{:?} element without id",
                element.kind
            )));
        }
        if !seen.insert(id.to_string()) {
            tracing::debug!(id, "Dropping repeated element id");
            continue;
        }
        elements.push(element);
    }

    let node_ids: HashSet<&str> = elements
        .iter()
        .filter(|e| e.is_node())
        .map(Element::id)
        .collect();
    for edge in elements.iter().filter(|e| e.is_edge()) {
        for end in [edge.source(), edge.target()] {
            match end {
                Some(id) if node_ids.contains(id) => {}
                _ => {
                    return Err(AppError::MalformedSnapshot(format!(
                        "edge '{}' has a missing endpoint",
                        edge.id()
                    )))
                }
            }
        }
    }
    Ok(elements)
}
