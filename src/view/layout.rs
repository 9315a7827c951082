//! Layout runner and the pluggable layout engines.
//!
//! A [`LayoutEngine`] maps a [`LayoutGraph`] (the nodes and edges currently
//! in the view) to positions. The [`LayoutRunner`] owns the engine, keeps the
//! last positions and, once a run completes, fits and centers the viewport.

use std::collections::HashMap;

use glam::Vec2;
use indexmap::IndexMap;
use serde::Serialize;

use super::canvas::GraphView;
use super::force::ForceLayout;
use super::layered::LayeredLayout;
use super::viewport::Viewport;
use crate::config::{LayoutAlgorithm, LayoutConfig, ViewportConfig};

/// Node positions in layout units, in view order.
pub type Positions = IndexMap<String, Vec2>;

/// A node as the layout sees it.
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub id: String,
    pub node_type: Option<String>,
}

/// An edge between two node indices.
#[derive(Debug, Clone)]
pub struct LayoutEdge {
    pub from_idx: usize,
    pub to_idx: usize,
    pub edge_type: Option<String>,
}

/// The structure handed to a layout engine.
#[derive(Debug, Clone, Default)]
pub struct LayoutGraph {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
}

impl LayoutGraph {
    /// Collects the nodes of `view` and the edges whose endpoints are both present.
    pub fn from_view<V: GraphView + ?Sized>(view: &V) -> Self {
        let mut nodes = Vec::new();
        let mut id_to_idx = HashMap::new();
        for element in view.elements().filter(|e| e.is_node()) {
            id_to_idx.insert(element.id().to_string(), nodes.len());
            nodes.push(LayoutNode {
                id: element.id().to_string(),
                node_type: element.node_type().map(str::to_string),
            });
        }

        let edges = view
            .elements()
            .filter(|e| e.is_edge())
            .filter_map(|e| {
                let from_idx = *id_to_idx.get(e.source()?)?;
                let to_idx = *id_to_idx.get(e.target()?)?;
                Some(LayoutEdge {
                    from_idx,
                    to_idx,
                    edge_type: e.edge_type().map(str::to_string),
                })
            })
            .collect();

        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Arranges nodes. Engines must be total: every node of the input gets a
/// finite position.
pub trait LayoutEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn compute(&self, graph: &LayoutGraph) -> Positions;
}

/// Axis-aligned box around a set of positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    /// Bounds of all positions, `None` if there are none.
    pub fn of(positions: &Positions) -> Option<Self> {
        let mut points = positions.values();
        let first = *points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Self { min, max })
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) / 2.0
    }

    /// Grows the box by `margin` on every side.
    pub fn expand(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }
}

/// Summary of one completed layout run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutReport {
    pub engine: &'static str,
    /// Run counter since the runner was created.
    pub run: u64,
    pub nodes: usize,
    pub edges: usize,
    /// Zoom after the viewport was fitted.
    pub zoom: f32,
}

/// Runs the layout engine and fits the viewport afterwards.
pub struct LayoutRunner {
    engine: Box<dyn LayoutEngine>,
    viewport: Viewport,
    positions: Positions,
    runs: u64,
    last_report: Option<LayoutReport>,
}

impl Default for LayoutRunner {
    fn default() -> Self {
        Self::from_config(&LayoutConfig::default(), &ViewportConfig::default())
    }
}

impl LayoutRunner {
    pub fn new(engine: Box<dyn LayoutEngine>, viewport: Viewport) -> Self {
        Self {
            engine,
            viewport,
            positions: Positions::new(),
            runs: 0,
            last_report: None,
        }
    }

    pub fn from_config(layout: &LayoutConfig, viewport: &ViewportConfig) -> Self {
        let engine: Box<dyn LayoutEngine> = match layout.algorithm {
            LayoutAlgorithm::Layered => Box::new(LayeredLayout::from_config(layout)),
            LayoutAlgorithm::Force => Box::new(ForceLayout::from_config(layout)),
        };
        Self::new(engine, Viewport::from_config(viewport))
    }

    /// Lays out the whole view, then fits and centers the viewport.
    pub fn run<V: GraphView + ?Sized>(&mut self, view: &V) -> LayoutReport {
        let graph = LayoutGraph::from_view(view);
        self.positions = self.engine.compute(&graph);
        self.runs += 1;

        self.on_complete();

        tracing::debug!(
            engine = self.engine.name(),
            run = self.runs,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            zoom = self.viewport.zoom(),
            "Layout complete"
        );
        let report = LayoutReport {
            engine: self.engine.name(),
            run: self.runs,
            nodes: graph.nodes.len(),
            edges: graph.edges.len(),
            zoom: self.viewport.zoom(),
        };
        self.last_report = Some(report.clone());
        report
    }

    fn on_complete(&mut self) {
        let bounds = Bounds::of(&self.positions);
        self.viewport.fit(bounds);
    }

    pub fn positions(&self) -> &Positions {
        &self.positions
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn last_report(&self) -> Option<&LayoutReport> {
        self.last_report.as_ref()
    }
}
