//! Hierarchical top-down layout.
//!
//! Nodes are ranked by longest path from the sources (cycles fall back to
//! view order), ordered within each rank by barycenter sweeps, then spread
//! on a grid centered at the origin.

use std::collections::VecDeque;

use glam::Vec2;

use super::layout::{LayoutEdge, LayoutEngine, LayoutGraph, Positions};
use crate::config::LayoutConfig;

/// Barycenter sweeps (down then up) per layout.
const ORDERING_PASSES: usize = 2;

#[derive(Debug, Clone)]
pub struct LayeredLayout {
    node_spacing: f32,
    rank_spacing: f32,
}

impl Default for LayeredLayout {
    fn default() -> Self {
        Self::from_config(&LayoutConfig::default())
    }
}

impl LayeredLayout {
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self {
            node_spacing: config.node_spacing.max(1.0),
            rank_spacing: config.rank_spacing.max(1.0),
        }
    }
}

impl LayoutEngine for LayeredLayout {
    fn name(&self) -> &'static str {
        "layered"
    }

    fn compute(&self, graph: &LayoutGraph) -> Positions {
        let n = graph.nodes.len();
        let mut positions = Positions::with_capacity(n);
        if n == 0 {
            return positions;
        }

        let ranks = compute_ranks(n, &graph.edges);
        let depth = ranks.iter().copied().max().unwrap_or(0) + 1;
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); depth];
        for (idx, rank) in ranks.iter().enumerate() {
            buckets[*rank].push(idx);
        }
        order_buckets(&mut buckets, &graph.edges, n);

        let mut placed = vec![Vec2::ZERO; n];
        for (rank, bucket) in buckets.iter().enumerate() {
            let width = bucket.len().saturating_sub(1) as f32 * self.node_spacing;
            for (slot, idx) in bucket.iter().enumerate() {
                placed[*idx] = Vec2::new(
                    slot as f32 * self.node_spacing - width / 2.0,
                    rank as f32 * self.rank_spacing,
                );
            }
        }

        for (node, position) in graph.nodes.iter().zip(placed) {
            positions.insert(node.id.clone(), position);
        }
        positions
    }
}

/// Longest-path ranks over a topological order. Nodes left over by cycles
/// are appended in view order, and edges pointing back at an already placed
/// node are ignored.
fn compute_ranks(n: usize, edges: &[LayoutEdge]) -> Vec<usize> {
    let mut indeg = vec![0usize; n];
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for edge in edges.iter().filter(|e| e.from_idx != e.to_idx) {
        adj[edge.from_idx].push(edge.to_idx);
        indeg[edge.to_idx] += 1;
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&i| indeg[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(node) = queue.pop_front() {
        order.push(node);
        for &next in &adj[node] {
            indeg[next] -= 1;
            if indeg[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() < n {
        let mut seen = vec![false; n];
        for &idx in &order {
            seen[idx] = true;
        }
        order.extend((0..n).filter(|&i| !seen[i]));
    }

    let mut ranks = vec![0usize; n];
    let mut placed = vec![false; n];
    for &node in &order {
        placed[node] = true;
        for &next in &adj[node] {
            if !placed[next] {
                ranks[next] = ranks[next].max(ranks[node] + 1);
            }
        }
    }
    ranks
}

/// Reduces crossings by sorting each rank on the mean slot of its neighbors,
/// sweeping down (incoming) then up (outgoing).
fn order_buckets(buckets: &mut [Vec<usize>], edges: &[LayoutEdge], n: usize) {
    if buckets.len() <= 1 {
        return;
    }
    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];
    for edge in edges.iter().filter(|e| e.from_idx != e.to_idx) {
        outgoing[edge.from_idx].push(edge.to_idx);
        incoming[edge.to_idx].push(edge.from_idx);
    }

    let mut slots = vec![0usize; n];
    update_slots(buckets, &mut slots);

    for _ in 0..ORDERING_PASSES {
        for rank in 1..buckets.len() {
            sort_bucket(&mut buckets[rank], &incoming, &slots);
            update_slots(buckets, &mut slots);
        }
        for rank in (0..buckets.len() - 1).rev() {
            sort_bucket(&mut buckets[rank], &outgoing, &slots);
            update_slots(buckets, &mut slots);
        }
    }
}

fn update_slots(buckets: &[Vec<usize>], slots: &mut [usize]) {
    for bucket in buckets {
        for (slot, idx) in bucket.iter().enumerate() {
            slots[*idx] = slot;
        }
    }
}

fn sort_bucket(bucket: &mut Vec<usize>, neighbors: &[Vec<usize>], slots: &[usize]) {
    if bucket.len() <= 1 {
        return;
    }
    let mut scored: Vec<(f32, usize)> = bucket
        .iter()
        .enumerate()
        .map(|(current, &idx)| (barycenter(idx, current, neighbors, slots), idx))
        .collect();
    // Stable: ties keep their current order.
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    *bucket = scored.into_iter().map(|(_, idx)| idx).collect();
}

fn barycenter(idx: usize, current: usize, neighbors: &[Vec<usize>], slots: &[usize]) -> f32 {
    let list = &neighbors[idx];
    if list.is_empty() {
        return current as f32;
    }
    list.iter().map(|&nb| slots[nb] as f32).sum::<f32>() / list.len() as f32
}
