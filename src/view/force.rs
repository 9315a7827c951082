//! Force-directed layout.

use glam::Vec2;

use super::layout::{LayoutEngine, LayoutGraph, Positions};
use crate::config::LayoutConfig;

/// Physics constants for force-directed layout.
const REPULSION_STRENGTH: f32 = 200.0; // Base repulsion (no degree scaling)
const DAMPING: f32 = 0.6; // Velocity friction per step
const MIN_DISTANCE: f32 = 0.5;
const MIN_MASS: f32 = 1.0; // Minimum mass per node
const MASS_PER_CONNECTION: f32 = 1.5; // Additional mass per connection
const MAX_VELOCITY: f32 = 200.0;
const TIMESTEP: f32 = 0.016;

// Per-edge-type spring parameters (stiffness, rest_length)
// Equilibrium: stiffness * ln(d/rest) = REPULSION / d²
const SPRING_STEP_CHILD: (f32, f32) = (50.0, 4.0); // Tight event-child
const SPRING_STEP_PARTICIPANT: (f32, f32) = (30.0, 5.0);
const SPRING_CHILD_OUTLINK: (f32, f32) = (10.0, 10.0); // Loose causal link
const SPRING_DEFAULT: (f32, f32) = (15.0, 8.0);

#[derive(Debug, Clone, Copy)]
struct Body {
    position: Vec2,
    velocity: Vec2,
    mass: f32,
}

#[derive(Debug, Clone, Copy)]
struct Spring {
    from_idx: usize,
    to_idx: usize,
    stiffness: f32,
    rest_length: f32,
}

/// Springs along edges, inverse-square repulsion between all pairs.
///
/// Deterministic: nodes start on a golden-angle spiral in view order, so
/// the same view always yields the same positions.
#[derive(Debug, Clone)]
pub struct ForceLayout {
    iterations: usize,
    /// Layout units per physics unit.
    scale: f32,
}

impl Default for ForceLayout {
    fn default() -> Self {
        Self::from_config(&LayoutConfig::default())
    }
}

impl ForceLayout {
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self {
            iterations: config.iterations,
            scale: config.node_spacing.max(1.0) / SPRING_DEFAULT.1,
        }
    }
}

impl LayoutEngine for ForceLayout {
    fn name(&self) -> &'static str {
        "force"
    }

    fn compute(&self, graph: &LayoutGraph) -> Positions {
        let n = graph.nodes.len();
        let mut bodies: Vec<Body> = (0..n)
            .map(|i| Body {
                position: initial_position(i, n),
                velocity: Vec2::ZERO,
                mass: MIN_MASS,
            })
            .collect();

        let springs: Vec<Spring> = graph
            .edges
            .iter()
            .filter(|e| e.from_idx != e.to_idx)
            .map(|e| {
                let (stiffness, rest_length) = spring_params(e.edge_type.as_deref());
                Spring {
                    from_idx: e.from_idx,
                    to_idx: e.to_idx,
                    stiffness,
                    rest_length,
                }
            })
            .collect();

        distribute_mass(&mut bodies, &springs);
        for _ in 0..self.iterations {
            step(&mut bodies, &springs, TIMESTEP);
        }

        graph
            .nodes
            .iter()
            .zip(&bodies)
            .map(|(node, body)| (node.id.clone(), body.position * self.scale))
            .collect()
    }
}

/// One physics step: log springs, pairwise repulsion, recentering, damping.
fn step(bodies: &mut [Body], springs: &[Spring], dt: f32) {
    let n = bodies.len();
    if n == 0 {
        return;
    }

    // --- Repulsion: F_r = K / d² ---
    for i in 0..n {
        for j in (i + 1)..n {
            let delta = bodies[i].position - bodies[j].position;
            let dist = delta.length().max(MIN_DISTANCE);
            let force = REPULSION_STRENGTH / (dist * dist);
            let dir = delta.normalize_or_zero();

            let (mi, mj) = (bodies[i].mass, bodies[j].mass);
            bodies[i].velocity += dir * force * dt / mi;
            bodies[j].velocity -= dir * force * dt / mj;
        }
    }

    // --- Attraction: F_a = stiffness * ln(d / rest_length) ---
    for spring in springs {
        let delta = bodies[spring.to_idx].position - bodies[spring.from_idx].position;
        let dist = delta.length().max(MIN_DISTANCE);
        let force = spring.stiffness * (dist / spring.rest_length).ln();
        let dir = delta.normalize_or_zero();

        let (mf, mt) = (bodies[spring.from_idx].mass, bodies[spring.to_idx].mass);
        bodies[spring.from_idx].velocity += dir * force * dt / mf;
        bodies[spring.to_idx].velocity -= dir * force * dt / mt;
    }

    // --- Centering: pure translation of the centroid to the origin ---
    let centroid: Vec2 = bodies.iter().map(|b| b.position).sum::<Vec2>() / n as f32;
    for body in bodies.iter_mut() {
        body.position -= centroid;
    }

    // --- Damping and integration ---
    for body in bodies.iter_mut() {
        body.velocity *= DAMPING;
        let speed = body.velocity.length();
        if speed > MAX_VELOCITY {
            body.velocity = body.velocity.normalize() * MAX_VELOCITY;
        } else if speed < 0.001 {
            body.velocity = Vec2::ZERO;
        }
        body.position += body.velocity * dt;
    }
}

/// Heavier nodes for higher degree, so hubs move less.
fn distribute_mass(bodies: &mut [Body], springs: &[Spring]) {
    let mut connection_counts = vec![0usize; bodies.len()];
    for spring in springs {
        connection_counts[spring.from_idx] += 1;
        connection_counts[spring.to_idx] += 1;
    }
    for (body, count) in bodies.iter_mut().zip(connection_counts) {
        body.mass = MIN_MASS + count as f32 * MASS_PER_CONNECTION;
    }
}

fn spring_params(edge_type: Option<&str>) -> (f32, f32) {
    match edge_type {
        Some("step_child") => SPRING_STEP_CHILD,
        Some("step_participant") => SPRING_STEP_PARTICIPANT,
        Some("child_outlink") => SPRING_CHILD_OUTLINK,
        _ => SPRING_DEFAULT,
    }
}

/// Golden-angle spiral: evenly spread, strictly increasing radius.
fn initial_position(i: usize, total_nodes: usize) -> Vec2 {
    let golden_angle = std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
    let idx = i as f32 + 0.5;
    let n = total_nodes.max(1) as f32;

    // Larger graphs need more space
    let base_radius = 3.0 + (n / 10.0).sqrt() * 2.0;
    let radius = base_radius * (idx / n).sqrt();
    let theta = idx * golden_angle;

    Vec2::new(radius * theta.cos(), radius * theta.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::layout::{LayoutEdge, LayoutNode};

    fn star(leaves: usize) -> LayoutGraph {
        let mut nodes = vec![LayoutNode {
            id: "hub".into(),
            node_type: Some("root".into()),
        }];
        let mut edges = Vec::new();
        for i in 0..leaves {
            nodes.push(LayoutNode {
                id: format!("leaf{i}"),
                node_type: Some("child".into()),
            });
            edges.push(LayoutEdge {
                from_idx: 0,
                to_idx: i + 1,
                edge_type: Some("step_child".into()),
            });
        }
        LayoutGraph { nodes, edges }
    }

    #[test]
    fn test_initial_positions_are_distinct() {
        let points: Vec<Vec2> = (0..50).map(|i| initial_position(i, 50)).collect();
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                assert!(a.distance(*b) > 1e-3);
            }
        }
    }

    #[test]
    fn test_layout_is_deterministic_and_finite() {
        let layout = ForceLayout::default();
        let first = layout.compute(&star(6));
        let second = layout.compute(&star(6));

        assert_eq!(first, second);
        assert_eq!(first.len(), 7);
        assert!(first.values().all(|p| p.is_finite()));
    }

    #[test]
    fn test_hub_mass_grows_with_degree() {
        let graph = star(4);
        let mut bodies: Vec<Body> = (0..5)
            .map(|i| Body {
                position: initial_position(i, 5),
                velocity: Vec2::ZERO,
                mass: MIN_MASS,
            })
            .collect();
        let springs: Vec<Spring> = graph
            .edges
            .iter()
            .map(|e| Spring {
                from_idx: e.from_idx,
                to_idx: e.to_idx,
                stiffness: 1.0,
                rest_length: 1.0,
            })
            .collect();
        distribute_mass(&mut bodies, &springs);
        assert_eq!(bodies[0].mass, MIN_MASS + 4.0 * MASS_PER_CONNECTION);
        assert_eq!(bodies[1].mass, MIN_MASS + MASS_PER_CONNECTION);
    }

    #[test]
    fn test_single_node_stays_at_origin() {
        let mut graph = star(0);
        graph.edges.clear();
        let positions = ForceLayout::default().compute(&graph);
        assert_eq!(positions["hub"], Vec2::ZERO);
    }
}
