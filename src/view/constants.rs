//! Visual constants for layout and image export.

// =============================================================================
// Node Colors (RGB)
// =============================================================================

/// Root event (Gold).
pub const COLOR_ROOT: [u8; 3] = [0xFF, 0xD7, 0x00];
/// Event with children (Purple).
pub const COLOR_PARENT: [u8; 3] = [0x99, 0x66, 0xCC];
/// Leaf event (Blue).
pub const COLOR_CHILD: [u8; 3] = [0x4A, 0x90, 0xD9];
/// Participant (Green).
pub const COLOR_PARTICIPANT: [u8; 3] = [0x5C, 0xB8, 0x5C];
/// Container event (Gray).
pub const COLOR_CONTAINER: [u8; 3] = [0xAA, 0xAA, 0xAA];
/// Node border.
pub const COLOR_NODE_BORDER: [u8; 3] = [0x33, 0x33, 0x33];

// =============================================================================
// Edge Colors (RGB)
// =============================================================================

/// Event to child step.
pub const COLOR_STEP_CHILD: [u8; 3] = [0x55, 0x55, 0x55];
/// Event to participant.
pub const COLOR_STEP_PARTICIPANT: [u8; 3] = [0x5C, 0xB8, 0x5C];
/// Causal link between children (Orange).
pub const COLOR_CHILD_OUTLINK: [u8; 3] = [0xFF, 0x80, 0x4D];
/// Default edge color.
pub const COLOR_EDGE_DEFAULT: [u8; 3] = [0x80, 0x80, 0x80];

// =============================================================================
// Sizing (layout units, before export scale)
// =============================================================================

/// Node radius.
pub const NODE_RADIUS: f32 = 18.0;
/// Node border width.
pub const NODE_BORDER_WIDTH: f32 = 2.0;
/// Edge stroke width.
pub const EDGE_WIDTH: f32 = 2.0;
/// Arrow head length.
pub const ARROW_SIZE: f32 = 8.0;
/// Radius of the loop drawn for a self edge.
pub const SELF_LOOP_RADIUS: f32 = 12.0;

// =============================================================================
// Helpers
// =============================================================================

/// Fill color for a node type.
pub fn node_color(node_type: Option<&str>) -> [u8; 3] {
    match node_type {
        Some("root") => COLOR_ROOT,
        Some("parent") => COLOR_PARENT,
        Some("participant") => COLOR_PARTICIPANT,
        Some("container") => COLOR_CONTAINER,
        _ => COLOR_CHILD,
    }
}

/// Stroke color for an edge type.
pub fn edge_color(edge_type: Option<&str>) -> [u8; 3] {
    match edge_type {
        Some("step_child") => COLOR_STEP_CHILD,
        Some("step_participant") => COLOR_STEP_PARTICIPANT,
        Some("child_outlink") => COLOR_CHILD_OUTLINK,
        _ => COLOR_EDGE_DEFAULT,
    }
}
