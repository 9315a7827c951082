//! The graph view and everything that reads or writes it.
//!
//! - [`Synchronizer`] - the only writer of the view
//! - [`GraphView`] / [`Canvas`] - the live element set
//! - [`LayoutRunner`] - arranges the view and fits the [`Viewport`]
//! - [`SidebarBridge`] - relays selections and edits to the side panel
//! - [`Exporter`] - rasterizes the view to PNG

mod canvas;
pub mod constants;
mod export;
mod force;
mod history;
mod layered;
mod layout;
mod menu;
mod selection;
mod sync;
mod viewport;

pub use canvas::{Canvas, GraphView};
pub use export::{Download, Exporter};
pub use force::ForceLayout;
pub use history::{Removal, RemovalSlot};
pub use layered::LayeredLayout;
pub use layout::{
    Bounds, LayoutEdge, LayoutEngine, LayoutGraph, LayoutNode, LayoutReport, LayoutRunner,
    Positions,
};
pub use menu::{context_menu, MenuAction, MenuItem, MenuState};
pub use selection::{FieldEntry, Selection, SidebarBridge};
pub use sync::{ExpandOutcome, ExpandTicket, Synchronizer, ViewState};
pub use viewport::Viewport;
