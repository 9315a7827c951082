//! Curate - interactive graph view over event-schema documents.
//!
//! A schema document is parsed into nodes and edges, shown as a graph view,
//! and kept in sync with the authoritative document while the user expands
//! sub-trees, removes and restores elements, and edits fields.

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod schema;
pub mod services;
pub mod view;
