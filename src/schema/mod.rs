//! Schema document handling for the in-process backend.

mod edit;
mod parser;

pub use edit::apply_edit;
pub use parser::SchemaGraph;
