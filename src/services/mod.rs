//! Application services layered over the view.
//!
//! [`Engine`] is the single execution context that owns the view;
//! [`DocumentService`] and [`DocumentStore`] handle the document round trips
//! it schedules.

mod document;
mod engine;
mod notifications;

pub use document::{
    pretty_json, read_upload, validate_upload, DocumentService, DocumentStore,
    ACCEPTED_EXTENSIONS, MAX_UPLOAD_BYTES,
};
pub use engine::{Engine, EngineEvent, EngineHandle, EngineState};
pub use notifications::{Notification, NotificationLevel};
