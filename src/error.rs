//! Application error types with user-facing message translation.

use thiserror::Error;

/// Guidance shown when a document has no usable root event.
pub const MISSING_ROOT_HINT: &str =
    "Schema has no root node: ensure a root node with an 'or' children gate exists";

/// Message shown when an event is missing its `children_gate` key.
pub const MISSING_CHILDREN_GATE_HINT: &str =
    "An event with children is missing its 'children_gate' key (expected \"or\", \"and\" or \"xor\")";

/// Application-level errors for Curate.
#[derive(Error, Debug)]
pub enum AppError {
    // Transport errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend error ({status}): {title}")]
    Backend { status: u16, title: String },

    #[error("No sub-tree available for node: {0}")]
    SubtreeUnavailable(String),

    // View precondition errors
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element is not a node: {0}")]
    NotANode(String),

    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    // Schema document errors
    #[error("Schema has no root node")]
    MissingRoot,

    #[error("Missing key '{key}' in {context}")]
    MissingKey { key: String, context: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Parsing error! Upload the file again.")]
    NotLoaded,

    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    #[error("Field '{0}' is not editable")]
    ReadOnlyField(String),

    // Output errors
    #[error("Export failed: {0}")]
    Export(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Engine is no longer running")]
    EngineStopped,
}

impl AppError {
    /// Builds a [`AppError::MissingKey`] for `key` within `context`.
    pub fn missing_key(key: &str, context: impl Into<String>) -> Self {
        Self::MissingKey {
            key: key.to_string(),
            context: context.into(),
        }
    }

    /// Builds a [`AppError::Backend`] from a non-success response body.
    pub fn backend(status: u16, body: &str) -> Self {
        Self::Backend {
            status,
            title: extract_error_title(body),
        }
    }

    /// Text shown to the user in a transient notification.
    ///
    /// Backend titles are shown verbatim except for the two conditions users
    /// can act on: a missing root event and a missing `children_gate`.
    pub fn user_message(&self) -> String {
        match self {
            AppError::MissingRoot => MISSING_ROOT_HINT.to_string(),
            AppError::MissingKey { key, .. } if key == "children_gate" => {
                MISSING_CHILDREN_GATE_HINT.to_string()
            }
            AppError::Backend { title, .. } => translate_title(title),
            other => other.to_string(),
        }
    }
}

/// Extracts the human-readable title embedded in a backend error body.
///
/// Bodies are HTML error pages carrying `<title>Error: detail // Server</title>`;
/// the text before `//` is kept. Bodies without a title are returned trimmed.
pub fn extract_error_title(body: &str) -> String {
    let title = match (body.find("<title>"), body.rfind("</title>")) {
        (Some(start), Some(end)) if start + "<title>".len() <= end => {
            &body[start + "<title>".len()..end]
        }
        _ => body,
    };
    let title = match title.find("//") {
        Some(cut) => &title[..cut],
        None => title,
    };
    title.trim().to_string()
}

fn translate_title(title: &str) -> String {
    if title.contains("root_node") || title.contains("no root") {
        MISSING_ROOT_HINT.to_string()
    } else if title.contains("'children_gate'") {
        MISSING_CHILDREN_GATE_HINT.to_string()
    } else {
        title.to_string()
    }
}
