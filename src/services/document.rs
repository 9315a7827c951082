//! Document round trips and the authoritative snapshot.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use crate::backend::DocumentEndpoint;
use crate::error::AppError;
use crate::models::{is_excluded_key, DocumentSnapshot, ElementList, FieldEdit};
use crate::view::Download;

/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_BYTES: u64 = 2_000_000;
/// Accepted upload file extensions.
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["json", "jsonld", "txt"];

/// Checks an upload before it is sent anywhere: exactly one file, an
/// accepted extension, and at most [`MAX_UPLOAD_BYTES`].
pub fn validate_upload(file_count: usize, file_name: &str, size: u64) -> Result<(), AppError> {
    if file_count != 1 {
        return Err(AppError::UploadRejected(format!(
            "select exactly one file (got {file_count})"
        )));
    }
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext) => {}
        _ => {
            return Err(AppError::UploadRejected(format!(
                "'{file_name}' is not a .json, .jsonld or .txt file"
            )))
        }
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(AppError::UploadRejected(format!(
            "'{file_name}' is {size} bytes; the limit is {MAX_UPLOAD_BYTES}"
        )));
    }
    Ok(())
}

/// Validates and reads an upload from disk. The size is checked before
/// the file is read.
pub async fn read_upload(path: &Path) -> Result<(String, Vec<u8>), AppError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let size = tokio::fs::metadata(path).await?.len();
    validate_upload(1, &file_name, size)?;
    let contents = tokio::fs::read(path).await?;
    Ok((file_name, contents))
}

/// Serializes `value` as JSON indented with four spaces.
pub fn pretty_json(value: &Value) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Holds the latest document snapshot.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    current: Option<DocumentSnapshot>,
}

impl DocumentStore {
    /// Stores `snapshot`. Returns true when its element list differs from
    /// the previous one, i.e. when the view needs a reload.
    pub fn apply(&mut self, snapshot: DocumentSnapshot) -> bool {
        let changed = self.differs(&snapshot.parsed_schema);
        self.current = Some(snapshot);
        changed
    }

    /// Whether `elements` is structurally different from the current element
    /// list. Always true before the first document.
    pub fn differs(&self, elements: &ElementList) -> bool {
        self.elements() != Some(elements)
    }

    pub fn current(&self) -> Option<&DocumentSnapshot> {
        self.current.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.name.as_str())
    }

    pub fn elements(&self) -> Option<&ElementList> {
        self.current.as_ref().map(|c| &c.parsed_schema)
    }

    pub fn schema_json(&self) -> Option<&Value> {
        self.current.as_ref().map(|c| &c.schema_json)
    }

    /// The raw document as a download.
    pub fn export_json(&self, file_name: &str) -> Result<Download, AppError> {
        let schema = self.schema_json().ok_or(AppError::NotLoaded)?;
        Ok(Download::new(file_name, pretty_json(schema)?))
    }
}

/// Upload, reload and field-edit round trips against the document endpoint.
#[derive(Clone)]
pub struct DocumentService {
    endpoint: Arc<dyn DocumentEndpoint>,
}

impl DocumentService {
    pub fn new(endpoint: Arc<dyn DocumentEndpoint>) -> Self {
        Self { endpoint }
    }

    pub async fn upload(&self, file_name: &str, contents: Vec<u8>) -> Result<DocumentSnapshot, AppError> {
        validate_upload(1, file_name, contents.len() as u64)?;
        tracing::info!(file_name, bytes = contents.len(), "Uploading document");
        self.endpoint.upload(file_name, contents).await
    }

    /// Sends an edited raw document (the JSON editor round trip).
    pub async fn reload(&self, schema_json: Value) -> Result<DocumentSnapshot, AppError> {
        tracing::info!("Reloading edited document");
        self.endpoint.reload(&schema_json).await
    }

    pub async fn update_field(&self, edit: FieldEdit) -> Result<DocumentSnapshot, AppError> {
        if is_excluded_key(&edit.key) {
            return Err(AppError::ReadOnlyField(edit.key));
        }
        tracing::info!(id = %edit.id, key = %edit.key, "Submitting field edit");
        self.endpoint.update_field(&edit).await
    }
}
