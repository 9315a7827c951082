//! Export-doc command handler.

use std::path::{Path, PathBuf};

use color_eyre::Result;

use crate::backend;
use crate::config::Config;
use crate::services::{read_upload, DocumentService, DocumentStore};

use super::App;

impl App {
    /// Upload a document and write the returned raw document as indented JSON.
    pub async fn run_export_doc(&self, config: &Config, input: &Path, out: Option<&Path>) -> Result<()> {
        let backend = backend::connect(&config.backend, self.remote.as_deref())?;
        let service = DocumentService::new(backend.documents);

        let (file_name, contents) = read_upload(input).await?;
        let snapshot = service
            .upload(&file_name, contents)
            .await
            .map_err(|e| color_eyre::eyre::eyre!(e.user_message()))?;

        let mut store = DocumentStore::default();
        store.apply(snapshot);
        let download = store.export_json(&config.export.document_file_name)?;
        let path = out
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(download.file_name()));
        let path = download.save_as(&path)?;

        tracing::info!(name = store.name().unwrap_or_default(), path = %path.display(), "Wrote document");
        println!("{}", path.display());
        Ok(())
    }
}
