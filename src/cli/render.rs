//! Render command handler.

use std::path::{Path, PathBuf};

use color_eyre::Result;

use crate::config::Config;
use crate::services::EngineEvent;

use super::App;

impl App {
    /// Upload, expand the requested nodes in order, and export a PNG.
    pub async fn run_render(
        &self,
        mut config: Config,
        input: &Path,
        expand: &[String],
        out: Option<&Path>,
        scale: Option<f32>,
    ) -> Result<()> {
        if let Some(scale) = scale {
            config.export.scale = scale;
        }
        let handle = self.open(&config, input).await?;
        let mut events = handle.subscribe();

        for node_id in expand {
            if !handle.tap(Some(node_id.as_str())).await? {
                tracing::warn!(node_id = %node_id, "Not a node, skipping");
                continue;
            }
            handle.settle().await?;
            while let Ok(event) = events.try_recv() {
                if let EngineEvent::Expanded { node_id, outcome } = event {
                    tracing::info!(node_id = %node_id, ?outcome, "Expanded");
                }
            }
        }

        let download = handle.export().await?;
        let path = out
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(download.file_name()));
        let bytes = download.len();
        let path = download.save_as(&path)?;
        tracing::info!(path = %path.display(), bytes, scale = config.export.effective_scale(), "Exported image");
        println!("{}", path.display());

        handle.shutdown().await?;
        Ok(())
    }
}
