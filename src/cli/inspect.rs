//! Inspect command handler.

use std::path::Path;

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::config::Config;

use super::App;

impl App {
    /// Print the loaded view, or the side-panel fields of one element, as JSON.
    pub async fn run_inspect(&self, config: &Config, input: &Path, node: Option<&str>) -> Result<()> {
        let handle = self.open(config, input).await?;

        let output = match node {
            Some(id) => {
                let selection = handle
                    .context_tap(Some(id))
                    .await?
                    .ok_or_else(|| eyre!("no selection for {id}"))?;
                serde_json::to_string_pretty(&selection)?
            }
            None => serde_json::to_string_pretty(&handle.state().await?)?,
        };
        println!("{output}");

        handle.shutdown().await?;
        Ok(())
    }
}
