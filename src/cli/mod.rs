//! CLI module for Curate.
//!
//! Subcommands:
//! - `render`: Upload a document, expand nodes, export a PNG
//! - `inspect`: Print the view or one element's editable fields as JSON
//! - `session`: Drive the view interactively from stdin
//! - `export-doc`: Round-trip a document and write the pretty JSON download

mod export_doc;
mod inspect;
mod render;
mod session;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use tokio::sync::broadcast::Receiver;

use crate::backend;
use crate::config::Config;
use crate::services::{Engine, EngineEvent, EngineHandle, NotificationLevel};

/// Curate - interactive graph view over event-schema documents
#[derive(Parser)]
#[command(name = "curate")]
#[command(about = "Schema curation - graph view over event-schema documents")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Base URL of a remote schema backend (overrides `backend.url`)
    #[arg(long, global = true)]
    pub remote: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Upload a document, expand nodes in order, and export a PNG
    Render {
        /// Schema document to upload
        input: PathBuf,

        /// Node to expand (repeatable, applied in order)
        #[arg(long = "expand", value_name = "ID")]
        expand: Vec<String>,

        /// Output path (defaults to `export.file_name`)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Raster scale, clamped to 1.5..=3.0
        #[arg(long)]
        scale: Option<f32>,
    },

    /// Print the normalized view, or one element's editable fields
    Inspect {
        /// Schema document to upload
        input: PathBuf,

        /// Element whose side-panel fields to print
        #[arg(long)]
        node: Option<String>,
    },

    /// Interactive session over stdin
    Session {
        /// Schema document to upload
        input: PathBuf,
    },

    /// Round-trip a document and write it as indented JSON
    ExportDoc {
        /// Schema document to upload
        input: PathBuf,

        /// Output path (defaults to `export.document_file_name`)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

impl App {
    /// Run the CLI application.
    pub async fn run(self, config: Config) -> Result<()> {
        match self.command {
            Command::Render {
                ref input,
                ref expand,
                ref out,
                scale,
            } => {
                self.run_render(config, input, expand, out.as_deref(), scale)
                    .await
            }
            Command::Inspect {
                ref input,
                ref node,
            } => self.run_inspect(&config, input, node.as_deref()).await,
            Command::Session { ref input } => self.run_session(&config, input).await,
            Command::ExportDoc { ref input, ref out } => {
                self.run_export_doc(&config, input, out.as_deref()).await
            }
        }
    }

    /// Spawns an engine, uploads `input`, and waits for the view to load.
    async fn open(&self, config: &Config, input: &Path) -> Result<EngineHandle> {
        let backend = backend::connect(&config.backend, self.remote.as_deref())?;
        let handle = Engine::new(backend, config).spawn();
        let mut events = handle.subscribe();

        handle.upload_file(input).await?;
        handle.settle().await?;

        if handle.state().await?.document.is_none() {
            let reason = last_error(&mut events)
                .unwrap_or_else(|| "document was not loaded".to_string());
            return Err(eyre!("{}: {}", input.display(), reason));
        }
        Ok(handle)
    }
}

/// Message of the most recent error notification already emitted.
fn last_error(events: &mut Receiver<EngineEvent>) -> Option<String> {
    let mut last = None;
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::Notify { notification } = event {
            if notification.level == NotificationLevel::Error {
                last = Some(notification.message);
            }
        }
    }
    last
}
