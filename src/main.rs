//! Curate - graph view over event-schema documents

use clap::Parser;
use tracing_subscriber::EnvFilter;

use curate::cli::App;
use curate::config::Config;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let app = App::parse();

    // Initialize logging; stdout is reserved for command output
    let default_filter = if app.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::debug!(
        backend = config.backend.url.as_deref().unwrap_or("in-process"),
        layout = ?config.layout.algorithm,
        "Loaded configuration"
    );

    app.run(config).await
}
