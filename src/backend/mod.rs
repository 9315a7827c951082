//! Schema backend clients.
//!
//! The engine talks to the backend only through the traits in [`traits`].
//! [`HttpBackend`] calls a remote service; [`LocalBackend`] parses documents
//! in-process with [`crate::schema`].

mod http;
mod local;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use http::HttpBackend;
pub use local::LocalBackend;
pub use traits::{DocumentEndpoint, SchemaBackend, SubtreeFetcher};

use crate::config::BackendConfig;
use crate::error::AppError;

/// One backend seen through both of its interfaces.
#[derive(Clone)]
pub struct Backend {
    pub fetcher: Arc<dyn SubtreeFetcher>,
    pub documents: Arc<dyn DocumentEndpoint>,
}

impl Backend {
    pub fn new<T: SchemaBackend + 'static>(backend: T) -> Self {
        let backend = Arc::new(backend);
        Self {
            fetcher: backend.clone(),
            documents: backend,
        }
    }
}

/// Picks the backend: `remote` (or the configured URL) selects HTTP,
/// otherwise documents are parsed in-process.
pub fn connect(config: &BackendConfig, remote: Option<&str>) -> Result<Backend, AppError> {
    match remote.or(config.url.as_deref()) {
        Some(url) => {
            tracing::info!(url, "Using remote schema backend");
            let timeout = Duration::from_secs(config.timeout_secs);
            Ok(Backend::new(HttpBackend::new(url, timeout)?))
        }
        None => {
            tracing::debug!("Using in-process schema backend");
            Ok(Backend::new(LocalBackend::new()))
        }
    }
}
