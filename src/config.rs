//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. User config: `~/.config/curate/config.toml` (XDG) or platform config dir
//! 2. Project config: `.curate.toml`
//! 3. Environment variables: `CURATE_*` (nested keys separated by `__`)
//!
//! Every section has defaults, so no file is required.
//!
//! ```toml
//! [backend]
//! url = "http://127.0.0.1:5000"
//! timeout_secs = 10
//!
//! [layout]
//! algorithm = "force"
//! iterations = 800
//!
//! [export]
//! scale = 3.0
//! ```

use std::ops::Deref;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

/// Lowest export scale accepted.
pub const MIN_EXPORT_SCALE: f32 = 1.5;
/// Highest export scale accepted.
pub const MAX_EXPORT_SCALE: f32 = 3.0;

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub layout: LayoutConfig,
    pub viewport: ViewportConfig,
    pub export: ExportConfig,
}

/// Schema backend location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of a remote schema backend. When unset the in-process
    /// backend parses documents locally.
    pub url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 10,
        }
    }
}

/// Which layout algorithm arranges the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutAlgorithm {
    /// Hierarchical top-down layers.
    #[default]
    Layered,
    /// Force-directed springs and repulsion.
    Force,
}

/// Layout tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub algorithm: LayoutAlgorithm,
    /// Physics steps per run (force layout only).
    pub iterations: usize,
    /// Horizontal gap between nodes in the same layer.
    pub node_spacing: f32,
    /// Vertical gap between layers.
    pub rank_spacing: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            algorithm: LayoutAlgorithm::Layered,
            iterations: 500,
            node_spacing: 90.0,
            rank_spacing: 140.0,
        }
    }
}

/// Canvas dimensions and zoom bounds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: f32,
    pub height: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Margin kept around the graph when fitting.
    pub padding: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            min_zoom: 0.5,
            max_zoom: 4.0,
            padding: 30.0,
        }
    }
}

/// Image and document download settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Raster scale, clamped to `MIN_EXPORT_SCALE..=MAX_EXPORT_SCALE`.
    pub scale: f32,
    /// File name of the exported image.
    pub file_name: String,
    /// File name of the downloaded schema document.
    pub document_file_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scale: 2.0,
            file_name: "graph.png".to_string(),
            document_file_name: "schema.json".to_string(),
        }
    }
}

impl ExportConfig {
    /// Scale actually used for rasterizing.
    pub fn effective_scale(&self) -> f32 {
        clamp_scale(self.scale)
    }
}

/// Clamps an export scale into the supported range. Non-finite values fall
/// back to the default.
pub fn clamp_scale(scale: f32) -> f32 {
    if scale.is_finite() {
        scale.clamp(MIN_EXPORT_SCALE, MAX_EXPORT_SCALE)
    } else {
        ExportConfig::default().scale
    }
}

impl Config {
    /// Load config with layered resolution (user → project → env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::extract_from(Self::figment())
    }

    /// The layered provider stack used by [`Config::load`].
    pub fn figment() -> Figment {
        Figment::new()
            // Layer 1: User config (lowest priority)
            .merge(Toml::file(Self::user_config_path()))
            // Layer 2: Project config
            .merge(Toml::file(".curate.toml"))
            // Layer 3: Environment variables (highest priority)
            .merge(Env::prefixed("CURATE_").split("__"))
    }

    /// Extract a config from any figment.
    pub fn extract_from(figment: Figment) -> Result<Self, ConfigError> {
        figment.extract().map_err(ConfigError::from)
    }

    /// User config path: ~/.config/curate/config.toml (XDG) or platform config dir.
    fn user_config_path() -> std::path::PathBuf {
        // Prefer XDG config location (~/.config) on all platforms
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("curate").join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        // Fall back to platform-specific config dir
        dirs::config_dir()
            .map(|p| p.join("curate").join("config.toml"))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_without_sources() {
        let config = Config::extract_from(Figment::new()).unwrap();
        assert!(config.backend.url.is_none());
        assert_eq!(config.layout.algorithm, LayoutAlgorithm::Layered);
        assert_eq!(config.viewport.min_zoom, 0.5);
        assert_eq!(config.viewport.max_zoom, 4.0);
        assert_eq!(config.export.file_name, "graph.png");
    }

    #[test]
    fn test_toml_overrides_partial_sections() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            [backend]
            url = "http://localhost:5000"

            [layout]
            algorithm = "force"
            "#,
        ));
        let config = Config::extract_from(figment).unwrap();
        assert_eq!(config.backend.url.as_deref(), Some("http://localhost:5000"));
        assert_eq!(config.backend.timeout_secs, 10);
        assert_eq!(config.layout.algorithm, LayoutAlgorithm::Force);
        assert_eq!(config.layout.iterations, 500);
    }

    #[test]
    fn test_invalid_algorithm_is_error() {
        let figment = Figment::new().merge(Toml::string("[layout]\nalgorithm = \"spiral\""));
        assert!(Config::extract_from(figment).is_err());
    }

    #[test]
    fn test_export_scale_is_clamped() {
        assert_eq!(clamp_scale(0.5), MIN_EXPORT_SCALE);
        assert_eq!(clamp_scale(10.0), MAX_EXPORT_SCALE);
        assert_eq!(clamp_scale(2.5), 2.5);
        assert_eq!(clamp_scale(f32::NAN), 2.0);
    }

    #[test]
    #[serial]
    fn test_env_layer_overrides_nested_keys() {
        std::env::set_var("CURATE_EXPORT__SCALE", "3");
        std::env::set_var("CURATE_BACKEND__TIMEOUT_SECS", "42");
        let config = Config::extract_from(
            Figment::new().merge(Env::prefixed("CURATE_").split("__")),
        );
        std::env::remove_var("CURATE_EXPORT__SCALE");
        std::env::remove_var("CURATE_BACKEND__TIMEOUT_SECS");

        let config = config.unwrap();
        assert_eq!(config.export.scale, 3.0);
        assert_eq!(config.backend.timeout_secs, 42);
    }
}
