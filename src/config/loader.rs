//! Configuration Loader
//!
//! Layers configuration sources in priority order and deserializes the result into
//! [`FieldgenConfig`]:
//!
//! 1. Built-in defaults (`#[serde(default)]` on every section)
//! 2. An optional TOML file (`config/fieldgen.toml`, or an explicit path)
//! 3. Environment variables prefixed with `FIELDGEN_`, sections separated by `__`
//!    (e.g. `FIELDGEN_COMPLETION__API_KEY`, `FIELDGEN_SERVICE__TIMEOUT_MS`)

use super::error::{ConfigResult, ConfigurationError};
use super::FieldgenConfig;
use crate::constants::ENV_PREFIX;
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Default configuration file location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/fieldgen.toml";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: FieldgenConfig,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from the default file (if present) and the environment
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            Self::load_from_file(&default_path)
        } else {
            Self::load_with_sources(None, Some(ENV_PREFIX))
        }
    }

    /// Load configuration from an explicit TOML file, overlaid with the environment
    pub fn load_from_file(path: &Path) -> ConfigResult<Arc<ConfigManager>> {
        if !path.exists() {
            return Err(ConfigurationError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }
        Self::load_with_sources(Some(path), Some(ENV_PREFIX))
    }

    /// Load configuration from a file only, ignoring the process environment.
    /// This is useful for testing without touching global environment variables.
    pub fn load_from_file_without_env(path: &Path) -> ConfigResult<Arc<ConfigManager>> {
        if !path.exists() {
            return Err(ConfigurationError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }
        Self::load_with_sources(Some(path), None)
    }

    /// Wrap an already-built configuration after validating it
    pub fn from_config(config: FieldgenConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            source_path: None,
        }))
    }

    fn load_with_sources(
        path: Option<&Path>,
        env_prefix: Option<&str>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            debug!("Loading configuration file: {}", path.display());
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        if let Some(prefix) = env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let source_name = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "environment".to_string());

        let config: FieldgenConfig = builder
            .build()
            .and_then(|layered| layered.try_deserialize())
            .map_err(|e| ConfigurationError::load_error(&source_name, e))?;

        config.validate()?;

        let manager = ConfigManager {
            config,
            source_path: path.map(Path::to_path_buf),
        };

        info!(
            source = %source_name,
            model = %manager.config.completion.model,
            api_key = %manager.config.completion.masked_api_key(),
            "Configuration loaded successfully"
        );

        Ok(Arc::new(manager))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &FieldgenConfig {
        &self.config
    }

    /// File the configuration was read from, if any
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Configuration as JSON with the credential masked, for logs and `check` output
    pub fn debug_config(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null);
        if let Some(completion) = value.get_mut("completion").and_then(|c| c.as_object_mut()) {
            completion.insert(
                "api_key".to_string(),
                serde_json::Value::String(self.config.completion.masked_api_key()),
            );
        }
        value
    }
}
