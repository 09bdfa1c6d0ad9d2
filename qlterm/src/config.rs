//! Front-end configuration.
//!
//! A [`FrontendConfig`] is plain data loaded once (usually from a TOML file) and then
//! shared read-only. [`FrontendConfig::install`] publishes it process-wide; every
//! later [`FrontendConfig::global`] call observes the same value.
use std::path::{Path, PathBuf};

use log::info;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static GLOBAL: OnceCell<FrontendConfig> = OnceCell::new();

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read or write the configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse the configuration file: {source}")]
    Parse {
        source: toml::de::Error,
        file: String,
    },

    #[error("Failed to serialize the configuration to `{}`: {message}", path.display())]
    Serialize { path: PathBuf, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Database bound to the `db` global optarg when a query does not name one.
    pub default_database: String,

    /// Global optarg names accepted on top of the built-in allow-list.
    pub extra_optargs: Vec<String>,

    /// Deepest term nesting the builder accepts.
    pub max_term_depth: usize,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            default_database: "test".to_string(),
            extra_optargs: Vec::new(),
            max_term_depth: 64,
        }
    }
}

impl FrontendConfig {
    /// Load a configuration from a TOML file. Missing keys take their default value.
    pub fn load_from_toml(path: &Path) -> Result<Self, ConfigError> {
        let toml_str = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&toml_str)?;
        info!("Loaded front-end configuration from `{}`", path.display());
        Ok(config)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|source| ConfigError::Parse {
            source,
            file: toml_str.to_string(),
        })
    }

    /// Save the configuration to a TOML file, creating parent directories as needed.
    pub fn save_to_toml(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_str = toml::to_string(self).map_err(|e| ConfigError::Serialize {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Publish this configuration process-wide.
    ///
    /// Fails (returning the rejected value) when a configuration was already installed
    /// or [`global`](Self::global) was already read.
    pub fn install(self) -> Result<(), FrontendConfig> {
        GLOBAL.set(self)
    }

    /// The installed configuration, or the defaults when none was installed.
    pub fn global() -> &'static FrontendConfig {
        GLOBAL.get_or_init(FrontendConfig::default)
    }

    /// Whether `name` was added to the allow-list by this configuration.
    pub fn allows_extra_optarg(&self, name: &str) -> bool {
        self.extra_optargs.iter().any(|extra| extra == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let config = FrontendConfig::from_toml_str("default_database = \"prod\"\n").unwrap();
        assert_eq!(config.default_database, "prod");
        assert_eq!(config.max_term_depth, FrontendConfig::default().max_term_depth);
        assert!(config.extra_optargs.is_empty());
    }

    #[test]
    fn rejects_malformed_files() {
        let err = FrontendConfig::from_toml_str("max_term_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("qlterm-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("frontend.toml");
        let config = FrontendConfig {
            default_database: "analytics".to_string(),
            extra_optargs: vec!["read_mode".to_string()],
            max_term_depth: 16,
        };

        config.save_to_toml(&path).unwrap();
        let loaded = FrontendConfig::load_from_toml(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.allows_extra_optarg("read_mode"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
