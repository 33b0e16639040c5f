//! Configuration Loader
//!
//! Handles locating `langspec.toml` and layering overrides with proper precedence.

use crate::component::ComponentConfig;
use crate::overrides::ConfigOverride;
use crate::{ConfigError, ConfigResult, CONFIG_FILE_NAME};
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Loads the component configuration and applies overrides in this order:
/// 1. Component config (./langspec.toml) - lowest priority
/// 2. Environment variables (LANGSPEC_*) - overrides the file
/// 3. Explicit override (CLI flags) - highest priority
pub struct ConfigLoader {
    /// Explicit override supplied by the caller
    explicit: ConfigOverride,
    /// Whether LANGSPEC_* variables are consulted
    use_env: bool,
}

/// Loaded configuration
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Configuration exactly as declared on disk
    pub declared: ComponentConfig,

    /// Configuration after all overrides
    pub effective: ComponentConfig,

    /// Component root directory (where langspec.toml was found)
    pub root: PathBuf,
}

impl ConfigLoader {
    /// Create a new configuration loader that honours the environment
    pub fn new() -> Self {
        Self {
            explicit: ConfigOverride::default(),
            use_env: true,
        }
    }

    /// Set the explicit (highest precedence) override
    pub fn with_override(mut self, explicit: ConfigOverride) -> Self {
        self.explicit = explicit;
        self
    }

    /// Enable/disable environment variable overrides
    pub fn with_env(mut self, use_env: bool) -> Self {
        self.use_env = use_env;
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find langspec.toml.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<LoadedConfig> {
        let config_path = Self::find_config_file(start_dir)
            .ok_or_else(|| ConfigError::NotFound(start_dir.join(CONFIG_FILE_NAME)))?;
        self.load_from_file(&config_path)
    }

    /// Load configuration from a specific langspec.toml
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<LoadedConfig> {
        let declared = ComponentConfig::load_from_file(config_path)?;
        let effective = self.resolve_override()?.apply(&declared);
        effective.validate()?;

        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(LoadedConfig {
            declared,
            effective,
            root,
        })
    }

    /// Combine environment and explicit overrides
    pub fn resolve_override(&self) -> ConfigResult<ConfigOverride> {
        let base = if self.use_env {
            ConfigOverride::from_env()?
        } else {
            ConfigOverride::default()
        };
        Ok(base.layer(&self.explicit))
    }

    /// Find langspec.toml by walking up the directory tree
    pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
        start_dir
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Default root of materialised components (~/.langspec/components)
    pub fn default_components_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".langspec").join("components"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadedConfig {
    /// Absolute-or-relative target directory of the component
    pub fn target_dir(&self) -> PathBuf {
        self.root.join(self.effective.target_dir())
    }
}
