//! Langspec Configuration System
//!
//! Provides configuration management for language components including:
//! - Component configuration (langspec.toml)
//! - Component identifiers (`group:name:version`)
//! - Build-tool overrides of identity, engine version and dependencies
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is resolved in the following order (later overrides earlier):
//! 1. Component config (./langspec.toml)
//! 2. Environment variables (LANGSPEC_*)
//! 3. CLI flags
//!
//! Overrides only ever change the in-memory view; the file on disk is never
//! rewritten.
//!
//! # Example
//!
//! ```no_run
//! use langspec_config::{ConfigLoader, ConfigOverride};
//! use std::path::Path;
//!
//! let loaded = ConfigLoader::new()
//!     .with_override(ConfigOverride::default().with_version("1.2.0"))
//!     .load_from_directory(Path::new("."))
//!     .unwrap();
//! println!("{}", loaded.effective.id());
//! ```

pub mod component;
pub mod identifier;
pub mod loader;
pub mod overrides;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid component identifier '{0}': expected group:name:version")]
    InvalidIdentifier(String),

    #[error("Path must be relative to the component directory: {0}")]
    InvalidPath(PathBuf),

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Name of the declarative component configuration file
pub const CONFIG_FILE_NAME: &str = "langspec.toml";

// Re-export main types
pub use component::{ComponentConfig, DependencyKind, GeneratesConfig};
pub use identifier::ComponentId;
pub use loader::{ConfigLoader, LoadedConfig};
pub use overrides::ConfigOverride;
