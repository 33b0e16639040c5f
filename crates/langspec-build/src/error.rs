/// Build system error types
use crate::engine::Diagnostic;
use langspec_config::{ComponentId, ConfigError};
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Unresolved dependency {group}:{name}:{version}")]
    UnresolvedDependency {
        group: String,
        name: String,
        version: String,
    },

    #[error("Invalid build request: {0}")]
    InvalidRequest(String),

    #[error("Stage '{stage}' failed with {} diagnostic(s)", diagnostics.len())]
    EngineFailure {
        stage: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("Recorded build state at {path} is unusable: {reason}")]
    StaleState { path: PathBuf, reason: String },

    #[error("Failed to invoke build engine '{program}': {error}")]
    EngineInvocation { program: String, error: String },

    #[error("Unknown stage '{0}'")]
    UnknownStage(String),

    #[error("Archive stage succeeded but produced no artifact at {0}")]
    MissingArtifact(PathBuf),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create an unresolved dependency error
    pub fn unresolved(id: &ComponentId) -> Self {
        Self::UnresolvedDependency {
            group: id.group.clone(),
            name: id.name.clone(),
            version: id.version.clone(),
        }
    }

    /// Create an engine failure error
    pub fn engine_failure(stage: impl Into<String>, diagnostics: Vec<Diagnostic>) -> Self {
        Self::EngineFailure {
            stage: stage.into(),
            diagnostics,
        }
    }
}
