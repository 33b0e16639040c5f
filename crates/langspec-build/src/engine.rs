//! Build engine interface
//!
//! The engine is the opaque compiler backend. The orchestrator hands it one
//! [`BuildRequest`] per `build` stage and asks it to run the remaining
//! stages with a [`StageContext`]; every call reports a [`BuildOutcome`].

use crate::error::BuildResult;
use crate::pipeline::Stage;
use crate::request::BuildRequest;
use langspec_config::ComponentId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Note => write!(f, "note"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A message reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self::new(Severity::Note, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Result of an engine call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub success: bool,
    /// Diagnostics in the order the engine reported them
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildOutcome {
    /// Successful outcome without diagnostics
    pub fn success() -> Self {
        Self {
            success: true,
            diagnostics: Vec::new(),
        }
    }

    /// Failed outcome with the given diagnostics
    pub fn failure(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            success: false,
            diagnostics,
        }
    }

    /// Append a diagnostic
    pub fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }

    /// Whether the outcome stops the pipeline
    ///
    /// Only the explicit failure flag counts. Error diagnostics on a
    /// successful outcome are reported but do not fail the stage.
    pub fn is_failure(&self) -> bool {
        !self.success
    }

    /// Number of diagnostics with the given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Log every diagnostic at the level matching its severity
    pub fn log_diagnostics(&self, stage: Stage) {
        for diagnostic in &self.diagnostics {
            match diagnostic.severity {
                Severity::Note => info!(%stage, "{}", diagnostic.message),
                Severity::Warning => warn!(%stage, "{}", diagnostic.message),
                Severity::Error => error!(%stage, "{}", diagnostic.message),
            }
        }
    }
}

/// What the engine needs to know to run a stage other than `build`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageContext {
    /// Component being built
    pub component: ComponentId,
    /// Component root directory
    pub project_dir: PathBuf,
    /// Directory holding the archive and recorded state
    pub target_dir: PathBuf,
    /// Where the `archive` stage must place its artifact
    pub archive: PathBuf,
    /// Output directories generated by the component's languages
    pub output_dirs: Vec<PathBuf>,
    /// Pinned engine version, if any
    pub engine_version: Option<String>,
}

/// Opaque compiler backend
pub trait BuildEngine {
    /// Compile a component; the request is consumed by the call
    fn build(&mut self, request: BuildRequest) -> BuildResult<BuildOutcome>;

    /// Run any other pipeline stage
    fn execute(&mut self, stage: Stage, context: &StageContext) -> BuildResult<BuildOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_diagnostics_do_not_fail_successful_outcome() {
        let outcome = BuildOutcome::success().with_diagnostic(Diagnostic::error("pardoned"));
        assert!(!outcome.is_failure());
        assert_eq!(outcome.count(Severity::Error), 1);
    }

    #[test]
    fn test_failure_flag_fails() {
        assert!(BuildOutcome::failure(vec![]).is_failure());
    }

    #[test]
    fn test_outcome_wire_format() {
        let outcome: BuildOutcome = serde_json::from_str(
            r#"{"success": false, "diagnostics": [
                {"severity": "warning", "message": "unused rule"},
                {"severity": "error", "message": "unbound variable x"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(
            outcome,
            BuildOutcome::failure(vec![
                Diagnostic::warning("unused rule"),
                Diagnostic::error("unbound variable x"),
            ])
        );
    }

    #[test]
    fn test_diagnostics_default_to_empty() {
        let outcome: BuildOutcome = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert_eq!(outcome, BuildOutcome::success());
    }

    #[test]
    fn test_diagnostic_display() {
        assert_eq!(Diagnostic::note("done").to_string(), "note: done");
    }
}
