//! Recorded input state between build invocations
//!
//! The state lives at `<target>/.langspec/inputs.json`. It is read once at the
//! start of the `build` stage and written once after that stage succeeds.

use crate::error::{BuildError, BuildResult};
use crate::tracker::{InputFile, InputSnapshot};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Current on-disk format version
pub const STATE_FORMAT_VERSION: u32 = 1;

const STATE_DIR: &str = ".langspec";
const STATE_FILE: &str = "inputs.json";

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    files: Vec<InputFile>,
}

/// Store for the input snapshot of the last successful build
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store under a component's target directory
    pub fn new(target_dir: &Path) -> Self {
        Self {
            path: target_dir.join(STATE_DIR).join(STATE_FILE),
        }
    }

    /// Store at an explicit file location
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the recorded snapshot
    ///
    /// Returns `Ok(None)` when nothing has been recorded yet and
    /// `Err(BuildError::StaleState)` when the file cannot be used.
    pub fn read(&self) -> BuildResult<Option<InputSnapshot>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.stale(e.to_string())),
        };

        let state: StateFile =
            serde_json::from_str(&content).map_err(|e| self.stale(e.to_string()))?;
        if state.version != STATE_FORMAT_VERSION {
            return Err(self.stale(format!(
                "format version {} (expected {})",
                state.version, STATE_FORMAT_VERSION
            )));
        }

        Ok(Some(state.files.into_iter().collect()))
    }

    /// Read the recorded snapshot, treating unusable state as absent
    pub fn load(&self) -> Option<InputSnapshot> {
        match self.read() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "discarding recorded build state");
                None
            }
        }
    }

    /// Record the snapshot of a successful build
    pub fn save(&self, snapshot: &InputSnapshot) -> BuildResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }

        let state = StateFile {
            version: STATE_FORMAT_VERSION,
            files: snapshot.files().collect(),
        };
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| BuildError::io(&self.path, e.into()))?;

        // Write through a temporary file so a crash never leaves half a record
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, json).map_err(|e| BuildError::io(&temp, e))?;
        fs::rename(&temp, &self.path).map_err(|e| BuildError::io(&self.path, e))?;

        debug!(path = %self.path.display(), files = snapshot.len(), "recorded build state");
        Ok(())
    }

    /// Forget the recorded snapshot
    pub fn clear(&self) -> BuildResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "cleared build state");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BuildError::io(&self.path, e)),
        }
    }

    fn stale(&self, reason: String) -> BuildError {
        BuildError::StaleState {
            path: self.path.clone(),
            reason,
        }
    }
}
