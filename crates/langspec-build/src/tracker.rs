//! Change detection between build invocations
//!
//! Each successful build records a fingerprint for every input file. The next
//! invocation diffs the current files against that record and decides whether
//! the engine can be given a change set or must rebuild everything.
//!
//! Deletions always force a full rebuild. Engines for dynamically defined
//! languages cannot retract definitions derived from a file that no longer
//! exists, so incremental state is discarded whenever a file disappears.

use crate::error::{BuildError, BuildResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// SHA-256 content digest of a file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint raw content
    pub fn of_bytes(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Fingerprint the content of a file
    pub fn of_file(path: &Path) -> BuildResult<Self> {
        let content = fs::read(path).map_err(|e| BuildError::io(path, e))?;
        Ok(Self::of_bytes(&content))
    }

    /// Hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An input file with its last known fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
}

/// Fingerprints of a set of input files, ordered by path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    files: BTreeMap<PathBuf, Fingerprint>,
}

impl InputSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint every file in `paths`
    pub fn capture(paths: &[PathBuf]) -> BuildResult<Self> {
        let mut snapshot = Self::new();
        for path in paths {
            snapshot.insert(path.clone(), Fingerprint::of_file(path)?);
        }
        Ok(snapshot)
    }

    /// Record a file
    pub fn insert(&mut self, path: PathBuf, fingerprint: Fingerprint) {
        self.files.insert(path, fingerprint);
    }

    /// Fingerprint of a recorded file
    pub fn get(&self, path: &Path) -> Option<&Fingerprint> {
        self.files.get(path)
    }

    /// Recorded paths, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    /// Recorded files, sorted by path
    pub fn files(&self) -> impl Iterator<Item = InputFile> + '_ {
        self.files.iter().map(|(path, fingerprint)| InputFile {
            path: path.clone(),
            fingerprint: fingerprint.clone(),
        })
    }

    /// Number of recorded files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<InputFile> for InputSnapshot {
    fn from_iter<I: IntoIterator<Item = InputFile>>(iter: I) -> Self {
        Self {
            files: iter
                .into_iter()
                .map(|f| (f.path, f.fingerprint))
                .collect(),
        }
    }
}

/// Change to a single input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum Change {
    /// New file
    Create(PathBuf),
    /// Content differs from the recorded fingerprint
    Modify(PathBuf),
    /// Recorded file no longer exists
    Delete(PathBuf),
}

impl Change {
    /// Path of the changed file
    pub fn path(&self) -> &Path {
        match self {
            Self::Create(path) | Self::Modify(path) | Self::Delete(path) => path,
        }
    }

    /// Whether this is a deletion
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete(_))
    }
}

/// Changes between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Create an empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// All changes
    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    /// Number of created files
    pub fn created(&self) -> usize {
        self.count(|c| matches!(c, Change::Create(_)))
    }

    /// Number of modified files
    pub fn modified(&self) -> usize {
        self.count(|c| matches!(c, Change::Modify(_)))
    }

    /// Number of deleted files
    pub fn deleted(&self) -> usize {
        self.count(Change::is_delete)
    }

    /// Whether any file was deleted
    pub fn has_deletions(&self) -> bool {
        self.changes.iter().any(Change::is_delete)
    }

    /// Copy without deletions
    pub fn without_deletions(&self) -> ChangeSet {
        self.changes
            .iter()
            .filter(|c| !c.is_delete())
            .cloned()
            .collect()
    }

    /// Number of changes
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Check if nothing changed
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn count(&self, predicate: impl Fn(&Change) -> bool) -> usize {
        self.changes.iter().filter(|c| predicate(c)).count()
    }
}

impl FromIterator<Change> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = Change>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// How the engine is asked to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Submit only the change set
    Incremental,
    /// Rebuild from scratch with the full file list
    Full,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incremental => write!(f, "incremental"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Why a build was classified as full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullReason {
    /// No usable record of a previous build
    NoPreviousState,
    /// Recorded files have disappeared
    FilesDeleted(usize),
}

impl fmt::Display for FullReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPreviousState => write!(f, "no previous build state"),
            Self::FilesDeleted(n) => write!(f, "{} input file(s) deleted", n),
        }
    }
}

/// Result of classifying an invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub mode: BuildMode,
    pub changes: ChangeSet,
    /// Set when `mode` is `Full`
    pub reason: Option<FullReason>,
}

impl Classification {
    /// Whether the build may run incrementally
    pub fn is_incremental(&self) -> bool {
        self.mode == BuildMode::Incremental
    }
}

/// Classify an invocation by diffing `current` against `previous`
///
/// Created and modified files are listed in path order, followed by deleted
/// files in path order.
pub fn classify(previous: Option<&InputSnapshot>, current: &InputSnapshot) -> Classification {
    let empty = InputSnapshot::new();
    let recorded = previous.unwrap_or(&empty);

    let mut changes: Vec<Change> = current
        .files
        .iter()
        .filter_map(|(path, fingerprint)| match recorded.get(path) {
            None => Some(Change::Create(path.clone())),
            Some(old) if old != fingerprint => Some(Change::Modify(path.clone())),
            Some(_) => None,
        })
        .collect();

    changes.extend(
        recorded
            .files
            .keys()
            .filter(|path| !current.files.contains_key(*path))
            .map(|path| Change::Delete(path.clone())),
    );

    let changes = ChangeSet { changes };
    let reason = if recorded.is_empty() {
        Some(FullReason::NoPreviousState)
    } else if changes.has_deletions() {
        Some(FullReason::FilesDeleted(changes.deleted()))
    } else {
        None
    };

    let mode = if reason.is_some() {
        BuildMode::Full
    } else {
        BuildMode::Incremental
    };

    Classification {
        mode,
        changes,
        reason,
    }
}
