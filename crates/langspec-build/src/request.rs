//! Build request assembly
//!
//! A [`BuildRequest`] is the single declarative value handed to the engine by
//! the `build` stage. Include paths always come from the whole resolved
//! graph. Sources are either the complete file list or a change set, never
//! both.

use crate::error::{BuildError, BuildResult};
use crate::graph::ResolvedGraph;
use crate::tracker::{BuildMode, ChangeSet};
use langspec_config::ComponentId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Compilation goal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    /// Compile the component's languages into loadable form
    #[default]
    Compile,
    /// Process the component's example files with its own compiled language
    Examples,
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile => write!(f, "compile"),
            Self::Examples => write!(f, "examples"),
        }
    }
}

/// Which sources the engine must process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "files", rename_all = "lowercase")]
pub enum SourceSpec {
    /// Rebuild from scratch with every current file
    Full(Vec<PathBuf>),
    /// Apply created and modified files only
    Incremental(ChangeSet),
}

impl SourceSpec {
    /// Build mode these sources belong to
    pub fn mode(&self) -> BuildMode {
        match self {
            Self::Full(_) => BuildMode::Full,
            Self::Incremental(_) => BuildMode::Incremental,
        }
    }

    /// Number of files handed to the engine
    pub fn len(&self) -> usize {
        match self {
            Self::Full(files) => files.len(),
            Self::Incremental(changes) => changes.len(),
        }
    }

    /// Check if no file is handed to the engine
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Request consumed by [`crate::BuildEngine::build`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildRequest {
    /// Component being compiled
    pub component: ComponentId,
    /// Languages used to compile it, dependencies first
    pub languages: Vec<ComponentId>,
    pub include_paths: Vec<PathBuf>,
    pub sources: SourceSpec,
    pub goal: Goal,
    /// Directories the engine is expected to populate
    pub output_dirs: Vec<PathBuf>,
    /// Languages whose errors must not fail the build
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pardoned_languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
}

impl BuildRequest {
    /// Build mode of the request
    pub fn mode(&self) -> BuildMode {
        self.sources.mode()
    }
}

/// Assembles build requests for a resolved graph
#[derive(Debug, Clone)]
pub struct RequestBuilder<'a> {
    graph: &'a ResolvedGraph,
    pardoned_languages: Vec<String>,
    engine_version: Option<String>,
    extra_languages: Vec<ComponentId>,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(graph: &'a ResolvedGraph) -> Self {
        Self {
            graph,
            pardoned_languages: Vec::new(),
            engine_version: None,
            extra_languages: Vec::new(),
        }
    }

    /// Add a language after the graph's own languages
    pub fn language(mut self, id: ComponentId) -> Self {
        self.extra_languages.push(id);
        self
    }

    pub fn pardoned_languages(mut self, languages: Vec<String>) -> Self {
        self.pardoned_languages = languages;
        self
    }

    pub fn engine_version(mut self, version: Option<String>) -> Self {
        self.engine_version = version;
        self
    }

    /// Build a request for `mode`
    ///
    /// In full mode the sources are the graph's complete file list and
    /// `changes` is ignored. In incremental mode the sources are exactly
    /// `changes`, which must not contain deletions.
    pub fn build(
        &self,
        mode: BuildMode,
        changes: &ChangeSet,
        goal: Goal,
    ) -> BuildResult<BuildRequest> {
        let root = self.graph.root();
        let include_paths = self.graph.include_paths();
        if include_paths.is_empty() && root.has_build_dependencies() {
            return Err(BuildError::InvalidRequest(format!(
                "{} declares build dependencies but no include paths were resolved",
                root.id
            )));
        }

        let sources = match mode {
            BuildMode::Full => SourceSpec::Full(self.graph.source_files()),
            BuildMode::Incremental => {
                if let Some(deleted) = changes.iter().find(|c| c.is_delete()) {
                    return Err(BuildError::InvalidRequest(format!(
                        "incremental request with deleted file {}",
                        deleted.path().display()
                    )));
                }
                SourceSpec::Incremental(changes.clone())
            }
        };

        let mut languages = self.graph.languages();
        for id in &self.extra_languages {
            if !languages.contains(id) {
                languages.push(id.clone());
            }
        }

        Ok(BuildRequest {
            component: root.id.clone(),
            languages,
            include_paths,
            sources,
            goal,
            output_dirs: self.graph.output_dirs(),
            pardoned_languages: self.pardoned_languages.clone(),
            engine_version: self.engine_version.clone(),
        })
    }
}
