//! Language components and the providers that materialise them
//!
//! A [`Component`] is read-only metadata: who it is, where it lives on disk,
//! which include paths and source files it contributes to dependents, which
//! output directories its languages generate, and what it depends on.
//! Fetching component archives is someone else's job; providers only expose
//! components that already exist locally.

use crate::error::{BuildError, BuildResult};
use langspec_config::{
    ComponentConfig, ComponentId, DependencyKind, GeneratesConfig, CONFIG_FILE_NAME,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// A reference from one component to another
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyDeclaration {
    /// Referenced component
    pub id: ComponentId,
    /// What flows from the dependency to the dependent
    pub kind: DependencyKind,
}

/// A resolved language component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Component identity
    pub id: ComponentId,
    /// On-disk location
    pub location: PathBuf,
    /// Include paths contributed to dependents
    pub include_paths: Vec<PathBuf>,
    /// Source files contributed to source-kind dependents
    pub source_files: Vec<PathBuf>,
    /// Output-directory generators of this component's languages
    pub generates: Vec<GeneratesConfig>,
    /// Dependency declarations, in declaration order
    pub dependencies: Vec<DependencyDeclaration>,
}

impl Component {
    /// Create a component with no contributions or dependencies
    pub fn new(id: ComponentId, location: impl Into<PathBuf>) -> Self {
        Self {
            id,
            location: location.into(),
            include_paths: Vec::new(),
            source_files: Vec::new(),
            generates: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Set contributed include paths
    pub fn with_include_paths(mut self, include_paths: Vec<PathBuf>) -> Self {
        self.include_paths = include_paths;
        self
    }

    /// Set contributed source files
    pub fn with_source_files(mut self, source_files: Vec<PathBuf>) -> Self {
        self.source_files = source_files;
        self
    }

    /// Declare an output directory generated by `language`
    pub fn with_generates(
        mut self,
        language: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Self {
        self.generates.push(GeneratesConfig {
            language: language.into(),
            directory: directory.into(),
        });
        self
    }

    /// Add a dependency declaration
    pub fn with_dependency(mut self, kind: DependencyKind, id: ComponentId) -> Self {
        self.dependencies.push(DependencyDeclaration { id, kind });
        self
    }

    /// Build a component from its declarative configuration
    ///
    /// Include paths are resolved against `location`; source files are
    /// discovered under the configured source directories.
    pub fn from_config(config: &ComponentConfig, location: &Path) -> BuildResult<Self> {
        let include_paths = config
            .paths
            .include
            .iter()
            .map(|p| location.join(p))
            .collect();
        let source_files = discover_source_files(location, config)?;

        let dependencies = [
            DependencyKind::Compile,
            DependencyKind::Source,
            DependencyKind::Library,
        ]
        .into_iter()
        .flat_map(|kind| {
            config
                .dependencies
                .of_kind(kind)
                .iter()
                .map(move |id| DependencyDeclaration {
                    id: id.clone(),
                    kind,
                })
        })
        .collect();

        Ok(Self {
            id: config.id(),
            location: location.to_path_buf(),
            include_paths,
            source_files,
            generates: config.generates.clone(),
            dependencies,
        })
    }

    /// Declared dependencies of one kind, in declaration order
    pub fn declarations(&self, kind: DependencyKind) -> impl Iterator<Item = &ComponentId> {
        self.dependencies
            .iter()
            .filter(move |d| d.kind == kind)
            .map(|d| &d.id)
    }

    /// Whether any compile or source dependency is declared
    pub fn has_build_dependencies(&self) -> bool {
        self.dependencies
            .iter()
            .any(|d| d.kind != DependencyKind::Library)
    }
}

/// Discover a component's source files
///
/// Directories are walked in configuration order with entries sorted by
/// name, so the result is stable across runs. Missing directories are
/// skipped.
pub fn discover_source_files(
    location: &Path,
    config: &ComponentConfig,
) -> BuildResult<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut source_files = Vec::new();

    for dir in &config.paths.sources {
        let source_dir = location.join(dir);
        if !source_dir.is_dir() {
            debug!(dir = %source_dir.display(), "source directory does not exist, skipping");
            continue;
        }

        for entry in WalkDir::new(&source_dir)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&source_dir).to_path_buf();
                BuildError::io(path, e.into())
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let extension = path.extension().and_then(|s| s.to_str());
            if config.accepts_extension(extension) && seen.insert(path.to_path_buf()) {
                source_files.push(path.to_path_buf());
            }
        }
    }

    Ok(source_files)
}

/// Source of materialised component metadata
pub trait ComponentProvider {
    /// Look up a component; `Ok(None)` when it is not materialised
    fn component(&self, id: &ComponentId) -> BuildResult<Option<Component>>;
}

/// Provider backed by an in-memory map
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    components: HashMap<ComponentId, Component>,
}

impl InMemoryProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component
    pub fn insert(&mut self, component: Component) {
        self.components.insert(component.id.clone(), component);
    }

    /// Register a component, builder style
    pub fn with(mut self, component: Component) -> Self {
        self.insert(component);
        self
    }

    /// Number of registered components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Check if no component is registered
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl ComponentProvider for InMemoryProvider {
    fn component(&self, id: &ComponentId) -> BuildResult<Option<Component>> {
        Ok(self.components.get(id).cloned())
    }
}

/// Provider reading components materialised as
/// `<root>/<group>/<name>/<version>/langspec.toml`
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
}

impl DirectoryProvider {
    /// Create a provider rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory where `id` is expected to be materialised
    pub fn component_dir(&self, id: &ComponentId) -> PathBuf {
        self.root.join(&id.group).join(&id.name).join(&id.version)
    }
}

impl ComponentProvider for DirectoryProvider {
    fn component(&self, id: &ComponentId) -> BuildResult<Option<Component>> {
        let location = self.component_dir(id);
        let config_path = location.join(CONFIG_FILE_NAME);
        if !config_path.is_file() {
            debug!(component = %id, path = %config_path.display(), "component not materialised");
            return Ok(None);
        }

        let config = ComponentConfig::load_from_file(&config_path)?;
        if config.id() != *id {
            return Err(BuildError::InvalidRequest(format!(
                "{} declares identity {}, expected {}",
                config_path.display(),
                config.id(),
                id
            )));
        }

        Component::from_config(&config, &location).map(Some)
    }
}
