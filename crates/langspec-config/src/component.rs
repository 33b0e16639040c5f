//! Component Configuration (langspec.toml)
//!
//! Handles the declarative configuration stored in `langspec.toml` at the
//! root of every language component, whether it is the project being built
//! or a materialised dependency.

use crate::identifier::ComponentId;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Default directory for the archive and recorded build state
const DEFAULT_TARGET_DIR: &str = "target";

/// Component configuration from langspec.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ComponentConfig {
    /// Component identity
    pub component: IdentityConfig,

    /// Dependency declarations
    #[serde(default)]
    pub dependencies: DependenciesConfig,

    /// Contributed include paths and source locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Output-directory generators
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generates: Vec<GeneratesConfig>,

    /// Build settings
    #[serde(default)]
    pub build: BuildSection,
}

/// Identity section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct IdentityConfig {
    /// Group identifier
    pub group: String,

    /// Component name
    pub name: String,

    /// Component version
    pub version: String,

    /// Pinned build engine version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
}

/// Dependency declarations, grouped by kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DependenciesConfig {
    /// Compile-time (language/tool) dependencies
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub compile: Vec<ComponentId>,

    /// Source dependencies, compiled as part of this component
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<ComponentId>,

    /// Backend libraries (nothing flows into the build)
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub library: Vec<ComponentId>,
}

/// Paths section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Include paths contributed to dependents
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<PathBuf>,

    /// Directories holding this component's source files
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<PathBuf>,

    /// Source file extensions (empty: every file counts)
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
}

/// An output-directory generator: `language` writes into `directory`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GeneratesConfig {
    /// Language that produces the output
    pub language: String,

    /// Output directory, relative to the dependent component
    pub directory: PathBuf,
}

/// Build section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct BuildSection {
    /// Target directory (default: "target")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<PathBuf>,

    /// Languages whose errors do not fail the build
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pardoned_languages: Vec<String>,
}

/// Kind of a dependency declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Contributes include paths
    Compile,
    /// Contributes include paths and source files
    Source,
    /// Backend library, contributes nothing to the build
    Library,
}

impl DependencyKind {
    /// Get the kind name as used in langspec.toml
    pub fn name(&self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Source => "source",
            Self::Library => "library",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl DependenciesConfig {
    /// Declarations of one kind, in declaration order
    pub fn of_kind(&self, kind: DependencyKind) -> &[ComponentId] {
        match kind {
            DependencyKind::Compile => &self.compile,
            DependencyKind::Source => &self.source,
            DependencyKind::Library => &self.library,
        }
    }

    /// Whether any compile or source dependency is declared
    pub fn has_build_dependencies(&self) -> bool {
        !self.compile.is_empty() || !self.source.is_empty()
    }
}

impl ComponentConfig {
    /// Create a configuration with only an identity
    pub fn new(id: ComponentId) -> Self {
        Self {
            component: IdentityConfig {
                group: id.group,
                name: id.name,
                version: id.version,
                engine_version: None,
            },
            dependencies: DependenciesConfig::default(),
            paths: PathsConfig::default(),
            generates: Vec::new(),
            build: BuildSection::default(),
        }
    }

    /// Load component configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config = Self::parse(&content, path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration text, reporting `origin` in errors
    pub fn parse(content: &str, origin: &Path) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: origin.to_path_buf(),
            error: e,
        })
    }

    /// Validate the component configuration
    pub fn validate(&self) -> ConfigResult<()> {
        let id = self.id();
        id.validate()?;

        for kind in [
            DependencyKind::Compile,
            DependencyKind::Source,
            DependencyKind::Library,
        ] {
            validate_dependencies(&id, kind, self.dependencies.of_kind(kind))?;
        }

        for path in self.paths.include.iter().chain(&self.paths.sources) {
            validate_relative(path)?;
        }

        for generates in &self.generates {
            if generates.language.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "generates.language".to_string(),
                    reason: "language cannot be empty".to_string(),
                });
            }
            validate_owned_dir(&generates.directory)?;
        }

        if let Some(target) = &self.build.target {
            validate_owned_dir(target)?;
        }

        Ok(())
    }

    /// Component identifier
    pub fn id(&self) -> ComponentId {
        ComponentId::new(
            self.component.group.clone(),
            self.component.name.clone(),
            self.component.version.clone(),
        )
    }

    /// Pinned engine version, if any
    pub fn engine_version(&self) -> Option<&str> {
        self.component.engine_version.as_deref()
    }

    /// Target directory relative to the component root
    pub fn target_dir(&self) -> PathBuf {
        self.build
            .target
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET_DIR))
    }

    /// Whether `extension` selects a source file (no filter selects everything)
    pub fn accepts_extension(&self, extension: Option<&str>) -> bool {
        if self.paths.extensions.is_empty() {
            return true;
        }
        extension.is_some_and(|ext| self.paths.extensions.iter().any(|e| e == ext))
    }
}

fn validate_dependencies(
    owner: &ComponentId,
    kind: DependencyKind,
    deps: &[ComponentId],
) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for dep in deps {
        if dep == owner {
            return Err(ConfigError::ValidationError(format!(
                "component {} declares itself as a {} dependency",
                owner, kind
            )));
        }
        if !seen.insert(dep) {
            return Err(ConfigError::ValidationError(format!(
                "{} dependency {} is declared more than once",
                kind, dep
            )));
        }
    }
    Ok(())
}

fn validate_relative(path: &Path) -> ConfigResult<()> {
    if path.is_absolute() {
        return Err(ConfigError::InvalidPath(path.to_path_buf()));
    }
    Ok(())
}

/// A directory the build empties or deletes from: strictly below the
/// component root
fn validate_owned_dir(path: &Path) -> ConfigResult<()> {
    let mut below_root = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => below_root = true,
            Component::CurDir => {}
            _ => return Err(ConfigError::InvalidPath(path.to_path_buf())),
        }
    }
    if !below_root {
        return Err(ConfigError::InvalidPath(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(toml: &str) -> ComponentConfig {
        ComponentConfig::parse(toml, Path::new("langspec.toml")).unwrap()
    }

    #[test]
    fn test_parse_minimal_component_config() {
        let config = parse(
            r#"
[component]
group = "org.example"
name = "calc"
version = "0.1.0"
"#,
        );
        assert!(config.validate().is_ok());
        assert_eq!(config.id(), ComponentId::new("org.example", "calc", "0.1.0"));
        assert_eq!(config.target_dir(), PathBuf::from("target"));
        assert!(config.generates.is_empty());
        assert!(!config.dependencies.has_build_dependencies());
    }

    #[test]
    fn test_parse_full_component_config() {
        let config = parse(
            r#"
[component]
group = "org.example"
name = "calc"
version = "develop-SNAPSHOT"
engine-version = "2.6.0"

[dependencies]
compile = ["org.example:esv:2.6.0", "org.example:sdf3:2.6.0"]
source = ["org.example:calc.lib:develop-SNAPSHOT"]
library = ["org.example:runtime:1.0"]

[paths]
include = ["trans"]
sources = ["trans", "syntax"]
extensions = ["str", "sdf3"]

[[generates]]
language = "Stratego"
directory = "src-gen/stratego"

[build]
target = "out"
pardoned-languages = ["esv"]
"#,
        );
        assert!(config.validate().is_ok());
        assert_eq!(config.engine_version(), Some("2.6.0"));
        assert_eq!(config.dependencies.compile.len(), 2);
        assert_eq!(
            config.dependencies.of_kind(DependencyKind::Source),
            &[ComponentId::new("org.example", "calc.lib", "develop-SNAPSHOT")]
        );
        assert_eq!(config.generates[0].directory, PathBuf::from("src-gen/stratego"));
        assert_eq!(config.target_dir(), PathBuf::from("out"));
        assert_eq!(config.build.pardoned_languages, vec!["esv".to_string()]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ComponentConfig::parse(
            r#"
[component]
group = "g"
name = "n"
version = "1"
colour = "blue"
"#,
            Path::new("langspec.toml"),
        );
        assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let mut config = ComponentConfig::new(ComponentId::new("g", "n", "1"));
        config.dependencies.compile.push(ComponentId::new("g", "n", "1"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_duplicate_dependency_rejected() {
        let mut config = ComponentConfig::new(ComponentId::new("g", "n", "1"));
        config.dependencies.source.push(ComponentId::new("g", "lib", "1"));
        config.dependencies.source.push(ComponentId::new("g", "lib", "1"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_absolute_paths_rejected() {
        let mut config = ComponentConfig::new(ComponentId::new("g", "n", "1"));
        config.paths.include.push(PathBuf::from("/usr/include"));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPath(_))));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("./.")]
    #[case("..")]
    #[case("../sibling")]
    #[case("src-gen/../..")]
    #[case("/tmp/out")]
    fn test_generated_directory_must_stay_below_root(#[case] directory: &str) {
        let mut config = ComponentConfig::new(ComponentId::new("g", "n", "1"));
        config.generates.push(GeneratesConfig {
            language: "Stratego".to_string(),
            directory: PathBuf::from(directory),
        });
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPath(_))));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("../target")]
    fn test_target_directory_must_stay_below_root(#[case] target: &str) {
        let mut config = ComponentConfig::new(ComponentId::new("g", "n", "1"));
        config.build.target = Some(PathBuf::from(target));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPath(_))));
    }

    #[test]
    fn test_nested_generated_directory_accepted() {
        let mut config = ComponentConfig::new(ComponentId::new("g", "n", "1"));
        config.generates.push(GeneratesConfig {
            language: "Stratego".to_string(),
            directory: PathBuf::from("./src-gen/stratego"),
        });
        config.build.target = Some(PathBuf::from("build/out"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_identity_rejected() {
        let config = ComponentConfig::new(ComponentId::new("g", "", "1"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_extension_filter() {
        let mut config = ComponentConfig::new(ComponentId::new("g", "n", "1"));
        assert!(config.accepts_extension(None));
        assert!(config.accepts_extension(Some("anything")));

        config.paths.extensions = vec!["str".to_string()];
        assert!(config.accepts_extension(Some("str")));
        assert!(!config.accepts_extension(Some("sdf3")));
        assert!(!config.accepts_extension(None));
    }
}
