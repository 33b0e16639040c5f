//! Build-tool overrides
//!
//! A wrapping build description may assert the authoritative identity,
//! engine version and dependency lists of a component without editing its
//! `langspec.toml`. Present fields replace the declared value wholesale;
//! absent fields leave it untouched. List fields are replaced, never merged.

use crate::component::ComponentConfig;
use crate::identifier::ComponentId;
use crate::{ConfigError, ConfigResult};
use std::env;

/// Environment variable names read by [`ConfigOverride::from_env`]
pub const ENV_GROUP: &str = "LANGSPEC_GROUP";
pub const ENV_NAME: &str = "LANGSPEC_NAME";
pub const ENV_VERSION: &str = "LANGSPEC_VERSION";
pub const ENV_ENGINE_VERSION: &str = "LANGSPEC_ENGINE_VERSION";
pub const ENV_COMPILE_DEPS: &str = "LANGSPEC_COMPILE_DEPS";
pub const ENV_SOURCE_DEPS: &str = "LANGSPEC_SOURCE_DEPS";
pub const ENV_LIBRARY_DEPS: &str = "LANGSPEC_LIBRARY_DEPS";

/// Overrides applied on top of a declared component configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverride {
    pub group: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub engine_version: Option<String>,
    pub compile_deps: Option<Vec<ComponentId>>,
    pub source_deps: Option<Vec<ComponentId>>,
    pub library_deps: Option<Vec<ComponentId>>,
}

impl ConfigOverride {
    /// Set the overriding group
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set the overriding name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the overriding version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Pin the engine version
    pub fn with_engine_version(mut self, version: impl Into<String>) -> Self {
        self.engine_version = Some(version.into());
        self
    }

    /// Replace the compile dependency list
    pub fn with_compile_deps(mut self, deps: Vec<ComponentId>) -> Self {
        self.compile_deps = Some(deps);
        self
    }

    /// Replace the source dependency list
    pub fn with_source_deps(mut self, deps: Vec<ComponentId>) -> Self {
        self.source_deps = Some(deps);
        self
    }

    /// Replace the backend-library dependency list
    pub fn with_library_deps(mut self, deps: Vec<ComponentId>) -> Self {
        self.library_deps = Some(deps);
        self
    }

    /// Check if no field is present
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Stack `higher` on top of this override; its present fields win
    pub fn layer(self, higher: &ConfigOverride) -> ConfigOverride {
        ConfigOverride {
            group: higher.group.clone().or(self.group),
            name: higher.name.clone().or(self.name),
            version: higher.version.clone().or(self.version),
            engine_version: higher.engine_version.clone().or(self.engine_version),
            compile_deps: higher.compile_deps.clone().or(self.compile_deps),
            source_deps: higher.source_deps.clone().or(self.source_deps),
            library_deps: higher.library_deps.clone().or(self.library_deps),
        }
    }

    /// Compute the effective configuration
    ///
    /// Pure: the declared configuration is left untouched, and applying the
    /// same override to its own output yields the same configuration again.
    pub fn apply(&self, declared: &ComponentConfig) -> ComponentConfig {
        let mut effective = declared.clone();

        if let Some(group) = &self.group {
            effective.component.group = group.clone();
        }
        if let Some(name) = &self.name {
            effective.component.name = name.clone();
        }
        if let Some(version) = &self.version {
            effective.component.version = version.clone();
        }
        if let Some(engine_version) = &self.engine_version {
            effective.component.engine_version = Some(engine_version.clone());
        }
        if let Some(deps) = &self.compile_deps {
            effective.dependencies.compile = deps.clone();
        }
        if let Some(deps) = &self.source_deps {
            effective.dependencies.source = deps.clone();
        }
        if let Some(deps) = &self.library_deps {
            effective.dependencies.library = deps.clone();
        }

        effective
    }

    /// Read overrides from LANGSPEC_* environment variables
    ///
    /// Dependency lists are comma-separated `group:name:version` entries; an
    /// empty variable replaces the list with nothing.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read overrides through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            group: lookup(ENV_GROUP),
            name: lookup(ENV_NAME),
            version: lookup(ENV_VERSION),
            engine_version: lookup(ENV_ENGINE_VERSION),
            compile_deps: lookup(ENV_COMPILE_DEPS)
                .map(|v| parse_id_list(ENV_COMPILE_DEPS, &v))
                .transpose()?,
            source_deps: lookup(ENV_SOURCE_DEPS)
                .map(|v| parse_id_list(ENV_SOURCE_DEPS, &v))
                .transpose()?,
            library_deps: lookup(ENV_LIBRARY_DEPS)
                .map(|v| parse_id_list(ENV_LIBRARY_DEPS, &v))
                .transpose()?,
        })
    }
}

fn parse_id_list(field: &str, value: &str) -> ConfigResult<Vec<ComponentId>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ConfigError::InvalidValue {
                field: field.to_string(),
                reason: format!("'{}' is not a group:name:version identifier", s),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn declared() -> ComponentConfig {
        let mut config = ComponentConfig::new(ComponentId::new("org.example", "calc", "0.1.0"));
        config.dependencies.compile = vec![ComponentId::new("org.example", "esv", "2.6.0")];
        config.dependencies.source = vec![ComponentId::new("org.example", "calc.lib", "0.1.0")];
        config
    }

    #[test]
    fn test_version_only_override_keeps_dependencies() {
        let declared = declared();
        let effective = ConfigOverride::default()
            .with_version("9.9.9")
            .apply(&declared);

        assert_eq!(effective.component.version, "9.9.9");
        assert_eq!(effective.component.group, "org.example");
        assert_eq!(effective.dependencies, declared.dependencies);
    }

    #[test]
    fn test_list_override_replaces_wholesale() {
        let replacement = vec![ComponentId::new("other", "sdf3", "1.0")];
        let effective = ConfigOverride::default()
            .with_compile_deps(replacement.clone())
            .apply(&declared());

        assert_eq!(effective.dependencies.compile, replacement);
        assert_eq!(effective.dependencies.source.len(), 1);
    }

    #[test]
    fn test_present_empty_list_clears_declared_list() {
        let effective = ConfigOverride::default()
            .with_source_deps(Vec::new())
            .apply(&declared());
        assert!(effective.dependencies.source.is_empty());
        assert_eq!(effective.dependencies.compile.len(), 1);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let ov = ConfigOverride::default()
            .with_group("com.acme")
            .with_engine_version("3.0")
            .with_library_deps(vec![ComponentId::new("com.acme", "rt", "1")]);

        let once = ov.apply(&declared());
        let twice = ov.apply(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_override_is_identity() {
        let ov = ConfigOverride::default();
        assert!(ov.is_empty());
        assert_eq!(ov.apply(&declared()), declared());
    }

    #[test]
    fn test_layer_precedence() {
        let env = ConfigOverride::default()
            .with_group("from.env")
            .with_version("1.0");
        let cli = ConfigOverride::default().with_version("2.0");

        let merged = env.layer(&cli);
        assert_eq!(merged.group.as_deref(), Some("from.env"));
        assert_eq!(merged.version.as_deref(), Some("2.0"));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_VERSION, "5.0"),
            (ENV_COMPILE_DEPS, "g:a:1, g:b:2"),
            (ENV_SOURCE_DEPS, ""),
        ]
        .into_iter()
        .collect();

        let ov = ConfigOverride::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(ov.version.as_deref(), Some("5.0"));
        assert_eq!(ov.group, None);
        assert_eq!(
            ov.compile_deps,
            Some(vec![ComponentId::new("g", "a", "1"), ComponentId::new("g", "b", "2")])
        );
        assert_eq!(ov.source_deps, Some(Vec::new()));
        assert_eq!(ov.library_deps, None);
    }

    #[test]
    fn test_from_lookup_rejects_bad_identifier() {
        let result = ConfigOverride::from_lookup(|k| {
            (k == ENV_LIBRARY_DEPS).then(|| "not-an-id".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
