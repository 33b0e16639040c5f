//! Component identifiers
//!
//! A component is identified by `group:name:version`. Versions are opaque
//! strings; `develop-SNAPSHOT` is as valid as `1.2.0`.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a language component
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentId {
    /// Group (organisation) the component belongs to
    pub group: String,
    /// Component name
    pub name: String,
    /// Component version
    pub version: String,
}

impl ComponentId {
    /// Create a new identifier without validation
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// File-system friendly form: `group-name-version`
    pub fn file_name(&self) -> String {
        format!("{}-{}-{}", self.group, self.name, self.version)
    }

    /// Check that every segment is non-empty and free of whitespace
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("group", &self.group),
            ("name", &self.name),
            ("version", &self.version),
        ] {
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("{} cannot be empty", field),
                });
            }
            if value.contains(':') || value.chars().any(char::is_whitespace) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("'{}' contains ':' or whitespace", value),
                });
            }
        }
        Ok(())
    }
}

impl FromStr for ComponentId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let [group, name, version] = parts.as_slice() else {
            return Err(ConfigError::InvalidIdentifier(s.to_string()));
        };

        let id = ComponentId::new(*group, *name, *version);
        id.validate()
            .map_err(|_| ConfigError::InvalidIdentifier(s.to_string()))?;
        Ok(id)
    }
}

impl TryFrom<String> for ComponentId {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ComponentId> for String {
    fn from(id: ComponentId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)
    }
}
