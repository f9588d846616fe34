use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::validation::ConfigValidator;

/// Identity of the service emitting telemetry.
///
/// An empty `name` is accepted: it is discouraged, but nothing downstream
/// depends on it being set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub version: Option<String>,
    /// Overrides the semantic-conventions schema URL when set
    pub schema_url: Option<String>,
    /// Extra resource attributes, e.g. `deployment.environment.name`
    pub attributes: BTreeMap<String, String>,
    /// Adds `host.name` to the resource
    pub detect_host: bool,
}

impl ServiceConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl ConfigValidator for ServiceConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        for key in self.attributes.keys() {
            if key.trim().is_empty() {
                return Err(crate::ConfigError::Validation(
                    "service.attributes keys cannot be empty".to_string(),
                ));
            }
        }

        if let Some(ref schema_url) = self.schema_url {
            if !schema_url.starts_with("http://") && !schema_url.starts_with("https://") {
                return Err(crate::ConfigError::Validation(
                    "service.schema_url must be a valid HTTP/HTTPS URL".to_string(),
                ));
            }
        }

        Ok(())
    }
}
