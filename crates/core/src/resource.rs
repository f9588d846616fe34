use std::collections::BTreeMap;

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::{resource, SCHEMA_URL};
use telemetry_config::ServiceConfig;
use tracing::debug;

const HOST_NAME: &str = "host.name";

/// Immutable identity attached to every exported span and metric.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceIdentity {
    pub name: String,
    pub version: Option<String>,
    pub schema_url: String,
    pub attributes: BTreeMap<String, String>,
}

impl ServiceIdentity {
    /// Empty names are allowed.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            schema_url: SCHEMA_URL.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        let mut identity = Self::new(config.name.clone());
        identity.version = config.version.clone();
        if let Some(ref schema_url) = config.schema_url {
            identity.schema_url = schema_url.clone();
        }
        identity.attributes = config.attributes.clone();

        if config.detect_host && !identity.attributes.contains_key(HOST_NAME) {
            match hostname::get().map(|h| h.into_string()) {
                Ok(Ok(host)) => {
                    identity.attributes.insert(HOST_NAME.to_string(), host);
                }
                other => debug!(result = ?other, "无法获取主机名，跳过 host.name"),
            }
        }

        identity
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

pub fn build_resource(identity: &ServiceIdentity) -> Resource {
    let mut attributes = Vec::with_capacity(identity.attributes.len() + 1);
    if let Some(ref version) = identity.version {
        attributes.push(KeyValue::new(resource::SERVICE_VERSION, version.clone()));
    }
    attributes.extend(
        identity
            .attributes
            .iter()
            .map(|(key, value)| KeyValue::new(key.clone(), value.clone())),
    );

    Resource::builder()
        .with_service_name(identity.name.clone())
        .with_schema_url(attributes, identity.schema_url.clone())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::{Key, Value};

    fn attr(resource: &Resource, key: &'static str) -> Option<String> {
        resource.get(&Key::from_static_str(key)).map(|v| v.to_string())
    }

    #[test]
    fn test_resource_carries_identity() {
        let identity = ServiceIdentity::new("coffee-server")
            .with_version("1.2.3")
            .with_attribute("deployment.environment.name", "staging");
        let resource = build_resource(&identity);

        assert_eq!(
            resource.get(&Key::from_static_str(resource::SERVICE_NAME)),
            Some(Value::from("coffee-server"))
        );
        assert_eq!(
            attr(&resource, resource::SERVICE_VERSION),
            Some("1.2.3".to_string())
        );
        assert_eq!(
            attr(&resource, "deployment.environment.name"),
            Some("staging".to_string())
        );
        assert_eq!(resource.schema_url(), Some(SCHEMA_URL));
    }

    #[test]
    fn test_empty_service_name_is_kept() {
        let resource = build_resource(&ServiceIdentity::new(""));
        assert_eq!(attr(&resource, resource::SERVICE_NAME), Some(String::new()));
    }

    #[test]
    fn test_from_config_respects_overrides() {
        let mut config = ServiceConfig::named("svc");
        config.schema_url = Some("https://example.com/schemas/1.0.0".to_string());
        config.detect_host = true;
        config
            .attributes
            .insert(HOST_NAME.to_string(), "pinned-host".to_string());

        let identity = ServiceIdentity::from_config(&config);
        assert_eq!(identity.schema_url, "https://example.com/schemas/1.0.0");
        assert_eq!(
            identity.attributes.get(HOST_NAME).map(String::as_str),
            Some("pinned-host")
        );
    }

    #[test]
    fn test_host_detection_is_opt_in() {
        let identity = ServiceIdentity::from_config(&ServiceConfig::named("svc"));
        assert!(!identity.attributes.contains_key(HOST_NAME));
        assert_eq!(identity.schema_url, SCHEMA_URL);
    }
}
