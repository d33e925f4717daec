//! Provider configuration
//!
//! The host passes the provider block as an attribute map. It is validated
//! against [`provider_schema`], converted to JSON and deserialized into
//! [`ProviderConfig`].

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use serde_json::json;
use stratus_core::registry::RegistryError;
use stratus_core::resource::Value;
use stratus_core::schema::{
    AttributeSchema, AttributeType, BlockSchema, ResourceSchema, TypeError, types,
};

use crate::tags::{IgnoreTagsConfig, KeyValueTags, TagSettings};

/// Services whose endpoint can be overridden
pub const ENDPOINT_SERVICES: &[&str] = &[
    "apigateway",
    "datasync",
    "efs",
    "elasticache",
    "fsx",
    "iotanalytics",
];

pub const DEFAULT_MAX_RETRIES: u32 = 25;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("region is not set: configure `region` or set AWS_REGION")]
    MissingRegion,

    #[error("unsupported endpoint override '{0}', expected one of: {services}", services = ENDPOINT_SERVICES.join(", "))]
    UnknownEndpoint(String),

    #[error("invalid provider configuration: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Schema(Vec<TypeError>),

    #[error("invalid provider configuration: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to build HTTP client: {0}")]
    Http(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub max_retries: Option<u32>,
    /// Service name -> endpoint URL
    pub endpoints: HashMap<String, String>,
    pub default_tags: BTreeMap<String, String>,
    pub ignore_tags: IgnoreTagsConfig,
}

impl ProviderConfig {
    /// Parse and validate the provider block
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> Result<Self, ConfigError> {
        provider_schema()
            .validate(attributes)
            .map_err(ConfigError::Schema)?;

        let mut object = serde_json::Map::new();
        for (key, value) in attributes {
            // Single-item blocks deserialize as plain structs
            let value = match key.as_str() {
                "ignore_tags" => value.first_block().map(|b| Value::Map(b.clone())),
                _ => Some(value.clone()),
            };
            if let Some(json) = value.as_ref().and_then(value_to_json) {
                object.insert(key.clone(), json);
            }
        }
        let config: ProviderConfig = serde_json::from_value(serde_json::Value::Object(object))?;
        config.check_endpoints()?;
        Ok(config)
    }

    fn check_endpoints(&self) -> Result<(), ConfigError> {
        match self
            .endpoints
            .keys()
            .find(|k| !ENDPOINT_SERVICES.contains(&k.as_str()))
        {
            Some(unknown) => Err(ConfigError::UnknownEndpoint(unknown.clone())),
            None => Ok(()),
        }
    }

    /// Configured region, falling back to AWS_REGION then AWS_DEFAULT_REGION
    pub fn resolve_region(&self) -> Result<String, ConfigError> {
        self.region
            .clone()
            .or_else(|| std::env::var("AWS_REGION").ok())
            .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
            .filter(|r| !r.is_empty())
            .ok_or(ConfigError::MissingRegion)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn endpoint(&self, service: &str) -> Option<&str> {
        self.endpoints.get(service).map(String::as_str)
    }

    pub fn tag_settings(&self) -> TagSettings {
        TagSettings {
            default_tags: self
                .default_tags
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect::<KeyValueTags>(),
            ignore_tags: self.ignore_tags.clone(),
        }
    }
}

/// Schema of the provider block
pub fn provider_schema() -> ResourceSchema {
    ResourceSchema::new("aws")
        .with_description("AWS provider configuration")
        .attribute(
            AttributeSchema::new(
                "region",
                types::string_matching(
                    r"^[a-z]{2}(-[a-z]+)+-\d+$",
                    "must be an AWS region such as us-east-1",
                ),
            )
            .with_description("Region for all API calls; falls back to AWS_REGION"),
        )
        .attribute(
            AttributeSchema::new("profile", AttributeType::String)
                .with_description("Shared config profile"),
        )
        .attribute(
            AttributeSchema::new("max_retries", types::int_between(0, 100))
                .with_default(DEFAULT_MAX_RETRIES as i64)
                .with_description("Maximum retries of a throttled or failed API call"),
        )
        .attribute(
            AttributeSchema::new("endpoints", types::string_map())
                .with_description("Endpoint URL overrides keyed by service name"),
        )
        .attribute(
            AttributeSchema::new("default_tags", types::string_map())
                .with_description("Tags applied to every taggable resource"),
        )
        .attribute(
            AttributeSchema::new(
                "ignore_tags",
                BlockSchema::new()
                    .attribute(AttributeSchema::new("keys", types::string_set()))
                    .attribute(AttributeSchema::new("key_prefixes", types::string_set()))
                    .into_type(),
            )
            .with_max_items(1),
        )
}

/// Convert an attribute Value to JSON
fn value_to_json(value: &Value) -> Option<serde_json::Value> {
    match value {
        Value::String(s) => Some(json!(s)),
        Value::Bool(b) => Some(json!(b)),
        Value::Int(i) => Some(json!(i)),
        Value::Float(f) => Some(json!(f)),
        Value::List(items) => Some(serde_json::Value::Array(
            items.iter().filter_map(value_to_json).collect(),
        )),
        Value::Map(map) => Some(serde_json::Value::Object(
            map.iter()
                .filter_map(|(k, v)| value_to_json(v).map(|j| (k.clone(), j)))
                .collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn full_configuration_round_trips_into_struct() {
        let mut endpoints = HashMap::new();
        endpoints.insert("efs".to_string(), Value::from("http://localhost:4566"));
        let mut ignore = HashMap::new();
        ignore.insert("key_prefixes".to_string(), Value::from_strings(["kubernetes.io/"]));
        let mut defaults = HashMap::new();
        defaults.insert("Owner".to_string(), Value::from("platform"));

        let config = ProviderConfig::from_attributes(&attrs(vec![
            ("region", Value::from("eu-west-1")),
            ("max_retries", Value::Int(5)),
            ("endpoints", Value::Map(endpoints)),
            ("default_tags", Value::Map(defaults)),
            ("ignore_tags", Value::List(vec![Value::Map(ignore)])),
        ]))
        .unwrap();

        assert_eq!(config.resolve_region().unwrap(), "eu-west-1");
        assert_eq!(config.max_retries(), 5);
        assert_eq!(config.endpoint("efs"), Some("http://localhost:4566"));
        assert_eq!(config.endpoint("fsx"), None);
        assert_eq!(config.ignore_tags.key_prefixes, vec!["kubernetes.io/".to_string()]);
        assert_eq!(config.tag_settings().default_tags.get("Owner"), Some("platform"));
    }

    #[test]
    fn defaults_when_empty() {
        let config = ProviderConfig::from_attributes(&HashMap::new()).unwrap();
        assert_eq!(config.max_retries(), DEFAULT_MAX_RETRIES);
        assert!(config.endpoints.is_empty());
    }

    #[test]
    fn unknown_endpoint_is_rejected() {
        let mut endpoints = HashMap::new();
        endpoints.insert("s3".to_string(), Value::from("http://localhost"));
        let err = ProviderConfig::from_attributes(&attrs(vec![("endpoints", Value::Map(endpoints))]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEndpoint(ref s) if s == "s3"));
        assert_eq!(
            err.to_string(),
            "unsupported endpoint override 's3', expected one of: apigateway, datasync, efs, elasticache, fsx, iotanalytics"
        );
    }

    #[test]
    fn invalid_region_fails_schema() {
        let err = ProviderConfig::from_attributes(&attrs(vec![("region", Value::from("Mars"))]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Schema(_)));
    }
}
