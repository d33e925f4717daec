//! Stratus AWS Provider
//!
//! AWS resources and data sources behind the `stratus_core::provider::Provider`
//! interface. Each resource type is a `ResourceDefinition` registered by name;
//! the provider validates configuration, fills schema defaults and dispatches
//! to the definition with the shared [`AwsClients`].

pub mod arn;
pub mod awserr;
pub mod case_convert;
pub mod config;
pub mod conns;
pub mod data_sources;
pub mod resources;
pub mod schemas;
pub mod tags;
pub mod validation;

use std::collections::HashMap;

use log::debug;
use stratus_core::provider::{BoxFuture, Provider, ProviderError, ProviderResult, ResourceType};
use stratus_core::registry::Registry;
use stratus_core::resource::{Resource, ResourceId, State, Value};
use stratus_core::schema::ResourceSchema;

pub use config::{ConfigError, ProviderConfig};
pub use conns::AwsClients;

/// AWS Provider
pub struct AwsProvider {
    clients: AwsClients,
    registry: Registry<AwsClients>,
}

impl AwsProvider {
    /// Configure the provider from its configuration block
    pub async fn configure(attributes: &HashMap<String, Value>) -> Result<Self, ConfigError> {
        let config = ProviderConfig::from_attributes(attributes)?;
        Self::new(&config).await
    }

    /// Create a provider, loading credentials from the environment
    pub async fn new(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let clients = AwsClients::from_config(config).await?;
        Self::with_clients(clients)
    }

    /// Create with specific clients (for testing)
    pub fn with_clients(clients: AwsClients) -> Result<Self, ConfigError> {
        let mut registry = Registry::new();
        resources::register_all(&mut registry)?;
        data_sources::register_all(&mut registry)?;
        Ok(Self { clients, registry })
    }

    pub fn clients(&self) -> &AwsClients {
        &self.clients
    }

    /// Schema validation, defaults, then cross-attribute rules; every
    /// problem is reported in one error
    fn prepare(&self, schema: &ResourceSchema, resource: &Resource) -> ProviderResult<Resource> {
        let mut messages: Vec<String> = match schema.validate(&resource.attributes) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
        };

        let attributes = schema.apply_defaults(&resource.attributes);
        if !resource.is_data_source() {
            if let Err(errors) =
                validation::validate_resource(&resource.id.resource_type, &attributes)
            {
                messages.extend(errors.iter().map(|e| e.to_string()));
            }
        }

        if !messages.is_empty() {
            return Err(ProviderError::new(format!(
                "Invalid configuration for {}: {}",
                resource.id,
                messages.join("; ")
            ))
            .for_resource(resource.id.clone()));
        }
        Ok(Resource {
            attributes,
            ..resource.clone()
        })
    }
}

fn unknown_resource_type(id: &ResourceId) -> ProviderError {
    ProviderError::new(format!("Unknown resource type: {}", id.resource_type)).for_resource(id.clone())
}

impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        self.registry.resource_types()
    }

    fn data_source_types(&self) -> Vec<Box<dyn ResourceType>> {
        self.registry.data_source_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(str::to_string);
        Box::pin(async move {
            let definition = self
                .registry
                .resource(&id.resource_type)
                .ok_or_else(|| unknown_resource_type(&id))?;
            let Some(identifier) = identifier else {
                return Ok(State::not_found(id));
            };
            debug!("read {} ({})", id, identifier);
            definition.read(&self.clients, &id, &identifier).await
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let definition = self
                .registry
                .resource(&resource.id.resource_type)
                .ok_or_else(|| unknown_resource_type(&resource.id))?;
            let resource = self.prepare(&definition.schema(), &resource)?;
            definition.create(&self.clients, &resource).await
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move {
            let definition = self
                .registry
                .resource(&id.resource_type)
                .ok_or_else(|| unknown_resource_type(&id))?;
            let to = self.prepare(&definition.schema(), &to)?;
            definition
                .update(&self.clients, &id, &identifier, &from, &to)
                .await
        })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            let definition = self
                .registry
                .resource(&id.resource_type)
                .ok_or_else(|| unknown_resource_type(&id))?;
            definition.delete(&self.clients, &id, &identifier).await
        })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let definition = self
                .registry
                .data_source(&resource.id.resource_type)
                .ok_or_else(|| unknown_resource_type(&resource.id))?;
            let resource = self.prepare(&definition.schema(), &resource)?;
            definition.read(&self.clients, &resource).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conns::test_support::offline_clients;

    fn provider() -> AwsProvider {
        let _ = env_logger::builder().is_test(true).try_init();
        AwsProvider::with_clients(offline_clients("us-east-1")).unwrap()
    }

    #[test]
    fn exposes_every_resource_and_data_source() {
        let provider = provider();
        let mut names: Vec<&str> = provider.resource_types().iter().map(|t| t.name()).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "apigateway.authorizer",
                "datasync.agent",
                "datasync.location_nfs",
                "datasync.location_s3",
                "datasync.task",
                "efs.mount_target",
                "elasticache.user_group",
                "fsx.lustre_file_system",
                "iotanalytics.pipeline",
            ]
        );
        assert_eq!(provider.data_source_types().len(), 2);
    }

    #[tokio::test]
    async fn read_without_identifier_is_not_found() {
        let provider = provider();
        let id = ResourceId::new("efs.mount_target", "main");
        let state = provider.read(&id, None).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn unknown_type_is_rejected() {
        let provider = provider();
        let resource = Resource::new("ec2.vpc", "main");
        let err = provider.create(&resource).await.unwrap_err();
        assert_eq!(err.message, "Unknown resource type: ec2.vpc");
        let err = provider.delete(&resource.id, "vpc-1").await.unwrap_err();
        assert_eq!(err.message, "Unknown resource type: ec2.vpc");
    }

    #[tokio::test]
    async fn create_reports_schema_and_cross_attribute_errors_together() {
        let provider = provider();
        let resource = Resource::new("apigateway.authorizer", "auth")
            .with_attribute("rest_api_id", "abc123")
            .with_attribute("name", "auth")
            .with_attribute("authorizer_result_ttl_in_seconds", 7200i64);
        let err = provider.create(&resource).await.unwrap_err();

        assert!(err.message.starts_with("Invalid configuration for apigateway.authorizer.auth"));
        assert!(err.message.contains("authorizer_result_ttl_in_seconds"));
        assert!(err.message.contains("authorizer_uri is required when type is TOKEN"));
    }

    #[test]
    fn prepare_fills_defaults() {
        let provider = provider();
        let definition = provider.registry.resource("fsx.lustre_file_system").unwrap();
        let resource = Resource::new("fsx.lustre_file_system", "scratch")
            .with_attribute("storage_capacity", 1200i64)
            .with_attribute("subnet_ids", Value::from_strings(["subnet-1"]));
        let prepared = provider.prepare(&definition.schema(), &resource).unwrap();

        assert_eq!(prepared.attributes.get("deployment_type"), Some(&Value::from("SCRATCH_1")));
        assert_eq!(prepared.attributes.get("storage_type"), Some(&Value::from("SSD")));
        assert_eq!(prepared.attributes.get("copy_tags_to_backups"), Some(&Value::Bool(false)));
    }

    #[tokio::test]
    async fn data_source_conflicts_are_rejected() {
        let provider = provider();
        let config = Resource::new("datasync.agent", "edge")
            .with_attribute("arn", "arn:aws:datasync:us-east-1:123456789012:agent/agent-1")
            .with_attribute("name", "edge")
            .with_read_only(true);
        let err = provider.read_data_source(&config).await.unwrap_err();
        assert!(err.message.starts_with("Invalid configuration for datasync.agent.edge"));
    }
}
