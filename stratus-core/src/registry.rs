//! Registry - Map from type name to resource and data source definitions
//!
//! `M` is the provider's connection metadata (API clients, configuration),
//! handed to every callback.

use std::collections::BTreeMap;

use crate::provider::{BoxFuture, ProviderError, ProviderResult, ResourceType};
use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;

/// A managed resource: schema plus CRUD callbacks
pub trait ResourceDefinition<M>: Send + Sync {
    fn name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    fn create<'a>(
        &'a self,
        meta: &'a M,
        resource: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>>;

    fn read<'a>(
        &'a self,
        meta: &'a M,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>>;

    /// In-place update. Resources whose attributes are all `force_new` keep
    /// the default, which refuses.
    fn update<'a>(
        &'a self,
        _meta: &'a M,
        id: &'a ResourceId,
        _identifier: &'a str,
        _from: &'a State,
        _to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        let name = self.name();
        Box::pin(async move {
            Err(ProviderError::new(format!(
                "Update not supported for {}, delete and recreate",
                name
            ))
            .for_resource(id.clone()))
        })
    }

    fn delete<'a>(
        &'a self,
        meta: &'a M,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>>;
}

/// A read-only data source
pub trait DataSourceDefinition<M>: Send + Sync {
    fn name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    fn read<'a>(&'a self, meta: &'a M, config: &'a Resource)
    -> BoxFuture<'a, ProviderResult<State>>;
}

/// Registration error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Resource type '{0}' is already registered")]
    DuplicateResource(String),

    #[error("Data source '{0}' is already registered")]
    DuplicateDataSource(String),
}

/// Type name and schema, exposed through the `ResourceType` trait
struct RegisteredType {
    name: &'static str,
    schema: ResourceSchema,
}

impl ResourceType for RegisteredType {
    fn name(&self) -> &'static str {
        self.name
    }

    fn schema(&self) -> ResourceSchema {
        self.schema.clone()
    }
}

/// Static map of everything a provider exposes
pub struct Registry<M> {
    resources: BTreeMap<&'static str, Box<dyn ResourceDefinition<M>>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSourceDefinition<M>>>,
}

impl<M> Default for Registry<M> {
    fn default() -> Self {
        Self {
            resources: BTreeMap::new(),
            data_sources: BTreeMap::new(),
        }
    }
}

impl<M> Registry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_resource(
        &mut self,
        definition: Box<dyn ResourceDefinition<M>>,
    ) -> Result<(), RegistryError> {
        let name = definition.name();
        if self.resources.contains_key(name) {
            return Err(RegistryError::DuplicateResource(name.to_string()));
        }
        self.resources.insert(name, definition);
        Ok(())
    }

    pub fn register_data_source(
        &mut self,
        definition: Box<dyn DataSourceDefinition<M>>,
    ) -> Result<(), RegistryError> {
        let name = definition.name();
        if self.data_sources.contains_key(name) {
            return Err(RegistryError::DuplicateDataSource(name.to_string()));
        }
        self.data_sources.insert(name, definition);
        Ok(())
    }

    pub fn resource(&self, name: &str) -> Option<&dyn ResourceDefinition<M>> {
        self.resources.get(name).map(|d| d.as_ref())
    }

    pub fn data_source(&self, name: &str) -> Option<&dyn DataSourceDefinition<M>> {
        self.data_sources.get(name).map(|d| d.as_ref())
    }

    pub fn resource_names(&self) -> Vec<&'static str> {
        self.resources.keys().copied().collect()
    }

    pub fn data_source_names(&self) -> Vec<&'static str> {
        self.data_sources.keys().copied().collect()
    }

    /// Resource types as seen through the `Provider` interface
    pub fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        self.resources
            .values()
            .map(|d| {
                Box::new(RegisteredType {
                    name: d.name(),
                    schema: d.schema(),
                }) as Box<dyn ResourceType>
            })
            .collect()
    }

    /// Data sources as seen through the `Provider` interface
    pub fn data_source_types(&self) -> Vec<Box<dyn ResourceType>> {
        self.data_sources
            .values()
            .map(|d| {
                Box::new(RegisteredType {
                    name: d.name(),
                    schema: d.schema(),
                }) as Box<dyn ResourceType>
            })
            .collect()
    }
}
