//! Resource definitions and the helpers their CRUD handlers share

pub mod apigateway;
pub mod datasync;
pub mod efs;
pub mod elasticache;
pub mod fsx;
pub mod iotanalytics;

use std::collections::HashMap;

use stratus_core::differ::changed_attributes;
use stratus_core::provider::{ProviderError, ProviderResult};
use stratus_core::registry::{Registry, RegistryError};
use stratus_core::resource::{AttributeMap, ResourceId, Value};
use stratus_core::schema::ResourceSchema;

use crate::conns::AwsClients;

/// Register every managed resource
pub fn register_all(registry: &mut Registry<AwsClients>) -> Result<(), RegistryError> {
    registry.register_resource(Box::new(apigateway::Authorizer))?;
    registry.register_resource(Box::new(datasync::agent::Agent))?;
    registry.register_resource(Box::new(datasync::location_s3::LocationS3))?;
    registry.register_resource(Box::new(datasync::location_nfs::LocationNfs))?;
    registry.register_resource(Box::new(datasync::task::Task))?;
    registry.register_resource(Box::new(efs::MountTarget))?;
    registry.register_resource(Box::new(elasticache::UserGroup))?;
    registry.register_resource(Box::new(fsx::LustreFileSystem))?;
    registry.register_resource(Box::new(iotanalytics::Pipeline))?;
    Ok(())
}

/// Required string attribute, or an error naming it
pub(crate) fn require_str<'a>(
    id: &ResourceId,
    attributes: &'a HashMap<String, Value>,
    key: &str,
) -> ProviderResult<&'a str> {
    attributes
        .get_str(key)
        .ok_or_else(|| ProviderError::new(format!("{} is required", key)).for_resource(id.clone()))
}

/// Error for a request shape the SDK refused to build
pub(crate) fn build_error(
    id: &ResourceId,
    what: &str,
    err: impl std::error::Error + Send + Sync + 'static,
) -> ProviderError {
    ProviderError::new(format!("Failed to build {}: {}", what, err))
        .for_resource(id.clone())
        .with_cause(err)
}

/// Error for a response missing a field AWS always returns
pub(crate) fn missing_field(id: &ResourceId, operation: &str, field: &str) -> ProviderError {
    ProviderError::new(format!("{} response has no {}", operation, field)).for_resource(id.clone())
}

/// Insert `value` under `key` when present
pub(crate) fn set_str(attributes: &mut HashMap<String, Value>, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        attributes.insert(key.to_string(), Value::from(v));
    }
}

pub(crate) fn set_int(attributes: &mut HashMap<String, Value>, key: &str, value: Option<i32>) {
    if let Some(v) = value {
        attributes.insert(key.to_string(), Value::Int(i64::from(v)));
    }
}

/// Wrap one map as a single-item block value
pub(crate) fn single_block(map: HashMap<String, Value>) -> Value {
    Value::List(vec![Value::Map(map)])
}

/// Whether a set-typed attribute differs between two attribute maps
pub(crate) fn set_changed(
    old: &HashMap<String, Value>,
    new: &HashMap<String, Value>,
    key: &str,
) -> bool {
    let mut a = old.get_strings(key);
    let mut b = new.get_strings(key);
    a.sort();
    b.sort();
    a != b
}

/// Whether configuration changes any of `keys` relative to the state read
/// from AWS; values AWS filled in for unset attributes do not count
pub(crate) fn any_changed(
    schema: &ResourceSchema,
    old: &HashMap<String, Value>,
    new: &HashMap<String, Value>,
    keys: &[&str],
) -> bool {
    changed_attributes(new, old, schema)
        .iter()
        .any(|k| keys.contains(&k.as_str()))
}

/// Convert a count or size from configuration to the SDK's i32
pub(crate) fn to_i32(id: &ResourceId, key: &str, value: i64) -> ProviderResult<i32> {
    i32::try_from(value).map_err(|_| {
        ProviderError::new(format!("{} value {} is out of range", key, value)).for_resource(id.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn register_all_registers_each_type_once() {
        let mut registry = Registry::new();
        register_all(&mut registry).unwrap();
        assert_eq!(registry.resource_names().len(), 9);
        assert!(register_all(&mut registry).is_err());
    }

    #[test]
    fn set_comparison_ignores_order() {
        let old = attrs(vec![("security_groups", Value::from_strings(["sg-1", "sg-2"]))]);
        let new = attrs(vec![("security_groups", Value::from_strings(["sg-2", "sg-1"]))]);
        assert!(!set_changed(&old, &new, "security_groups"));
        let removed = attrs(vec![]);
        assert!(set_changed(&old, &removed, "security_groups"));
    }

    #[test]
    fn any_changed_ignores_unset_optional_computed() {
        use stratus_core::schema::{AttributeSchema, AttributeType};

        let schema = ResourceSchema::new("test.thing")
            .attribute(AttributeSchema::new("name", AttributeType::String))
            .attribute(
                AttributeSchema::new("auto_import_policy", AttributeType::String)
                    .optional_computed(),
            );
        let old = attrs(vec![
            ("name", Value::from("a")),
            ("auto_import_policy", Value::from("NONE")),
        ]);
        let new = attrs(vec![("name", Value::from("a"))]);
        assert!(!any_changed(&schema, &old, &new, &["name", "auto_import_policy"]));

        let new = attrs(vec![("name", Value::from("b"))]);
        assert!(any_changed(&schema, &old, &new, &["name"]));
        assert!(!any_changed(&schema, &old, &new, &["auto_import_policy"]));
    }

    #[test]
    fn require_str_names_the_attribute() {
        let id = ResourceId::new("efs.mount_target", "main");
        let err = require_str(&id, &HashMap::new(), "subnet_id").unwrap_err();
        assert_eq!(err.message, "subnet_id is required");
        assert!(to_i32(&id, "storage_capacity", i64::MAX).is_err());
    }
}
