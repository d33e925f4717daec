//! EFS schema definitions

use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as aws_types;

/// Attributes reported for a mount target by both the resource and the data source
fn computed_mount_target_attributes(schema: ResourceSchema) -> ResourceSchema {
    [
        "dns_name",
        "mount_target_dns_name",
        "file_system_arn",
        "network_interface_id",
        "availability_zone_name",
        "availability_zone_id",
        "owner_id",
    ]
    .into_iter()
    .fold(schema, |schema, name| {
        schema.attribute(AttributeSchema::new(name, AttributeType::String).computed())
    })
}

/// Returns the schema for EFS mount targets
pub fn mount_target_schema() -> ResourceSchema {
    computed_mount_target_attributes(
        ResourceSchema::new("efs.mount_target")
            .with_description("A mount target exposing an EFS file system in one subnet")
            .attribute(
                AttributeSchema::new("file_system_id", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("subnet_id", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("ip_address", aws_types::ipv4_address())
                    .optional_computed()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("security_groups", types::string_set())
                    .optional_computed()
                    .with_items(0, Some(5))
                    .with_description("Up to five security group ids"),
            ),
    )
}

/// Returns the schema for the mount target data source
pub fn mount_target_data_source_schema() -> ResourceSchema {
    computed_mount_target_attributes(
        ResourceSchema::new("efs.mount_target")
            .with_description("Look up an EFS mount target")
            .attribute(
                AttributeSchema::new("mount_target_id", AttributeType::String)
                    .optional_computed()
                    .conflicts_with(&["file_system_id", "access_point_id"]),
            )
            .attribute(AttributeSchema::new("file_system_id", AttributeType::String).optional_computed())
            .attribute(AttributeSchema::new("access_point_id", AttributeType::String).optional_computed())
            .attribute(AttributeSchema::new("subnet_id", AttributeType::String).computed())
            .attribute(AttributeSchema::new("ip_address", AttributeType::String).computed())
            .attribute(AttributeSchema::new("security_groups", types::string_set()).computed()),
    )
}

/// Returns all EFS resource schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![mount_target_schema()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use stratus_core::resource::Value;

    #[test]
    fn mount_target_requires_file_system_and_subnet() {
        let errors = mount_target_schema().validate(&HashMap::new()).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn at_most_five_security_groups() {
        let mut attrs = HashMap::new();
        attrs.insert("file_system_id".to_string(), Value::from("fs-1"));
        attrs.insert("subnet_id".to_string(), Value::from("subnet-1"));
        attrs.insert(
            "security_groups".to_string(),
            Value::from_strings(["sg-1", "sg-2", "sg-3", "sg-4", "sg-5", "sg-6"]),
        );
        assert!(mount_target_schema().validate(&attrs).is_err());
    }

    #[test]
    fn computed_attributes_are_read_only() {
        let mut attrs = HashMap::new();
        attrs.insert("file_system_id".to_string(), Value::from("fs-1"));
        attrs.insert("subnet_id".to_string(), Value::from("subnet-1"));
        attrs.insert("dns_name".to_string(), Value::from("x"));
        assert!(mount_target_schema().validate(&attrs).is_err());
    }

    #[test]
    fn data_source_lookup_keys_conflict() {
        let mut attrs = HashMap::new();
        attrs.insert("mount_target_id".to_string(), Value::from("fsmt-1"));
        attrs.insert("file_system_id".to_string(), Value::from("fs-1"));
        assert!(mount_target_data_source_schema().validate(&attrs).is_err());
    }
}
