//! FSx schema definitions

use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as aws_types;

pub const DEPLOYMENT_TYPES: &[&str] = &["SCRATCH_1", "SCRATCH_2", "PERSISTENT_1", "PERSISTENT_2"];
pub const STORAGE_TYPES: &[&str] = &["SSD", "HDD"];
pub const DRIVE_CACHE_TYPES: &[&str] = &["NONE", "READ"];
pub const AUTO_IMPORT_POLICIES: &[&str] = &["NONE", "NEW", "NEW_CHANGED", "NEW_CHANGED_DELETED"];

/// Returns the schema for FSx for Lustre file systems
pub fn lustre_file_system_schema() -> ResourceSchema {
    aws_types::with_tags(
        ResourceSchema::new("fsx.lustre_file_system")
            .with_description("An FSx for Lustre file system")
            .attribute(
                AttributeSchema::new("storage_capacity", types::int_between(1200, 2_147_483_647))
                    .required()
                    .with_description("Capacity in GiB; grows in place, never shrinks"),
            )
            .attribute(
                AttributeSchema::new("subnet_ids", types::string_list())
                    .required()
                    .force_new()
                    .with_items(1, Some(1)),
            )
            .attribute(
                AttributeSchema::new("security_group_ids", types::string_set())
                    .force_new()
                    .not_refreshed()
                    .with_items(0, Some(50)),
            )
            .attribute(
                AttributeSchema::new("import_path", aws_types::s3_uri())
                    .force_new()
                    .with_diff_suppress(aws_types::suppress_trailing_slash),
            )
            .attribute(
                AttributeSchema::new("export_path", aws_types::s3_uri())
                    .optional_computed()
                    .force_new()
                    .with_diff_suppress(aws_types::suppress_trailing_slash),
            )
            .attribute(
                AttributeSchema::new("imported_file_chunk_size", types::int_between(1, 512_000))
                    .optional_computed()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("deployment_type", types::string_in(DEPLOYMENT_TYPES))
                    .with_default("SCRATCH_1")
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new(
                    "per_unit_storage_throughput",
                    types::int_in(&[12, 40, 50, 100, 125, 200, 250, 500, 1000]),
                )
                .force_new(),
            )
            .attribute(
                AttributeSchema::new("storage_type", types::string_in(STORAGE_TYPES))
                    .with_default("SSD")
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("drive_cache_type", types::string_in(DRIVE_CACHE_TYPES))
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("auto_import_policy", types::string_in(AUTO_IMPORT_POLICIES))
                    .optional_computed(),
            )
            .attribute(
                AttributeSchema::new("kms_key_id", aws_types::arn())
                    .optional_computed()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("copy_tags_to_backups", AttributeType::Bool)
                    .with_default(false)
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("weekly_maintenance_start_time", aws_types::weekly_time())
                    .optional_computed(),
            )
            .attribute(
                AttributeSchema::new("automatic_backup_retention_days", types::int_between(0, 90))
                    .optional_computed(),
            )
            .attribute(
                AttributeSchema::new("daily_automatic_backup_start_time", aws_types::daily_time())
                    .optional_computed(),
            )
            .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
            .attribute(AttributeSchema::new("dns_name", AttributeType::String).computed())
            .attribute(AttributeSchema::new("mount_name", AttributeType::String).computed())
            .attribute(
                AttributeSchema::new("network_interface_ids", types::string_list()).computed(),
            )
            .attribute(AttributeSchema::new("owner_id", AttributeType::String).computed())
            .attribute(AttributeSchema::new("vpc_id", AttributeType::String).computed()),
    )
}

/// Returns all FSx schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![lustre_file_system_schema()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use stratus_core::resource::Value;

    fn base() -> HashMap<String, Value> {
        let mut attrs = HashMap::new();
        attrs.insert("storage_capacity".to_string(), Value::Int(1200));
        attrs.insert("subnet_ids".to_string(), Value::from_strings(["subnet-1"]));
        attrs
    }

    #[test]
    fn minimal_file_system() {
        assert!(lustre_file_system_schema().validate(&base()).is_ok());
    }

    #[test]
    fn single_subnet_only() {
        let mut attrs = base();
        attrs.insert("subnet_ids".to_string(), Value::from_strings(["subnet-1", "subnet-2"]));
        assert!(lustre_file_system_schema().validate(&attrs).is_err());
    }

    #[test]
    fn maintenance_windows() {
        let mut attrs = base();
        attrs.insert("weekly_maintenance_start_time".to_string(), Value::from("3:05:30"));
        attrs.insert("daily_automatic_backup_start_time".to_string(), Value::from("01:00"));
        attrs.insert("automatic_backup_retention_days".to_string(), Value::Int(90));
        assert!(lustre_file_system_schema().validate(&attrs).is_ok());

        attrs.insert("automatic_backup_retention_days".to_string(), Value::Int(91));
        assert!(lustre_file_system_schema().validate(&attrs).is_err());
    }

    #[test]
    fn throughput_values() {
        let mut attrs = base();
        attrs.insert("per_unit_storage_throughput".to_string(), Value::Int(200));
        assert!(lustre_file_system_schema().validate(&attrs).is_ok());
        attrs.insert("per_unit_storage_throughput".to_string(), Value::Int(300));
        assert!(lustre_file_system_schema().validate(&attrs).is_err());
    }
}
