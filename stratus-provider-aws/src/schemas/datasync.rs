//! DataSync schema definitions

use stratus_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema, types};

use super::types as aws_types;

pub const S3_STORAGE_CLASSES: &[&str] = &[
    "STANDARD",
    "STANDARD_IA",
    "ONEZONE_IA",
    "INTELLIGENT_TIERING",
    "GLACIER",
    "DEEP_ARCHIVE",
    "OUTPOSTS",
];

pub const NFS_VERSIONS: &[&str] = &["AUTOMATIC", "NFS3", "NFS4_0", "NFS4_1"];

/// Returns the schema for DataSync agents
pub fn agent_schema() -> ResourceSchema {
    aws_types::with_tags(
        ResourceSchema::new("datasync.agent")
            .with_description("A DataSync agent activated in the configured region")
            .attribute(
                AttributeSchema::new("activation_key", AttributeType::String)
                    .force_new()
                    .not_refreshed()
                    .conflicts_with(&["ip_address"])
                    .with_description("Activation key; obtained from the agent when unset"),
            )
            .attribute(
                AttributeSchema::new("ip_address", aws_types::ipv4_address())
                    .force_new()
                    .not_refreshed()
                    .conflicts_with(&["activation_key"])
                    .with_description("Agent address reachable from the provider"),
            )
            .attribute(
                AttributeSchema::new("private_link_endpoint", AttributeType::String)
                    .optional_computed()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("security_group_arns", aws_types::arn_set()).force_new(),
            )
            .attribute(AttributeSchema::new("subnet_arns", aws_types::arn_set()).force_new())
            .attribute(
                AttributeSchema::new("vpc_endpoint_id", AttributeType::String).force_new(),
            )
            .attribute(AttributeSchema::new("name", AttributeType::String).optional_computed())
            .attribute(AttributeSchema::new("arn", AttributeType::String).computed()),
    )
}

/// Returns the schema for S3 locations
pub fn location_s3_schema() -> ResourceSchema {
    aws_types::with_tags(
        ResourceSchema::new("datasync.location_s3")
            .with_description("An S3 bucket used as a DataSync source or destination")
            .attribute(
                AttributeSchema::new("s3_bucket_arn", aws_types::arn())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("subdirectory", AttributeType::String)
                    .required()
                    .force_new()
                    .with_diff_suppress(aws_types::suppress_trailing_slash),
            )
            .attribute(
                AttributeSchema::new(
                    "s3_config",
                    BlockSchema::new()
                        .attribute(
                            AttributeSchema::new("bucket_access_role_arn", aws_types::arn())
                                .required(),
                        )
                        .into_type(),
                )
                .required()
                .force_new()
                .with_items(1, Some(1)),
            )
            .attribute(
                AttributeSchema::new("s3_storage_class", types::string_in(S3_STORAGE_CLASSES))
                    .optional_computed()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("agent_arns", aws_types::arn_set()).force_new())
            .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
            .attribute(AttributeSchema::new("uri", AttributeType::String).computed()),
    )
}

/// Returns the schema for NFS locations
pub fn location_nfs_schema() -> ResourceSchema {
    aws_types::with_tags(
        ResourceSchema::new("datasync.location_nfs")
            .with_description("An NFS export used as a DataSync source or destination")
            .attribute(
                AttributeSchema::new("server_hostname", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("subdirectory", AttributeType::String)
                    .required()
                    .with_diff_suppress(aws_types::suppress_trailing_slash),
            )
            .attribute(
                AttributeSchema::new(
                    "on_prem_config",
                    BlockSchema::new()
                        .attribute(
                            AttributeSchema::new("agent_arns", aws_types::arn_set()).required(),
                        )
                        .into_type(),
                )
                .required()
                .with_items(1, Some(1)),
            )
            .attribute(
                AttributeSchema::new(
                    "mount_options",
                    BlockSchema::new()
                        .attribute(
                            AttributeSchema::new("version", types::string_in(NFS_VERSIONS))
                                .with_default("AUTOMATIC"),
                        )
                        .into_type(),
                )
                .optional_computed()
                .with_max_items(1)
                .with_diff_suppress(aws_types::suppress_unset_block_fields),
            )
            .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
            .attribute(AttributeSchema::new("uri", AttributeType::String).computed()),
    )
}

fn options_block() -> AttributeType {
    let option = |name: &str, values: &[&str]| {
        AttributeSchema::new(name, types::string_in(values)).optional_computed()
    };
    BlockSchema::new()
        .attribute(option("atime", &["NONE", "BEST_EFFORT"]))
        .attribute(
            AttributeSchema::new("bytes_per_second", AttributeType::Int)
                .optional_computed()
                .with_description("Bandwidth limit; -1 for unlimited"),
        )
        .attribute(option("gid", &["NONE", "INT_VALUE", "NAME", "BOTH"]))
        .attribute(option("log_level", &["OFF", "BASIC", "TRANSFER"]))
        .attribute(option("mtime", &["NONE", "PRESERVE"]))
        .attribute(option("overwrite_mode", &["ALWAYS", "NEVER"]))
        .attribute(option("posix_permissions", &["NONE", "PRESERVE"]))
        .attribute(option("preserve_deleted_files", &["PRESERVE", "REMOVE"]))
        .attribute(option("preserve_devices", &["NONE", "PRESERVE"]))
        .attribute(option("task_queueing", &["ENABLED", "DISABLED"]))
        .attribute(option("transfer_mode", &["CHANGED", "ALL"]))
        .attribute(option("uid", &["NONE", "INT_VALUE", "NAME", "BOTH"]))
        .attribute(option(
            "verify_mode",
            &["NONE", "POINT_IN_TIME_CONSISTENT", "ONLY_FILES_TRANSFERRED"],
        ))
        .into_type()
}

/// Returns the schema for DataSync tasks
pub fn task_schema() -> ResourceSchema {
    aws_types::with_tags(
        ResourceSchema::new("datasync.task")
            .with_description("A DataSync transfer between two locations")
            .attribute(
                AttributeSchema::new("source_location_arn", aws_types::arn())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("destination_location_arn", aws_types::arn())
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("name", AttributeType::String))
            .attribute(AttributeSchema::new("cloudwatch_log_group_arn", aws_types::arn()))
            .attribute(
                AttributeSchema::new("options", options_block())
                    .optional_computed()
                    .with_max_items(1)
                    .with_diff_suppress(aws_types::suppress_unset_block_fields),
            )
            .attribute(
                AttributeSchema::new(
                    "schedule",
                    BlockSchema::new()
                        .attribute(
                            AttributeSchema::new("schedule_expression", AttributeType::String)
                                .required(),
                        )
                        .into_type(),
                )
                .with_max_items(1),
            )
            .attribute(
                AttributeSchema::new(
                    "excludes",
                    BlockSchema::new()
                        .attribute(AttributeSchema::new(
                            "filter_type",
                            types::string_in(&["SIMPLE_PATTERN"]),
                        ))
                        .attribute(AttributeSchema::new("value", AttributeType::String))
                        .into_type(),
                )
                .with_max_items(1),
            )
            .attribute(AttributeSchema::new("arn", AttributeType::String).computed()),
    )
}

/// Returns the schema for the agent data source
pub fn agent_data_source_schema() -> ResourceSchema {
    ResourceSchema::new("datasync.agent")
        .with_description("Look up a DataSync agent by ARN or name")
        .attribute(
            AttributeSchema::new("arn", aws_types::arn())
                .optional_computed()
                .conflicts_with(&["name"]),
        )
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .optional_computed()
                .conflicts_with(&["arn"]),
        )
        .attribute(AttributeSchema::new("status", AttributeType::String).computed())
        .attribute(AttributeSchema::new("endpoint_type", AttributeType::String).computed())
        .attribute(AttributeSchema::new("private_link_endpoint", AttributeType::String).computed())
        .attribute(AttributeSchema::new("vpc_endpoint_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("subnet_arns", types::string_set()).computed())
        .attribute(AttributeSchema::new("security_group_arns", types::string_set()).computed())
}

/// Returns all DataSync resource schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        agent_schema(),
        location_s3_schema(),
        location_nfs_schema(),
        task_schema(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use stratus_core::resource::Value;

    fn block(pairs: Vec<(&str, Value)>) -> Value {
        Value::List(vec![Value::Map(
            pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        )])
    }

    #[test]
    fn agent_key_conflicts_with_ip() {
        let mut attrs = HashMap::new();
        attrs.insert("activation_key".to_string(), Value::from("ABCDE-12345"));
        attrs.insert("ip_address".to_string(), Value::from("10.0.0.5"));
        let errors = agent_schema().validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn location_s3_requires_one_config_block() {
        let mut attrs = HashMap::new();
        attrs.insert("s3_bucket_arn".to_string(), Value::from("arn:aws:s3:::bucket"));
        attrs.insert("subdirectory".to_string(), Value::from("/data/"));
        attrs.insert("s3_config".to_string(), Value::List(vec![]));
        assert!(location_s3_schema().validate(&attrs).is_err());

        attrs.insert(
            "s3_config".to_string(),
            block(vec![(
                "bucket_access_role_arn",
                Value::from("arn:aws:iam::123456789012:role/sync"),
            )]),
        );
        assert!(location_s3_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn task_options_are_enumerated() {
        let mut attrs = HashMap::new();
        attrs.insert(
            "source_location_arn".to_string(),
            Value::from("arn:aws:datasync:us-east-1:123456789012:location/loc-1"),
        );
        attrs.insert(
            "destination_location_arn".to_string(),
            Value::from("arn:aws:datasync:us-east-1:123456789012:location/loc-2"),
        );
        attrs.insert(
            "options".to_string(),
            block(vec![
                ("verify_mode", Value::from("ONLY_FILES_TRANSFERRED")),
                ("bytes_per_second", Value::Int(-1)),
            ]),
        );
        assert!(task_schema().validate(&attrs).is_ok());

        attrs.insert("options".to_string(), block(vec![("atime", Value::from("ALWAYS"))]));
        assert!(task_schema().validate(&attrs).is_err());
    }

    #[test]
    fn nfs_version_enum() {
        let mut attrs = HashMap::new();
        attrs.insert("server_hostname".to_string(), Value::from("nfs.example.com"));
        attrs.insert("subdirectory".to_string(), Value::from("/exports"));
        attrs.insert(
            "on_prem_config".to_string(),
            block(vec![(
                "agent_arns",
                Value::from_strings(["arn:aws:datasync:us-east-1:123456789012:agent/agent-1"]),
            )]),
        );
        attrs.insert("mount_options".to_string(), block(vec![("version", Value::from("NFS5"))]));
        assert!(location_nfs_schema().validate(&attrs).is_err());
    }
}
