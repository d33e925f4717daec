//! ElastiCache schema definitions

use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as aws_types;

/// Returns the schema for ElastiCache user groups
pub fn user_group_schema() -> ResourceSchema {
    aws_types::with_tags(
        ResourceSchema::new("elasticache.user_group")
            .with_description("A group of ElastiCache users for role-based access control")
            .attribute(
                AttributeSchema::new(
                    "user_group_id",
                    types::string_matching(
                        r"^[a-zA-Z][a-zA-Z0-9-]*$",
                        "must begin with a letter and contain only letters, digits and hyphens",
                    ),
                )
                .required()
                .force_new(),
            )
            .attribute(
                AttributeSchema::new("engine", types::string_in(&["REDIS"]))
                    .required()
                    .force_new()
                    .with_diff_suppress(|_, old, new| {
                        old.as_str().map(str::to_ascii_uppercase)
                            == new.as_str().map(str::to_ascii_uppercase)
                    }),
            )
            .attribute(AttributeSchema::new("user_ids", types::string_set()))
            .attribute(AttributeSchema::new("arn", AttributeType::String).computed()),
    )
}

/// Returns all ElastiCache schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![user_group_schema()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use stratus_core::resource::Value;

    #[test]
    fn valid_user_group() {
        let mut attrs = HashMap::new();
        attrs.insert("user_group_id".to_string(), Value::from("app-users"));
        attrs.insert("engine".to_string(), Value::from("REDIS"));
        attrs.insert("user_ids".to_string(), Value::from_strings(["default", "app"]));
        assert!(user_group_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn invalid_group_id() {
        let mut attrs = HashMap::new();
        attrs.insert("user_group_id".to_string(), Value::from("1-users"));
        attrs.insert("engine".to_string(), Value::from("REDIS"));
        assert!(user_group_schema().validate(&attrs).is_err());
    }

    #[test]
    fn engine_case_is_suppressed() {
        let schema = user_group_schema();
        let suppress = schema.attributes["engine"].diff_suppress.unwrap();
        assert!(suppress("engine", &Value::from("redis"), &Value::from("REDIS")));
    }
}
