//! IoT Analytics schema definitions

use stratus_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema, types};

use super::types as aws_types;

/// Activity kinds; each `pipeline_activity` block sets exactly one
pub const ACTIVITY_KINDS: &[&str] = &[
    "channel",
    "datastore",
    "lambda",
    "add_attributes",
    "remove_attributes",
    "select_attributes",
    "filter",
    "math",
    "device_registry_enrich",
    "device_shadow_enrich",
];

pub const MAX_ACTIVITIES: usize = 25;

fn activity_name() -> AttributeSchema {
    AttributeSchema::new("name", types::string_len_between(1, 128)).required()
}

fn next() -> AttributeSchema {
    AttributeSchema::new("next", types::string_len_between(1, 128))
        .with_description("Name of the activity that follows")
}

fn required_string(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String).required()
}

fn single(block: BlockSchema, name: &str) -> AttributeSchema {
    AttributeSchema::new(name, block.into_type()).with_max_items(1)
}

fn enrich_block() -> BlockSchema {
    BlockSchema::new()
        .attribute(activity_name())
        .attribute(required_string("attribute"))
        .attribute(required_string("thing_name"))
        .attribute(AttributeSchema::new("role_arn", aws_types::arn()).required())
        .attribute(next())
}

fn activity_block() -> AttributeType {
    BlockSchema::new()
        .attribute(single(
            BlockSchema::new()
                .attribute(activity_name())
                .attribute(required_string("channel_name"))
                .attribute(next()),
            "channel",
        ))
        .attribute(single(
            BlockSchema::new()
                .attribute(activity_name())
                .attribute(required_string("datastore_name")),
            "datastore",
        ))
        .attribute(single(
            BlockSchema::new()
                .attribute(activity_name())
                .attribute(required_string("lambda_name"))
                .attribute(
                    AttributeSchema::new("batch_size", types::int_between(1, 1000)).required(),
                )
                .attribute(next()),
            "lambda",
        ))
        .attribute(single(
            BlockSchema::new()
                .attribute(activity_name())
                .attribute(
                    AttributeSchema::new("attributes", types::string_map())
                        .required()
                        .with_items(1, Some(50)),
                )
                .attribute(next()),
            "add_attributes",
        ))
        .attribute(single(
            BlockSchema::new()
                .attribute(activity_name())
                .attribute(
                    AttributeSchema::new("attributes", types::string_set())
                        .required()
                        .with_items(1, Some(50)),
                )
                .attribute(next()),
            "remove_attributes",
        ))
        .attribute(single(
            BlockSchema::new()
                .attribute(activity_name())
                .attribute(
                    AttributeSchema::new("attributes", types::string_set())
                        .required()
                        .with_items(1, Some(50)),
                )
                .attribute(next()),
            "select_attributes",
        ))
        .attribute(single(
            BlockSchema::new()
                .attribute(activity_name())
                .attribute(required_string("filter"))
                .attribute(next()),
            "filter",
        ))
        .attribute(single(
            BlockSchema::new()
                .attribute(activity_name())
                .attribute(required_string("attribute"))
                .attribute(required_string("math"))
                .attribute(next()),
            "math",
        ))
        .attribute(single(enrich_block(), "device_registry_enrich"))
        .attribute(single(enrich_block(), "device_shadow_enrich"))
        .into_type()
}

/// Returns the schema for IoT Analytics pipelines
pub fn pipeline_schema() -> ResourceSchema {
    aws_types::with_tags(
        ResourceSchema::new("iotanalytics.pipeline")
            .with_description("An IoT Analytics pipeline processing channel messages")
            .attribute(
                AttributeSchema::new(
                    "name",
                    types::string_matching(
                        r"^[a-zA-Z0-9_]{1,128}$",
                        "must be 1-128 letters, digits or underscores",
                    ),
                )
                .required()
                .force_new(),
            )
            .attribute(
                AttributeSchema::new("pipeline_activity", activity_block())
                    .required()
                    .with_items(1, Some(MAX_ACTIVITIES)),
            )
            .attribute(AttributeSchema::new("arn", AttributeType::String).computed()),
    )
}

/// Returns all IoT Analytics schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![pipeline_schema()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use stratus_core::resource::Value;

    fn map(pairs: Vec<(&str, Value)>) -> Value {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn valid_pipeline() {
        let activities = Value::List(vec![
            map(vec![(
                "channel",
                Value::List(vec![map(vec![
                    ("name", Value::from("in")),
                    ("channel_name", Value::from("telemetry")),
                    ("next", Value::from("out")),
                ])]),
            )]),
            map(vec![(
                "datastore",
                Value::List(vec![map(vec![
                    ("name", Value::from("out")),
                    ("datastore_name", Value::from("store")),
                ])]),
            )]),
        ]);
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::from("telemetry_pipeline"));
        attrs.insert("pipeline_activity".to_string(), activities);
        assert!(pipeline_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn lambda_batch_size_range() {
        let activities = Value::List(vec![map(vec![(
            "lambda",
            Value::List(vec![map(vec![
                ("name", Value::from("transform")),
                ("lambda_name", Value::from("fn")),
                ("batch_size", Value::Int(0)),
            ])]),
        )])]);
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::from("p"));
        attrs.insert("pipeline_activity".to_string(), activities);
        assert!(pipeline_schema().validate(&attrs).is_err());
    }

    #[test]
    fn pipeline_needs_an_activity() {
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::from("p"));
        attrs.insert("pipeline_activity".to_string(), Value::List(vec![]));
        assert!(pipeline_schema().validate(&attrs).is_err());
    }
}
