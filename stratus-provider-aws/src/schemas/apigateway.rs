//! API Gateway schema definitions

use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as aws_types;

pub const AUTHORIZER_TYPES: &[&str] = &["TOKEN", "REQUEST", "COGNITO_USER_POOLS"];
pub const DEFAULT_IDENTITY_SOURCE: &str = "method.request.header.Authorization";
pub const DEFAULT_AUTHORIZER_TTL: i64 = 300;

/// Returns the schema for REST API authorizers
pub fn authorizer_schema() -> ResourceSchema {
    ResourceSchema::new("apigateway.authorizer")
        .with_description("An authorizer for methods of a REST API")
        .attribute(
            AttributeSchema::new("rest_api_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("type", types::string_in(AUTHORIZER_TYPES))
                .with_default("TOKEN")
                .with_description("Authorizer type"),
        )
        .attribute(
            AttributeSchema::new("authorizer_uri", AttributeType::String)
                .with_description("Lambda invocation URI; required unless type is COGNITO_USER_POOLS"),
        )
        .attribute(
            AttributeSchema::new("authorizer_credentials", aws_types::arn())
                .with_description("IAM role API Gateway assumes to call the authorizer"),
        )
        .attribute(
            AttributeSchema::new("authorizer_result_ttl_in_seconds", types::int_between(0, 3600))
                .with_default(DEFAULT_AUTHORIZER_TTL),
        )
        .attribute(
            AttributeSchema::new("identity_source", AttributeType::String)
                .with_default(DEFAULT_IDENTITY_SOURCE),
        )
        .attribute(AttributeSchema::new(
            "identity_validation_expression",
            AttributeType::String,
        ))
        .attribute(
            AttributeSchema::new("provider_arns", aws_types::arn_set())
                .with_description("Cognito user pool ARNs; required for COGNITO_USER_POOLS"),
        )
        .attribute(AttributeSchema::new("id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
}

/// Returns all API Gateway schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![authorizer_schema()]
}
