//! AWS-specific type definitions

use std::net::Ipv4Addr;
use std::sync::Arc;

use stratus_core::resource::Value;
use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::arn::is_arn;

/// ARN type
pub fn arn() -> AttributeType {
    AttributeType::Custom {
        name: "Arn".to_string(),
        base: Box::new(AttributeType::String),
        validate: Arc::new(|value| match value {
            Value::String(s) if is_arn(s) => Ok(()),
            Value::String(s) => Err(format!("Invalid ARN '{}'", s)),
            _ => Err("Expected string".to_string()),
        }),
    }
}

/// Set of ARNs
pub fn arn_set() -> AttributeType {
    AttributeType::Set(Box::new(arn()))
}

/// IPv4 address type
pub fn ipv4_address() -> AttributeType {
    AttributeType::Custom {
        name: "Ipv4Address".to_string(),
        base: Box::new(AttributeType::String),
        validate: Arc::new(|value| match value {
            Value::String(s) if s.parse::<Ipv4Addr>().is_ok() => Ok(()),
            Value::String(s) => Err(format!("Invalid IPv4 address '{}'", s)),
            _ => Err("Expected string".to_string()),
        }),
    }
}

/// S3 URI, e.g. "s3://bucket/prefix"
pub fn s3_uri() -> AttributeType {
    types::string_matching(r"^s3://[^/]+(/.*)?$", "must be an S3 URI like s3://bucket/prefix")
}

/// Weekly maintenance window start, "d:HH:MM" with d in 1..=7
pub fn weekly_time() -> AttributeType {
    types::string_matching(
        r"^[1-7]:([01]\d|2[0-3]):[0-5]\d$",
        "must be in the format d:HH:MM",
    )
}

/// Daily start time, "HH:MM"
pub fn daily_time() -> AttributeType {
    types::string_matching(r"^([01]\d|2[0-3]):[0-5]\d$", "must be in the format HH:MM")
}

/// Adds the `tags` and `tags_all` attributes
pub fn with_tags(schema: ResourceSchema) -> ResourceSchema {
    schema
        .attribute(
            AttributeSchema::new("tags", types::string_map())
                .with_description("Tags on the resource, merged over provider default_tags"),
        )
        .attribute(
            AttributeSchema::new("tags_all", types::string_map())
                .computed()
                .with_description("All tags on the resource, including provider default_tags"),
        )
}

/// Ignore a difference consisting only of a trailing slash
pub fn suppress_trailing_slash(_key: &str, old: &Value, new: &Value) -> bool {
    match (old.as_str(), new.as_str()) {
        (Some(old), Some(new)) => old.trim_end_matches('/') == new.trim_end_matches('/'),
        _ => false,
    }
}

/// Ignore differences in block fields left unset in configuration
///
/// Used for blocks whose unset fields AWS fills with its own defaults.
pub fn suppress_unset_block_fields(_key: &str, old: &Value, new: &Value) -> bool {
    let (Some(old), Some(new)) = (old.as_list(), new.as_list()) else {
        return false;
    };
    old.len() == new.len()
        && old.iter().zip(new).all(|(o, n)| match (o.as_map(), n.as_map()) {
            (Some(o), Some(n)) => n.iter().all(|(k, v)| o.get(k) == Some(v)),
            _ => o == n,
        })
}
