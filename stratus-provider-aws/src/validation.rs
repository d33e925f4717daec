//! Cross-attribute validation
//!
//! Schemas check each attribute on its own. The rules here relate several
//! attributes of one resource and run after schema validation, with schema
//! defaults already applied.

use std::collections::HashMap;

use stratus_core::resource::{AttributeMap, Value};

use crate::schemas::iotanalytics::ACTIVITY_KINDS;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation
pub type ValidationResult = Result<(), Vec<ValidationError>>;

fn finish(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate API Gateway authorizer attributes
pub fn validate_authorizer(attributes: &HashMap<String, Value>) -> ValidationResult {
    let mut errors = Vec::new();
    let authorizer_type = attributes.get_str("type").unwrap_or("TOKEN");

    if authorizer_type == "COGNITO_USER_POOLS" {
        if attributes.get_strings("provider_arns").is_empty() {
            errors.push(ValidationError::new(
                "provider_arns",
                "provider_arns is required when type is COGNITO_USER_POOLS",
            ));
        }
    } else if attributes.get_str("authorizer_uri").is_none_or(str::is_empty) {
        errors.push(ValidationError::new(
            "authorizer_uri",
            format!("authorizer_uri is required when type is {}", authorizer_type),
        ));
    }

    finish(errors)
}

/// Validate DataSync agent attributes
pub fn validate_datasync_agent(attributes: &HashMap<String, Value>) -> ValidationResult {
    if attributes.get_str("activation_key").is_none() && attributes.get_str("ip_address").is_none() {
        return Err(vec![ValidationError::new(
            "activation_key",
            "one of activation_key or ip_address must be set",
        )]);
    }
    Ok(())
}

/// Validate DataSync task attributes
pub fn validate_datasync_task(attributes: &HashMap<String, Value>) -> ValidationResult {
    let mut errors = Vec::new();
    for (i, exclude) in attributes.get_blocks("excludes").into_iter().enumerate() {
        if exclude.get_str("filter_type").is_some() != exclude.get_str("value").is_some() {
            errors.push(ValidationError::new(
                format!("excludes[{}]", i),
                "filter_type and value must be set together",
            ));
        }
    }
    finish(errors)
}

/// Validate FSx for Lustre attributes
pub fn validate_lustre_file_system(attributes: &HashMap<String, Value>) -> ValidationResult {
    let mut errors = Vec::new();
    let deployment_type = attributes.get_str("deployment_type").unwrap_or("SCRATCH_1");
    let storage_type = attributes.get_str("storage_type").unwrap_or("SSD");
    let persistent = deployment_type.starts_with("PERSISTENT");
    let throughput = attributes.get_int("per_unit_storage_throughput");

    match (persistent, throughput) {
        (true, None) => errors.push(ValidationError::new(
            "per_unit_storage_throughput",
            format!("per_unit_storage_throughput is required for {}", deployment_type),
        )),
        (false, Some(_)) => errors.push(ValidationError::new(
            "per_unit_storage_throughput",
            "per_unit_storage_throughput is only valid for PERSISTENT deployment types",
        )),
        (true, Some(value)) => {
            let allowed: &[i64] = match (deployment_type, storage_type) {
                ("PERSISTENT_1", "HDD") => &[12, 40],
                ("PERSISTENT_1", _) => &[50, 100, 200],
                _ => &[125, 250, 500, 1000],
            };
            if !allowed.contains(&value) {
                errors.push(ValidationError::new(
                    "per_unit_storage_throughput",
                    format!(
                        "{} is not valid for {} {} storage, expected one of {:?}",
                        value, deployment_type, storage_type, allowed
                    ),
                ));
            }
        }
        (false, None) => {}
    }

    if !persistent {
        if attributes.get_int("automatic_backup_retention_days").unwrap_or(0) > 0 {
            errors.push(ValidationError::new(
                "automatic_backup_retention_days",
                "automatic backups are only supported for PERSISTENT deployment types",
            ));
        }
        if attributes.get_str("daily_automatic_backup_start_time").is_some() {
            errors.push(ValidationError::new(
                "daily_automatic_backup_start_time",
                "automatic backups are only supported for PERSISTENT deployment types",
            ));
        }
    }

    if attributes.get_str("import_path").is_none() {
        for dependent in ["export_path", "auto_import_policy"] {
            if attributes.get_str(dependent).is_some() {
                errors.push(ValidationError::new(dependent, format!("{} requires import_path", dependent)));
            }
        }
        if attributes.get_int("imported_file_chunk_size").is_some() {
            errors.push(ValidationError::new(
                "imported_file_chunk_size",
                "imported_file_chunk_size requires import_path",
            ));
        }
    }

    match (storage_type, attributes.get_str("drive_cache_type")) {
        ("HDD", None) => errors.push(ValidationError::new(
            "drive_cache_type",
            "drive_cache_type is required for HDD storage",
        )),
        ("HDD", Some(_)) if deployment_type != "PERSISTENT_1" => errors.push(ValidationError::new(
            "storage_type",
            "HDD storage requires deployment_type PERSISTENT_1",
        )),
        ("SSD", Some(_)) => errors.push(ValidationError::new(
            "drive_cache_type",
            "drive_cache_type is only valid for HDD storage",
        )),
        _ => {}
    }

    finish(errors)
}

/// Validate IoT Analytics pipeline activities
pub fn validate_pipeline(attributes: &HashMap<String, Value>) -> ValidationResult {
    let mut errors = Vec::new();
    let activities = attributes.get_blocks("pipeline_activity");
    let mut names = Vec::new();
    let mut nexts = Vec::new();

    for (i, activity) in activities.iter().enumerate() {
        let kinds: Vec<&str> = ACTIVITY_KINDS
            .iter()
            .copied()
            .filter(|kind| activity.get_block(kind).is_some())
            .collect();
        if kinds.len() != 1 {
            errors.push(ValidationError::new(
                format!("pipeline_activity[{}]", i),
                format!(
                    "exactly one of {} must be set, got {}",
                    ACTIVITY_KINDS.join(", "),
                    kinds.len()
                ),
            ));
            continue;
        }
        if let Some(body) = activity.get_block(kinds[0]) {
            if let Some(name) = body.get_str("name") {
                names.push(name.to_string());
            }
            if let Some(next) = body.get_str("next") {
                nexts.push((i, kinds[0], next.to_string()));
            }
        }
    }

    for (i, kind, next) in nexts {
        if !names.contains(&next) {
            errors.push(ValidationError::new(
                format!("pipeline_activity[{}].{}.next", i, kind),
                format!("no activity named '{}'", next),
            ));
        }
    }

    finish(errors)
}

/// Validate cross-attribute rules of a resource type
pub fn validate_resource(
    resource_type: &str,
    attributes: &HashMap<String, Value>,
) -> ValidationResult {
    match resource_type {
        "apigateway.authorizer" => validate_authorizer(attributes),
        "datasync.agent" => validate_datasync_agent(attributes),
        "datasync.task" => validate_datasync_task(attributes),
        "fsx.lustre_file_system" => validate_lustre_file_system(attributes),
        "iotanalytics.pipeline" => validate_pipeline(attributes),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn block(pairs: Vec<(&str, Value)>) -> Value {
        Value::List(vec![Value::Map(
            pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        )])
    }

    #[test]
    fn token_authorizer_needs_uri() {
        let errors = validate_resource(
            "apigateway.authorizer",
            &attrs(vec![("type", Value::from("TOKEN"))]),
        )
        .unwrap_err();
        assert_eq!(errors[0].path, "authorizer_uri");
    }

    #[test]
    fn cognito_authorizer_needs_provider_arns() {
        let errors = validate_resource(
            "apigateway.authorizer",
            &attrs(vec![("type", Value::from("COGNITO_USER_POOLS"))]),
        )
        .unwrap_err();
        assert_eq!(errors[0].path, "provider_arns");

        let ok = validate_resource(
            "apigateway.authorizer",
            &attrs(vec![
                ("type", Value::from("COGNITO_USER_POOLS")),
                (
                    "provider_arns",
                    Value::from_strings(["arn:aws:cognito-idp:us-east-1:123456789012:userpool/us-east-1_abc"]),
                ),
            ]),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn agent_needs_key_or_address() {
        assert!(validate_resource("datasync.agent", &HashMap::new()).is_err());
        assert!(
            validate_resource("datasync.agent", &attrs(vec![("ip_address", Value::from("10.0.0.5"))]))
                .is_ok()
        );
    }

    #[test]
    fn task_exclude_pairs() {
        let errors = validate_resource(
            "datasync.task",
            &attrs(vec![("excludes", block(vec![("filter_type", Value::from("SIMPLE_PATTERN"))]))]),
        )
        .unwrap_err();
        assert_eq!(errors[0].path, "excludes[0]");
    }

    #[test]
    fn lustre_persistent_rules() {
        let errors = validate_resource(
            "fsx.lustre_file_system",
            &attrs(vec![("deployment_type", Value::from("PERSISTENT_2"))]),
        )
        .unwrap_err();
        assert_eq!(errors[0].path, "per_unit_storage_throughput");

        assert!(validate_resource(
            "fsx.lustre_file_system",
            &attrs(vec![
                ("deployment_type", Value::from("PERSISTENT_1")),
                ("per_unit_storage_throughput", Value::Int(200)),
                ("automatic_backup_retention_days", Value::Int(7)),
            ]),
        )
        .is_ok());

        assert!(validate_resource(
            "fsx.lustre_file_system",
            &attrs(vec![
                ("deployment_type", Value::from("PERSISTENT_2")),
                ("per_unit_storage_throughput", Value::Int(200)),
            ]),
        )
        .is_err());
    }

    #[test]
    fn lustre_scratch_rules() {
        let errors = validate_resource(
            "fsx.lustre_file_system",
            &attrs(vec![
                ("deployment_type", Value::from("SCRATCH_2")),
                ("automatic_backup_retention_days", Value::Int(3)),
                ("export_path", Value::from("s3://bucket/out")),
            ]),
        )
        .unwrap_err();
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["automatic_backup_retention_days", "export_path"]);
    }

    #[test]
    fn lustre_hdd_needs_drive_cache() {
        let errors = validate_resource(
            "fsx.lustre_file_system",
            &attrs(vec![
                ("deployment_type", Value::from("PERSISTENT_1")),
                ("storage_type", Value::from("HDD")),
                ("per_unit_storage_throughput", Value::Int(12)),
            ]),
        )
        .unwrap_err();
        assert_eq!(errors[0].path, "drive_cache_type");
    }

    #[test]
    fn pipeline_activity_has_exactly_one_kind() {
        let activity = Value::Map(
            [
                ("channel".to_string(), block(vec![("name", Value::from("a"))])),
                ("datastore".to_string(), block(vec![("name", Value::from("b"))])),
            ]
            .into_iter()
            .collect(),
        );
        let errors = validate_resource(
            "iotanalytics.pipeline",
            &attrs(vec![("pipeline_activity", Value::List(vec![activity]))]),
        )
        .unwrap_err();
        assert!(errors[0].message.starts_with("exactly one of"));
    }

    #[test]
    fn pipeline_next_must_exist() {
        let activity = |kind: &str, name: &str, next: Option<&str>| {
            let mut body = vec![("name", Value::from(name))];
            if let Some(next) = next {
                body.push(("next", Value::from(next)));
            }
            Value::Map([(kind.to_string(), block(body))].into_iter().collect())
        };
        let activities = Value::List(vec![
            activity("channel", "in", Some("filter")),
            activity("filter", "filter", Some("missing")),
            activity("datastore", "out", None),
        ]);
        let errors = validate_resource(
            "iotanalytics.pipeline",
            &attrs(vec![("pipeline_activity", activities)]),
        )
        .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "pipeline_activity[1].filter.next");
    }

    #[test]
    fn unknown_types_pass() {
        assert!(validate_resource("efs.mount_target", &HashMap::new()).is_ok());
    }
}
