//! Differ - Compare desired state with current state
//!
//! Computes which configured attributes differ from the state read back from
//! AWS, honoring diff suppression, set semantics and replacement rules.

use std::collections::HashMap;

use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::{AttributeSchema, ResourceSchema};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences that can be applied in place
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with a difference in a `force_new` attribute
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
        forced_by: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State, schema: &ResourceSchema) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = changed_attributes(&desired.attributes, &current.attributes, schema);

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let forced_by: Vec<String> = changed
        .iter()
        .filter(|name| schema.attributes.get(*name).is_some_and(|a| a.force_new))
        .cloned()
        .collect();

    if forced_by.is_empty() {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
            forced_by,
        }
    }
}

/// Configured attributes (defaults applied) that differ from the state read
/// back from AWS, under the same rules [`diff`] uses
pub fn changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schema: &ResourceSchema,
) -> Vec<String> {
    let desired = schema.apply_defaults(desired);
    find_changed_attributes(&desired, current, schema)
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schema: &ResourceSchema,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        let attr = schema.attributes.get(key);
        match current.get(key) {
            Some(current_value) if values_equal(attr, key, current_value, desired_value) => {}
            None if attr
                .is_some_and(|a| !a.refreshed || is_empty_equivalent(a, key, desired_value)) => {}
            _ => changed.push(key.clone()),
        }
    }

    // Attributes removed from configuration but still set remotely; computed
    // attributes are owned by AWS once unset in configuration.
    for (key, current_value) in current {
        if key.starts_with('_') || desired.contains_key(key) {
            continue;
        }
        if let Some(attr) = schema.attributes.get(key)
            && attr.configurable
            && !attr.computed
            && !is_empty_equivalent(attr, key, current_value)
        {
            changed.push(key.clone());
        }
    }

    changed.sort();
    changed
}

fn values_equal(attr: Option<&AttributeSchema>, key: &str, old: &Value, new: &Value) -> bool {
    if old == new {
        return true;
    }
    let Some(attr) = attr else {
        return false;
    };
    if let Some(suppress) = attr.diff_suppress
        && suppress(key, old, new)
    {
        return true;
    }
    if attr.attr_type.is_set()
        && let (Value::List(a), Value::List(b)) = (old, new)
    {
        return same_elements(a, b);
    }
    false
}

/// An empty list/map/string is equivalent to the attribute being absent
fn is_empty_equivalent(attr: &AttributeSchema, key: &str, value: &Value) -> bool {
    let empty = match value {
        Value::List(items) => items.is_empty(),
        Value::Map(map) => map.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    if empty {
        return true;
    }
    attr.diff_suppress
        .is_some_and(|suppress| suppress(key, value, &Value::String(String::new())))
}

fn same_elements(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut remaining: Vec<&Value> = b.iter().collect();
    for item in a {
        match remaining.iter().position(|candidate| *candidate == item) {
            Some(pos) => {
                remaining.swap_remove(pos);
            }
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeType, types};

    fn schema() -> ResourceSchema {
        ResourceSchema::new("test.user_group")
            .attribute(
                AttributeSchema::new("user_group_id", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("user_ids", types::string_set()))
            .attribute(
                AttributeSchema::new("import_path", AttributeType::String).with_diff_suppress(
                    |_, old, new| {
                        old.as_str().map(|s| s.trim_end_matches('/'))
                            == new.as_str().map(|s| s.trim_end_matches('/'))
                    },
                ),
            )
            .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
            .attribute(AttributeSchema::new("engine_token", AttributeType::String).not_refreshed())
    }

    fn existing(attrs: Vec<(&str, Value)>) -> State {
        State::existing(
            ResourceId::new("test.user_group", "g"),
            attrs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("test.user_group", "g");
        let current = State::not_found(ResourceId::new("test.user_group", "g"));

        let result = diff(&desired, &current, &schema());
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn set_order_is_ignored() {
        let desired = Resource::new("test.user_group", "g")
            .with_attribute("user_group_id", "g")
            .with_attribute("user_ids", Value::from_strings(["a", "b"]));
        let current = existing(vec![
            ("user_group_id", Value::from("g")),
            ("user_ids", Value::from_strings(["b", "a"])),
            ("arn", Value::from("arn:aws:elasticache:us-east-1:1:usergroup:g")),
        ]);

        assert!(matches!(
            diff(&desired, &current, &schema()),
            Diff::NoChange(_)
        ));
    }

    #[test]
    fn suppressed_difference_is_no_change() {
        let desired = Resource::new("test.user_group", "g")
            .with_attribute("user_group_id", "g")
            .with_attribute("import_path", "s3://bucket/");
        let current = existing(vec![
            ("user_group_id", Value::from("g")),
            ("import_path", Value::from("s3://bucket")),
        ]);

        assert!(!diff(&desired, &current, &schema()).is_change());
    }

    #[test]
    fn update_when_mutable_attribute_changes() {
        let desired = Resource::new("test.user_group", "g")
            .with_attribute("user_group_id", "g")
            .with_attribute("user_ids", Value::from_strings(["a", "c"]));
        let current = existing(vec![
            ("user_group_id", Value::from("g")),
            ("user_ids", Value::from_strings(["a", "b"])),
        ]);

        match diff(&desired, &current, &schema()) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["user_ids".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn replace_when_force_new_attribute_changes() {
        let desired = Resource::new("test.user_group", "g").with_attribute("user_group_id", "h");
        let current = existing(vec![("user_group_id", Value::from("g"))]);

        match diff(&desired, &current, &schema()) {
            Diff::Replace { forced_by, .. } => {
                assert_eq!(forced_by, vec!["user_group_id".to_string()])
            }
            other => panic!("Expected Replace, got {:?}", other),
        }
    }

    #[test]
    fn unrefreshed_attribute_absent_from_state_is_no_change() {
        let desired = Resource::new("test.user_group", "g")
            .with_attribute("user_group_id", "g")
            .with_attribute("engine_token", "secret");
        let current = existing(vec![("user_group_id", Value::from("g"))]);

        assert!(!diff(&desired, &current, &schema()).is_change());
    }

    #[test]
    fn removed_configurable_attribute_is_a_change() {
        let desired = Resource::new("test.user_group", "g").with_attribute("user_group_id", "g");
        let current = existing(vec![
            ("user_group_id", Value::from("g")),
            ("user_ids", Value::from_strings(["a"])),
        ]);

        assert!(diff(&desired, &current, &schema()).is_change());
    }

    #[test]
    fn changed_attributes_skips_aws_filled_values() {
        let schema = schema().attribute(
            AttributeSchema::new("maintenance_window", AttributeType::String).optional_computed(),
        );
        let mut current = HashMap::new();
        current.insert("user_group_id".to_string(), Value::from("g"));
        current.insert("maintenance_window".to_string(), Value::from("5:03:30"));
        let mut desired = HashMap::new();
        desired.insert("user_group_id".to_string(), Value::from("g"));
        assert!(changed_attributes(&desired, &current, &schema).is_empty());

        desired.insert("maintenance_window".to_string(), Value::from("1:00:00"));
        assert_eq!(
            changed_attributes(&desired, &current, &schema),
            vec!["maintenance_window".to_string()]
        );
    }
}
