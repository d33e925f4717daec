//! Schema - Define type schemas for resources
//!
//! Every resource and data source declares a schema: attribute types,
//! validation functions, replacement rules and diff suppression. The
//! provider validates configuration against it before calling AWS.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::resource::Value;

/// Validation function attached to a custom type
pub type ValidateFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Returns true when the difference between `old` and `new` should be ignored
pub type DiffSuppressFn = fn(key: &str, old: &Value, new: &Value) -> bool;

/// Attribute type
#[derive(Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Floating point number
    Float,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: ValidateFn,
    },
    /// Ordered list
    List(Box<AttributeType>),
    /// Unordered collection; compared without regard to order
    Set(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Nested configuration block (a list of maps)
    Block(Box<BlockSchema>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Float, Value::Float(_) | Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { base, validate, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner) | AttributeType::Set(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Block(block), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    let Value::Map(map) = item else {
                        return Err(TypeError::ListItemError {
                            index: i,
                            inner: Box::new(TypeError::TypeMismatch {
                                expected: "Block".to_string(),
                                got: item.type_name(),
                            }),
                        });
                    };
                    if let Some(first) = validate_attributes(&block.attributes, map).into_iter().next() {
                        return Err(TypeError::ListItemError {
                            index: i,
                            inner: Box::new(first),
                        });
                    }
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    /// Whether values of this type compare without regard to order
    pub fn is_set(&self) -> bool {
        matches!(self, AttributeType::Set(_))
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Float => "Float".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Set(inner) => format!("Set<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(_) => "Block".to_string(),
        }
    }
}

impl fmt::Debug for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::Block(block) => f.debug_tuple("Block").field(block).finish(),
            other => write!(f, "{}", other.type_name()),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ReadOnlyAttribute { name: String },

    #[error("Attribute '{name}' conflicts with '{other}'")]
    ConflictingAttributes { name: String, other: String },

    #[error("Attribute '{name}' expects between {min} and {} items, got {got}", max.map(|m| m.to_string()).unwrap_or_else(|| "unlimited".to_string()))]
    ItemCount {
        name: String,
        min: usize,
        max: Option<usize>,
        got: usize,
    },

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Populated by the provider
    pub computed: bool,
    /// Whether the attribute may appear in configuration
    pub configurable: bool,
    /// A change to this attribute requires replacing the resource
    pub force_new: bool,
    pub sensitive: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub conflicts_with: Vec<String>,
    pub min_items: usize,
    pub max_items: Option<usize>,
    pub diff_suppress: Option<DiffSuppressFn>,
    /// Whether reads report this attribute; AWS never returns some inputs
    /// (activation keys, ENI security groups) after create
    pub refreshed: bool,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            configurable: true,
            force_new: false,
            sensitive: false,
            default: None,
            description: None,
            conflicts_with: Vec::new(),
            min_items: 0,
            max_items: None,
            diff_suppress: None,
            refreshed: true,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Output-only attribute set by the provider
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self.configurable = false;
        self
    }

    /// Attribute that may be configured, or left for AWS to fill in
    pub fn optional_computed(mut self) -> Self {
        self.computed = true;
        self.configurable = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn conflicts_with(mut self, others: &[&str]) -> Self {
        self.conflicts_with = others.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_items(mut self, min: usize, max: Option<usize>) -> Self {
        self.min_items = min;
        self.max_items = max;
        self
    }

    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn with_diff_suppress(mut self, f: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(f);
        self
    }

    pub fn not_refreshed(mut self) -> Self {
        self.refreshed = false;
        self
    }

    fn check_item_count(&self, value: &Value) -> Result<(), TypeError> {
        let Some(items) = value.as_list() else {
            return Ok(());
        };
        let got = items.len();
        let too_many = self.max_items.is_some_and(|max| got > max);
        if got < self.min_items || too_many {
            return Err(TypeError::ItemCount {
                name: self.name.clone(),
                min: self.min_items,
                max: self.max_items,
                got,
            });
        }
        Ok(())
    }
}

/// Nested block schema
#[derive(Debug, Clone, Default)]
pub struct BlockSchema {
    pub attributes: HashMap<String, AttributeSchema>,
}

impl BlockSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    /// Wrap this block as an attribute type
    pub fn into_type(self) -> AttributeType {
        AttributeType::Block(Box::new(self))
    }
}

/// Validate an attribute map against a set of attribute schemas
fn validate_attributes(
    schemas: &HashMap<String, AttributeSchema>,
    attributes: &HashMap<String, Value>,
) -> Vec<TypeError> {
    let mut errors = Vec::new();
    let mut reported_conflicts: BTreeSet<(&str, &str)> = BTreeSet::new();

    let mut names: Vec<&String> = schemas.keys().collect();
    names.sort();

    for name in names {
        let schema = &schemas[name];
        let Some(value) = attributes.get(name) else {
            if schema.required && schema.default.is_none() {
                errors.push(TypeError::MissingRequired { name: name.clone() });
            }
            continue;
        };

        if !schema.configurable {
            errors.push(TypeError::ReadOnlyAttribute { name: name.clone() });
            continue;
        }

        for other in &schema.conflicts_with {
            if !attributes.contains_key(other) {
                continue;
            }
            let (first, second) = if name.as_str() < other.as_str() {
                (name.as_str(), other.as_str())
            } else {
                (other.as_str(), name.as_str())
            };
            if reported_conflicts.insert((first, second)) {
                errors.push(TypeError::ConflictingAttributes {
                    name: first.to_string(),
                    other: second.to_string(),
                });
            }
        }

        if let Err(e) = schema.check_item_count(value) {
            errors.push(e);
        }

        if let Err(e) = schema.attr_type.validate(value) {
            errors.push(TypeError::AttributeError {
                name: name.clone(),
                inner: Box::new(e),
            });
        }
    }

    // Unknown attributes are allowed (the host engine may pass meta-arguments)
    errors
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Validate resource attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let errors = validate_attributes(&self.attributes, attributes);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Return a copy of `attributes` with defaults filled in for absent attributes
    pub fn apply_defaults(&self, attributes: &HashMap<String, Value>) -> HashMap<String, Value> {
        let mut result = attributes.clone();
        for (name, schema) in &self.attributes {
            if let Some(default) = &schema.default {
                result.entry(name.clone()).or_insert_with(|| default.clone());
            }
        }
        result
    }

    /// Names of attributes whose change requires replacement
    pub fn force_new_attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .attributes
            .values()
            .filter(|a| a.force_new)
            .map(|a| a.name.as_str())
            .collect();
        names.sort();
        names
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        AttributeType::Custom {
            name: "PositiveInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: Arc::new(|value| match value {
                Value::Int(n) if *n > 0 => Ok(()),
                Value::Int(_) => Err("Value must be positive".to_string()),
                _ => Err("Expected integer".to_string()),
            }),
        }
    }

    /// Integer within an inclusive range
    pub fn int_between(min: i64, max: i64) -> AttributeType {
        AttributeType::Custom {
            name: format!("Int[{}..={}]", min, max),
            base: Box::new(AttributeType::Int),
            validate: Arc::new(move |value| match value {
                Value::Int(n) if (min..=max).contains(n) => Ok(()),
                Value::Int(n) => Err(format!(
                    "Value {} out of range, expected between {} and {}",
                    n, min, max
                )),
                _ => Err("Expected integer".to_string()),
            }),
        }
    }

    /// String whose length lies within an inclusive range
    pub fn string_len_between(min: usize, max: usize) -> AttributeType {
        AttributeType::Custom {
            name: format!("String[{}..={}]", min, max),
            base: Box::new(AttributeType::String),
            validate: Arc::new(move |value| match value {
                Value::String(s) if (min..=max).contains(&s.len()) => Ok(()),
                Value::String(s) => Err(format!(
                    "Length of '{}' must be between {} and {}, got {}",
                    s,
                    min,
                    max,
                    s.len()
                )),
                _ => Err("Expected string".to_string()),
            }),
        }
    }

    /// String matching a regular expression
    pub fn string_matching(pattern: &'static str, message: &'static str) -> AttributeType {
        let re = regex::Regex::new(pattern);
        AttributeType::Custom {
            name: "Pattern".to_string(),
            base: Box::new(AttributeType::String),
            validate: Arc::new(move |value| {
                let re = re
                    .as_ref()
                    .map_err(|e| format!("Invalid pattern '{}': {}", pattern, e))?;
                match value {
                    Value::String(s) if re.is_match(s) => Ok(()),
                    Value::String(s) => Err(format!("Invalid value '{}': {}", s, message)),
                    _ => Err("Expected string".to_string()),
                }
            }),
        }
    }

    /// String limited to a fixed set of values
    pub fn string_in(values: &[&str]) -> AttributeType {
        AttributeType::Enum(values.iter().map(|v| v.to_string()).collect())
    }

    /// Integer limited to a fixed set of values
    pub fn int_in(values: &[i64]) -> AttributeType {
        let allowed = values.to_vec();
        AttributeType::Custom {
            name: format!("Int{:?}", allowed),
            base: Box::new(AttributeType::Int),
            validate: Arc::new(move |value| match value {
                Value::Int(n) if allowed.contains(n) => Ok(()),
                Value::Int(n) => Err(format!(
                    "Value {} not allowed, expected one of {:?}",
                    n, allowed
                )),
                _ => Err("Expected integer".to_string()),
            }),
        }
    }

    /// Set of strings
    pub fn string_set() -> AttributeType {
        AttributeType::Set(Box::new(AttributeType::String))
    }

    /// List of strings
    pub fn string_list() -> AttributeType {
        AttributeType::List(Box::new(AttributeType::String))
    }

    /// Map of strings (tags)
    pub fn string_map() -> AttributeType {
        AttributeType::Map(Box::new(AttributeType::String))
    }
}
