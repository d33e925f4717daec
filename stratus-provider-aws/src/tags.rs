//! Key-value tags shared by every taggable resource
//!
//! Resources carry two tag maps: `tags` as configured, and `tags_all` with the
//! provider's `default_tags` merged underneath. Tags AWS manages itself
//! (`aws:` prefix) and tags matched by `ignore_tags` never surface in state.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use stratus_core::resource::Value;

const AWS_TAG_PREFIX: &str = "aws:";

/// Tag keys the provider never manages
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IgnoreTagsConfig {
    pub keys: Vec<String>,
    pub key_prefixes: Vec<String>,
}

impl IgnoreTagsConfig {
    pub fn ignores(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key) || self.key_prefixes.iter().any(|p| key.starts_with(p))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueTags(BTreeMap<String, String>);

impl KeyValueTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags from a `tags` attribute value; non-string entries are skipped
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(map) = value.and_then(Value::as_map) else {
            return Self::default();
        };
        map.iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
            .collect()
    }

    pub fn to_value(&self) -> Value {
        Value::Map(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect::<HashMap<_, _>>(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    /// Drop tags reserved for AWS (`aws:` prefix)
    pub fn ignore_aws(self) -> Self {
        self.0
            .into_iter()
            .filter(|(k, _)| !k.starts_with(AWS_TAG_PREFIX))
            .collect()
    }

    pub fn ignore_config(self, config: &IgnoreTagsConfig) -> Self {
        self.0.into_iter().filter(|(k, _)| !config.ignores(k)).collect()
    }

    /// `other` layered over `self`; keys in `other` win
    pub fn merge(&self, other: &KeyValueTags) -> Self {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(merged)
    }

    /// Drop entries identical to a default tag, leaving what the resource
    /// configured itself
    pub fn without_defaults(&self, defaults: &KeyValueTags) -> Self {
        self.0
            .iter()
            .filter(|(k, v)| defaults.0.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Tags to set going from `self` to `new`: added or changed values
    pub fn updated(&self, new: &KeyValueTags) -> Self {
        new.0
            .iter()
            .filter(|(k, v)| self.0.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Keys to remove going from `self` to `new`
    pub fn removed(&self, new: &KeyValueTags) -> Vec<String> {
        self.0
            .keys()
            .filter(|k| !new.0.contains_key(*k))
            .cloned()
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyValueTags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Provider-wide tag settings
#[derive(Debug, Clone, Default)]
pub struct TagSettings {
    pub default_tags: KeyValueTags,
    pub ignore_tags: IgnoreTagsConfig,
}

impl TagSettings {
    /// Full tag set to send on create: defaults overlaid with resource tags
    pub fn for_create(&self, configured: Option<&Value>) -> KeyValueTags {
        self.default_tags.merge(&KeyValueTags::from_value(configured))
    }

    /// `tags` and `tags_all` attribute values for tags read back from AWS
    ///
    /// A remote tag whose key and value both match a default tag is reported
    /// only in `tags_all`, even when the resource configures it too; the read
    /// path cannot tell the two apart. Such a tag is redundant in
    /// configuration, and [`TagSettings::changes`] yields nothing to apply
    /// for it.
    pub fn for_state(&self, remote: KeyValueTags) -> (Value, Value) {
        let all = remote.ignore_aws().ignore_config(&self.ignore_tags);
        let own = all.without_defaults(&self.default_tags);
        (own.to_value(), all.to_value())
    }

    /// Changes needed to move the remote tag set from `old` to `new`
    /// configuration; ignored keys are never touched
    pub fn changes(&self, old: Option<&Value>, new: Option<&Value>) -> TagChanges {
        let old = self.for_create(old).ignore_config(&self.ignore_tags);
        let new = self.for_create(new).ignore_config(&self.ignore_tags);
        TagChanges {
            set: old.updated(&new),
            remove: old.removed(&new),
        }
    }
}

/// Tags to set and keys to remove in one update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagChanges {
    pub set: KeyValueTags,
    pub remove: Vec<String>,
}

impl TagChanges {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> KeyValueTags {
        pairs.iter().copied().collect()
    }

    fn settings() -> TagSettings {
        TagSettings {
            default_tags: tags(&[("Owner", "platform"), ("Env", "dev")]),
            ignore_tags: IgnoreTagsConfig {
                keys: vec!["LastScanned".to_string()],
                key_prefixes: vec!["kubernetes.io/".to_string()],
            },
        }
    }

    #[test]
    fn create_merges_defaults_under_resource_tags() {
        let configured = tags(&[("Env", "prod"), ("Name", "fs")]).to_value();
        let all = settings().for_create(Some(&configured));
        assert_eq!(all, tags(&[("Env", "prod"), ("Name", "fs"), ("Owner", "platform")]));
    }

    #[test]
    fn state_hides_aws_ignored_and_default_tags() {
        let remote = tags(&[
            ("aws:cloudformation:stack-name", "x"),
            ("LastScanned", "yesterday"),
            ("kubernetes.io/cluster/a", "owned"),
            ("Owner", "platform"),
            ("Env", "prod"),
        ]);
        let (own, all) = settings().for_state(remote);
        assert_eq!(KeyValueTags::from_value(Some(&own)), tags(&[("Env", "prod")]));
        assert_eq!(
            KeyValueTags::from_value(Some(&all)),
            tags(&[("Env", "prod"), ("Owner", "platform")])
        );
    }

    #[test]
    fn changes_between_configurations() {
        let old = tags(&[("Name", "a"), ("Team", "x")]).to_value();
        let new = tags(&[("Name", "b"), ("LastScanned", "now")]).to_value();
        let changes = settings().changes(Some(&old), Some(&new));
        assert_eq!(changes.set, tags(&[("Name", "b")]));
        assert_eq!(changes.remove, vec!["Team".to_string()]);

        let unchanged = settings().changes(Some(&old), Some(&old));
        assert!(unchanged.is_empty());
    }

    #[test]
    fn configured_copy_of_default_tag_needs_no_tag_calls() {
        let remote = tags(&[("Owner", "platform"), ("Env", "dev"), ("Name", "fs")]);
        let (own, _) = settings().for_state(remote);
        assert_eq!(KeyValueTags::from_value(Some(&own)), tags(&[("Name", "fs")]));

        let configured = tags(&[("Owner", "platform"), ("Name", "fs")]).to_value();
        let changes = settings().changes(Some(&own), Some(&configured));
        assert!(changes.is_empty());
    }
}
