//! DataSync agents, locations and tasks
//!
//! Every DataSync object is addressed by its ARN and tagged through the same
//! TagResource/UntagResource calls, so the tag plumbing lives here.

pub mod agent;
pub mod location_nfs;
pub mod location_s3;
pub mod task;

use std::collections::HashMap;

use aws_sdk_datasync::types::TagListEntry;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use log::debug;
use stratus_core::provider::ProviderResult;
use stratus_core::resource::{ResourceId, Value};

use super::build_error;
use crate::awserr::{is_aws_err, sdk_error};
use crate::conns::AwsClients;
use crate::tags::{KeyValueTags, TagChanges};

const INVALID_REQUEST: &str = "InvalidRequestException";

/// DataSync reports a missing object as an InvalidRequestException
pub(crate) fn is_not_found<E, R>(err: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata,
{
    is_aws_err(err, INVALID_REQUEST, "not found") || is_aws_err(err, INVALID_REQUEST, "does not exist")
}

pub(crate) fn sdk_tags(id: &ResourceId, tags: &KeyValueTags) -> ProviderResult<Vec<TagListEntry>> {
    tags.iter()
        .map(|(k, v)| {
            TagListEntry::builder()
                .key(k)
                .value(v)
                .build()
                .map_err(|e| build_error(id, "DataSync tag", e))
        })
        .collect()
}

/// Tags to send on create, or `None` when there are none
pub(crate) fn create_tags(
    conn: &AwsClients,
    id: &ResourceId,
    configured: Option<&Value>,
) -> ProviderResult<Option<Vec<TagListEntry>>> {
    let tags = conn.tags.for_create(configured);
    if tags.is_empty() {
        return Ok(None);
    }
    sdk_tags(id, &tags).map(Some)
}

fn tags_from_sdk(tags: &[TagListEntry]) -> KeyValueTags {
    tags.iter()
        .map(|t| (t.key(), t.value().unwrap_or_default()))
        .collect()
}

/// Read the tags of `arn` into `tags` and `tags_all`
pub(crate) async fn read_tags(
    conn: &AwsClients,
    id: &ResourceId,
    arn: &str,
    attributes: &mut HashMap<String, Value>,
) -> ProviderResult<()> {
    debug!("DataSync ListTagsForResource {}", arn);
    let tags: Vec<TagListEntry> = conn
        .datasync
        .list_tags_for_resource()
        .resource_arn(arn)
        .into_paginator()
        .items()
        .send()
        .try_collect()
        .await
        .map_err(|e| sdk_error("Failed to list DataSync tags", id, e))?;
    let (tags, tags_all) = conn.tags.for_state(tags_from_sdk(&tags));
    attributes.insert("tags".to_string(), tags);
    attributes.insert("tags_all".to_string(), tags_all);
    Ok(())
}

pub(crate) async fn update_tags(
    conn: &AwsClients,
    id: &ResourceId,
    arn: &str,
    changes: &TagChanges,
) -> ProviderResult<()> {
    if !changes.remove.is_empty() {
        debug!("DataSync UntagResource {} {:?}", arn, changes.remove);
        conn.datasync
            .untag_resource()
            .resource_arn(arn)
            .set_keys(Some(changes.remove.clone()))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to untag DataSync resource", id, e))?;
    }
    if !changes.set.is_empty() {
        debug!("DataSync TagResource {}", arn);
        conn.datasync
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(sdk_tags(id, &changes.set)?))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to tag DataSync resource", id, e))?;
    }
    Ok(())
}

/// Apply the tag difference between two attribute maps
pub(crate) async fn update_tags_between(
    conn: &AwsClients,
    id: &ResourceId,
    arn: &str,
    old: &HashMap<String, Value>,
    new: &HashMap<String, Value>,
) -> ProviderResult<()> {
    let changes = conn.tags.changes(old.get("tags"), new.get("tags"));
    if changes.is_empty() {
        return Ok(());
    }
    update_tags(conn, id, arn, &changes).await
}

/// Subdirectory part of a location URI such as `s3://bucket/prefix/`
/// or `nfs://10.0.0.1/exports/`
pub(crate) fn subdirectory_from_uri(uri: &str) -> Option<String> {
    let (_, rest) = uri.split_once("://")?;
    let (_, path) = rest.split_once('/')?;
    Some(format!("/{}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdirectory_keeps_trailing_slash() {
        assert_eq!(
            subdirectory_from_uri("s3://my-bucket/data/in/").as_deref(),
            Some("/data/in/")
        );
        assert_eq!(subdirectory_from_uri("nfs://10.0.0.1/").as_deref(), Some("/"));
        assert_eq!(subdirectory_from_uri("s3://my-bucket"), None);
        assert_eq!(subdirectory_from_uri("not-a-uri"), None);
    }

    #[test]
    fn tags_without_value_read_as_empty() {
        let entries = vec![
            TagListEntry::builder().key("env").value("prod").build().unwrap(),
            TagListEntry::builder().key("flag").build().unwrap(),
        ];
        let tags = tags_from_sdk(&entries);
        assert_eq!(tags.get("env"), Some("prod"));
        assert_eq!(tags.get("flag"), Some(""));
    }

    #[test]
    fn create_tags_merges_defaults() {
        let mut conn = crate::conns::test_support::offline_clients("us-east-1");
        conn.tags.default_tags = [("owner", "platform")].into_iter().collect();
        let id = ResourceId::new("datasync.task", "nightly");
        let configured = Value::Map(HashMap::from([("env".to_string(), Value::from("prod"))]));

        let tags = create_tags(&conn, &id, Some(&configured)).unwrap().unwrap();
        let mut keys: Vec<&str> = tags.iter().map(TagListEntry::key).collect();
        keys.sort();
        assert_eq!(keys, vec!["env", "owner"]);

        conn.tags.default_tags = KeyValueTags::new();
        assert!(create_tags(&conn, &id, None).unwrap().is_none());
    }
}
