//! ElastiCache user groups

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_elasticache::types::{Tag, UserGroup as UserGroupDescription};
use log::{debug, info, warn};
use stratus_core::provider::{BoxFuture, ProviderResult};
use stratus_core::registry::ResourceDefinition;
use stratus_core::resource::{AttributeMap, Resource, ResourceId, State, Value};
use stratus_core::schema::ResourceSchema;
use stratus_core::waiter::{RefreshResult, StateChangeConf};

use super::{require_str, set_str};
use crate::awserr::{is_not_found, sdk_error};
use crate::conns::AwsClients;
use crate::schemas;
use crate::tags::{KeyValueTags, TagChanges};

const CREATE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const UPDATE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DELETE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const NOT_FOUND_CODES: &[&str] = &["UserGroupNotFound"];

const STATUS_ACTIVE: &str = "active";
const STATUS_CREATING: &str = "creating";
const STATUS_MODIFYING: &str = "modifying";
const STATUS_DELETING: &str = "deleting";

pub struct UserGroup;

impl ResourceDefinition<AwsClients> for UserGroup {
    fn name(&self) -> &'static str {
        "elasticache.user_group"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::elasticache::user_group_schema()
    }

    fn create<'a>(
        &'a self,
        conn: &'a AwsClients,
        resource: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(create_user_group(conn, resource))
    }

    fn read<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(read_user_group(conn, id, identifier))
    }

    fn update<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(update_user_group(conn, id, identifier, from, to))
    }

    fn delete<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(delete_user_group(conn, id, identifier))
    }
}

fn sdk_tags(tags: &KeyValueTags) -> Vec<Tag> {
    tags.iter()
        .map(|(k, v)| Tag::builder().key(k).value(v).build())
        .collect()
}

fn tags_from_sdk(tags: &[Tag]) -> KeyValueTags {
    tags.iter()
        .filter_map(|t| Some((t.key()?, t.value().unwrap_or_default())))
        .collect()
}

/// User ids to add and remove going from `old` to `new`
fn user_id_changes(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let add = new.iter().filter(|u| !old.contains(u)).cloned().collect();
    let remove = old.iter().filter(|u| !new.contains(u)).cloned().collect();
    (add, remove)
}

async fn find_user_group(
    conn: &AwsClients,
    id: &ResourceId,
    user_group_id: &str,
) -> ProviderResult<Option<UserGroupDescription>> {
    debug!("ElastiCache DescribeUserGroups {}", user_group_id);
    match conn
        .elasticache
        .describe_user_groups()
        .user_group_id(user_group_id)
        .send()
        .await
    {
        Ok(output) => Ok(output.user_groups().first().cloned()),
        Err(err) if is_not_found(&err, NOT_FOUND_CODES) => Ok(None),
        Err(err) => Err(sdk_error("Failed to read ElastiCache user group", id, err)),
    }
}

async fn status_user_group(
    conn: &AwsClients,
    id: &ResourceId,
    user_group_id: &str,
) -> RefreshResult<UserGroupDescription> {
    Ok(find_user_group(conn, id, user_group_id).await?.map(|group| {
        let status = group.status().unwrap_or_default().to_string();
        (group, status)
    }))
}

async fn wait_user_group_active(
    conn: &AwsClients,
    id: &ResourceId,
    user_group_id: &str,
    timeout: Duration,
) -> ProviderResult<()> {
    StateChangeConf::new(&[STATUS_CREATING, STATUS_MODIFYING], &[STATUS_ACTIVE], timeout)
        .with_delay(Duration::from_secs(5))
        .with_min_timeout(Duration::from_secs(3))
        .wait(|| status_user_group(conn, id, user_group_id))
        .await?;
    Ok(())
}

async fn update_tags(
    conn: &AwsClients,
    id: &ResourceId,
    arn: &str,
    changes: &TagChanges,
) -> ProviderResult<()> {
    if !changes.remove.is_empty() {
        debug!("ElastiCache RemoveTagsFromResource {} {:?}", arn, changes.remove);
        conn.elasticache
            .remove_tags_from_resource()
            .resource_name(arn)
            .set_tag_keys(Some(changes.remove.clone()))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to untag ElastiCache user group", id, e))?;
    }
    if !changes.set.is_empty() {
        debug!("ElastiCache AddTagsToResource {}", arn);
        conn.elasticache
            .add_tags_to_resource()
            .resource_name(arn)
            .set_tags(Some(sdk_tags(&changes.set)))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to tag ElastiCache user group", id, e))?;
    }
    Ok(())
}

fn flatten_user_group(group: &UserGroupDescription) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    set_str(&mut attributes, "user_group_id", group.user_group_id());
    set_str(&mut attributes, "engine", group.engine());
    set_str(&mut attributes, "arn", group.arn());
    attributes.insert(
        "user_ids".to_string(),
        Value::from_strings(group.user_ids()),
    );
    attributes
}

async fn create_user_group(conn: &AwsClients, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = &resource.attributes;
    let user_group_id = require_str(id, attrs, "user_group_id")?;
    let user_ids = attrs.get_strings("user_ids");
    let tags = conn.tags.for_create(attrs.get("tags"));

    debug!("ElastiCache CreateUserGroup {}", user_group_id);
    conn.elasticache
        .create_user_group()
        .user_group_id(user_group_id)
        .set_engine(attrs.get_str("engine").map(str::to_string))
        .set_user_ids((!user_ids.is_empty()).then_some(user_ids))
        .set_tags((!tags.is_empty()).then(|| sdk_tags(&tags)))
        .send()
        .await
        .map_err(|e| sdk_error("Failed to create ElastiCache user group", id, e))?;

    wait_user_group_active(conn, id, user_group_id, CREATE_TIMEOUT).await?;
    info!("created ElastiCache user group {}", user_group_id);

    read_user_group(conn, id, user_group_id).await
}

async fn read_user_group(
    conn: &AwsClients,
    id: &ResourceId,
    user_group_id: &str,
) -> ProviderResult<State> {
    let Some(group) = find_user_group(conn, id, user_group_id).await? else {
        warn!("ElastiCache user group {} not found, removing {} from state", user_group_id, id);
        return Ok(State::not_found(id.clone()));
    };
    let mut attributes = flatten_user_group(&group);

    if let Some(arn) = group.arn() {
        debug!("ElastiCache ListTagsForResource {}", arn);
        let output = conn
            .elasticache
            .list_tags_for_resource()
            .resource_name(arn)
            .send()
            .await
            .map_err(|e| sdk_error("Failed to list ElastiCache user group tags", id, e))?;
        let (tags, tags_all) = conn.tags.for_state(tags_from_sdk(output.tag_list()));
        attributes.insert("tags".to_string(), tags);
        attributes.insert("tags_all".to_string(), tags_all);
    }

    Ok(State::existing(id.clone(), attributes).with_identifier(user_group_id))
}

async fn update_user_group(
    conn: &AwsClients,
    id: &ResourceId,
    user_group_id: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let (add, remove) = user_id_changes(
        &from.attributes.get_strings("user_ids"),
        &to.attributes.get_strings("user_ids"),
    );
    if !add.is_empty() || !remove.is_empty() {
        debug!(
            "ElastiCache ModifyUserGroup {} add={:?} remove={:?}",
            user_group_id, add, remove
        );
        conn.elasticache
            .modify_user_group()
            .user_group_id(user_group_id)
            .set_user_ids_to_add((!add.is_empty()).then_some(add))
            .set_user_ids_to_remove((!remove.is_empty()).then_some(remove))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to modify ElastiCache user group", id, e))?;
        wait_user_group_active(conn, id, user_group_id, UPDATE_TIMEOUT).await?;
    }

    let changes = conn.tags.changes(from.attributes.get("tags"), to.attributes.get("tags"));
    if !changes.is_empty() {
        let arn = require_str(id, &from.attributes, "arn")?;
        update_tags(conn, id, arn, &changes).await?;
    }

    read_user_group(conn, id, user_group_id).await
}

async fn delete_user_group(
    conn: &AwsClients,
    id: &ResourceId,
    user_group_id: &str,
) -> ProviderResult<()> {
    debug!("ElastiCache DeleteUserGroup {}", user_group_id);
    match conn
        .elasticache
        .delete_user_group()
        .user_group_id(user_group_id)
        .send()
        .await
    {
        Ok(_) => {}
        Err(err) if is_not_found(&err, NOT_FOUND_CODES) => return Ok(()),
        Err(err) => return Err(sdk_error("Failed to delete ElastiCache user group", id, err)),
    }

    StateChangeConf::new(&[STATUS_DELETING, STATUS_ACTIVE], &[], DELETE_TIMEOUT)
        .with_min_timeout(Duration::from_secs(3))
        .wait(|| status_user_group(conn, id, user_group_id))
        .await?;
    info!("deleted ElastiCache user group {}", user_group_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn user_id_changes_split_add_and_remove() {
        let (add, remove) = user_id_changes(&ids(&["default", "reader"]), &ids(&["default", "writer"]));
        assert_eq!(add, ids(&["writer"]));
        assert_eq!(remove, ids(&["reader"]));

        let (add, remove) = user_id_changes(&ids(&["a", "b"]), &ids(&["b", "a"]));
        assert!(add.is_empty());
        assert!(remove.is_empty());
    }

    #[test]
    fn flatten_reads_group_fields() {
        let group = UserGroupDescription::builder()
            .user_group_id("app-users")
            .status("active")
            .engine("redis")
            .user_ids("default")
            .user_ids("app")
            .arn("arn:aws:elasticache:us-east-1:123456789012:usergroup:app-users")
            .build();
        let attrs = flatten_user_group(&group);
        assert_eq!(attrs.get_str("engine"), Some("redis"));
        assert_eq!(attrs.get_strings("user_ids"), ids(&["default", "app"]));
        assert_eq!(
            attrs.get_str("arn"),
            Some("arn:aws:elasticache:us-east-1:123456789012:usergroup:app-users")
        );
    }

    #[test]
    fn tags_round_trip_through_sdk_shape() {
        let tags: KeyValueTags = [("env", "prod"), ("team", "cache")].into_iter().collect();
        let sdk = sdk_tags(&tags);
        assert_eq!(sdk.len(), 2);
        assert_eq!(tags_from_sdk(&sdk), tags);
    }
}
