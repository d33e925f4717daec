//! DataSync NFS locations

use std::collections::HashMap;

use aws_sdk_datasync::operation::describe_location_nfs::DescribeLocationNfsOutput;
use aws_sdk_datasync::types::{NfsMountOptions, NfsVersion, OnPremConfig};
use log::{debug, info, warn};
use stratus_core::provider::{BoxFuture, ProviderError, ProviderResult};
use stratus_core::registry::ResourceDefinition;
use stratus_core::resource::{AttributeMap, Resource, ResourceId, State, Value};
use stratus_core::schema::ResourceSchema;

use super::location_s3::delete_location;
use super::{create_tags, is_not_found, read_tags, subdirectory_from_uri, update_tags_between};
use crate::awserr::sdk_error;
use crate::conns::AwsClients;
use crate::resources::{any_changed, build_error, missing_field, require_str, set_str, single_block};
use crate::schemas;

pub struct LocationNfs;

impl ResourceDefinition<AwsClients> for LocationNfs {
    fn name(&self) -> &'static str {
        "datasync.location_nfs"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::datasync::location_nfs_schema()
    }

    fn create<'a>(
        &'a self,
        conn: &'a AwsClients,
        resource: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(create_location(conn, resource))
    }

    fn read<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(read_location(conn, id, identifier))
    }

    fn update<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(update_location(conn, id, identifier, from, to))
    }

    fn delete<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(delete_location(conn, id, identifier, "NFS"))
    }
}

fn expand_on_prem_config(
    id: &ResourceId,
    attrs: &HashMap<String, Value>,
) -> ProviderResult<OnPremConfig> {
    let block = attrs
        .get_block("on_prem_config")
        .ok_or_else(|| ProviderError::new("on_prem_config is required").for_resource(id.clone()))?;
    OnPremConfig::builder()
        .set_agent_arns(Some(block.get_strings("agent_arns")))
        .build()
        .map_err(|e| build_error(id, "OnPremConfig", e))
}

fn expand_mount_options(attrs: &HashMap<String, Value>) -> Option<NfsMountOptions> {
    attrs.get_block("mount_options").map(|block| {
        NfsMountOptions::builder()
            .set_version(block.get_str("version").map(NfsVersion::from))
            .build()
    })
}

fn flatten_location(location: &DescribeLocationNfsOutput) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    set_str(&mut attributes, "arn", location.location_arn());
    set_str(&mut attributes, "uri", location.location_uri());

    if let Some(uri) = location.location_uri() {
        if let Some(subdirectory) = subdirectory_from_uri(uri) {
            attributes.insert("subdirectory".to_string(), Value::String(subdirectory));
        }
        set_str(&mut attributes, "server_hostname", hostname_from_uri(uri));
    }
    if let Some(config) = location.on_prem_config() {
        attributes.insert(
            "on_prem_config".to_string(),
            single_block(HashMap::from([(
                "agent_arns".to_string(),
                Value::from_strings(config.agent_arns()),
            )])),
        );
    }
    if let Some(version) = location.mount_options().and_then(NfsMountOptions::version) {
        attributes.insert(
            "mount_options".to_string(),
            single_block(HashMap::from([(
                "version".to_string(),
                Value::from(version.as_str()),
            )])),
        );
    }
    attributes
}

/// Host of `nfs://host/export`
fn hostname_from_uri(uri: &str) -> Option<&str> {
    let rest = uri.split_once("://")?.1;
    let host = rest.split('/').next()?;
    (!host.is_empty()).then_some(host)
}

async fn find_location(
    conn: &AwsClients,
    id: &ResourceId,
    arn: &str,
) -> ProviderResult<Option<DescribeLocationNfsOutput>> {
    debug!("DataSync DescribeLocationNfs {}", arn);
    match conn.datasync.describe_location_nfs().location_arn(arn).send().await {
        Ok(output) => Ok(Some(output)),
        Err(err) if is_not_found(&err) => Ok(None),
        Err(err) => Err(sdk_error("Failed to read DataSync NFS location", id, err)),
    }
}

async fn create_location(conn: &AwsClients, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = &resource.attributes;

    debug!("DataSync CreateLocationNfs for {}", id);
    let output = conn
        .datasync
        .create_location_nfs()
        .server_hostname(require_str(id, attrs, "server_hostname")?)
        .subdirectory(require_str(id, attrs, "subdirectory")?)
        .on_prem_config(expand_on_prem_config(id, attrs)?)
        .set_mount_options(expand_mount_options(attrs))
        .set_tags(create_tags(conn, id, attrs.get("tags"))?)
        .send()
        .await
        .map_err(|e| sdk_error("Failed to create DataSync NFS location", id, e))?;
    let arn = output
        .location_arn()
        .ok_or_else(|| missing_field(id, "CreateLocationNfs", "LocationArn"))?
        .to_string();
    info!("created DataSync NFS location {} ({})", arn, id);

    read_location(conn, id, &arn).await
}

async fn read_location(conn: &AwsClients, id: &ResourceId, arn: &str) -> ProviderResult<State> {
    let Some(location) = find_location(conn, id, arn).await? else {
        warn!("DataSync NFS location {} not found, removing {} from state", arn, id);
        return Ok(State::not_found(id.clone()));
    };
    let mut attributes = flatten_location(&location);
    read_tags(conn, id, arn, &mut attributes).await?;
    Ok(State::existing(id.clone(), attributes).with_identifier(arn))
}

async fn update_location(
    conn: &AwsClients,
    id: &ResourceId,
    arn: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let attrs = &to.attributes;
    if any_changed(
        &schemas::datasync::location_nfs_schema(),
        &from.attributes,
        attrs,
        &["subdirectory", "on_prem_config", "mount_options"],
    ) {
        debug!("DataSync UpdateLocationNfs {}", arn);
        conn.datasync
            .update_location_nfs()
            .location_arn(arn)
            .set_subdirectory(attrs.get_str("subdirectory").map(str::to_string))
            .on_prem_config(expand_on_prem_config(id, attrs)?)
            .set_mount_options(expand_mount_options(attrs))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to update DataSync NFS location", id, e))?;
    }
    update_tags_between(conn, id, arn, &from.attributes, attrs).await?;
    read_location(conn, id, arn).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(pairs: Vec<(&str, Value)>) -> Value {
        single_block(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn expand_agent_and_mount_options() {
        let id = ResourceId::new("datasync.location_nfs", "src");
        let resource = Resource::new("datasync.location_nfs", "src")
            .with_attribute(
                "on_prem_config",
                block(vec![(
                    "agent_arns",
                    Value::from_strings(["arn:aws:datasync:us-east-1:123456789012:agent/agent-1"]),
                )]),
            )
            .with_attribute("mount_options", block(vec![("version", Value::from("NFS4_1"))]));

        let config = expand_on_prem_config(&id, &resource.attributes).unwrap();
        assert_eq!(config.agent_arns().len(), 1);
        let options = expand_mount_options(&resource.attributes).unwrap();
        assert_eq!(options.version(), Some(&NfsVersion::Nfs41));
    }

    #[test]
    fn mount_options_are_optional() {
        assert!(expand_mount_options(&HashMap::new()).is_none());
        let id = ResourceId::new("datasync.location_nfs", "src");
        assert!(expand_on_prem_config(&id, &HashMap::new()).is_err());
    }

    #[test]
    fn flatten_reads_uri_parts() {
        let location = DescribeLocationNfsOutput::builder()
            .location_arn("arn:aws:datasync:us-east-1:123456789012:location/loc-0123")
            .location_uri("nfs://10.0.0.9/exports/data/")
            .mount_options(NfsMountOptions::builder().version(NfsVersion::Nfs3).build())
            .build();
        let attrs = flatten_location(&location);
        assert_eq!(attrs.get_str("server_hostname"), Some("10.0.0.9"));
        assert_eq!(attrs.get_str("subdirectory"), Some("/exports/data/"));
        assert_eq!(
            attrs.get_block("mount_options").and_then(|b| b.get_str("version")),
            Some("NFS3")
        );
    }
}
