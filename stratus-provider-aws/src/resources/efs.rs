//! EFS mount targets

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_efs::operation::create_mount_target::builders::CreateMountTargetFluentBuilder;
use aws_sdk_efs::types::MountTargetDescription;
use log::{debug, info, warn};
use stratus_core::provider::{BoxFuture, ProviderResult};
use stratus_core::registry::ResourceDefinition;
use stratus_core::resource::{AttributeMap, Resource, ResourceId, State, Value};
use stratus_core::schema::ResourceSchema;
use stratus_core::waiter::{RefreshResult, StateChangeConf};

use super::{require_str, set_changed, set_str};
use crate::awserr::{is_not_found, sdk_error};
use crate::conns::AwsClients;
use crate::schemas;

const CREATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const DELETE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const NOT_FOUND_CODES: &[&str] = &["MountTargetNotFound", "FileSystemNotFound", "AccessPointNotFound"];

pub struct MountTarget;

impl ResourceDefinition<AwsClients> for MountTarget {
    fn name(&self) -> &'static str {
        "efs.mount_target"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::efs::mount_target_schema()
    }

    fn create<'a>(
        &'a self,
        conn: &'a AwsClients,
        resource: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(create_mount_target(conn, resource))
    }

    fn read<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(read_mount_target(conn, id, identifier))
    }

    fn update<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(update_mount_target(conn, id, identifier, from, to))
    }

    fn delete<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(delete_mount_target(conn, id, identifier))
    }
}

/// Mount target lookup filter; exactly one of the ids is sent as the primary key
#[derive(Debug, Clone, Default)]
pub(crate) struct MountTargetFilter<'a> {
    pub mount_target_id: Option<&'a str>,
    pub file_system_id: Option<&'a str>,
    pub access_point_id: Option<&'a str>,
}

pub(crate) async fn find_mount_targets(
    conn: &AwsClients,
    id: &ResourceId,
    filter: &MountTargetFilter<'_>,
) -> ProviderResult<Vec<MountTargetDescription>> {
    debug!("EFS DescribeMountTargets {:?}", filter);
    let request = conn
        .efs
        .describe_mount_targets()
        .set_mount_target_id(filter.mount_target_id.map(str::to_string))
        .set_file_system_id(filter.file_system_id.map(str::to_string))
        .set_access_point_id(filter.access_point_id.map(str::to_string));
    match request.send().await {
        Ok(output) => Ok(output.mount_targets().to_vec()),
        Err(err) if is_not_found(&err, NOT_FOUND_CODES) => Ok(Vec::new()),
        Err(err) => Err(sdk_error("Failed to read EFS mount targets", id, err)),
    }
}

async fn find_mount_target_by_id(
    conn: &AwsClients,
    id: &ResourceId,
    mount_target_id: &str,
) -> ProviderResult<Option<MountTargetDescription>> {
    let filter = MountTargetFilter {
        mount_target_id: Some(mount_target_id),
        ..Default::default()
    };
    Ok(find_mount_targets(conn, id, &filter).await?.into_iter().next())
}

/// Life cycle state of a mount target; a `deleted` mount target counts as gone
async fn status_life_cycle(
    conn: &AwsClients,
    id: &ResourceId,
    mount_target_id: &str,
) -> RefreshResult<MountTargetDescription> {
    Ok(find_mount_target_by_id(conn, id, mount_target_id)
        .await?
        .map(|mt| {
            let state = mt.life_cycle_state().as_str().to_string();
            (mt, state)
        })
        .filter(|(_, state)| state != "deleted"))
}

pub(crate) async fn mount_target_security_groups(
    conn: &AwsClients,
    id: &ResourceId,
    mount_target_id: &str,
) -> ProviderResult<Vec<String>> {
    debug!("EFS DescribeMountTargetSecurityGroups {}", mount_target_id);
    let output = conn
        .efs
        .describe_mount_target_security_groups()
        .mount_target_id(mount_target_id)
        .send()
        .await
        .map_err(|e| sdk_error("Failed to read EFS mount target security groups", id, e))?;
    Ok(output.security_groups().to_vec())
}

fn expand_create(
    request: CreateMountTargetFluentBuilder,
    attributes: &HashMap<String, Value>,
) -> CreateMountTargetFluentBuilder {
    let security_groups = attributes.get_strings("security_groups");
    request
        .set_file_system_id(attributes.get_str("file_system_id").map(str::to_string))
        .set_subnet_id(attributes.get_str("subnet_id").map(str::to_string))
        .set_ip_address(attributes.get_str("ip_address").map(str::to_string))
        .set_security_groups((!security_groups.is_empty()).then_some(security_groups))
}

/// State attributes of a mount target
pub(crate) fn flatten_mount_target(
    conn: &AwsClients,
    mt: &MountTargetDescription,
    security_groups: &[String],
) -> HashMap<String, Value> {
    let file_system_id = mt.file_system_id();
    let mut attributes = HashMap::new();
    attributes.insert("file_system_id".to_string(), Value::from(file_system_id));
    attributes.insert("subnet_id".to_string(), Value::from(mt.subnet_id()));
    attributes.insert(
        "security_groups".to_string(),
        Value::from_strings(security_groups),
    );
    set_str(&mut attributes, "ip_address", mt.ip_address());
    set_str(&mut attributes, "network_interface_id", mt.network_interface_id());
    set_str(&mut attributes, "availability_zone_name", mt.availability_zone_name());
    set_str(&mut attributes, "availability_zone_id", mt.availability_zone_id());
    set_str(&mut attributes, "owner_id", mt.owner_id());

    let hostname = conn.regional_hostname("efs");
    attributes.insert(
        "dns_name".to_string(),
        Value::String(format!("{}.{}", file_system_id, hostname)),
    );
    if let Some(az) = mt.availability_zone_name() {
        attributes.insert(
            "mount_target_dns_name".to_string(),
            Value::String(format!("{}.{}.{}", az, file_system_id, hostname)),
        );
    }
    if let Some(owner) = mt.owner_id() {
        attributes.insert(
            "file_system_arn".to_string(),
            Value::String(
                conn.arn("elasticfilesystem", owner, &format!("file-system/{}", file_system_id))
                    .to_string(),
            ),
        );
    }
    attributes
}

async fn create_mount_target(conn: &AwsClients, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let file_system_id = require_str(id, &resource.attributes, "file_system_id")?;

    // Creating more than one mount target per file system at a time fails
    // with IncorrectFileSystemLifeCycleState
    let _guard = conn
        .mutex_kv
        .lock(&format!("createMountTarget-{}", file_system_id))
        .await;

    debug!("EFS CreateMountTarget for {}", file_system_id);
    let output = expand_create(conn.efs.create_mount_target(), &resource.attributes)
        .send()
        .await
        .map_err(|e| sdk_error("Failed to create EFS mount target", id, e))?;
    let mount_target_id = output.mount_target_id().to_string();

    StateChangeConf::new(&["creating"], &["available"], CREATE_TIMEOUT)
        .with_delay(Duration::from_secs(10))
        .with_min_timeout(Duration::from_secs(3))
        .wait(|| status_life_cycle(conn, id, &mount_target_id))
        .await?;
    info!("created EFS mount target {} ({})", mount_target_id, id);

    read_mount_target(conn, id, &mount_target_id).await
}

async fn read_mount_target(
    conn: &AwsClients,
    id: &ResourceId,
    mount_target_id: &str,
) -> ProviderResult<State> {
    let Some(mt) = find_mount_target_by_id(conn, id, mount_target_id).await? else {
        warn!("EFS mount target {} not found, removing {} from state", mount_target_id, id);
        return Ok(State::not_found(id.clone()));
    };
    let security_groups = mount_target_security_groups(conn, id, mount_target_id).await?;
    Ok(State::existing(id.clone(), flatten_mount_target(conn, &mt, &security_groups))
        .with_identifier(mount_target_id))
}

async fn update_mount_target(
    conn: &AwsClients,
    id: &ResourceId,
    mount_target_id: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    if set_changed(&from.attributes, &to.attributes, "security_groups") {
        debug!("EFS ModifyMountTargetSecurityGroups {}", mount_target_id);
        conn.efs
            .modify_mount_target_security_groups()
            .mount_target_id(mount_target_id)
            .set_security_groups(Some(to.attributes.get_strings("security_groups")))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to modify EFS mount target security groups", id, e))?;
    }
    read_mount_target(conn, id, mount_target_id).await
}

async fn delete_mount_target(
    conn: &AwsClients,
    id: &ResourceId,
    mount_target_id: &str,
) -> ProviderResult<()> {
    debug!("EFS DeleteMountTarget {}", mount_target_id);
    match conn
        .efs
        .delete_mount_target()
        .mount_target_id(mount_target_id)
        .send()
        .await
    {
        Ok(_) => {}
        Err(err) if is_not_found(&err, NOT_FOUND_CODES) => return Ok(()),
        Err(err) => return Err(sdk_error("Failed to delete EFS mount target", id, err)),
    }

    StateChangeConf::new(&["available", "deleting"], &[], DELETE_TIMEOUT)
        .with_delay(Duration::from_secs(10))
        .with_min_timeout(Duration::from_secs(3))
        .wait(|| status_life_cycle(conn, id, mount_target_id))
        .await?;
    info!("deleted EFS mount target {} ({})", mount_target_id, id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conns::test_support::offline_clients;
    use aws_sdk_efs::types::LifeCycleState;

    fn mount_target() -> MountTargetDescription {
        MountTargetDescription::builder()
            .mount_target_id("fsmt-0123")
            .file_system_id("fs-abc")
            .subnet_id("subnet-1")
            .life_cycle_state(LifeCycleState::Available)
            .owner_id("123456789012")
            .ip_address("10.0.1.20")
            .network_interface_id("eni-1")
            .availability_zone_name("us-west-2a")
            .availability_zone_id("usw2-az1")
            .build()
            .unwrap()
    }

    #[test]
    fn flatten_derives_dns_names_and_arn() {
        let conn = offline_clients("us-west-2");
        let attrs = flatten_mount_target(&conn, &mount_target(), &["sg-1".to_string()]);

        assert_eq!(attrs.get_str("dns_name"), Some("fs-abc.efs.us-west-2.amazonaws.com"));
        assert_eq!(
            attrs.get_str("mount_target_dns_name"),
            Some("us-west-2a.fs-abc.efs.us-west-2.amazonaws.com")
        );
        assert_eq!(
            attrs.get_str("file_system_arn"),
            Some("arn:aws:elasticfilesystem:us-west-2:123456789012:file-system/fs-abc")
        );
        assert_eq!(attrs.get_str("availability_zone_id"), Some("usw2-az1"));
        assert_eq!(attrs.get_strings("security_groups"), vec!["sg-1".to_string()]);
    }

    #[test]
    fn expand_sends_configured_fields_only() {
        let conn = offline_clients("us-east-1");
        let resource = Resource::new("efs.mount_target", "main")
            .with_attribute("file_system_id", "fs-abc")
            .with_attribute("subnet_id", "subnet-1");
        let request = expand_create(conn.efs.create_mount_target(), &resource.attributes);
        let input = request.as_input();

        assert_eq!(input.get_file_system_id().as_deref(), Some("fs-abc"));
        assert_eq!(input.get_subnet_id().as_deref(), Some("subnet-1"));
        assert_eq!(input.get_ip_address(), &None);
        assert_eq!(input.get_security_groups(), &None);
    }

    #[tokio::test]
    async fn create_requires_file_system_id() {
        let conn = offline_clients("us-east-1");
        let resource = Resource::new("efs.mount_target", "main").with_attribute("subnet_id", "subnet-1");
        let err = MountTarget.create(&conn, &resource).await.unwrap_err();
        assert_eq!(err.message, "file_system_id is required");
    }
}
