//! FSx for Lustre file systems

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_fsx::types::{
    AutoImportPolicyType, CreateFileSystemLustreConfiguration, DriveCacheType, FileSystem,
    FileSystemType, LustreDeploymentType, StorageType, Tag, UpdateFileSystemLustreConfiguration,
};
use log::{debug, info, warn};
use stratus_core::provider::{BoxFuture, ProviderError, ProviderResult};
use stratus_core::registry::ResourceDefinition;
use stratus_core::resource::{AttributeMap, Resource, ResourceId, State, Value};
use stratus_core::schema::ResourceSchema;
use stratus_core::waiter::{RefreshResult, StateChangeConf};

use super::{any_changed, missing_field, require_str, set_int, set_str, to_i32};
use crate::awserr::{is_not_found, sdk_error};
use crate::conns::AwsClients;
use crate::schemas;
use crate::tags::{KeyValueTags, TagChanges};

const CREATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const UPDATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const DELETE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const NOT_FOUND_CODES: &[&str] = &["FileSystemNotFound"];

const LIFECYCLE_AVAILABLE: &str = "AVAILABLE";
const LIFECYCLE_CREATING: &str = "CREATING";
const LIFECYCLE_UPDATING: &str = "UPDATING";
const LIFECYCLE_DELETING: &str = "DELETING";
const LIFECYCLE_FAILED: &str = "FAILED";

/// Attributes changed in place through UpdateFileSystem's Lustre configuration
const LUSTRE_UPDATABLE: &[&str] = &[
    "weekly_maintenance_start_time",
    "automatic_backup_retention_days",
    "daily_automatic_backup_start_time",
    "auto_import_policy",
];

pub struct LustreFileSystem;

impl ResourceDefinition<AwsClients> for LustreFileSystem {
    fn name(&self) -> &'static str {
        "fsx.lustre_file_system"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::fsx::lustre_file_system_schema()
    }

    fn create<'a>(
        &'a self,
        conn: &'a AwsClients,
        resource: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(create_file_system(conn, resource))
    }

    fn read<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(read_file_system(conn, id, identifier))
    }

    fn update<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(update_file_system(conn, id, identifier, from, to))
    }

    fn delete<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(delete_file_system(conn, id, identifier))
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

fn int_attr(id: &ResourceId, attrs: &HashMap<String, Value>, key: &str) -> ProviderResult<Option<i32>> {
    attrs.get_int(key).map(|v| to_i32(id, key, v)).transpose()
}

fn expand_lustre_configuration(
    id: &ResourceId,
    attrs: &HashMap<String, Value>,
) -> ProviderResult<CreateFileSystemLustreConfiguration> {
    Ok(CreateFileSystemLustreConfiguration::builder()
        .set_import_path(attrs.get_str("import_path").map(str::to_string))
        .set_export_path(attrs.get_str("export_path").map(str::to_string))
        .set_imported_file_chunk_size(int_attr(id, attrs, "imported_file_chunk_size")?)
        .set_deployment_type(attrs.get_str("deployment_type").map(LustreDeploymentType::from))
        .set_per_unit_storage_throughput(int_attr(id, attrs, "per_unit_storage_throughput")?)
        .set_drive_cache_type(attrs.get_str("drive_cache_type").map(DriveCacheType::from))
        .set_auto_import_policy(attrs.get_str("auto_import_policy").map(AutoImportPolicyType::from))
        .set_copy_tags_to_backups(attrs.get_bool("copy_tags_to_backups"))
        .set_weekly_maintenance_start_time(
            attrs.get_str("weekly_maintenance_start_time").map(str::to_string),
        )
        .set_automatic_backup_retention_days(int_attr(id, attrs, "automatic_backup_retention_days")?)
        .set_daily_automatic_backup_start_time(
            attrs.get_str("daily_automatic_backup_start_time").map(str::to_string),
        )
        .build())
}

fn expand_lustre_update(
    id: &ResourceId,
    attrs: &HashMap<String, Value>,
) -> ProviderResult<UpdateFileSystemLustreConfiguration> {
    Ok(UpdateFileSystemLustreConfiguration::builder()
        .set_weekly_maintenance_start_time(
            attrs.get_str("weekly_maintenance_start_time").map(str::to_string),
        )
        .set_automatic_backup_retention_days(int_attr(id, attrs, "automatic_backup_retention_days")?)
        .set_daily_automatic_backup_start_time(
            attrs.get_str("daily_automatic_backup_start_time").map(str::to_string),
        )
        .set_auto_import_policy(attrs.get_str("auto_import_policy").map(AutoImportPolicyType::from))
        .build())
}

fn flatten_file_system(fs: &FileSystem) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    set_int(&mut attributes, "storage_capacity", fs.storage_capacity());
    attributes.insert("subnet_ids".to_string(), Value::from_strings(fs.subnet_ids()));
    attributes.insert(
        "network_interface_ids".to_string(),
        Value::from_strings(fs.network_interface_ids()),
    );
    set_str(&mut attributes, "storage_type", fs.storage_type().map(StorageType::as_str));
    set_str(&mut attributes, "kms_key_id", fs.kms_key_id());
    set_str(&mut attributes, "arn", fs.resource_arn());
    set_str(&mut attributes, "dns_name", fs.dns_name());
    set_str(&mut attributes, "owner_id", fs.owner_id());
    set_str(&mut attributes, "vpc_id", fs.vpc_id());

    if let Some(lustre) = fs.lustre_configuration() {
        set_str(
            &mut attributes,
            "weekly_maintenance_start_time",
            lustre.weekly_maintenance_start_time(),
        );
        set_str(
            &mut attributes,
            "deployment_type",
            lustre.deployment_type().map(LustreDeploymentType::as_str),
        );
        set_int(
            &mut attributes,
            "per_unit_storage_throughput",
            lustre.per_unit_storage_throughput(),
        );
        set_str(&mut attributes, "mount_name", lustre.mount_name());
        set_str(
            &mut attributes,
            "daily_automatic_backup_start_time",
            lustre.daily_automatic_backup_start_time(),
        );
        set_int(
            &mut attributes,
            "automatic_backup_retention_days",
            lustre.automatic_backup_retention_days(),
        );
        if let Some(copy) = lustre.copy_tags_to_backups() {
            attributes.insert("copy_tags_to_backups".to_string(), Value::Bool(copy));
        }
        set_str(
            &mut attributes,
            "drive_cache_type",
            lustre.drive_cache_type().map(DriveCacheType::as_str),
        );

        if let Some(repo) = lustre.data_repository_configuration() {
            set_str(&mut attributes, "import_path", repo.import_path());
            set_str(&mut attributes, "export_path", repo.export_path());
            set_int(
                &mut attributes,
                "imported_file_chunk_size",
                repo.imported_file_chunk_size(),
            );
            set_str(
                &mut attributes,
                "auto_import_policy",
                repo.auto_import_policy().map(AutoImportPolicyType::as_str),
            );
        }
    }
    attributes
}

async fn find_file_system(
    conn: &AwsClients,
    id: &ResourceId,
    file_system_id: &str,
) -> ProviderResult<Option<FileSystem>> {
    debug!("FSx DescribeFileSystems {}", file_system_id);
    match conn
        .fsx
        .describe_file_systems()
        .file_system_ids(file_system_id)
        .send()
        .await
    {
        Ok(output) => Ok(output.file_systems().first().cloned()),
        Err(err) if is_not_found(&err, NOT_FOUND_CODES) => Ok(None),
        Err(err) => Err(sdk_error("Failed to read FSx Lustre file system", id, err)),
    }
}

/// Lifecycle of a file system; `FAILED` ends the wait with AWS's reason
async fn status_lifecycle(
    conn: &AwsClients,
    id: &ResourceId,
    file_system_id: &str,
) -> RefreshResult<FileSystem> {
    let Some(fs) = find_file_system(conn, id, file_system_id).await? else {
        return Ok(None);
    };
    let lifecycle = fs
        .lifecycle()
        .map(|l| l.as_str().to_string())
        .unwrap_or_default();
    if lifecycle == LIFECYCLE_FAILED {
        let reason = fs
            .failure_details()
            .and_then(|d| d.message())
            .unwrap_or("no failure details");
        return Err(ProviderError::new(format!(
            "FSx file system {} failed: {}",
            file_system_id, reason
        ))
        .for_resource(id.clone()));
    }
    Ok(Some((fs, lifecycle)))
}

async fn wait_available(
    conn: &AwsClients,
    id: &ResourceId,
    file_system_id: &str,
    pending: &[&str],
    timeout: Duration,
) -> ProviderResult<()> {
    StateChangeConf::new(pending, &[LIFECYCLE_AVAILABLE], timeout)
        .with_delay(Duration::from_secs(30))
        .with_poll_interval(Duration::from_secs(30))
        .wait(|| status_lifecycle(conn, id, file_system_id))
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
        debug!("FSx UntagResource {} {:?}", arn, changes.remove);
        conn.fsx
            .untag_resource()
            .resource_arn(arn)
            .set_tag_keys(Some(changes.remove.clone()))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to untag FSx file system", id, e))?;
    }
    if !changes.set.is_empty() {
        debug!("FSx TagResource {}", arn);
        conn.fsx
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(sdk_tags(&changes.set)))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to tag FSx file system", id, e))?;
    }
    Ok(())
}

async fn create_file_system(conn: &AwsClients, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = &resource.attributes;
    let capacity = attrs
        .get_int("storage_capacity")
        .ok_or_else(|| ProviderError::new("storage_capacity is required").for_resource(id.clone()))?;
    let security_group_ids = attrs.get_strings("security_group_ids");
    let tags = conn.tags.for_create(attrs.get("tags"));

    debug!("FSx CreateFileSystem (LUSTRE) for {}", id);
    let output = conn
        .fsx
        .create_file_system()
        .file_system_type(FileSystemType::Lustre)
        .storage_capacity(to_i32(id, "storage_capacity", capacity)?)
        .set_subnet_ids(Some(attrs.get_strings("subnet_ids")))
        .set_security_group_ids((!security_group_ids.is_empty()).then_some(security_group_ids))
        .set_storage_type(attrs.get_str("storage_type").map(StorageType::from))
        .set_kms_key_id(attrs.get_str("kms_key_id").map(str::to_string))
        .set_tags((!tags.is_empty()).then(|| sdk_tags(&tags)))
        .lustre_configuration(expand_lustre_configuration(id, attrs)?)
        .send()
        .await
        .map_err(|e| sdk_error("Failed to create FSx Lustre file system", id, e))?;
    let file_system_id = output
        .file_system()
        .and_then(FileSystem::file_system_id)
        .ok_or_else(|| missing_field(id, "CreateFileSystem", "FileSystemId"))?
        .to_string();

    wait_available(conn, id, &file_system_id, &[LIFECYCLE_CREATING], CREATE_TIMEOUT).await?;
    info!("created FSx Lustre file system {} ({})", file_system_id, id);

    read_file_system(conn, id, &file_system_id).await
}

async fn read_file_system(
    conn: &AwsClients,
    id: &ResourceId,
    file_system_id: &str,
) -> ProviderResult<State> {
    let Some(fs) = find_file_system(conn, id, file_system_id).await? else {
        warn!("FSx file system {} not found, removing {} from state", file_system_id, id);
        return Ok(State::not_found(id.clone()));
    };
    let mut attributes = flatten_file_system(&fs);
    let (tags, tags_all) = conn.tags.for_state(tags_from_sdk(fs.tags()));
    attributes.insert("tags".to_string(), tags);
    attributes.insert("tags_all".to_string(), tags_all);

    Ok(State::existing(id.clone(), attributes).with_identifier(file_system_id))
}

fn lustre_settings_changed(from: &HashMap<String, Value>, to: &HashMap<String, Value>) -> bool {
    any_changed(&schemas::fsx::lustre_file_system_schema(), from, to, LUSTRE_UPDATABLE)
}

async fn update_file_system(
    conn: &AwsClients,
    id: &ResourceId,
    file_system_id: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let old_capacity = from.attributes.get_int("storage_capacity");
    let new_capacity = to.attributes.get_int("storage_capacity");
    let capacity_changed = old_capacity != new_capacity;
    if let (Some(old), Some(new)) = (old_capacity, new_capacity) {
        if new < old {
            return Err(ProviderError::new(format!(
                "storage_capacity cannot shrink from {} to {}; the file system must be replaced",
                old, new
            ))
            .for_resource(id.clone()));
        }
    }

    if capacity_changed || lustre_settings_changed(&from.attributes, &to.attributes) {
        debug!("FSx UpdateFileSystem {}", file_system_id);
        let mut request = conn
            .fsx
            .update_file_system()
            .file_system_id(file_system_id)
            .lustre_configuration(expand_lustre_update(id, &to.attributes)?);
        if let Some(capacity) = new_capacity.filter(|_| capacity_changed) {
            request = request.storage_capacity(to_i32(id, "storage_capacity", capacity)?);
        }
        request
            .send()
            .await
            .map_err(|e| sdk_error("Failed to update FSx Lustre file system", id, e))?;
        wait_available(conn, id, file_system_id, &[LIFECYCLE_UPDATING], UPDATE_TIMEOUT).await?;
    }

    let changes = conn.tags.changes(from.attributes.get("tags"), to.attributes.get("tags"));
    if !changes.is_empty() {
        let arn = require_str(id, &from.attributes, "arn")?;
        update_tags(conn, id, arn, &changes).await?;
    }

    read_file_system(conn, id, file_system_id).await
}

async fn delete_file_system(
    conn: &AwsClients,
    id: &ResourceId,
    file_system_id: &str,
) -> ProviderResult<()> {
    debug!("FSx DeleteFileSystem {}", file_system_id);
    match conn
        .fsx
        .delete_file_system()
        .file_system_id(file_system_id)
        .send()
        .await
    {
        Ok(_) => {}
        Err(err) if is_not_found(&err, NOT_FOUND_CODES) => return Ok(()),
        Err(err) => return Err(sdk_error("Failed to delete FSx Lustre file system", id, err)),
    }

    StateChangeConf::new(&[LIFECYCLE_AVAILABLE, LIFECYCLE_DELETING], &[], DELETE_TIMEOUT)
        .with_poll_interval(Duration::from_secs(30))
        .wait(|| status_lifecycle(conn, id, file_system_id))
        .await?;
    info!("deleted FSx Lustre file system {} ({})", file_system_id, id);
    Ok(())
}
