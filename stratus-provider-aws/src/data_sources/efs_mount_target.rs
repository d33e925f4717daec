//! EFS mount target lookup

use std::collections::HashMap;

use log::debug;
use stratus_core::provider::{BoxFuture, ProviderError, ProviderResult};
use stratus_core::registry::DataSourceDefinition;
use stratus_core::resource::{AttributeMap, Resource, State, Value};
use stratus_core::schema::ResourceSchema;

use super::lookup_error;
use crate::conns::AwsClients;
use crate::resources::efs::{
    MountTargetFilter, find_mount_targets, flatten_mount_target, mount_target_security_groups,
};
use crate::resources::set_str;
use crate::schemas;

pub struct MountTarget;

impl DataSourceDefinition<AwsClients> for MountTarget {
    fn name(&self) -> &'static str {
        "efs.mount_target"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::efs::mount_target_data_source_schema()
    }

    fn read<'a>(
        &'a self,
        conn: &'a AwsClients,
        config: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(read_mount_target(conn, config))
    }
}

/// DescribeMountTargets takes exactly one primary key: the mount target id,
/// else the access point, else the file system
fn lookup_filter(attrs: &HashMap<String, Value>) -> Option<MountTargetFilter<'_>> {
    let mount_target_id = attrs.get_str("mount_target_id");
    let access_point_id = attrs.get_str("access_point_id");
    let file_system_id = attrs.get_str("file_system_id");
    let filter = if mount_target_id.is_some() {
        MountTargetFilter {
            mount_target_id,
            ..Default::default()
        }
    } else if access_point_id.is_some() {
        MountTargetFilter {
            access_point_id,
            ..Default::default()
        }
    } else if file_system_id.is_some() {
        MountTargetFilter {
            file_system_id,
            ..Default::default()
        }
    } else {
        return None;
    };
    Some(filter)
}

async fn read_mount_target(conn: &AwsClients, config: &Resource) -> ProviderResult<State> {
    let id = &config.id;
    let attrs = &config.attributes;
    let filter = lookup_filter(attrs).ok_or_else(|| {
        ProviderError::new("one of mount_target_id, access_point_id or file_system_id is required")
            .for_resource(id.clone())
    })?;

    debug!("looking up EFS mount target for {}", id);
    let file_system_id = attrs.get_str("file_system_id");
    let matches: Vec<_> = find_mount_targets(conn, id, &filter)
        .await?
        .into_iter()
        .filter(|mt| file_system_id.is_none_or(|fs| mt.file_system_id() == fs))
        .collect();
    let [mount_target] = matches.as_slice() else {
        return Err(lookup_error(id, "EFS mount target", matches.len()));
    };

    let mount_target_id = mount_target.mount_target_id();
    let security_groups = mount_target_security_groups(conn, id, mount_target_id).await?;
    let mut attributes = flatten_mount_target(conn, mount_target, &security_groups);
    attributes.insert("mount_target_id".to_string(), Value::from(mount_target_id));
    set_str(&mut attributes, "access_point_id", attrs.get_str("access_point_id"));

    Ok(State::existing(id.clone(), attributes).with_identifier(mount_target_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), Value::from(*v))).collect()
    }

    #[test]
    fn mount_target_id_takes_precedence() {
        let a = attrs(&[("mount_target_id", "fsmt-1"), ("file_system_id", "fs-1")]);
        let filter = lookup_filter(&a).unwrap();
        assert_eq!(filter.mount_target_id, Some("fsmt-1"));
        assert_eq!(filter.file_system_id, None);
    }

    #[test]
    fn access_point_before_file_system() {
        let a = attrs(&[("access_point_id", "fsap-1"), ("file_system_id", "fs-1")]);
        let filter = lookup_filter(&a).unwrap();
        assert_eq!(filter.access_point_id, Some("fsap-1"));
        assert_eq!(filter.file_system_id, None);

        let a = attrs(&[("file_system_id", "fs-1")]);
        assert_eq!(lookup_filter(&a).unwrap().file_system_id, Some("fs-1"));
    }

    #[tokio::test]
    async fn lookup_needs_a_key() {
        let conn = crate::conns::test_support::offline_clients("us-east-1");
        let config = Resource::new("efs.mount_target", "lookup").with_read_only(true);
        let err = MountTarget.read(&conn, &config).await.unwrap_err();
        assert!(err.message.starts_with("one of mount_target_id"));
    }
}
