//! DataSync S3 locations

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_datasync::operation::describe_location_s3::DescribeLocationS3Output;
use aws_sdk_datasync::types::{S3Config, S3StorageClass};
use log::{debug, info, warn};
use stratus_core::provider::{BoxFuture, ProviderError, ProviderResult};
use stratus_core::registry::ResourceDefinition;
use stratus_core::resource::{AttributeMap, Resource, ResourceId, State, Value};
use stratus_core::schema::ResourceSchema;
use stratus_core::waiter::retry_when;

use super::{create_tags, is_not_found, read_tags, subdirectory_from_uri, update_tags_between};
use crate::arn::Arn;
use crate::awserr::{is_aws_err, sdk_error};
use crate::conns::AwsClients;
use crate::resources::{build_error, missing_field, require_str, set_str, single_block};
use crate::schemas;

/// How long a freshly created bucket role may take to become assumable
const IAM_PROPAGATION_TIMEOUT: Duration = Duration::from_secs(2 * 60);
const IAM_RETRY_INTERVAL: Duration = Duration::from_secs(5);

pub struct LocationS3;

impl ResourceDefinition<AwsClients> for LocationS3 {
    fn name(&self) -> &'static str {
        "datasync.location_s3"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::datasync::location_s3_schema()
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
        Box::pin(async move {
            update_tags_between(conn, id, identifier, &from.attributes, &to.attributes).await?;
            read_location(conn, id, identifier).await
        })
    }

    fn delete<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(delete_location(conn, id, identifier, "S3"))
    }
}

fn expand_s3_config(id: &ResourceId, block: &HashMap<String, Value>) -> ProviderResult<S3Config> {
    S3Config::builder()
        .set_bucket_access_role_arn(block.get_str("bucket_access_role_arn").map(str::to_string))
        .build()
        .map_err(|e| build_error(id, "S3Config", e))
}

fn flatten_location(location: &DescribeLocationS3Output, partition: &str) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    set_str(&mut attributes, "arn", location.location_arn());
    set_str(&mut attributes, "uri", location.location_uri());
    set_str(
        &mut attributes,
        "s3_storage_class",
        location.s3_storage_class().map(S3StorageClass::as_str),
    );
    attributes.insert(
        "agent_arns".to_string(),
        Value::from_strings(location.agent_arns()),
    );
    if let Some(config) = location.s3_config() {
        attributes.insert(
            "s3_config".to_string(),
            single_block(HashMap::from([(
                "bucket_access_role_arn".to_string(),
                Value::from(config.bucket_access_role_arn()),
            )])),
        );
    }

    // DescribeLocationS3 has no bucket field; both halves come from the URI
    if let Some(uri) = location.location_uri() {
        if let Some(subdirectory) = subdirectory_from_uri(uri) {
            attributes.insert("subdirectory".to_string(), Value::String(subdirectory));
        }
        if let Some(bucket) = bucket_from_uri(uri) {
            let arn = Arn::new(partition, "s3", "", "", bucket);
            attributes.insert("s3_bucket_arn".to_string(), Value::String(arn.to_string()));
        }
    }
    attributes
}

/// Bucket name of `s3://bucket/prefix`
fn bucket_from_uri(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix("s3://")?;
    let bucket = rest.split('/').next()?;
    (!bucket.is_empty()).then_some(bucket)
}

async fn find_location(
    conn: &AwsClients,
    id: &ResourceId,
    arn: &str,
) -> ProviderResult<Option<DescribeLocationS3Output>> {
    debug!("DataSync DescribeLocationS3 {}", arn);
    match conn.datasync.describe_location_s3().location_arn(arn).send().await {
        Ok(output) => Ok(Some(output)),
        Err(err) if is_not_found(&err) => Ok(None),
        Err(err) => Err(sdk_error("Failed to read DataSync S3 location", id, err)),
    }
}

async fn create_location(conn: &AwsClients, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = &resource.attributes;
    let config_block = attrs
        .get_block("s3_config")
        .ok_or_else(|| ProviderError::new("s3_config is required").for_resource(id.clone()))?;
    let s3_config = expand_s3_config(id, config_block)?;
    let agent_arns = attrs.get_strings("agent_arns");

    let request = conn
        .datasync
        .create_location_s3()
        .s3_bucket_arn(require_str(id, attrs, "s3_bucket_arn")?)
        .subdirectory(require_str(id, attrs, "subdirectory")?)
        .s3_config(s3_config)
        .set_s3_storage_class(attrs.get_str("s3_storage_class").map(S3StorageClass::from))
        .set_agent_arns((!agent_arns.is_empty()).then_some(agent_arns))
        .set_tags(create_tags(conn, id, attrs.get("tags"))?);

    debug!("DataSync CreateLocationS3 for {}", id);
    let output = retry_when(
        IAM_PROPAGATION_TIMEOUT,
        IAM_RETRY_INTERVAL,
        || request.clone().send(),
        |err| {
            is_aws_err(err, "InvalidRequestException", "Unable to assume role")
                || is_aws_err(err, "InvalidRequestException", "Access denied")
        },
    )
    .await
    .map_err(|e| sdk_error("Failed to create DataSync S3 location", id, e))?;
    let arn = output
        .location_arn()
        .ok_or_else(|| missing_field(id, "CreateLocationS3", "LocationArn"))?
        .to_string();
    info!("created DataSync S3 location {} ({})", arn, id);

    read_location(conn, id, &arn).await
}

async fn read_location(conn: &AwsClients, id: &ResourceId, arn: &str) -> ProviderResult<State> {
    let Some(location) = find_location(conn, id, arn).await? else {
        warn!("DataSync S3 location {} not found, removing {} from state", arn, id);
        return Ok(State::not_found(id.clone()));
    };
    let mut attributes = flatten_location(&location, &conn.partition);
    read_tags(conn, id, arn, &mut attributes).await?;
    Ok(State::existing(id.clone(), attributes).with_identifier(arn))
}

/// DeleteLocation for any location kind
pub(crate) async fn delete_location(
    conn: &AwsClients,
    id: &ResourceId,
    arn: &str,
    kind: &str,
) -> ProviderResult<()> {
    debug!("DataSync DeleteLocation {}", arn);
    match conn.datasync.delete_location().location_arn(arn).send().await {
        Ok(_) => {
            info!("deleted DataSync {} location {} ({})", kind, arn, id);
            Ok(())
        }
        Err(err) if is_not_found(&err) => Ok(()),
        Err(err) => Err(sdk_error(
            &format!("Failed to delete DataSync {} location", kind),
            id,
            err,
        )),
    }
}
