//! IoT Analytics pipelines
//!
//! A pipeline is an ordered list of activities. Each `pipeline_activity`
//! block holds exactly one activity kind, expanded into the matching field
//! of the SDK's `PipelineActivity`.

use std::collections::HashMap;

use aws_sdk_iotanalytics::types::{
    AddAttributesActivity, ChannelActivity, DatastoreActivity, DeviceRegistryEnrichActivity,
    DeviceShadowEnrichActivity, FilterActivity, LambdaActivity, MathActivity,
    Pipeline as PipelineDescription, PipelineActivity, RemoveAttributesActivity,
    SelectAttributesActivity, Tag,
};
use aws_smithy_types::error::operation::BuildError;
use log::{debug, info, warn};
use stratus_core::provider::{BoxFuture, ProviderError, ProviderResult};
use stratus_core::registry::ResourceDefinition;
use stratus_core::resource::{AttributeMap, Resource, ResourceId, State, Value};
use stratus_core::schema::ResourceSchema;

use super::{any_changed, build_error, require_str, set_str, single_block, to_i32};
use crate::awserr::{is_not_found, sdk_error};
use crate::conns::AwsClients;
use crate::schemas;
use crate::schemas::iotanalytics::ACTIVITY_KINDS;
use crate::tags::{KeyValueTags, TagChanges};

const NOT_FOUND_CODES: &[&str] = &["ResourceNotFoundException"];

pub struct Pipeline;

impl ResourceDefinition<AwsClients> for Pipeline {
    fn name(&self) -> &'static str {
        "iotanalytics.pipeline"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::iotanalytics::pipeline_schema()
    }

    fn create<'a>(
        &'a self,
        conn: &'a AwsClients,
        resource: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(create_pipeline(conn, resource))
    }

    fn read<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(read_pipeline(conn, id, identifier))
    }

    fn update<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(update_pipeline(conn, id, identifier, from, to))
    }

    fn delete<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(delete_pipeline(conn, id, identifier))
    }
}

fn sdk_tags(id: &ResourceId, tags: &KeyValueTags) -> ProviderResult<Vec<Tag>> {
    tags.iter()
        .map(|(k, v)| {
            Tag::builder()
                .key(k)
                .value(v)
                .build()
                .map_err(|e| build_error(id, "IoT Analytics tag", e))
        })
        .collect()
}

fn tags_from_sdk(tags: &[Tag]) -> KeyValueTags {
    tags.iter().map(|t| (t.key(), t.value())).collect()
}

fn string(block: &HashMap<String, Value>, key: &str) -> Option<String> {
    block.get_str(key).map(str::to_string)
}

fn string_map(block: &HashMap<String, Value>, key: &str) -> Option<HashMap<String, String>> {
    block.get(key).and_then(Value::as_map).map(|map| {
        map.iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
            .collect()
    })
}

/// Expand one `pipeline_activity` block
fn expand_activity(
    id: &ResourceId,
    activity: &HashMap<String, Value>,
) -> ProviderResult<PipelineActivity> {
    let Some((kind, b)) = ACTIVITY_KINDS
        .iter()
        .find_map(|kind| activity.get_block(kind).map(|b| (*kind, b)))
    else {
        return Err(ProviderError::new(format!(
            "pipeline_activity must set one of {}",
            ACTIVITY_KINDS.join(", ")
        ))
        .for_resource(id.clone()));
    };
    let err = |e: BuildError| build_error(id, kind, e);
    let builder = PipelineActivity::builder();

    let expanded = match kind {
        "channel" => builder.channel(
            ChannelActivity::builder()
                .set_name(string(b, "name"))
                .set_channel_name(string(b, "channel_name"))
                .set_next(string(b, "next"))
                .build()
                .map_err(err)?,
        ),
        "datastore" => builder.datastore(
            DatastoreActivity::builder()
                .set_name(string(b, "name"))
                .set_datastore_name(string(b, "datastore_name"))
                .build()
                .map_err(err)?,
        ),
        "lambda" => builder.lambda(
            LambdaActivity::builder()
                .set_name(string(b, "name"))
                .set_lambda_name(string(b, "lambda_name"))
                .set_batch_size(
                    b.get_int("batch_size")
                        .map(|v| to_i32(id, "batch_size", v))
                        .transpose()?,
                )
                .set_next(string(b, "next"))
                .build()
                .map_err(err)?,
        ),
        "add_attributes" => builder.add_attributes(
            AddAttributesActivity::builder()
                .set_name(string(b, "name"))
                .set_attributes(string_map(b, "attributes"))
                .set_next(string(b, "next"))
                .build()
                .map_err(err)?,
        ),
        "remove_attributes" => builder.remove_attributes(
            RemoveAttributesActivity::builder()
                .set_name(string(b, "name"))
                .set_attributes(Some(b.get_strings("attributes")))
                .set_next(string(b, "next"))
                .build()
                .map_err(err)?,
        ),
        "select_attributes" => builder.select_attributes(
            SelectAttributesActivity::builder()
                .set_name(string(b, "name"))
                .set_attributes(Some(b.get_strings("attributes")))
                .set_next(string(b, "next"))
                .build()
                .map_err(err)?,
        ),
        "filter" => builder.filter(
            FilterActivity::builder()
                .set_name(string(b, "name"))
                .set_filter(string(b, "filter"))
                .set_next(string(b, "next"))
                .build()
                .map_err(err)?,
        ),
        "math" => builder.math(
            MathActivity::builder()
                .set_name(string(b, "name"))
                .set_attribute(string(b, "attribute"))
                .set_math(string(b, "math"))
                .set_next(string(b, "next"))
                .build()
                .map_err(err)?,
        ),
        "device_registry_enrich" => builder.device_registry_enrich(
            DeviceRegistryEnrichActivity::builder()
                .set_name(string(b, "name"))
                .set_attribute(string(b, "attribute"))
                .set_thing_name(string(b, "thing_name"))
                .set_role_arn(string(b, "role_arn"))
                .set_next(string(b, "next"))
                .build()
                .map_err(err)?,
        ),
        _ => builder.device_shadow_enrich(
            DeviceShadowEnrichActivity::builder()
                .set_name(string(b, "name"))
                .set_attribute(string(b, "attribute"))
                .set_thing_name(string(b, "thing_name"))
                .set_role_arn(string(b, "role_arn"))
                .set_next(string(b, "next"))
                .build()
                .map_err(err)?,
        ),
    };
    Ok(expanded.build())
}

fn expand_activities(
    id: &ResourceId,
    attrs: &HashMap<String, Value>,
) -> ProviderResult<Vec<PipelineActivity>> {
    attrs
        .get_blocks("pipeline_activity")
        .into_iter()
        .map(|activity| expand_activity(id, activity))
        .collect()
}

/// Block fields common to every activity kind
fn activity_fields(name: &str, next: Option<&str>) -> HashMap<String, Value> {
    let mut block = HashMap::new();
    block.insert("name".to_string(), Value::from(name));
    set_str(&mut block, "next", next);
    block
}

fn with(mut block: HashMap<String, Value>, fields: Vec<(&str, Value)>) -> HashMap<String, Value> {
    block.extend(fields.into_iter().map(|(k, v)| (k.to_string(), v)));
    block
}

fn flatten_activity(activity: &PipelineActivity) -> Option<Value> {
    let (kind, block) = if let Some(a) = activity.channel() {
        (
            "channel",
            with(
                activity_fields(a.name(), a.next()),
                vec![("channel_name", Value::from(a.channel_name()))],
            ),
        )
    } else if let Some(a) = activity.datastore() {
        (
            "datastore",
            with(
                activity_fields(a.name(), None),
                vec![("datastore_name", Value::from(a.datastore_name()))],
            ),
        )
    } else if let Some(a) = activity.lambda() {
        (
            "lambda",
            with(
                activity_fields(a.name(), a.next()),
                vec![
                    ("lambda_name", Value::from(a.lambda_name())),
                    ("batch_size", Value::from(a.batch_size())),
                ],
            ),
        )
    } else if let Some(a) = activity.add_attributes() {
        let attributes = a
            .attributes()
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect();
        (
            "add_attributes",
            with(
                activity_fields(a.name(), a.next()),
                vec![("attributes", Value::Map(attributes))],
            ),
        )
    } else if let Some(a) = activity.remove_attributes() {
        (
            "remove_attributes",
            with(
                activity_fields(a.name(), a.next()),
                vec![("attributes", Value::from_strings(a.attributes()))],
            ),
        )
    } else if let Some(a) = activity.select_attributes() {
        (
            "select_attributes",
            with(
                activity_fields(a.name(), a.next()),
                vec![("attributes", Value::from_strings(a.attributes()))],
            ),
        )
    } else if let Some(a) = activity.filter() {
        (
            "filter",
            with(
                activity_fields(a.name(), a.next()),
                vec![("filter", Value::from(a.filter()))],
            ),
        )
    } else if let Some(a) = activity.math() {
        (
            "math",
            with(
                activity_fields(a.name(), a.next()),
                vec![
                    ("attribute", Value::from(a.attribute())),
                    ("math", Value::from(a.math())),
                ],
            ),
        )
    } else if let Some(a) = activity.device_registry_enrich() {
        (
            "device_registry_enrich",
            with(
                activity_fields(a.name(), a.next()),
                vec![
                    ("attribute", Value::from(a.attribute())),
                    ("thing_name", Value::from(a.thing_name())),
                    ("role_arn", Value::from(a.role_arn())),
                ],
            ),
        )
    } else if let Some(a) = activity.device_shadow_enrich() {
        (
            "device_shadow_enrich",
            with(
                activity_fields(a.name(), a.next()),
                vec![
                    ("attribute", Value::from(a.attribute())),
                    ("thing_name", Value::from(a.thing_name())),
                    ("role_arn", Value::from(a.role_arn())),
                ],
            ),
        )
    } else {
        return None;
    };
    Some(Value::Map(HashMap::from([(
        kind.to_string(),
        single_block(block),
    )])))
}

fn flatten_pipeline(pipeline: &PipelineDescription) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    set_str(&mut attributes, "name", pipeline.name());
    set_str(&mut attributes, "arn", pipeline.arn());
    attributes.insert(
        "pipeline_activity".to_string(),
        Value::List(pipeline.activities().iter().filter_map(flatten_activity).collect()),
    );
    attributes
}

async fn find_pipeline(
    conn: &AwsClients,
    id: &ResourceId,
    name: &str,
) -> ProviderResult<Option<PipelineDescription>> {
    debug!("IoT Analytics DescribePipeline {}", name);
    match conn.iotanalytics.describe_pipeline().pipeline_name(name).send().await {
        Ok(output) => Ok(output.pipeline().cloned()),
        Err(err) if is_not_found(&err, NOT_FOUND_CODES) => Ok(None),
        Err(err) => Err(sdk_error("Failed to read IoT Analytics pipeline", id, err)),
    }
}

async fn update_tags(
    conn: &AwsClients,
    id: &ResourceId,
    arn: &str,
    changes: &TagChanges,
) -> ProviderResult<()> {
    if !changes.remove.is_empty() {
        debug!("IoT Analytics UntagResource {} {:?}", arn, changes.remove);
        conn.iotanalytics
            .untag_resource()
            .resource_arn(arn)
            .set_tag_keys(Some(changes.remove.clone()))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to untag IoT Analytics pipeline", id, e))?;
    }
    if !changes.set.is_empty() {
        debug!("IoT Analytics TagResource {}", arn);
        conn.iotanalytics
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(sdk_tags(id, &changes.set)?))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to tag IoT Analytics pipeline", id, e))?;
    }
    Ok(())
}

async fn create_pipeline(conn: &AwsClients, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = &resource.attributes;
    let name = require_str(id, attrs, "name")?;
    let tags = conn.tags.for_create(attrs.get("tags"));

    debug!("IoT Analytics CreatePipeline {}", name);
    conn.iotanalytics
        .create_pipeline()
        .pipeline_name(name)
        .set_pipeline_activities(Some(expand_activities(id, attrs)?))
        .set_tags((!tags.is_empty()).then(|| sdk_tags(id, &tags)).transpose()?)
        .send()
        .await
        .map_err(|e| sdk_error("Failed to create IoT Analytics pipeline", id, e))?;
    info!("created IoT Analytics pipeline {} ({})", name, id);

    read_pipeline(conn, id, name).await
}

async fn read_pipeline(conn: &AwsClients, id: &ResourceId, name: &str) -> ProviderResult<State> {
    let Some(pipeline) = find_pipeline(conn, id, name).await? else {
        warn!("IoT Analytics pipeline {} not found, removing {} from state", name, id);
        return Ok(State::not_found(id.clone()));
    };
    let mut attributes = flatten_pipeline(&pipeline);

    if let Some(arn) = pipeline.arn() {
        debug!("IoT Analytics ListTagsForResource {}", arn);
        let output = conn
            .iotanalytics
            .list_tags_for_resource()
            .resource_arn(arn)
            .send()
            .await
            .map_err(|e| sdk_error("Failed to list IoT Analytics pipeline tags", id, e))?;
        let (tags, tags_all) = conn.tags.for_state(tags_from_sdk(output.tags()));
        attributes.insert("tags".to_string(), tags);
        attributes.insert("tags_all".to_string(), tags_all);
    }

    Ok(State::existing(id.clone(), attributes).with_identifier(name))
}

async fn update_pipeline(
    conn: &AwsClients,
    id: &ResourceId,
    name: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    if any_changed(
        &schemas::iotanalytics::pipeline_schema(),
        &from.attributes,
        &to.attributes,
        &["pipeline_activity"],
    ) {
        debug!("IoT Analytics UpdatePipeline {}", name);
        conn.iotanalytics
            .update_pipeline()
            .pipeline_name(name)
            .set_pipeline_activities(Some(expand_activities(id, &to.attributes)?))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to update IoT Analytics pipeline", id, e))?;
    }

    let changes = conn.tags.changes(from.attributes.get("tags"), to.attributes.get("tags"));
    if !changes.is_empty() {
        let arn = require_str(id, &from.attributes, "arn")?;
        update_tags(conn, id, arn, &changes).await?;
    }

    read_pipeline(conn, id, name).await
}

async fn delete_pipeline(conn: &AwsClients, id: &ResourceId, name: &str) -> ProviderResult<()> {
    debug!("IoT Analytics DeletePipeline {}", name);
    match conn.iotanalytics.delete_pipeline().pipeline_name(name).send().await {
        Ok(_) => {
            info!("deleted IoT Analytics pipeline {} ({})", name, id);
            Ok(())
        }
        Err(err) if is_not_found(&err, NOT_FOUND_CODES) => Ok(()),
        Err(err) => Err(sdk_error("Failed to delete IoT Analytics pipeline", id, err)),
    }
}
