//! API Gateway REST API authorizers
//!
//! Identified by `rest_api_id/authorizer_id`. Updates go through
//! UpdateAuthorizer's JSON-patch operations.

use std::collections::HashMap;

use aws_sdk_apigateway::operation::get_authorizer::GetAuthorizerOutput;
use aws_sdk_apigateway::types::{AuthorizerType, Op, PatchOperation};
use log::{debug, info, warn};
use stratus_core::provider::{BoxFuture, ProviderError, ProviderResult};
use stratus_core::registry::ResourceDefinition;
use stratus_core::resource::{AttributeMap, Resource, ResourceId, State, Value};
use stratus_core::schema::ResourceSchema;

use super::{missing_field, require_str, set_int, set_str, to_i32};
use crate::awserr::{is_not_found, sdk_error};
use crate::case_convert::patch_path;
use crate::conns::AwsClients;
use crate::schemas;

const NOT_FOUND_CODES: &[&str] = &["NotFoundException"];
const PROVIDER_ARNS_PATH: &str = "/providerARNs";

/// Scalar attributes updated with a `replace` patch operation
const REPLACEABLE: &[&str] = &[
    "name",
    "type",
    "authorizer_uri",
    "authorizer_credentials",
    "authorizer_result_ttl_in_seconds",
    "identity_source",
    "identity_validation_expression",
];

pub struct Authorizer;

impl ResourceDefinition<AwsClients> for Authorizer {
    fn name(&self) -> &'static str {
        "apigateway.authorizer"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::apigateway::authorizer_schema()
    }

    fn create<'a>(
        &'a self,
        conn: &'a AwsClients,
        resource: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(create_authorizer(conn, resource))
    }

    fn read<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(read_authorizer(conn, id, identifier))
    }

    fn update<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(update_authorizer(conn, id, identifier, from, to))
    }

    fn delete<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(delete_authorizer(conn, id, identifier))
    }
}

/// Split `rest_api_id/authorizer_id`
fn parse_identifier<'a>(id: &ResourceId, identifier: &'a str) -> ProviderResult<(&'a str, &'a str)> {
    match identifier.split_once('/') {
        Some((api, authorizer)) if !api.is_empty() && !authorizer.is_empty() => Ok((api, authorizer)),
        _ => Err(ProviderError::new(format!(
            "invalid authorizer identifier {:?}, expected rest_api_id/authorizer_id",
            identifier
        ))
        .for_resource(id.clone())),
    }
}

fn authorizer_arn(conn: &AwsClients, rest_api_id: &str, authorizer_id: &str) -> String {
    conn.arn(
        "apigateway",
        "",
        &format!("/restapis/{}/authorizers/{}", rest_api_id, authorizer_id),
    )
    .to_string()
}

/// Text form of an attribute for a patch value
fn patch_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::List(_) | Value::Map(_) => None,
    }
}

/// Patch operations moving the authorizer from `old` to `new`
fn patch_operations(
    old: &HashMap<String, Value>,
    new: &HashMap<String, Value>,
) -> Vec<PatchOperation> {
    let mut operations: Vec<PatchOperation> = REPLACEABLE
        .iter()
        .filter(|key| old.get(**key) != new.get(**key))
        .map(|key| {
            PatchOperation::builder()
                .op(Op::Replace)
                .path(patch_path(key))
                .set_value(patch_value(new.get(*key)).or_else(|| Some(String::new())))
                .build()
        })
        .collect();

    let old_arns = old.get_strings("provider_arns");
    let new_arns = new.get_strings("provider_arns");
    operations.extend(
        new_arns
            .iter()
            .filter(|arn| !old_arns.contains(arn))
            .map(|arn| provider_arn_operation(Op::Add, arn)),
    );
    operations.extend(
        old_arns
            .iter()
            .filter(|arn| !new_arns.contains(arn))
            .map(|arn| provider_arn_operation(Op::Remove, arn)),
    );
    operations
}

fn provider_arn_operation(op: Op, arn: &str) -> PatchOperation {
    PatchOperation::builder()
        .op(op)
        .path(PROVIDER_ARNS_PATH)
        .value(arn)
        .build()
}

fn flatten_authorizer(
    conn: &AwsClients,
    rest_api_id: &str,
    authorizer: &GetAuthorizerOutput,
) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    attributes.insert("rest_api_id".to_string(), Value::from(rest_api_id));
    set_str(&mut attributes, "id", authorizer.id());
    set_str(&mut attributes, "name", authorizer.name());
    set_str(&mut attributes, "type", authorizer.r#type().map(AuthorizerType::as_str));
    set_str(&mut attributes, "authorizer_uri", authorizer.authorizer_uri());
    set_str(
        &mut attributes,
        "authorizer_credentials",
        authorizer.authorizer_credentials(),
    );
    set_str(&mut attributes, "identity_source", authorizer.identity_source());
    set_str(
        &mut attributes,
        "identity_validation_expression",
        authorizer.identity_validation_expression(),
    );
    // AWS omits a TTL of zero
    set_int(
        &mut attributes,
        "authorizer_result_ttl_in_seconds",
        Some(authorizer.authorizer_result_ttl_in_seconds().unwrap_or(0)),
    );
    if !authorizer.provider_arns().is_empty() {
        attributes.insert(
            "provider_arns".to_string(),
            Value::from_strings(authorizer.provider_arns()),
        );
    }
    if let Some(authorizer_id) = authorizer.id() {
        attributes.insert(
            "arn".to_string(),
            Value::String(authorizer_arn(conn, rest_api_id, authorizer_id)),
        );
    }
    attributes
}

async fn create_authorizer(conn: &AwsClients, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = &resource.attributes;
    let rest_api_id = require_str(id, attrs, "rest_api_id")?;
    let provider_arns = attrs.get_strings("provider_arns");
    let ttl = attrs
        .get_int("authorizer_result_ttl_in_seconds")
        .map(|ttl| to_i32(id, "authorizer_result_ttl_in_seconds", ttl))
        .transpose()?;

    debug!("API Gateway CreateAuthorizer on {}", rest_api_id);
    let output = conn
        .apigateway
        .create_authorizer()
        .rest_api_id(rest_api_id)
        .name(require_str(id, attrs, "name")?)
        .set_type(attrs.get_str("type").map(AuthorizerType::from))
        .set_authorizer_uri(attrs.get_str("authorizer_uri").map(str::to_string))
        .set_authorizer_credentials(attrs.get_str("authorizer_credentials").map(str::to_string))
        .set_authorizer_result_ttl_in_seconds(ttl)
        .set_identity_source(attrs.get_str("identity_source").map(str::to_string))
        .set_identity_validation_expression(
            attrs.get_str("identity_validation_expression").map(str::to_string),
        )
        .set_provider_arns((!provider_arns.is_empty()).then_some(provider_arns))
        .send()
        .await
        .map_err(|e| sdk_error("Failed to create API Gateway authorizer", id, e))?;
    let authorizer_id = output
        .id()
        .ok_or_else(|| missing_field(id, "CreateAuthorizer", "id"))?;
    let identifier = format!("{}/{}", rest_api_id, authorizer_id);
    info!("created API Gateway authorizer {} ({})", identifier, id);

    read_authorizer(conn, id, &identifier).await
}

async fn read_authorizer(
    conn: &AwsClients,
    id: &ResourceId,
    identifier: &str,
) -> ProviderResult<State> {
    let (rest_api_id, authorizer_id) = parse_identifier(id, identifier)?;
    debug!("API Gateway GetAuthorizer {}", identifier);
    let authorizer = match conn
        .apigateway
        .get_authorizer()
        .rest_api_id(rest_api_id)
        .authorizer_id(authorizer_id)
        .send()
        .await
    {
        Ok(output) => output,
        Err(err) if is_not_found(&err, NOT_FOUND_CODES) => {
            warn!("API Gateway authorizer {} not found, removing {} from state", identifier, id);
            return Ok(State::not_found(id.clone()));
        }
        Err(err) => return Err(sdk_error("Failed to read API Gateway authorizer", id, err)),
    };

    Ok(
        State::existing(id.clone(), flatten_authorizer(conn, rest_api_id, &authorizer))
            .with_identifier(identifier),
    )
}

async fn update_authorizer(
    conn: &AwsClients,
    id: &ResourceId,
    identifier: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let (rest_api_id, authorizer_id) = parse_identifier(id, identifier)?;
    let operations = patch_operations(&from.attributes, &to.attributes);
    if !operations.is_empty() {
        debug!(
            "API Gateway UpdateAuthorizer {} with {} operations",
            identifier,
            operations.len()
        );
        conn.apigateway
            .update_authorizer()
            .rest_api_id(rest_api_id)
            .authorizer_id(authorizer_id)
            .set_patch_operations(Some(operations))
            .send()
            .await
            .map_err(|e| sdk_error("Failed to update API Gateway authorizer", id, e))?;
    }
    read_authorizer(conn, id, identifier).await
}

async fn delete_authorizer(
    conn: &AwsClients,
    id: &ResourceId,
    identifier: &str,
) -> ProviderResult<()> {
    let (rest_api_id, authorizer_id) = parse_identifier(id, identifier)?;
    debug!("API Gateway DeleteAuthorizer {}", identifier);
    match conn
        .apigateway
        .delete_authorizer()
        .rest_api_id(rest_api_id)
        .authorizer_id(authorizer_id)
        .send()
        .await
    {
        Ok(_) => {
            info!("deleted API Gateway authorizer {} ({})", identifier, id);
            Ok(())
        }
        Err(err) if is_not_found(&err, NOT_FOUND_CODES) => Ok(()),
        Err(err) => Err(sdk_error("Failed to delete API Gateway authorizer", id, err)),
    }
}
