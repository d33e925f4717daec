//! DataSync agents
//!
//! An agent is activated with a key the agent VM hands out over plain HTTP.
//! When no `activation_key` is configured the key is fetched from
//! `ip_address`: the agent answers with a redirect whose `Location` carries
//! the key in its `activationKey` query parameter.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_datasync::operation::describe_agent::DescribeAgentOutput;
use log::{debug, info, warn};
use reqwest::Url;
use stratus_core::provider::{BoxFuture, ProviderError, ProviderResult};
use stratus_core::registry::ResourceDefinition;
use stratus_core::resource::{AttributeMap, Resource, ResourceId, State, Value};
use stratus_core::schema::ResourceSchema;
use stratus_core::waiter::{RefreshResult, StateChangeConf, retry_when};

use super::{create_tags, is_not_found, read_tags, update_tags_between};
use crate::awserr::sdk_error;
use crate::conns::AwsClients;
use crate::resources::{missing_field, set_str};
use crate::schemas;

const CREATE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const ACTIVATION_RETRY_INTERVAL: Duration = Duration::from_secs(10);

const STATUS_ONLINE: &str = "ONLINE";
const STATUS_OFFLINE: &str = "OFFLINE";

pub struct Agent;

impl ResourceDefinition<AwsClients> for Agent {
    fn name(&self) -> &'static str {
        "datasync.agent"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::datasync::agent_schema()
    }

    fn create<'a>(
        &'a self,
        conn: &'a AwsClients,
        resource: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(create_agent(conn, resource))
    }

    fn read<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(read_agent(conn, id, identifier))
    }

    fn update<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(update_agent(conn, id, identifier, from, to))
    }

    fn delete<'a>(
        &'a self,
        conn: &'a AwsClients,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(delete_agent(conn, id, identifier))
    }
}

/// URL the agent answers with its activation redirect
fn activation_url(
    ip_address: &str,
    region: &str,
    private_link_endpoint: Option<&str>,
) -> Result<Url, String> {
    let mut url = Url::parse(&format!("http://{}/", ip_address)).map_err(|e| e.to_string())?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("gatewayType", "SYNC")
            .append_pair("activationRegion", region);
        if let Some(endpoint) = private_link_endpoint {
            query
                .append_pair("privateLinkEndpoint", endpoint)
                .append_pair("endpointType", "PRIVATE_LINK");
        }
    }
    Ok(url)
}

/// `activationKey` query parameter of a redirect location
fn activation_key_from_location(location: &str) -> Option<String> {
    Url::parse(location)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == "activationKey")
        .map(|(_, v)| v.into_owned())
        .filter(|key| !key.is_empty())
}

async fn fetch_activation_key(
    conn: &AwsClients,
    id: &ResourceId,
    ip_address: &str,
    private_link_endpoint: Option<&str>,
) -> ProviderResult<String> {
    let url = activation_url(ip_address, &conn.region, private_link_endpoint).map_err(|e| {
        ProviderError::new(format!("invalid agent address {}: {}", ip_address, e))
            .for_resource(id.clone())
    })?;

    debug!("requesting DataSync activation key from {}", url);
    let response = retry_when(
        CREATE_TIMEOUT,
        ACTIVATION_RETRY_INTERVAL,
        || conn.http.get(url.clone()).send(),
        |e: &reqwest::Error| e.is_connect() || e.is_timeout(),
    )
    .await
    .map_err(|e| {
        ProviderError::new(format!("Failed to retrieve activation key from {}: {}", ip_address, e))
            .for_resource(id.clone())
            .with_cause(e)
    })?;

    let status = response.status();
    if !status.is_redirection() {
        return Err(ProviderError::new(format!(
            "agent at {} answered {} instead of an activation redirect",
            ip_address, status
        ))
        .for_resource(id.clone()));
    }
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .and_then(activation_key_from_location)
        .ok_or_else(|| {
            ProviderError::new(format!("agent at {} returned no activation key", ip_address))
                .for_resource(id.clone())
        })
}

pub(crate) async fn find_agent(
    conn: &AwsClients,
    id: &ResourceId,
    arn: &str,
) -> ProviderResult<Option<DescribeAgentOutput>> {
    debug!("DataSync DescribeAgent {}", arn);
    match conn.datasync.describe_agent().agent_arn(arn).send().await {
        Ok(output) => Ok(Some(output)),
        Err(err) if is_not_found(&err) => Ok(None),
        Err(err) => Err(sdk_error("Failed to read DataSync agent", id, err)),
    }
}

async fn status_agent(conn: &AwsClients, id: &ResourceId, arn: &str) -> RefreshResult<()> {
    Ok(find_agent(conn, id, arn).await?.map(|agent| {
        let status = agent.status().map(|s| s.as_str().to_string()).unwrap_or_default();
        ((), status)
    }))
}

/// Attributes shared by the agent resource and data source
pub(crate) fn flatten_agent(agent: &DescribeAgentOutput) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    set_str(&mut attributes, "arn", agent.agent_arn());
    set_str(&mut attributes, "name", agent.name());
    let link = agent.private_link_config();
    set_str(
        &mut attributes,
        "private_link_endpoint",
        link.and_then(|l| l.private_link_endpoint()),
    );
    set_str(&mut attributes, "vpc_endpoint_id", link.and_then(|l| l.vpc_endpoint_id()));
    attributes.insert(
        "subnet_arns".to_string(),
        Value::from_strings(link.map(|l| l.subnet_arns()).unwrap_or_default()),
    );
    attributes.insert(
        "security_group_arns".to_string(),
        Value::from_strings(link.map(|l| l.security_group_arns()).unwrap_or_default()),
    );
    attributes
}

async fn create_agent(conn: &AwsClients, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = &resource.attributes;

    let activation_key = match (attrs.get_str("activation_key"), attrs.get_str("ip_address")) {
        (Some(key), _) => key.to_string(),
        (None, Some(ip)) => {
            fetch_activation_key(conn, id, ip, attrs.get_str("private_link_endpoint")).await?
        }
        (None, None) => {
            return Err(ProviderError::new("one of activation_key or ip_address is required")
                .for_resource(id.clone()));
        }
    };

    let subnet_arns = attrs.get_strings("subnet_arns");
    let security_group_arns = attrs.get_strings("security_group_arns");
    debug!("DataSync CreateAgent for {}", id);
    let output = conn
        .datasync
        .create_agent()
        .activation_key(activation_key)
        .set_agent_name(attrs.get_str("name").map(str::to_string))
        .set_vpc_endpoint_id(attrs.get_str("vpc_endpoint_id").map(str::to_string))
        .set_subnet_arns((!subnet_arns.is_empty()).then_some(subnet_arns))
        .set_security_group_arns((!security_group_arns.is_empty()).then_some(security_group_arns))
        .set_tags(create_tags(conn, id, attrs.get("tags"))?)
        .send()
        .await
        .map_err(|e| sdk_error("Failed to create DataSync agent", id, e))?;
    let arn = output
        .agent_arn()
        .ok_or_else(|| missing_field(id, "CreateAgent", "AgentArn"))?
        .to_string();

    StateChangeConf::new(&[STATUS_OFFLINE], &[STATUS_ONLINE], CREATE_TIMEOUT)
        .with_delay(Duration::from_secs(5))
        .with_min_timeout(Duration::from_secs(10))
        .wait(|| status_agent(conn, id, &arn))
        .await?;
    info!("created DataSync agent {} ({})", arn, id);

    read_agent(conn, id, &arn).await
}

async fn read_agent(conn: &AwsClients, id: &ResourceId, arn: &str) -> ProviderResult<State> {
    let Some(agent) = find_agent(conn, id, arn).await? else {
        warn!("DataSync agent {} not found, removing {} from state", arn, id);
        return Ok(State::not_found(id.clone()));
    };
    let mut attributes = flatten_agent(&agent);
    read_tags(conn, id, arn, &mut attributes).await?;
    Ok(State::existing(id.clone(), attributes).with_identifier(arn))
}

async fn update_agent(
    conn: &AwsClients,
    id: &ResourceId,
    arn: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    if let Some(name) = to.attributes.get_str("name") {
        if from.attributes.get_str("name") != Some(name) {
            debug!("DataSync UpdateAgent {}", arn);
            conn.datasync
                .update_agent()
                .agent_arn(arn)
                .name(name)
                .send()
                .await
                .map_err(|e| sdk_error("Failed to update DataSync agent", id, e))?;
        }
    }
    update_tags_between(conn, id, arn, &from.attributes, &to.attributes).await?;
    read_agent(conn, id, arn).await
}

async fn delete_agent(conn: &AwsClients, id: &ResourceId, arn: &str) -> ProviderResult<()> {
    debug!("DataSync DeleteAgent {}", arn);
    match conn.datasync.delete_agent().agent_arn(arn).send().await {
        Ok(_) => {
            info!("deleted DataSync agent {} ({})", arn, id);
            Ok(())
        }
        Err(err) if is_not_found(&err) => Ok(()),
        Err(err) => Err(sdk_error("Failed to delete DataSync agent", id, err)),
    }
}
