//! DataSync agent lookup by ARN or name

use aws_sdk_datasync::types::{AgentListEntry, EndpointType};
use log::debug;
use stratus_core::provider::{BoxFuture, ProviderError, ProviderResult};
use stratus_core::registry::DataSourceDefinition;
use stratus_core::resource::{AttributeMap, Resource, ResourceId, State};
use stratus_core::schema::ResourceSchema;

use super::lookup_error;
use crate::awserr::sdk_error;
use crate::conns::AwsClients;
use crate::resources::datasync::agent::{find_agent, flatten_agent};
use crate::resources::set_str;
use crate::schemas;

pub struct Agent;

impl DataSourceDefinition<AwsClients> for Agent {
    fn name(&self) -> &'static str {
        "datasync.agent"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::datasync::agent_data_source_schema()
    }

    fn read<'a>(
        &'a self,
        conn: &'a AwsClients,
        config: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(read_agent(conn, config))
    }
}

/// ARN of the single listed agent named `name`
fn agent_arn_by_name(id: &ResourceId, agents: &[AgentListEntry], name: &str) -> ProviderResult<String> {
    let matches: Vec<&str> = agents
        .iter()
        .filter(|a| a.name() == Some(name))
        .filter_map(AgentListEntry::agent_arn)
        .collect();
    match matches.as_slice() {
        [arn] => Ok(arn.to_string()),
        _ => Err(lookup_error(id, "DataSync agent", matches.len())),
    }
}

async fn read_agent(conn: &AwsClients, config: &Resource) -> ProviderResult<State> {
    let id = &config.id;
    let attrs = &config.attributes;

    let arn = match (attrs.get_str("arn"), attrs.get_str("name")) {
        (Some(arn), _) => arn.to_string(),
        (None, Some(name)) => {
            debug!("DataSync ListAgents looking for {}", name);
            let agents: Vec<AgentListEntry> = conn
                .datasync
                .list_agents()
                .into_paginator()
                .items()
                .send()
                .try_collect()
                .await
                .map_err(|e| sdk_error("Failed to list DataSync agents", id, e))?;
            agent_arn_by_name(id, &agents, name)?
        }
        (None, None) => {
            return Err(ProviderError::new("one of arn or name is required").for_resource(id.clone()));
        }
    };

    let agent = find_agent(conn, id, &arn)
        .await?
        .ok_or_else(|| lookup_error(id, "DataSync agent", 0))?;
    let mut attributes = flatten_agent(&agent);
    set_str(
        &mut attributes,
        "status",
        agent.status().map(|s| s.as_str()),
    );
    set_str(
        &mut attributes,
        "endpoint_type",
        agent.endpoint_type().map(EndpointType::as_str),
    );

    Ok(State::existing(id.clone(), attributes).with_identifier(arn))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, n: u32) -> AgentListEntry {
        AgentListEntry::builder()
            .name(name)
            .agent_arn(format!("arn:aws:datasync:us-east-1:123456789012:agent/agent-{}", n))
            .build()
    }

    #[test]
    fn name_must_match_exactly_one_agent() {
        let id = ResourceId::new("datasync.agent", "edge");
        let agents = vec![entry("edge", 1), entry("core", 2), entry("dup", 3), entry("dup", 4)];

        assert_eq!(
            agent_arn_by_name(&id, &agents, "core").unwrap(),
            "arn:aws:datasync:us-east-1:123456789012:agent/agent-2"
        );
        assert!(agent_arn_by_name(&id, &agents, "missing").is_err());
        let err = agent_arn_by_name(&id, &agents, "dup").unwrap_err();
        assert!(err.message.starts_with("2 DataSync agents matched"));
    }
}
