//! Data source definitions

pub mod datasync_agent;
pub mod efs_mount_target;

use stratus_core::provider::ProviderError;
use stratus_core::registry::{Registry, RegistryError};
use stratus_core::resource::ResourceId;

use crate::conns::AwsClients;

/// Register every data source
pub fn register_all(registry: &mut Registry<AwsClients>) -> Result<(), RegistryError> {
    registry.register_data_source(Box::new(datasync_agent::Agent))?;
    registry.register_data_source(Box::new(efs_mount_target::MountTarget))?;
    Ok(())
}

/// Lookup error for a data source whose query matched nothing or too much
pub(crate) fn lookup_error(id: &ResourceId, what: &str, matches: usize) -> ProviderError {
    let message = if matches == 0 {
        format!("no matching {} found", what)
    } else {
        format!(
            "{} {}s matched; change the search criteria to match exactly one",
            matches, what
        )
    };
    ProviderError::new(message).for_resource(id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_all_registers_each_data_source() {
        let mut registry = Registry::new();
        register_all(&mut registry).unwrap();
        assert_eq!(registry.data_source_names(), vec!["datasync.agent", "efs.mount_target"]);
    }

    #[test]
    fn lookup_error_messages() {
        let id = ResourceId::new("efs.mount_target", "lookup");
        assert_eq!(lookup_error(&id, "EFS mount target", 0).message, "no matching EFS mount target found");
        assert!(lookup_error(&id, "EFS mount target", 3).message.starts_with("3 EFS mount targets matched"));
    }
}
