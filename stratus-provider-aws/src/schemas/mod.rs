//! AWS resource schema definitions

pub mod apigateway;
pub mod datasync;
pub mod efs;
pub mod elasticache;
pub mod fsx;
pub mod iotanalytics;
pub mod types;

use stratus_core::schema::ResourceSchema;

/// Returns all AWS resource schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    let mut schemas = Vec::new();
    schemas.extend(apigateway::schemas());
    schemas.extend(datasync::schemas());
    schemas.extend(efs::schemas());
    schemas.extend(elasticache::schemas());
    schemas.extend(fsx::schemas());
    schemas.extend(iotanalytics::schemas());
    schemas
}

/// Returns all AWS data source schemas
pub fn all_data_source_schemas() -> Vec<ResourceSchema> {
    vec![
        datasync::agent_data_source_schema(),
        efs::mount_target_data_source_schema(),
    ]
}
