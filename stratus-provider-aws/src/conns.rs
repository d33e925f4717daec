//! AWS API clients shared by every resource callback

use std::time::Duration;

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use log::info;

use crate::arn::{Arn, dns_suffix_for_partition, partition_for_region};
use crate::config::{ConfigError, ProviderConfig};
use crate::tags::TagSettings;
use stratus_core::mutexkv::MutexKv;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a service client from the shared SDK config, honoring an endpoint
/// override from the provider block
macro_rules! service_client {
    ($krate:ident, $sdk:expr, $endpoint:expr) => {{
        let mut builder = $krate::config::Builder::from($sdk);
        if let Some(url) = $endpoint {
            builder = builder.endpoint_url(url);
        }
        $krate::Client::from_conf(builder.build())
    }};
}

/// Connection metadata handed to every resource and data source
#[derive(Debug, Clone)]
pub struct AwsClients {
    pub region: String,
    pub partition: String,
    pub dns_suffix: String,
    pub tags: TagSettings,
    pub mutex_kv: MutexKv,
    pub apigateway: aws_sdk_apigateway::Client,
    pub datasync: aws_sdk_datasync::Client,
    pub efs: aws_sdk_efs::Client,
    pub elasticache: aws_sdk_elasticache::Client,
    pub fsx: aws_sdk_fsx::Client,
    pub iotanalytics: aws_sdk_iotanalytics::Client,
    /// Plain HTTP client for agent activation, which does not follow redirects
    pub http: reqwest::Client,
}

impl AwsClients {
    /// Load credentials and build every service client
    pub async fn from_config(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let region = config.resolve_region()?;
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(config.max_retries() + 1));
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        info!("configured AWS clients for region {}", region);
        Self::with_sdk_config(&sdk_config, config, region)
    }

    /// Build clients from an already loaded SDK config
    pub fn with_sdk_config(
        sdk_config: &SdkConfig,
        config: &ProviderConfig,
        region: String,
    ) -> Result<Self, ConfigError> {
        let partition = partition_for_region(&region).to_string();
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::Http(e.to_string()))?;

        Ok(Self {
            dns_suffix: dns_suffix_for_partition(&partition).to_string(),
            partition,
            region,
            tags: config.tag_settings(),
            mutex_kv: MutexKv::new(),
            apigateway: service_client!(aws_sdk_apigateway, sdk_config, config.endpoint("apigateway")),
            datasync: service_client!(aws_sdk_datasync, sdk_config, config.endpoint("datasync")),
            efs: service_client!(aws_sdk_efs, sdk_config, config.endpoint("efs")),
            elasticache: service_client!(aws_sdk_elasticache, sdk_config, config.endpoint("elasticache")),
            fsx: service_client!(aws_sdk_fsx, sdk_config, config.endpoint("fsx")),
            iotanalytics: service_client!(aws_sdk_iotanalytics, sdk_config, config.endpoint("iotanalytics")),
            http,
        })
    }

    /// ARN in this provider's partition and region
    pub fn arn(&self, service: &str, account_id: &str, resource: &str) -> Arn {
        Arn::new(&self.partition, service, &self.region, account_id, resource)
    }

    /// Service endpoint host name, e.g. `efs.us-east-1.amazonaws.com`
    pub fn regional_hostname(&self, prefix: &str) -> String {
        format!("{}.{}.{}", prefix, self.region, self.dns_suffix)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Clients that never reach AWS; for exercising code paths that fail or
    /// return before any request
    pub fn offline_clients(region: &str) -> AwsClients {
        let sdk_config = SdkConfig::builder()
            .region(Region::new(region.to_string()))
            .behavior_version(BehaviorVersion::latest())
            .build();
        AwsClients::with_sdk_config(&sdk_config, &ProviderConfig::default(), region.to_string())
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::offline_clients;

    #[test]
    fn partition_and_dns_suffix_follow_region() {
        let clients = offline_clients("cn-north-1");
        assert_eq!(clients.partition, "aws-cn");
        assert_eq!(clients.dns_suffix, "amazonaws.com.cn");
        assert_eq!(
            clients.arn("elasticfilesystem", "123456789012", "file-system/fs-1").to_string(),
            "arn:aws-cn:elasticfilesystem:cn-north-1:123456789012:file-system/fs-1"
        );
        assert_eq!(clients.regional_hostname("efs"), "efs.cn-north-1.amazonaws.com.cn");
    }
}
