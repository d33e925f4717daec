//! ARN parsing and construction, plus partition lookup by region

use std::fmt;
use std::str::FromStr;

/// Amazon Resource Name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArnError {
    #[error("arn: invalid prefix in '{0}'")]
    InvalidPrefix(String),

    #[error("arn: not enough sections in '{0}'")]
    NotEnoughSections(String),

    #[error("arn: missing {section} in '{arn}'")]
    MissingSection { section: &'static str, arn: String },
}

impl Arn {
    pub fn new(
        partition: impl Into<String>,
        service: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            service: service.into(),
            region: region.into(),
            account_id: account_id.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

impl FromStr for Arn {
    type Err = ArnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix("arn:") else {
            return Err(ArnError::InvalidPrefix(s.to_string()));
        };
        // The resource part may itself contain colons
        let sections: Vec<&str> = rest.splitn(5, ':').collect();
        if sections.len() != 5 {
            return Err(ArnError::NotEnoughSections(s.to_string()));
        }
        for (section, value) in [("partition", sections[0]), ("service", sections[1]), ("resource", sections[4])] {
            if value.is_empty() {
                return Err(ArnError::MissingSection {
                    section,
                    arn: s.to_string(),
                });
            }
        }
        Ok(Arn::new(
            sections[0],
            sections[1],
            sections[2],
            sections[3],
            sections[4],
        ))
    }
}

/// Whether `s` parses as an ARN
pub fn is_arn(s: &str) -> bool {
    s.parse::<Arn>().is_ok()
}

/// Partition a region belongs to
pub fn partition_for_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else if region.starts_with("us-isob-") {
        "aws-iso-b"
    } else if region.starts_with("us-iso-") {
        "aws-iso"
    } else {
        "aws"
    }
}

/// DNS suffix of service endpoints in a partition
pub fn dns_suffix_for_partition(partition: &str) -> &'static str {
    match partition {
        "aws-cn" => "amazonaws.com.cn",
        "aws-iso" => "c2s.ic.gov",
        "aws-iso-b" => "sc2s.sgov.gov",
        _ => "amazonaws.com",
    }
}
