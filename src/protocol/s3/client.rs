//! S3 client construction

use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::Client as AwsS3Client;

use crate::config::RelayConfig;

/// Connection settings for the S3 target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3Config {
    /// Region override; the default provider chain is used when unset
    pub region: Option<String>,

    /// Custom endpoint URL (MinIO, LocalStack, ...)
    pub endpoint: Option<String>,

    /// Use path-style addressing (required for most S3-compatible services)
    pub force_path_style: bool,
}

impl From<&RelayConfig> for S3Config {
    fn from(config: &RelayConfig) -> Self {
        Self {
            region: config.s3_region.clone(),
            endpoint: config.s3_endpoint.clone(),
            force_path_style: config.s3_force_path_style,
        }
    }
}

/// Build the AWS SDK S3 client from configuration
pub async fn build_client(config: &S3Config) -> AwsS3Client {
    let region_provider = if let Some(region_str) = &config.region {
        RegionProviderChain::first_try(Region::new(region_str.clone()))
    } else {
        RegionProviderChain::default_provider()
    };

    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .region(region_provider)
        .load()
        .await;

    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);

    if let Some(endpoint) = &config.endpoint {
        s3_config_builder = s3_config_builder.endpoint_url(endpoint);
    }

    if config.force_path_style {
        s3_config_builder = s3_config_builder.force_path_style(true);
    }

    AwsS3Client::from_conf(s3_config_builder.build())
}
