use crate::{inventory, ComputeProvider};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::{InstanceType, RunInstancesMonitoringEnabled};
use aws_sdk_ec2::Client;
use relocate_common::{HealthStatus, ImageId, ImageStatus, InstanceId};
use tracing::debug;

pub struct Ec2Provider {
    client: Client,
    region: String,
}

impl Ec2Provider {
    /// Build a client for `region` from the default credential chain
    /// (environment, shared profile, instance role).
    pub async fn connect(region: &str) -> Self {
        let region = region.trim().to_string();
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .load()
            .await;
        Self {
            client: Client::new(&config),
            region,
        }
    }

    fn api_error<E, R>(&self, operation: &str, target: &str, err: SdkError<E, R>) -> anyhow::Error
    where
        E: std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        anyhow!(
            "EC2 {} {} in {} failed: {}",
            operation,
            target,
            self.region,
            DisplayErrorContext(&err)
        )
    }
}

// `InvalidInstanceID.NotFound`, `InvalidAMIID.NotFound`, ...
fn is_not_found<E: ProvideErrorMetadata, R>(err: &SdkError<E, R>) -> bool {
    err.as_service_error()
        .and_then(|e| e.code())
        .map(|code| code.ends_with(".NotFound"))
        .unwrap_or(false)
}

#[async_trait]
impl ComputeProvider for Ec2Provider {
    fn region(&self) -> &str {
        &self.region
    }

    async fn describe_instance(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Vec<inventory::DiscoveredInstance>> {
        let resp = match self
            .client
            .describe_instances()
            .instance_ids(instance_id.as_str())
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if is_not_found(&e) => return Ok(vec![]),
            Err(e) => return Err(self.api_error("DescribeInstances", instance_id.as_str(), e)),
        };

        let found = resp
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .map(|i| inventory::DiscoveredInstance {
                instance_id: InstanceId::new(i.instance_id().unwrap_or_default()),
                instance_type: i
                    .instance_type()
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_default(),
                state: i
                    .state()
                    .and_then(|s| s.name())
                    .map(|n| n.as_str().to_string())
                    .unwrap_or_default(),
            })
            .collect();
        Ok(found)
    }

    async fn stop_instance(&self, instance_id: &InstanceId) -> Result<()> {
        self.client
            .stop_instances()
            .instance_ids(instance_id.as_str())
            .send()
            .await
            .map_err(|e| self.api_error("StopInstances", instance_id.as_str(), e))?;
        debug!(instance_id = %instance_id, region = %self.region, "StopInstances accepted");
        Ok(())
    }

    async fn create_image(&self, instance_id: &InstanceId, name: &str) -> Result<ImageId> {
        let resp = self
            .client
            .create_image()
            .instance_id(instance_id.as_str())
            .name(name)
            .send()
            .await
            .map_err(|e| self.api_error("CreateImage", instance_id.as_str(), e))?;
        let image_id = resp
            .image_id()
            .ok_or_else(|| anyhow!("EC2 CreateImage returned no image id for {}", instance_id))?;
        Ok(ImageId::new(image_id))
    }

    async fn image_state(&self, image_id: &ImageId) -> Result<Option<ImageStatus>> {
        let resp = match self
            .client
            .describe_images()
            .image_ids(image_id.as_str())
            .send()
            .await
        {
            Ok(resp) => resp,
            // Freshly registered images can take a moment to become visible.
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(self.api_error("DescribeImages", image_id.as_str(), e)),
        };
        Ok(resp
            .images()
            .first()
            .and_then(|i| i.state())
            .map(|s| ImageStatus::parse(s.as_str())))
    }

    async fn copy_image(
        &self,
        source_image_id: &ImageId,
        source_region: &str,
        description: &str,
        name: &str,
    ) -> Result<ImageId> {
        let resp = self
            .client
            .copy_image()
            .source_image_id(source_image_id.as_str())
            .source_region(source_region)
            .description(description)
            .name(name)
            .send()
            .await
            .map_err(|e| self.api_error("CopyImage", source_image_id.as_str(), e))?;
        let image_id = resp.image_id().ok_or_else(|| {
            anyhow!("EC2 CopyImage returned no image id for {}", source_image_id)
        })?;
        Ok(ImageId::new(image_id))
    }

    async fn launch_instance(
        &self,
        image_id: &ImageId,
        instance_type: &str,
        options: &inventory::LaunchOptions,
    ) -> Result<InstanceId> {
        let resp = self
            .client
            .run_instances()
            .image_id(image_id.as_str())
            .instance_type(InstanceType::from(instance_type))
            .min_count(1)
            .max_count(1)
            .monitoring(
                RunInstancesMonitoringEnabled::builder()
                    .enabled(options.monitoring)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| self.api_error("RunInstances", image_id.as_str(), e))?;
        let instance_id = resp
            .instances()
            .first()
            .and_then(|i| i.instance_id())
            .ok_or_else(|| anyhow!("EC2 RunInstances returned no instance for {}", image_id))?;
        Ok(InstanceId::new(instance_id))
    }

    async fn instance_health(&self, instance_id: &InstanceId) -> Result<Option<HealthStatus>> {
        let resp = match self
            .client
            .describe_instance_status()
            .instance_ids(instance_id.as_str())
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => {
                return Err(self.api_error("DescribeInstanceStatus", instance_id.as_str(), e))
            }
        };
        Ok(resp
            .instance_statuses()
            .first()
            .and_then(|s| s.instance_status())
            .and_then(|s| s.status())
            .and_then(|s| HealthStatus::parse(s.as_str())))
    }
}
