use anyhow::anyhow;
use relocate_common::{
    HealthStatus, ImageId, ImageStatus, InstanceId, LifecycleState, MigrationError, RegionalImage,
    Result,
};
use relocate_providers::inventory::{DiscoveredInstance, LaunchOptions};
use relocate_providers::ComputeProvider;
use std::sync::Arc;
use tracing::info;

use crate::inspector;
use crate::waiter::{wait_until, Probe, WaitPolicy, Waits};

/// Region-scoped control-plane client with blocking semantics: every call
/// that starts an asynchronous operation returns only once that operation
/// reached its terminal success condition (or failed / timed out).
#[derive(Clone)]
pub struct RegionGateway {
    provider: Arc<dyn ComputeProvider>,
    waits: Waits,
}

impl RegionGateway {
    pub fn new(provider: Arc<dyn ComputeProvider>, waits: Waits) -> Self {
        Self { provider, waits }
    }

    pub fn region(&self) -> &str {
        self.provider.region()
    }

    pub async fn describe_instance(&self, instance_id: &InstanceId) -> Result<Vec<DiscoveredInstance>> {
        Ok(self.provider.describe_instance(instance_id).await?)
    }

    /// Request a stop and wait until the instance is observed `stopped`.
    pub async fn stop_instance(&self, instance_id: &InstanceId) -> Result<()> {
        self.provider.stop_instance(instance_id).await?;
        info!(instance_id = %instance_id, region = self.region(), "stop requested");
        self.wait_until_stopped(instance_id).await
    }

    pub async fn wait_until_stopped(&self, instance_id: &InstanceId) -> Result<()> {
        wait_until("instance_stopped", instance_id.as_str(), self.waits.stop, move || async move {
            let details = inspector::get_instance_details(instance_id, self).await?;
            Ok::<_, MigrationError>(match details.state {
                LifecycleState::Stopped => Probe::Ready(()),
                LifecycleState::ShuttingDown | LifecycleState::Terminated => {
                    Probe::Failed(details.state.to_string())
                }
                other => Probe::Pending(other.to_string()),
            })
        })
        .await
    }

    /// Wait for a `pending` instance to come up; it cannot be stopped before that.
    pub async fn wait_until_running(&self, instance_id: &InstanceId) -> Result<()> {
        wait_until("instance_running", instance_id.as_str(), self.waits.stop, move || async move {
            let details = inspector::get_instance_details(instance_id, self).await?;
            Ok::<_, MigrationError>(match details.state {
                LifecycleState::Running => Probe::Ready(()),
                LifecycleState::Pending => Probe::Pending(details.state.to_string()),
                other => Probe::Failed(other.to_string()),
            })
        })
        .await
    }

    /// Create an image of the instance and wait until it is available.
    pub async fn create_image(&self, instance_id: &InstanceId, name: &str) -> Result<RegionalImage> {
        let image_id = self.provider.create_image(instance_id, name).await?;
        info!(instance_id = %instance_id, image_id = %image_id, name, "image requested");
        self.wait_until_image_available(&image_id, self.waits.image)
            .await?;
        Ok(RegionalImage {
            region: self.region().to_string(),
            image_id,
        })
    }

    /// Copy `source` into this gateway's region and wait until the copy is available.
    pub async fn copy_image(
        &self,
        source: &RegionalImage,
        description: &str,
        name: &str,
    ) -> Result<RegionalImage> {
        if source.region == self.region() {
            return Err(MigrationError::Provider(anyhow!(
                "image {} is already in {}; refusing same-region copy",
                source.image_id,
                source.region
            )));
        }
        let image_id = self
            .provider
            .copy_image(&source.image_id, &source.region, description, name)
            .await?;
        info!(
            source_image = %source,
            image_id = %image_id,
            region = self.region(),
            "image copy requested"
        );
        self.wait_until_image_available(&image_id, self.waits.copy)
            .await?;
        Ok(RegionalImage {
            region: self.region().to_string(),
            image_id,
        })
    }

    async fn wait_until_image_available(
        &self,
        image_id: &ImageId,
        policy: WaitPolicy,
    ) -> Result<()> {
        wait_until("image_available", image_id.as_str(), policy, move || async move {
            Ok::<_, MigrationError>(match self.provider.image_state(image_id).await? {
                Some(ImageStatus::Available) => Probe::Ready(()),
                Some(ImageStatus::Failed(state)) => Probe::Failed(state),
                Some(ImageStatus::Pending) => Probe::Pending("pending".to_string()),
                None => Probe::Pending("not yet visible".to_string()),
            })
        })
        .await
    }

    /// Launch one instance (monitoring off) from an image that lives in this
    /// region, then wait until its status checks report `ok`.
    pub async fn launch_instance(
        &self,
        image: &RegionalImage,
        instance_type: &str,
    ) -> Result<InstanceId> {
        if image.region != self.region() {
            return Err(MigrationError::Provider(anyhow!(
                "image {} belongs to {} and cannot be launched in {}",
                image.image_id,
                image.region,
                self.region()
            )));
        }
        let options = LaunchOptions { monitoring: false };
        let instance_id = self
            .provider
            .launch_instance(&image.image_id, instance_type, &options)
            .await?;
        info!(
            instance_id = %instance_id,
            image_id = %image.image_id,
            instance_type,
            region = self.region(),
            "instance launched"
        );

        let launched = &instance_id;
        wait_until("instance_status_ok", launched.as_str(), self.waits.launch, move || async move {
            let health = self.provider.instance_health(launched).await?;
            if health == Some(HealthStatus::Ok) {
                return Ok::<_, MigrationError>(Probe::Ready(()));
            }
            // A launch that dies right away never reports status checks.
            let lifecycle = self
                .provider
                .describe_instance(launched)
                .await?
                .first()
                .and_then(|i| LifecycleState::parse(&i.state));
            Ok::<_, MigrationError>(match (lifecycle, health) {
                (Some(state @ (LifecycleState::ShuttingDown | LifecycleState::Terminated)), _) => {
                    Probe::Failed(state.to_string())
                }
                (_, Some(other)) => Probe::Pending(other.as_str().to_string()),
                (_, None) => Probe::Pending("no status yet".to_string()),
            })
        })
        .await?;
        Ok(instance_id)
    }
}
