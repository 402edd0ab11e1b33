use anyhow::Result;
use async_trait::async_trait;
use relocate_common::{HealthStatus, ImageId, ImageStatus, InstanceId};

/// Raw, region-bound access to a compute control plane.
///
/// Every method issues a single request and returns as soon as the provider
/// acknowledged it. Waiting for the asynchronous operation to settle is the
/// caller's job (see the orchestrator's `gateway` module).
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Region this client talks to (e.g. `eu-west-1`).
    fn region(&self) -> &str;

    /// All instances matching `instance_id` in this region.
    /// An unknown id yields an empty list rather than an error.
    async fn describe_instance(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Vec<inventory::DiscoveredInstance>>;

    async fn stop_instance(&self, instance_id: &InstanceId) -> Result<()>;

    /// Request a machine image of the instance. Returns the new image id.
    async fn create_image(&self, instance_id: &InstanceId, name: &str) -> Result<ImageId>;

    // None while the provider does not know the image yet (eventual consistency).
    async fn image_state(&self, image_id: &ImageId) -> Result<Option<ImageStatus>>;

    /// Copy an image from `source_region` into this provider's region.
    async fn copy_image(
        &self,
        source_image_id: &ImageId,
        source_region: &str,
        description: &str,
        name: &str,
    ) -> Result<ImageId>;

    /// Launch exactly one instance from `image_id`. Returns the new instance id.
    async fn launch_instance(
        &self,
        image_id: &ImageId,
        instance_type: &str,
        options: &inventory::LaunchOptions,
    ) -> Result<InstanceId>;

    // None until the provider starts reporting status checks for the instance.
    async fn instance_health(&self, instance_id: &InstanceId) -> Result<Option<HealthStatus>>;
}

pub mod inventory {
    use relocate_common::InstanceId;

    #[derive(Clone, Debug)]
    pub struct DiscoveredInstance {
        pub instance_id: InstanceId,
        pub instance_type: String,
        pub state: String, // raw provider state name
    }

    #[derive(Clone, Debug, Default)]
    pub struct LaunchOptions {
        pub monitoring: bool,
    }
}

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "ec2")]
pub mod ec2;
