use crate::{inventory, ComputeProvider};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use relocate_common::{HealthStatus, ImageId, ImageStatus, InstanceId};
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Provider call a fault can be attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockOperation {
    Describe,
    Stop,
    CreateImage,
    CopyImage,
    Launch,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    /// The request is rejected with this message.
    Reject(String),
    /// The request is accepted but the resource never settles.
    Stall,
    /// The resource settles into a failed state (image `failed`, instance `impaired`).
    Fail,
    /// The instance is terminated instead of reaching its target state.
    Terminate,
}

#[derive(Clone, Debug)]
pub struct LaunchRecord {
    pub region: String,
    pub image_id: ImageId,
    pub instance_type: String,
    pub monitoring: bool,
}

#[derive(Clone, Debug)]
struct Settling<T> {
    target: T,
    remaining: u32,
}

impl<T: Clone> Settling<T> {
    fn new(target: T, remaining: u32) -> Self {
        Self { target, remaining }
    }

    // Some(target) once enough observations were made.
    fn observe(&mut self) -> Option<T> {
        if self.remaining == 0 {
            Some(self.target.clone())
        } else {
            self.remaining -= 1;
            None
        }
    }
}

struct MockInstance {
    region: String,
    instance_id: InstanceId,
    instance_type: String,
    state: String,
    settling: Option<Settling<String>>,
    health: Option<HealthStatus>,
    health_settling: Option<Settling<HealthStatus>>,
}

impl MockInstance {
    fn observe(&mut self) {
        if let Some(target) = self.settling.as_mut().and_then(|s| s.observe()) {
            self.state = target;
            self.settling = None;
        }
        if let Some(target) = self.health_settling.as_mut().and_then(|s| s.observe()) {
            self.health = Some(target);
            self.health_settling = None;
        }
    }
}

struct MockImage {
    region: String,
    image_id: ImageId,
    name: String,
    // Source instance the image was made from; copies keep it.
    origin: InstanceId,
    status: ImageStatus,
    settling: Option<Settling<ImageStatus>>,
}

impl MockImage {
    fn observe(&mut self) {
        if let Some(target) = self.settling.as_mut().and_then(|s| s.observe()) {
            self.status = target;
            self.settling = None;
        }
    }
}

#[derive(Default)]
struct CloudState {
    instances: Vec<MockInstance>,
    images: Vec<MockImage>,
    faults: Vec<(MockOperation, InstanceId, Fault)>,
    launches: Vec<LaunchRecord>,
    stop_requests: Vec<InstanceId>,
    next_id: u64,
    settle_polls: u32,
}

impl CloudState {
    fn fault(&self, operation: MockOperation, origin: &InstanceId) -> Option<Fault> {
        self.faults
            .iter()
            .find(|(op, id, _)| *op == operation && id == origin)
            .map(|(_, _, fault)| fault.clone())
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn instance_mut(&mut self, region: &str, instance_id: &InstanceId) -> Option<&mut MockInstance> {
        self.instances
            .iter_mut()
            .find(|i| i.region == region && &i.instance_id == instance_id)
    }

    fn image_mut(&mut self, region: &str, image_id: &ImageId) -> Option<&mut MockImage> {
        self.images
            .iter_mut()
            .find(|i| i.region == region && &i.image_id == image_id)
    }

    fn image_settling(&self, fault: Option<&Fault>) -> Option<Settling<ImageStatus>> {
        match fault {
            Some(Fault::Stall) => None,
            Some(Fault::Fail) => Some(Settling::new(
                ImageStatus::Failed("failed".to_string()),
                self.settle_polls,
            )),
            _ => Some(Settling::new(ImageStatus::Available, self.settle_polls)),
        }
    }
}

fn reject(fault: Option<&Fault>) -> Result<()> {
    match fault {
        Some(Fault::Reject(message)) => Err(anyhow!("{}", message)),
        _ => Ok(()),
    }
}

/// In-memory control plane shared by every region it hands out providers for.
///
/// Asynchronous operations settle after `settle_polls` observations, so the
/// orchestrator's waiters see the same pending -> ready sequence as against a
/// real cloud. Faults are keyed by the *source* instance id; images and copies
/// remember the instance they originate from.
#[derive(Clone, Default)]
pub struct MockCloud {
    state: Arc<Mutex<CloudState>>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settle_polls(self, polls: u32) -> Self {
        self.lock().settle_polls = polls;
        self
    }

    fn lock(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an instance. `stopping` and `pending` instances settle into
    /// `stopped` and `running` like any other transition.
    pub fn add_instance(&self, region: &str, instance_id: &str, instance_type: &str, state: &str) {
        let mut cloud = self.lock();
        let settling = match state {
            "stopping" => Some(Settling::new("stopped".to_string(), cloud.settle_polls)),
            "pending" => Some(Settling::new("running".to_string(), cloud.settle_polls)),
            _ => None,
        };
        cloud.instances.push(MockInstance {
            region: region.to_string(),
            instance_id: InstanceId::new(instance_id),
            instance_type: instance_type.to_string(),
            state: state.to_string(),
            settling,
            health: Some(HealthStatus::Ok),
            health_settling: None,
        });
    }

    pub fn inject_fault(&self, operation: MockOperation, instance_id: &str, fault: Fault) {
        self.lock()
            .faults
            .push((operation, InstanceId::new(instance_id), fault));
    }

    pub fn provider(&self, region: &str) -> MockProvider {
        MockProvider {
            cloud: self.clone(),
            region: region.to_string(),
        }
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.lock().launches.clone()
    }

    pub fn stop_requests(&self, instance_id: &str) -> usize {
        self.lock()
            .stop_requests
            .iter()
            .filter(|id| id.as_str() == instance_id)
            .count()
    }

    /// (image id, name) of every image registered in `region`.
    pub fn images_in(&self, region: &str) -> Vec<(ImageId, String)> {
        self.lock()
            .images
            .iter()
            .filter(|i| i.region == region)
            .map(|i| (i.image_id.clone(), i.name.clone()))
            .collect()
    }

    pub fn instance_state(&self, region: &str, instance_id: &str) -> Option<String> {
        self.lock()
            .instances
            .iter()
            .find(|i| i.region == region && i.instance_id.as_str() == instance_id)
            .map(|i| i.state.clone())
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let cloud = Self::new().with_settle_polls(fixture.settle_polls);
        for i in &fixture.instances {
            cloud.add_instance(&i.region, &i.instance_id, &i.instance_type, &i.state);
        }
        for f in fixture.faults {
            cloud.inject_fault(f.operation, &f.instance_id, f.fault);
        }
        cloud
    }

    pub fn load_fixture(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading mock fixture {}", path.display()))?;
        let fixture: Fixture = serde_json::from_str(&raw)
            .with_context(|| format!("parsing mock fixture {}", path.display()))?;
        Ok(Self::from_fixture(fixture))
    }
}

/// JSON description of a mock cloud, used for dry runs of the CLI.
#[derive(Debug, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub settle_polls: u32,
    #[serde(default)]
    pub instances: Vec<FixtureInstance>,
    #[serde(default)]
    pub faults: Vec<FixtureFault>,
}

#[derive(Debug, Deserialize)]
pub struct FixtureInstance {
    pub region: String,
    pub instance_id: String,
    pub instance_type: String,
    #[serde(default = "default_fixture_state")]
    pub state: String,
}

fn default_fixture_state() -> String {
    "running".to_string()
}

#[derive(Debug, Deserialize)]
pub struct FixtureFault {
    pub operation: MockOperation,
    pub instance_id: String,
    pub fault: Fault,
}

pub struct MockProvider {
    cloud: MockCloud,
    region: String,
}

#[async_trait]
impl ComputeProvider for MockProvider {
    fn region(&self) -> &str {
        &self.region
    }

    async fn describe_instance(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Vec<inventory::DiscoveredInstance>> {
        let mut state = self.cloud.lock();
        reject(state.fault(MockOperation::Describe, instance_id).as_ref())?;

        let found = state
            .instances
            .iter_mut()
            .filter(|i| i.region == self.region && &i.instance_id == instance_id)
            .map(|i| {
                i.observe();
                inventory::DiscoveredInstance {
                    instance_id: i.instance_id.clone(),
                    instance_type: i.instance_type.clone(),
                    state: i.state.clone(),
                }
            })
            .collect();
        Ok(found)
    }

    async fn stop_instance(&self, instance_id: &InstanceId) -> Result<()> {
        let mut state = self.cloud.lock();
        let fault = state.fault(MockOperation::Stop, instance_id);
        reject(fault.as_ref())?;
        let settle_polls = state.settle_polls;
        state.stop_requests.push(instance_id.clone());

        let region = self.region.clone();
        let instance = state.instance_mut(&region, instance_id).ok_or_else(|| {
            anyhow!(
                "InvalidInstanceID.NotFound: instance {} does not exist in {}",
                instance_id,
                region
            )
        })?;
        match instance.state.as_str() {
            "stopped" | "stopping" => Ok(()),
            "running" => {
                instance.state = "stopping".to_string();
                instance.settling = match fault {
                    Some(Fault::Stall) => None,
                    Some(Fault::Terminate) => {
                        Some(Settling::new("terminated".to_string(), settle_polls))
                    }
                    _ => Some(Settling::new("stopped".to_string(), settle_polls)),
                };
                Ok(())
            }
            other => Err(anyhow!(
                "IncorrectInstanceState: instance {} is {} and cannot be stopped",
                instance_id,
                other
            )),
        }
    }

    async fn create_image(&self, instance_id: &InstanceId, name: &str) -> Result<ImageId> {
        let mut state = self.cloud.lock();
        let fault = state.fault(MockOperation::CreateImage, instance_id);
        reject(fault.as_ref())?;

        if state.instance_mut(&self.region, instance_id).is_none() {
            return Err(anyhow!(
                "InvalidInstanceID.NotFound: instance {} does not exist in {}",
                instance_id,
                self.region
            ));
        }

        let image_id = ImageId::new(format!("ami-mock{:05}", state.next_id()));
        let settling = state.image_settling(fault.as_ref());
        state.images.push(MockImage {
            region: self.region.clone(),
            image_id: image_id.clone(),
            name: name.to_string(),
            origin: instance_id.clone(),
            status: ImageStatus::Pending,
            settling,
        });
        Ok(image_id)
    }

    async fn image_state(&self, image_id: &ImageId) -> Result<Option<ImageStatus>> {
        let mut state = self.cloud.lock();
        let region = self.region.clone();
        Ok(state.image_mut(&region, image_id).map(|image| {
            image.observe();
            image.status.clone()
        }))
    }

    async fn copy_image(
        &self,
        source_image_id: &ImageId,
        source_region: &str,
        _description: &str,
        name: &str,
    ) -> Result<ImageId> {
        let mut state = self.cloud.lock();
        let (origin, status) = state
            .image_mut(source_region, source_image_id)
            .map(|i| (i.origin.clone(), i.status.clone()))
            .ok_or_else(|| {
                anyhow!(
                    "InvalidAMIID.NotFound: image {} does not exist in {}",
                    source_image_id,
                    source_region
                )
            })?;
        if status != ImageStatus::Available {
            return Err(anyhow!(
                "IncorrectState: source image {} is not available",
                source_image_id
            ));
        }
        let fault = state.fault(MockOperation::CopyImage, &origin);
        reject(fault.as_ref())?;

        let image_id = ImageId::new(format!("ami-mock{:05}", state.next_id()));
        let settling = state.image_settling(fault.as_ref());
        state.images.push(MockImage {
            region: self.region.clone(),
            image_id: image_id.clone(),
            name: name.to_string(),
            origin,
            status: ImageStatus::Pending,
            settling,
        });
        Ok(image_id)
    }

    async fn launch_instance(
        &self,
        image_id: &ImageId,
        instance_type: &str,
        options: &inventory::LaunchOptions,
    ) -> Result<InstanceId> {
        let mut state = self.cloud.lock();
        state.launches.push(LaunchRecord {
            region: self.region.clone(),
            image_id: image_id.clone(),
            instance_type: instance_type.to_string(),
            monitoring: options.monitoring,
        });

        let region = self.region.clone();
        let (origin, status) = state
            .image_mut(&region, image_id)
            .map(|i| (i.origin.clone(), i.status.clone()))
            .ok_or_else(|| {
                anyhow!(
                    "InvalidAMIID.NotFound: image {} does not exist in {}",
                    image_id,
                    region
                )
            })?;
        if status != ImageStatus::Available {
            return Err(anyhow!("InvalidAMIID.Unavailable: image {} is not available", image_id));
        }
        let fault = state.fault(MockOperation::Launch, &origin);
        reject(fault.as_ref())?;

        let settle_polls = state.settle_polls;
        let instance_id = InstanceId::new(format!("i-mock{:05}", state.next_id()));
        let (target, health, health_settling) = match fault {
            Some(Fault::Stall) => ("running", Some(HealthStatus::Initializing), None),
            Some(Fault::Fail) => (
                "running",
                Some(HealthStatus::Initializing),
                Some(Settling::new(HealthStatus::Impaired, settle_polls)),
            ),
            // Terminated instances never report status checks.
            Some(Fault::Terminate) => ("terminated", None, None),
            _ => (
                "running",
                Some(HealthStatus::Initializing),
                Some(Settling::new(HealthStatus::Ok, settle_polls)),
            ),
        };
        state.instances.push(MockInstance {
            region,
            instance_id: instance_id.clone(),
            instance_type: instance_type.to_string(),
            state: "pending".to_string(),
            settling: Some(Settling::new(target.to_string(), settle_polls)),
            health,
            health_settling,
        });
        Ok(instance_id)
    }

    async fn instance_health(&self, instance_id: &InstanceId) -> Result<Option<HealthStatus>> {
        let mut state = self.cloud.lock();
        let region = self.region.clone();
        let instance = state.instance_mut(&region, instance_id).ok_or_else(|| {
            anyhow!(
                "InvalidInstanceID.NotFound: instance {} does not exist in {}",
                instance_id,
                region
            )
        })?;
        instance.observe();
        Ok(instance.health)
    }
}
