use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

mod error;
pub mod naming;

pub use error::{MigrationError, Result};

// --- Identifiers ---

/// Provider-issued instance identifier (e.g. `i-0258ceb7c8aed1e08`), scoped to a region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Provider-issued machine image identifier (e.g. `ami-0aab5b8c501dd81e0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An image id together with the region it is valid in.
/// Image ids are not portable: the same string means nothing in another region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionalImage {
    pub region: String,
    pub image_id: ImageId,
}

impl fmt::Display for RegionalImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.image_id, self.region)
    }
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

impl LifecycleState {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "stopping" => Some(Self::Stopping),
            "stopped" => Some(Self::Stopped),
            "shutting-down" => Some(Self::ShuttingDown),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image availability as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageStatus {
    Pending,
    Available,
    /// Terminal non-usable state; carries the raw provider state (`failed`, `error`, ...).
    Failed(String),
}

impl ImageStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Self::Available,
            "pending" | "transient" => Self::Pending,
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Instance status check summary (the reachability checks run after boot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Initializing,
    Impaired,
    InsufficientData,
    NotApplicable,
}

impl HealthStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" => Some(Self::Ok),
            "initializing" => Some(Self::Initializing),
            "impaired" => Some(Self::Impaired),
            "insufficient-data" => Some(Self::InsufficientData),
            "not-applicable" => Some(Self::NotApplicable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Initializing => "initializing",
            Self::Impaired => "impaired",
            Self::InsufficientData => "insufficient-data",
            Self::NotApplicable => "not-applicable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStep {
    Stop,
    Image,
    Copy,
    Launch,
}

impl MigrationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Image => "image",
            Self::Copy => "copy",
            Self::Launch => "launch",
        }
    }

    /// Action type used in the action log.
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::Stop => "STOP_INSTANCE",
            Self::Image => "CREATE_IMAGE",
            Self::Copy => "COPY_IMAGE",
            Self::Launch => "LAUNCH_INSTANCE",
        }
    }
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of one instance in the migration pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    Running,  // Source observed running (or pending)
    Stopping, // Stop requested, waiting for `stopped`
    Stopped,
    Imaging,
    SourceImageReady,
    Copying,
    DestinationImageReady,
    Launching,
    Launched, // Destination instance passed its status checks
    Failed,
}

impl MigrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Imaging => "imaging",
            Self::SourceImageReady => "source_image_ready",
            Self::Copying => "copying",
            Self::DestinationImageReady => "destination_image_ready",
            Self::Launching => "launching",
            Self::Launched => "launched",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Launched | Self::Failed)
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Entities ---

/// Read-only snapshot of an instance, valid for a single driver invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDetails {
    pub instance_type: String,
    pub state: LifecycleState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: MigrationState,
    pub to: MigrationState,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Terminal result for one instance of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOutcome {
    pub instance_id: InstanceId,
    pub success: bool,
    pub new_instance_id: Option<InstanceId>,
    pub error_message: Option<String>,

    // Audit trail
    pub failed_step: Option<MigrationStep>,
    pub final_state: Option<MigrationState>,
    pub instance_type: Option<String>,
    pub source_image: Option<RegionalImage>,
    pub destination_image: Option<RegionalImage>,
    #[serde(default)]
    pub transitions: Vec<StateTransition>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl MigrationOutcome {
    /// One-line human summary, printed by the CLI after the batch.
    pub fn summary_line(&self) -> String {
        match (&self.new_instance_id, &self.error_message) {
            (Some(new_id), _) if self.success => {
                let image = self
                    .destination_image
                    .as_ref()
                    .map(|i| format!(" from {}", i))
                    .unwrap_or_default();
                format!("{}: migrated -> {}{}", self.instance_id, new_id, image)
            }
            (_, message) => {
                let step = self
                    .failed_step
                    .map(|s| format!(" at {}", s))
                    .unwrap_or_default();
                format!(
                    "{}: FAILED{}: {}",
                    self.instance_id,
                    step,
                    message.as_deref().unwrap_or("unknown error")
                )
            }
        }
    }
}
