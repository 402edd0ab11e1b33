use thiserror::Error;

pub type Result<T> = std::result::Result<T, MigrationError>;

#[derive(Debug, Error)]
pub enum MigrationError {
    /// The identifier resolved to zero or several instances.
    #[error("instance {instance_id} not found in {region} ({matches} matches)")]
    NotFound {
        instance_id: String,
        region: String,
        matches: usize,
    },

    /// A wait-until-terminal-state call exceeded its bound.
    #[error("timed out after {waited_ms}ms waiting for {operation} on {resource}")]
    OperationTimeout {
        operation: &'static str,
        resource: String,
        waited_ms: u64,
    },

    #[error("instance {instance_id} is {state}: {reason}")]
    InvalidState {
        instance_id: String,
        state: String,
        reason: String,
    },

    /// The control plane rejected a request or reported a failed resource.
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

impl MigrationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::OperationTimeout { .. } => "operation_timeout",
            Self::InvalidState { .. } => "invalid_state",
            Self::Provider(_) => "provider",
        }
    }
}
