use chrono::{DateTime, Utc};
use relocate_common::{
    InstanceId, LifecycleState, MigrationError, MigrationOutcome, MigrationState, MigrationStep,
    RegionalImage, StateTransition,
};
use tracing::debug;

/// Allowed edges of the per-instance pipeline. Any non-terminal state may fail.
pub fn can_transition(from: MigrationState, to: MigrationState) -> bool {
    use relocate_common::MigrationState::*;
    if to == Failed {
        return !from.is_terminal();
    }
    matches!(
        (from, to),
        (Running, Stopping)
            | (Stopping, Stopped)
            | (Stopped, Imaging)
            | (Imaging, SourceImageReady)
            | (SourceImageReady, Copying)
            | (Copying, DestinationImageReady)
            | (DestinationImageReady, Launching)
            | (Launching, Launched)
    )
}

/// Entry state for an observed source instance; None if it cannot be migrated.
pub fn initial_state(state: LifecycleState) -> Option<MigrationState> {
    match state {
        LifecycleState::Pending | LifecycleState::Running => Some(MigrationState::Running),
        LifecycleState::Stopping => Some(MigrationState::Stopping),
        LifecycleState::Stopped => Some(MigrationState::Stopped),
        LifecycleState::ShuttingDown | LifecycleState::Terminated => None,
    }
}

/// Everything known about one instance's migration while the driver runs.
/// Turned into a `MigrationOutcome` exactly once.
#[derive(Debug)]
pub struct MigrationProgress {
    pub instance_id: InstanceId,
    pub state: Option<MigrationState>,
    pub instance_type: Option<String>,
    pub source_image: Option<RegionalImage>,
    pub destination_image: Option<RegionalImage>,
    pub transitions: Vec<StateTransition>,
    pub started_at: DateTime<Utc>,
}

impl MigrationProgress {
    pub fn start(instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            state: None,
            instance_type: None,
            source_image: None,
            destination_image: None,
            transitions: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Record the state the source instance was first observed in.
    pub fn observe(&mut self, state: MigrationState) {
        debug!(instance_id = %self.instance_id, state = %state, "observed entry state");
        self.state = Some(state);
    }

    pub fn transition(&mut self, to: MigrationState, reason: &str) -> Result<(), MigrationError> {
        let Some(from) = self.state else {
            return Err(MigrationError::InvalidState {
                instance_id: self.instance_id.to_string(),
                state: "unobserved".to_string(),
                reason: format!("cannot move to {} before the instance was inspected", to),
            });
        };
        if !can_transition(from, to) {
            return Err(MigrationError::InvalidState {
                instance_id: self.instance_id.to_string(),
                state: from.to_string(),
                reason: format!("cannot move to {}", to),
            });
        }
        debug!(instance_id = %self.instance_id, from = %from, to = %to, reason, "state transition");
        self.transitions.push(StateTransition {
            from,
            to,
            reason: reason.to_string(),
            at: Utc::now(),
        });
        self.state = Some(to);
        Ok(())
    }

    pub fn succeed(self, new_instance_id: InstanceId) -> MigrationOutcome {
        self.into_outcome(Some(new_instance_id), None, None)
    }

    pub fn fail(mut self, step: MigrationStep, error_message: String) -> MigrationOutcome {
        if let Some(from) = self.state.filter(|s| !s.is_terminal()) {
            self.transitions.push(StateTransition {
                from,
                to: MigrationState::Failed,
                reason: error_message.clone(),
                at: Utc::now(),
            });
        }
        self.state = Some(MigrationState::Failed);
        self.into_outcome(None, Some(step), Some(error_message))
    }

    fn into_outcome(
        self,
        new_instance_id: Option<InstanceId>,
        failed_step: Option<MigrationStep>,
        error_message: Option<String>,
    ) -> MigrationOutcome {
        MigrationOutcome {
            instance_id: self.instance_id,
            success: new_instance_id.is_some(),
            new_instance_id,
            error_message,
            failed_step,
            final_state: self.state,
            instance_type: self.instance_type,
            source_image: self.source_image,
            destination_image: self.destination_image,
            transitions: self.transitions,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
