use relocate_common::{
    naming, InstanceId, LifecycleState, MigrationError, MigrationOutcome, MigrationState,
    MigrationStep, RegionalImage, Result,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use crate::gateway::RegionGateway;
use crate::inspector::get_instance_details;
use crate::logger::ActionLogger;
use crate::state_machine::{initial_state, MigrationProgress};

/// A step of the pipeline failed. Carries what had been achieved so far so
/// the coordinator can still report images that were created.
#[derive(Debug, Error)]
#[error("{step} failed for {instance_id}: {source}")]
pub struct StepFailure {
    pub instance_id: InstanceId,
    pub step: MigrationStep,
    pub source: MigrationError,
    pub progress: Box<MigrationProgress>,
}

impl StepFailure {
    pub fn into_outcome(self) -> MigrationOutcome {
        let message = self.source.to_string();
        self.progress.fail(self.step, message)
    }
}

/// Moves one instance through stop -> image -> copy -> launch.
pub struct TransitionDriver {
    source: RegionGateway,
    destination: RegionGateway,
    logger: Arc<ActionLogger>,
}

impl TransitionDriver {
    pub fn new(source: RegionGateway, destination: RegionGateway, logger: Arc<ActionLogger>) -> Self {
        Self {
            source,
            destination,
            logger,
        }
    }

    pub fn source(&self) -> &RegionGateway {
        &self.source
    }

    pub fn destination(&self) -> &RegionGateway {
        &self.destination
    }

    /// Run the whole pipeline for `instance_id`. Every step either completes
    /// (its wait reached the success condition) or ends the run with a
    /// `StepFailure`; nothing is retried.
    pub async fn run(&self, instance_id: &InstanceId) -> std::result::Result<MigrationOutcome, StepFailure> {
        let mut progress = MigrationProgress::start(instance_id.clone());
        match self.drive(&mut progress).await {
            Ok(new_instance_id) => Ok(progress.succeed(new_instance_id)),
            Err((step, source)) => Err(StepFailure {
                instance_id: instance_id.clone(),
                step,
                source,
                progress: Box::new(progress),
            }),
        }
    }

    async fn drive(
        &self,
        progress: &mut MigrationProgress,
    ) -> std::result::Result<InstanceId, (MigrationStep, MigrationError)> {
        let instance_id = progress.instance_id.clone();
        let src_region = self.source.region().to_string();
        let dst_region = self.destination.region().to_string();

        self.logged(
            MigrationStep::Stop,
            &instance_id,
            json!({ "region": src_region }),
            self.stop(progress),
        )
        .await?;

        let source_image = self
            .logged(
                MigrationStep::Image,
                &instance_id,
                json!({ "region": src_region, "name": naming::source_image_name(&instance_id) }),
                self.image(progress),
            )
            .await?;

        let destination_image = self
            .logged(
                MigrationStep::Copy,
                &instance_id,
                json!({
                    "source_image": source_image.image_id,
                    "source_region": src_region,
                    "destination_region": dst_region,
                }),
                self.copy(progress, &source_image),
            )
            .await?;

        self.logged(
            MigrationStep::Launch,
            &instance_id,
            json!({ "image": destination_image.image_id, "region": dst_region }),
            self.launch(progress, &destination_image),
        )
        .await
    }

    /// Wrap one step in an action-log entry (in_progress -> success|failed).
    async fn logged<T>(
        &self,
        step: MigrationStep,
        instance_id: &InstanceId,
        metadata: serde_json::Value,
        fut: impl Future<Output = Result<T>>,
    ) -> std::result::Result<T, (MigrationStep, MigrationError)> {
        let start = Instant::now();
        let log_id = self.logger.log_event_with_metadata(
            step.action_type(),
            "in_progress",
            instance_id,
            None,
            Some(metadata),
        );
        let result = fut.await;
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => self.logger.log_event_complete(
                log_id,
                step.action_type(),
                instance_id,
                "success",
                duration_ms,
                None,
                None,
            ),
            Err(e) => {
                let message = e.to_string();
                self.logger.log_event_complete(
                    log_id,
                    step.action_type(),
                    instance_id,
                    "failed",
                    duration_ms,
                    Some(&message),
                    Some(json!({ "error_kind": e.kind() })),
                );
            }
        }
        result.map_err(|e| (step, e))
    }

    async fn stop(&self, progress: &mut MigrationProgress) -> Result<()> {
        let instance_id = progress.instance_id.clone();
        let details = get_instance_details(&instance_id, &self.source).await?;
        let entry = initial_state(details.state).ok_or_else(|| MigrationError::InvalidState {
            instance_id: instance_id.to_string(),
            state: details.state.to_string(),
            reason: "instance cannot be stopped or imaged".to_string(),
        })?;
        progress.observe(entry);

        match details.state {
            LifecycleState::Stopped => {
                info!(instance_id = %instance_id, "already stopped, nothing to do");
                return Ok(());
            }
            LifecycleState::Stopping => {
                info!(instance_id = %instance_id, "stop already in progress, waiting");
                self.source.wait_until_stopped(&instance_id).await?;
            }
            _ => {
                if details.state == LifecycleState::Pending {
                    info!(instance_id = %instance_id, "still pending, waiting for it to run");
                    self.source.wait_until_running(&instance_id).await?;
                }
                progress.transition(MigrationState::Stopping, "stop requested")?;
                self.source.stop_instance(&instance_id).await?;
            }
        }
        progress.transition(MigrationState::Stopped, "instance stopped")
    }

    async fn image(&self, progress: &mut MigrationProgress) -> Result<RegionalImage> {
        let instance_id = progress.instance_id.clone();
        progress.transition(MigrationState::Imaging, "image requested")?;
        let image = self
            .source
            .create_image(&instance_id, &naming::source_image_name(&instance_id))
            .await?;
        progress.source_image = Some(image.clone());
        progress.transition(MigrationState::SourceImageReady, "source image available")?;
        Ok(image)
    }

    async fn copy(
        &self,
        progress: &mut MigrationProgress,
        source_image: &RegionalImage,
    ) -> Result<RegionalImage> {
        let instance_id = progress.instance_id.clone();
        progress.transition(MigrationState::Copying, "cross-region copy requested")?;
        let image = self
            .destination
            .copy_image(
                source_image,
                &naming::copy_description(&instance_id, self.source.region()),
                &naming::destination_image_name(&instance_id),
            )
            .await?;
        progress.destination_image = Some(image.clone());
        progress.transition(
            MigrationState::DestinationImageReady,
            "destination image available",
        )?;
        Ok(image)
    }

    async fn launch(
        &self,
        progress: &mut MigrationProgress,
        destination_image: &RegionalImage,
    ) -> Result<InstanceId> {
        let instance_id = progress.instance_id.clone();
        progress.transition(MigrationState::Launching, "launch requested")?;

        // Match the original compute shape: read the type from the source now.
        let details = get_instance_details(&instance_id, &self.source).await?;
        if details.instance_type.is_empty() {
            warn!(instance_id = %instance_id, "source reported an empty instance type");
        }
        progress.instance_type = Some(details.instance_type.clone());

        let new_instance_id = self
            .destination
            .launch_instance(destination_image, &details.instance_type)
            .await?;
        progress.transition(MigrationState::Launched, "status checks ok")?;
        info!(
            instance_id = %instance_id,
            new_instance_id = %new_instance_id,
            region = self.destination.region(),
            "migration complete"
        );
        Ok(new_instance_id)
    }
}
