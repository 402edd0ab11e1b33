// Common test utilities: a mock two-region cloud wired to a coordinator
#![allow(dead_code)]

use relocate_common::{InstanceId, MigrationOutcome};
use relocate_orchestrator::coordinator::QuietReporter;
use relocate_orchestrator::logger::ActionLogger;
use relocate_orchestrator::{
    BatchCoordinator, MigrationBatch, MigrationReport, RegionGateway, TransitionDriver, Waits,
};
use relocate_providers::mock::MockCloud;
use relocate_providers::ComputeProvider;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const SOURCE: &str = "us-east-1";
pub const DESTINATION: &str = "eu-west-1";

/// Polls every millisecond; anything that hasn't settled in 200ms is stalled.
pub fn fast_waits() -> Waits {
    Waits::uniform(Duration::from_millis(1), Duration::from_millis(200))
}

/// Mock cloud whose operations settle after two observations.
pub fn cloud() -> MockCloud {
    MockCloud::new().with_settle_polls(2)
}

pub fn driver_over(
    source: Arc<dyn ComputeProvider>,
    destination: Arc<dyn ComputeProvider>,
    logger: ActionLogger,
) -> TransitionDriver {
    TransitionDriver::new(
        RegionGateway::new(source, fast_waits()),
        RegionGateway::new(destination, fast_waits()),
        Arc::new(logger),
    )
}

pub fn driver(cloud: &MockCloud) -> TransitionDriver {
    driver_over(
        Arc::new(cloud.provider(SOURCE)),
        Arc::new(cloud.provider(DESTINATION)),
        ActionLogger::new(Uuid::new_v4()),
    )
}

pub fn coordinator(cloud: &MockCloud) -> BatchCoordinator {
    BatchCoordinator::new(driver(cloud), Uuid::new_v4())
}

pub fn batch(ids: &[&str]) -> MigrationBatch {
    MigrationBatch::new(ids.iter().map(|id| InstanceId::new(*id)))
}

pub async fn migrate(cloud: &MockCloud, ids: &[&str]) -> MigrationReport {
    coordinator(cloud).migrate(batch(ids), &QuietReporter).await
}

pub fn outcome<'a>(report: &'a MigrationReport, id: &str) -> &'a MigrationOutcome {
    report
        .outcomes
        .iter()
        .find(|o| o.instance_id.as_str() == id)
        .unwrap_or_else(|| panic!("no outcome for {id}"))
}
