use relocate_common::{InstanceId, MigrationOutcome};
use serde::Serialize;
use std::io::Write;
use tracing::{error, info};
use uuid::Uuid;

use crate::batch::MigrationBatch;
use crate::driver::TransitionDriver;

/// Receives per-instance progress while a batch runs.
pub trait ProgressReporter {
    fn started(&self, index: usize, total: usize, instance_id: &InstanceId);
    fn finished(&self, index: usize, total: usize, outcome: &MigrationOutcome);
}

/// Prints `{index}/{total}: {instance_id}` lines.
pub struct ConsoleReporter {
    to_stderr: bool,
}

impl ConsoleReporter {
    pub fn stdout() -> Self {
        Self { to_stderr: false }
    }

    // Used when stdout carries the JSON report.
    pub fn stderr() -> Self {
        Self { to_stderr: true }
    }

    fn emit(&self, line: &str) {
        // A closed console is not a migration failure.
        if self.to_stderr {
            let _ = writeln!(std::io::stderr(), "{}", line);
        } else {
            let _ = writeln!(std::io::stdout(), "{}", line);
        }
    }
}

impl ProgressReporter for ConsoleReporter {
    fn started(&self, index: usize, total: usize, instance_id: &InstanceId) {
        self.emit(&format!("{}/{}: {}", index, total, instance_id));
    }

    fn finished(&self, _index: usize, _total: usize, _outcome: &MigrationOutcome) {}
}

pub struct QuietReporter;

impl ProgressReporter for QuietReporter {
    fn started(&self, _index: usize, _total: usize, _instance_id: &InstanceId) {}
    fn finished(&self, _index: usize, _total: usize, _outcome: &MigrationOutcome) {}
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub correlation_id: Uuid,
    pub source_region: String,
    pub destination_region: String,
    pub outcomes: Vec<MigrationOutcome>,
}

impl MigrationReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

/// Runs a batch strictly in order, one instance at a time. The coordinator
/// is the only place where a failed migration is turned into an outcome:
/// one instance failing never stops the batch.
pub struct BatchCoordinator {
    driver: TransitionDriver,
    correlation_id: Uuid,
}

impl BatchCoordinator {
    pub fn new(driver: TransitionDriver, correlation_id: Uuid) -> Self {
        Self {
            driver,
            correlation_id,
        }
    }

    pub async fn migrate(
        &self,
        batch: MigrationBatch,
        reporter: &dyn ProgressReporter,
    ) -> MigrationReport {
        let total = batch.len();
        info!(
            correlation_id = %self.correlation_id,
            total,
            source_region = self.driver.source().region(),
            destination_region = self.driver.destination().region(),
            "migration batch started"
        );

        let mut outcomes = Vec::with_capacity(total);
        for (i, instance_id) in batch.into_iter().enumerate() {
            let index = i + 1;
            reporter.started(index, total, &instance_id);

            let outcome = match self.driver.run(&instance_id).await {
                Ok(outcome) => outcome,
                Err(failure) => {
                    error!(
                        instance_id = %instance_id,
                        step = %failure.step,
                        error_kind = failure.source.kind(),
                        "migration failed: {}",
                        failure.source
                    );
                    failure.into_outcome()
                }
            };

            reporter.finished(index, total, &outcome);
            outcomes.push(outcome);
        }

        let report = MigrationReport {
            correlation_id: self.correlation_id,
            source_region: self.driver.source().region().to_string(),
            destination_region: self.driver.destination().region().to_string(),
            outcomes,
        };
        info!(
            correlation_id = %self.correlation_id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "migration batch finished"
        );
        report
    }
}
