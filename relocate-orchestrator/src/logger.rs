use chrono::{DateTime, Utc};
use relocate_common::InstanceId;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};
use uuid::Uuid;

/// One row of the action log. `in_progress` rows are followed by a
/// completion row with the same `id`.
#[derive(Debug, Serialize)]
pub struct ActionEvent<'a> {
    pub id: Uuid,
    pub correlation_id: Uuid,
    pub action_type: &'a str,
    pub component: &'static str,
    pub status: &'a str,
    pub instance_id: &'a str,
    pub error_message: Option<&'a str>,
    pub duration_ms: Option<u64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Action logger for a migration batch. Every event goes to tracing; when a
/// journal file is configured it is also appended there as one JSON line.
pub struct ActionLogger {
    correlation_id: Uuid,
    journal: Option<Mutex<File>>,
}

impl ActionLogger {
    pub fn new(correlation_id: Uuid) -> Self {
        Self {
            correlation_id,
            journal: None,
        }
    }

    pub fn with_journal(mut self, path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| anyhow::anyhow!("cannot open journal {}: {}", path.display(), e))?;
        self.journal = Some(Mutex::new(file));
        Ok(self)
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn log_event(
        &self,
        action_type: &str,
        status: &str,
        instance_id: &InstanceId,
        error_message: Option<&str>,
    ) -> Uuid {
        self.log_event_with_metadata(action_type, status, instance_id, error_message, None)
    }

    /// Log event with metadata (context info)
    pub fn log_event_with_metadata(
        &self,
        action_type: &str,
        status: &str,
        instance_id: &InstanceId,
        error_message: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> Uuid {
        let log_id = Uuid::new_v4();
        self.record(ActionEvent {
            id: log_id,
            correlation_id: self.correlation_id,
            action_type,
            component: "orchestrator",
            status,
            instance_id: instance_id.as_str(),
            error_message,
            duration_ms: None,
            metadata,
            created_at: Utc::now(),
        });
        log_id
    }

    /// Log event completion with duration
    pub fn log_event_complete(
        &self,
        log_id: Uuid,
        action_type: &str,
        instance_id: &InstanceId,
        status: &str,
        duration_ms: u64,
        error_message: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) {
        self.record(ActionEvent {
            id: log_id,
            correlation_id: self.correlation_id,
            action_type,
            component: "orchestrator",
            status,
            instance_id: instance_id.as_str(),
            error_message,
            duration_ms: Some(duration_ms),
            metadata,
            created_at: Utc::now(),
        });
    }

    fn record(&self, event: ActionEvent<'_>) {
        info!(
            target: "action_log",
            log_id = %event.id,
            correlation_id = %event.correlation_id,
            instance_id = event.instance_id,
            status = event.status,
            duration_ms = event.duration_ms,
            error = event.error_message,
            "{}",
            event.action_type
        );

        let Some(journal) = &self.journal else {
            return;
        };
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!("action log serialization failed: {}", e);
                return;
            }
        };
        // A broken journal must not break the migration itself.
        let mut file = journal.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(file, "{}", line) {
            warn!("action log write failed: {}", e);
        }
    }
}
