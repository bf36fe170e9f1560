use crate::error::{AppError, AppResult};
use crate::services::CycleReport;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Kind of settlement unit an entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Wager,
    Leg,
    Ticket,
}

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: i64,
    pub event_type: String, // "unit_unresolved", "unit_failed", "cycle_completed", "cycle_aborted"
    pub unit: Option<UnitKind>,
    pub unit_id: Option<Uuid>,
    pub details: serde_json::Value,
}

/// Inspection log for units the engine could not settle, one JSON object
/// per line
pub struct AuditTrailService {
    log_file: PathBuf,
    file_handle: Arc<Mutex<std::fs::File>>,
}

impl AuditTrailService {
    /// Create a new audit trail service
    pub fn new(log_directory: PathBuf) -> AppResult<Self> {
        std::fs::create_dir_all(&log_directory)
            .map_err(|e| AppError::Message(format!("Failed to create log directory: {}", e)))?;

        let date = chrono::Utc::now().format("%Y-%m-%d");
        let log_file = log_directory.join(format!("settlement_audit_{}.log", date));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(|e| AppError::Message(format!("Failed to open audit log file: {}", e)))?;

        info!("Audit trail initialized: {:?}", log_file);

        Ok(Self {
            log_file,
            file_handle: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.log_file
    }

    /// Log an audit entry
    pub async fn log(&self, entry: AuditLogEntry) -> AppResult<()> {
        let json = serde_json::to_string(&entry)?;

        let mut file = self.file_handle.lock().await;
        writeln!(file, "{}", json)
            .map_err(|e| AppError::Message(format!("Failed to write audit log: {}", e)))?;

        file.flush()
            .map_err(|e| AppError::Message(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }

    /// Terms the calculator refused to price; the unit stays pending
    pub async fn log_unresolved(
        &self,
        unit: UnitKind,
        unit_id: Uuid,
        match_id: &str,
        reason: &str,
    ) -> AppResult<()> {
        self.log(AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "unit_unresolved".to_string(),
            unit: Some(unit),
            unit_id: Some(unit_id),
            details: serde_json::json!({
                "match_id": match_id,
                "reason": reason,
            }),
        })
        .await
    }

    /// Persistence failure; the unit's transaction was rolled back
    pub async fn log_failure(&self, unit: UnitKind, unit_id: Uuid, error: &str) -> AppResult<()> {
        self.log(AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "unit_failed".to_string(),
            unit: Some(unit),
            unit_id: Some(unit_id),
            details: serde_json::json!({ "error": error }),
        })
        .await
    }

    pub async fn log_cycle_completed(&self, report: &CycleReport) -> AppResult<()> {
        self.log(AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "cycle_completed".to_string(),
            unit: None,
            unit_id: None,
            details: serde_json::to_value(report)?,
        })
        .await
    }

    pub async fn log_cycle_aborted(&self, reason: &str) -> AppResult<()> {
        self.log(AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "cycle_aborted".to_string(),
            unit: None,
            unit_id: None,
            details: serde_json::json!({ "reason": reason }),
        })
        .await
    }
}
