use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::error;
use uuid::Uuid;

use crate::models::ExecutionMetric;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: String,
    pub execution_id: String,
    pub event_type: AuditEventType,
    pub function_name: String,
    pub language: String,
    pub runtime: Option<String>,
    pub total_time_ms: Option<u64>,
    pub status: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    ExecutionStart,
    ExecutionComplete,
}

/// Append-only JSON-lines audit trail, one entry per execution lifecycle
/// event. Exists alongside `ExecutionMetric` to answer "what happened
/// and when", independent of the metrics store's aggregation queries.
pub struct AuditLogger {
    log_file: Mutex<std::fs::File>,
}

impl AuditLogger {
    pub fn new(log_path: &str) -> Result<Self, std::io::Error> {
        if let Some(parent) = Path::new(log_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(log_path)?;

        Ok(Self {
            log_file: Mutex::new(file),
        })
    }

    pub async fn log_start(&self, execution_id: &Uuid, function_name: &str, language: &str) {
        let entry = AuditLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            execution_id: execution_id.to_string(),
            event_type: AuditEventType::ExecutionStart,
            function_name: function_name.to_string(),
            language: language.to_string(),
            runtime: None,
            total_time_ms: None,
            status: None,
            error: None,
        };

        self.write_log_entry(entry).await;
    }

    pub async fn log_complete(&self, execution_id: &Uuid, metric: &ExecutionMetric) {
        let entry = AuditLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            execution_id: execution_id.to_string(),
            event_type: AuditEventType::ExecutionComplete,
            function_name: metric.function_name.clone(),
            language: metric.language.clone(),
            runtime: Some(metric.runtime.clone()),
            total_time_ms: Some(metric.total_time_ms),
            status: Some(format!("{:?}", metric.status)),
            error: metric.error.clone(),
        };

        self.write_log_entry(entry).await;
    }

    async fn write_log_entry(&self, entry: AuditLogEntry) {
        if let Ok(json) = serde_json::to_string(&entry) {
            let mut file = self.log_file.lock().await;
            if let Err(e) = writeln!(file, "{}", json) {
                error!("failed to write audit log: {}", e);
            }
            let _ = file.flush();
        }
    }
}
