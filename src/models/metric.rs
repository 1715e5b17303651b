use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::execution::ExecutionStatus;

/// One row describing a single execution's timing, classification, and
/// context. Appended by the executor, read back by the metrics store's
/// `list`/`aggregate` operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetric {
    pub id: u64,
    pub function_name: String,
    pub runtime: String,
    pub language: String,
    pub cold_start: bool,
    pub timestamp: DateTime<Utc>,
    pub initialization_time_ms: u64,
    pub execution_time_ms: u64,
    pub total_time_ms: u64,
    pub status: ExecutionStatus,
    pub error: Option<String>,
    pub memory_used_mb: Option<f64>,
    pub cpu_usage_percent: Option<f64>,
}

impl ExecutionMetric {
    /// A metric with all timings zeroed, used for failures that never
    /// got as far as acquiring a container (unsupported language, engine
    /// unavailable before any container was created).
    pub fn zero(function_name: &str, runtime: &str, language: &str, status: ExecutionStatus) -> Self {
        Self {
            id: 0,
            function_name: function_name.to_string(),
            runtime: runtime.to_string(),
            language: language.to_string(),
            cold_start: true,
            timestamp: Utc::now(),
            initialization_time_ms: 0,
            execution_time_ms: 0,
            total_time_ms: 0,
            status,
            error: None,
            memory_used_mb: None,
            cpu_usage_percent: None,
        }
    }
}
