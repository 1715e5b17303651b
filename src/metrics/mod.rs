use serde::Serialize;
use tokio::sync::RwLock;

use crate::models::{ExecutionMetric, ExecutionStatus};

/// The fixed set of aggregation windows the metrics API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    OneHour,
    TwentyFourHours,
    SevenDays,
    ThirtyDays,
}

impl TimeWindow {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "1h" => Ok(TimeWindow::OneHour),
            "24h" => Ok(TimeWindow::TwentyFourHours),
            "7d" => Ok(TimeWindow::SevenDays),
            "30d" => Ok(TimeWindow::ThirtyDays),
            other => Err(format!(
                "invalid time_range '{}': expected one of 1h, 24h, 7d, 30d",
                other
            )),
        }
    }

    fn duration(&self) -> chrono::Duration {
        match self {
            TimeWindow::OneHour => chrono::Duration::hours(1),
            TimeWindow::TwentyFourHours => chrono::Duration::days(1),
            TimeWindow::SevenDays => chrono::Duration::days(7),
            TimeWindow::ThirtyDays => chrono::Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeBreakdown {
    pub default: usize,
    pub hardened: usize,
}

/// Result of `aggregate`. Every rate field is `count`-normalized, never
/// raw counts, mirroring the ratios the original dashboard charted.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedMetrics {
    pub count: usize,
    pub avg_execution_time_ms: f64,
    pub p95_execution_time_ms: Option<f64>,
    pub p99_execution_time_ms: Option<f64>,
    pub stdev_execution_time_ms: Option<f64>,
    pub avg_total_time_ms: f64,
    pub success_rate: f64,
    pub error_rate: f64,
    pub timeout_rate: f64,
    pub cold_start_percentage: f64,
    pub runtime_breakdown: RuntimeBreakdown,
}

impl AggregatedMetrics {
    fn empty() -> Self {
        Self {
            count: 0,
            avg_execution_time_ms: 0.0,
            p95_execution_time_ms: None,
            p99_execution_time_ms: None,
            stdev_execution_time_ms: None,
            avg_total_time_ms: 0.0,
            success_rate: 0.0,
            error_rate: 0.0,
            timeout_rate: 0.0,
            cold_start_percentage: 0.0,
            runtime_breakdown: RuntimeBreakdown { default: 0, hardened: 0 },
        }
    }
}

/// In-memory append-only log of every execution's metrics, queried by
/// the read APIs (`list`, `aggregate`). Appends hold a write lock only
/// long enough to push and hand back the assigned id; everything else
/// takes a read lock.
pub struct MetricsStore {
    rows: RwLock<Vec<ExecutionMetric>>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Assigns the next id and appends the row; returns the assigned id.
    pub async fn record(&self, mut metric: ExecutionMetric) -> u64 {
        let mut rows = self.rows.write().await;
        let id = rows.len() as u64 + 1;
        metric.id = id;
        rows.push(metric);
        id
    }

    /// Most recent `limit` rows for a function, newest first.
    pub async fn list(&self, function_name: &str, limit: usize) -> Vec<ExecutionMetric> {
        let rows = self.rows.read().await;
        let mut matching: Vec<ExecutionMetric> = rows
            .iter()
            .filter(|m| m.function_name == function_name)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.truncate(limit);
        matching
    }

    /// Aggregates rows within `window`, optionally scoped to one
    /// function. Percentile indices are clamped to `n - 1`: an earlier
    /// version of this computation indexed `sorted[(n as f64 * q) as
    /// usize]` directly, which reads one past the last element whenever
    /// `q` rounds up to `n` (e.g. p99 over exactly 100 samples).
    pub async fn aggregate(
        &self,
        function_name: Option<&str>,
        window: TimeWindow,
    ) -> AggregatedMetrics {
        let cutoff = chrono::Utc::now() - window.duration();
        let rows = self.rows.read().await;

        let matching: Vec<&ExecutionMetric> = rows
            .iter()
            .filter(|m| function_name.map_or(true, |name| m.function_name == name))
            .filter(|m| m.timestamp >= cutoff)
            .collect();

        if matching.is_empty() {
            return AggregatedMetrics::empty();
        }

        let total_count = matching.len();
        let success_count = matching
            .iter()
            .filter(|m| m.status == ExecutionStatus::Success)
            .count();
        let error_count = matching
            .iter()
            .filter(|m| m.status == ExecutionStatus::Error)
            .count();
        let timeout_count = matching
            .iter()
            .filter(|m| m.status == ExecutionStatus::Timeout)
            .count();
        let cold_start_count = matching.iter().filter(|m| m.cold_start).count();

        let mut execution_times: Vec<f64> = matching
            .iter()
            .map(|m| m.execution_time_ms as f64)
            .collect();
        let total_times: Vec<f64> = matching.iter().map(|m| m.total_time_ms as f64).collect();

        let avg_execution_time_ms = mean(&execution_times);
        let avg_total_time_ms = mean(&total_times);

        let (p95_execution_time_ms, p99_execution_time_ms, stdev_execution_time_ms) =
            if execution_times.len() >= 2 {
                execution_times.sort_by(|a, b| a.partial_cmp(b).unwrap());
                (
                    Some(percentile(&execution_times, 0.95)),
                    Some(percentile(&execution_times, 0.99)),
                    Some(stdev(&execution_times, avg_execution_time_ms)),
                )
            } else {
                (None, None, None)
            };

        AggregatedMetrics {
            count: total_count,
            avg_execution_time_ms,
            p95_execution_time_ms,
            p99_execution_time_ms,
            stdev_execution_time_ms,
            avg_total_time_ms,
            success_rate: success_count as f64 / total_count as f64,
            error_rate: error_count as f64 / total_count as f64,
            timeout_rate: timeout_count as f64 / total_count as f64,
            cold_start_percentage: cold_start_count as f64 / total_count as f64,
            runtime_breakdown: RuntimeBreakdown {
                default: matching.iter().filter(|m| m.runtime == "default").count(),
                hardened: matching.iter().filter(|m| m.runtime == "hardened").count(),
            },
        }
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// `sorted` must already be ascending. Index clamped to `n - 1` so a
/// quantile that rounds up to `n` lands on the last element instead of
/// past it.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    let idx = ((n as f64) * q) as usize;
    sorted[idx.min(n - 1)]
}

fn stdev(values: &[f64], mean_value: f64) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|v| (v - mean_value).powi(2))
        .sum::<f64>()
        / (n - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExecutionStatus;

    fn sample(function_name: &str, status: ExecutionStatus, exec_ms: u64, cold: bool) -> ExecutionMetric {
        ExecutionMetric {
            id: 0,
            function_name: function_name.to_string(),
            runtime: "default".to_string(),
            language: "python".to_string(),
            cold_start: cold,
            timestamp: chrono::Utc::now(),
            initialization_time_ms: 10,
            execution_time_ms: exec_ms,
            total_time_ms: exec_ms + 10,
            status,
            error: None,
            memory_used_mb: None,
            cpu_usage_percent: None,
        }
    }

    #[tokio::test]
    async fn aggregate_of_empty_store_returns_zeroed_block() {
        let store = MetricsStore::new();
        let result = store.aggregate(None, TimeWindow::OneHour).await;
        assert_eq!(result.count, 0);
        assert_eq!(result.success_rate, 0.0);
        assert!(result.p95_execution_time_ms.is_none());
    }

    #[tokio::test]
    async fn rates_sum_to_one_across_statuses() {
        let store = MetricsStore::new();
        store.record(sample("f", ExecutionStatus::Success, 100, true)).await;
        store.record(sample("f", ExecutionStatus::Error, 50, false)).await;
        store.record(sample("f", ExecutionStatus::Timeout, 5000, false)).await;

        let result = store.aggregate(Some("f"), TimeWindow::OneHour).await;
        assert_eq!(result.count, 3);
        let total = result.success_rate + result.error_rate + result.timeout_rate;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn percentile_index_is_clamped_to_last_element() {
        let sorted = vec![1.0, 2.0, 3.0];
        // n * q == n for q == 1.0 would index one past the end
        // unclamped; nothing in this store ever requests q == 1.0, but
        // the clamp makes that case safe too.
        assert_eq!(percentile(&sorted, 1.0), 3.0);
        assert_eq!(percentile(&sorted, 0.99), 3.0);
    }

    #[tokio::test]
    async fn list_returns_newest_first_and_respects_limit() {
        let store = MetricsStore::new();
        for i in 0..5 {
            store
                .record(sample("f", ExecutionStatus::Success, i, false))
                .await;
        }
        let rows = store.list("f", 2).await;
        assert_eq!(rows.len(), 2);
    }
}
