use serde::Serialize;

use crate::executor::SandboxExecutor;
use crate::models::{ExecutionStatus, FunctionRecord, IsolationRuntime};

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStats {
    pub avg_init_time_ms: f64,
    pub avg_exec_time_ms: f64,
    pub avg_total_time_ms: f64,
    pub min_total_time_ms: f64,
    pub max_total_time_ms: f64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DifferencePercent {
    pub init_time: Option<f64>,
    pub exec_time: Option<f64>,
    pub total_time: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    pub iterations: u32,
    pub default: RuntimeStats,
    pub hardened: RuntimeStats,
    pub difference_percent: DifferencePercent,
    pub recommendation: String,
}

/// Runs a function N times under each isolation runtime and reports
/// comparative timing stats, grounded on the original's
/// `compare_runtimes` endpoint. The default runtime gets a warm-start
/// pass after its first (necessarily cold) iteration; the hardened
/// runtime never pools, so every iteration there is cold by
/// construction.
pub struct RuntimeComparator<'a> {
    executor: &'a SandboxExecutor,
}

impl<'a> RuntimeComparator<'a> {
    pub fn new(executor: &'a SandboxExecutor) -> Self {
        Self { executor }
    }

    pub async fn compare(&self, function: &FunctionRecord, iterations: u32) -> ComparisonResult {
        let mut default_init = Vec::new();
        let mut default_exec = Vec::new();
        let mut default_total = Vec::new();
        let mut default_success = 0u32;

        for i in 0..iterations {
            let warm_start = i > 0;
            let result = self
                .executor
                .execute(function, IsolationRuntime::Default, warm_start)
                .await;
            default_init.push(result.metrics.initialization_time_ms as f64);
            default_exec.push(result.metrics.execution_time_ms as f64);
            default_total.push(result.metrics.total_time_ms as f64);
            if result.status == ExecutionStatus::Success {
                default_success += 1;
            }
        }

        let mut hardened_init = Vec::new();
        let mut hardened_exec = Vec::new();
        let mut hardened_total = Vec::new();
        let mut hardened_success = 0u32;

        for _ in 0..iterations {
            let result = self
                .executor
                .execute(function, IsolationRuntime::Hardened, false)
                .await;
            hardened_init.push(result.metrics.initialization_time_ms as f64);
            hardened_exec.push(result.metrics.execution_time_ms as f64);
            hardened_total.push(result.metrics.total_time_ms as f64);
            if result.status == ExecutionStatus::Success {
                hardened_success += 1;
            }
        }

        let default_stats = build_stats(&default_init, &default_exec, &default_total, default_success, iterations);
        let hardened_stats = build_stats(
            &hardened_init,
            &hardened_exec,
            &hardened_total,
            hardened_success,
            iterations,
        );

        let difference_percent = DifferencePercent {
            init_time: percent_diff(default_stats.avg_init_time_ms, hardened_stats.avg_init_time_ms),
            exec_time: percent_diff(default_stats.avg_exec_time_ms, hardened_stats.avg_exec_time_ms),
            total_time: percent_diff(default_stats.avg_total_time_ms, hardened_stats.avg_total_time_ms),
        };

        let recommendation = if default_stats.avg_total_time_ms <= hardened_stats.avg_total_time_ms {
            "default".to_string()
        } else {
            "hardened".to_string()
        };

        ComparisonResult {
            iterations,
            default: default_stats,
            hardened: hardened_stats,
            difference_percent,
            recommendation,
        }
    }
}

fn build_stats(
    init_times: &[f64],
    exec_times: &[f64],
    total_times: &[f64],
    success_count: u32,
    iterations: u32,
) -> RuntimeStats {
    RuntimeStats {
        avg_init_time_ms: mean(init_times),
        avg_exec_time_ms: mean(exec_times),
        avg_total_time_ms: mean(total_times),
        min_total_time_ms: total_times.iter().cloned().fold(f64::INFINITY, f64::min),
        max_total_time_ms: total_times.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        success_rate: success_count as f64 / iterations as f64,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// `None` when the baseline average is zero. Every default iteration
/// failed before producing a timing, making a percentage difference
/// meaningless rather than an infinite or NaN number.
fn percent_diff(baseline: f64, other: f64) -> Option<f64> {
    if baseline == 0.0 {
        None
    } else {
        Some((other - baseline) / baseline * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_diff_is_none_when_baseline_failed_entirely() {
        assert_eq!(percent_diff(0.0, 120.0), None);
    }

    #[test]
    fn percent_diff_reports_relative_difference() {
        let diff = percent_diff(100.0, 150.0).unwrap();
        assert!((diff - 50.0).abs() < 1e-9);
    }

    #[test]
    fn build_stats_reports_zero_success_rate_when_every_iteration_fails() {
        let stats = build_stats(&[10.0, 12.0], &[20.0, 22.0], &[30.0, 34.0], 0, 2);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.min_total_time_ms, 30.0);
        assert_eq!(stats.max_total_time_ms, 34.0);
    }

    #[tokio::test]
    async fn compare_runs_both_runtimes_and_recommends_the_faster_one() {
        use std::sync::Arc;

        use crate::config::Config;
        use crate::engine::ContainerEngine;
        use crate::metrics::MetricsStore;
        use crate::models::FunctionCreate;
        use crate::pool::WarmPool;
        use crate::test_support::{ExecBehavior, MockEngine};

        let engine: Arc<dyn ContainerEngine> = Arc::new(MockEngine::new(ExecBehavior::Success));
        let mut config = Config::default();
        config.enable_audit_log = false;
        let pool = Arc::new(WarmPool::new(engine.clone(), config.clone()));
        let metrics = Arc::new(MetricsStore::new());
        let executor = SandboxExecutor::new(engine, pool, metrics, config);

        let function = FunctionRecord::new(FunctionCreate {
            name: "f".to_string(),
            language: "python".to_string(),
            code: "print('hi')".to_string(),
            timeout: 30,
        });

        let comparator = RuntimeComparator::new(&executor);
        let result = comparator.compare(&function, 3).await;

        assert_eq!(result.iterations, 3);
        assert_eq!(result.default.success_rate, 1.0);
        assert_eq!(result.hardened.success_rate, 1.0);
        assert!(matches!(result.recommendation.as_str(), "default" | "hardened"));
        assert!(result.difference_percent.total_time.is_some());
    }
}
