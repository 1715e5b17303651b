mod audit;

pub use audit::AuditLogger;

use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::engine::ContainerEngine;
use crate::metrics::MetricsStore;
use crate::models::{
    ExecutionMetric, ExecutionResult, ExecutionStatus, FunctionRecord, IsolationRuntime, Language,
};
use crate::pool::WarmPool;
use crate::registry;

/// Orchestrates a single execution: acquire a container (warm or cold),
/// stage the function's code, run it under a wall-clock timeout, and
/// record a metrics row. Never returns an `Err`: every engine or
/// filesystem failure is folded into an `ExecutionResult` with
/// `status: Error` and a fully populated metrics block.
pub struct SandboxExecutor {
    engine: Arc<dyn ContainerEngine>,
    pool: Arc<WarmPool>,
    metrics: Arc<MetricsStore>,
    config: Config,
    audit: Option<AuditLogger>,
}

impl SandboxExecutor {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        pool: Arc<WarmPool>,
        metrics: Arc<MetricsStore>,
        config: Config,
    ) -> Self {
        let audit = if config.enable_audit_log {
            match AuditLogger::new(&config.audit_log_path) {
                Ok(logger) => Some(logger),
                Err(e) => {
                    error!("failed to open audit log: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            engine,
            pool,
            metrics,
            config,
            audit,
        }
    }

    pub async fn execute(
        &self,
        function: &FunctionRecord,
        runtime: IsolationRuntime,
        warm_start: bool,
    ) -> ExecutionResult {
        let t0 = Instant::now();
        let execution_id = Uuid::new_v4();

        if let Some(ref audit) = self.audit {
            audit
                .log_start(&execution_id, &function.name, &function.language)
                .await;
        }

        let language = match Language::from_str(&function.language) {
            Ok(l) => l,
            Err(msg) => {
                let metric = ExecutionMetric::zero(
                    &function.name,
                    runtime.tag(),
                    &function.language,
                    ExecutionStatus::Error,
                );
                let mut metric = metric;
                metric.error = Some(msg.clone());
                self.metrics.record(metric.clone()).await;
                return ExecutionResult {
                    status: ExecutionStatus::Error,
                    stdout: String::new(),
                    stderr: msg,
                    exit_code: -1,
                    metrics: metric,
                };
            }
        };

        let (acquired, cold_start) = self.acquire(language, runtime, warm_start).await;

        let container = match acquired {
            Ok(c) => c,
            Err(engine_msg) => {
                let mut metric = ExecutionMetric::zero(
                    &function.name,
                    runtime.tag(),
                    language.tag(),
                    ExecutionStatus::Error,
                );
                metric.cold_start = cold_start;
                metric.error = Some(engine_msg.clone());
                self.metrics.record(metric.clone()).await;
                return ExecutionResult {
                    status: ExecutionStatus::Error,
                    stdout: String::new(),
                    stderr: engine_msg,
                    exit_code: -1,
                    metrics: metric,
                };
            }
        };

        let init_end = Instant::now();
        let initialization_time_ms = init_end.duration_since(t0).as_millis() as u64;

        let profile = registry::profile(language);
        let filename = format!("/app/exec_{}.{}", execution_id, profile.extension);

        if let Err(e) = self
            .engine
            .copy_in(&container.handle, function.code.as_bytes(), &filename)
            .await
        {
            warn!("code staging failed for {}: {}", execution_id, e);
            self.engine.stop(&container.handle, 5).await;
            self.engine.remove(&container.handle).await;

            let mut metric = ExecutionMetric::zero(
                &function.name,
                runtime.tag(),
                language.tag(),
                ExecutionStatus::Error,
            );
            metric.cold_start = cold_start;
            metric.initialization_time_ms = initialization_time_ms;
            metric.total_time_ms = t0.elapsed().as_millis() as u64;
            metric.error = Some(e.to_string());
            self.metrics.record(metric.clone()).await;
            return ExecutionResult {
                status: ExecutionStatus::Error,
                stdout: String::new(),
                stderr: e.to_string(),
                exit_code: -1,
                metrics: metric,
            };
        }

        let argv = vec![profile.interpreter.to_string(), filename];
        let exec_start = Instant::now();
        let timeout_duration = std::time::Duration::from_secs(function.timeout as u64);

        let exec_outcome = tokio::time::timeout(
            timeout_duration,
            self.engine.exec(&container.handle, argv, "/app"),
        )
        .await;

        let execution_time_ms = exec_start.elapsed().as_millis() as u64;

        let (status, stdout, stderr, exit_code, error_tag) = match exec_outcome {
            Err(_) => {
                self.engine.stop(&container.handle, 0).await;
                (
                    ExecutionStatus::Timeout,
                    String::new(),
                    format!(
                        "execution timed out after {} seconds",
                        function.timeout
                    ),
                    -1,
                    Some("timeout".to_string()),
                )
            }
            Ok(Err(e)) => (
                ExecutionStatus::Error,
                String::new(),
                e.to_string(),
                -1,
                Some(e.to_string()),
            ),
            Ok(Ok(output)) => {
                if output.exit_code == 0 {
                    (
                        ExecutionStatus::Success,
                        output.stdout,
                        output.stderr,
                        output.exit_code,
                        None,
                    )
                } else {
                    (
                        ExecutionStatus::Error,
                        output.stdout,
                        output.stderr,
                        output.exit_code,
                        Some(format!("exit_code_{}", output.exit_code)),
                    )
                }
            }
        };

        // The wall-clock timeout is non-negotiable: never report success
        // for an execution that ran longer than the function's timeout.
        let status = if execution_time_ms > function.timeout as u64 * 1000 {
            ExecutionStatus::Timeout
        } else {
            status
        };

        self.teardown(container, status == ExecutionStatus::Success).await;

        let total_time_ms = t0.elapsed().as_millis() as u64;

        let mut metric = ExecutionMetric {
            id: 0,
            function_name: function.name.clone(),
            runtime: runtime.tag().to_string(),
            language: language.tag().to_string(),
            cold_start,
            timestamp: chrono::Utc::now(),
            initialization_time_ms,
            execution_time_ms,
            total_time_ms,
            status,
            error: error_tag,
            memory_used_mb: None,
            cpu_usage_percent: None,
        };
        metric.id = self.metrics.record(metric.clone()).await;

        if let Some(ref audit) = self.audit {
            audit.log_complete(&execution_id, &metric).await;
        }

        info!(
            "execution {} for {} finished: status={:?} total={}ms",
            execution_id, function.name, status, total_time_ms
        );

        ExecutionResult {
            status,
            stdout,
            stderr,
            exit_code,
            metrics: metric,
        }
    }

    /// Returns the acquired container plus its cold-start flag, or an
    /// engine error message on acquisition failure.
    async fn acquire(
        &self,
        language: Language,
        runtime: IsolationRuntime,
        warm_start: bool,
    ) -> (Result<crate::pool::PooledContainer, String>, bool) {
        if runtime == IsolationRuntime::Hardened {
            return (self.cold_create(language, runtime).await, true);
        }

        if warm_start {
            if let Some(container) = self.pool.checkout(language, runtime).await {
                debug!("warm-started from pool: {}", container.handle);
                return (Ok(container), false);
            }
            self.pool.ensure_bucket(language, runtime).await;
            return (self.cold_create(language, runtime).await, true);
        }

        (self.cold_create(language, runtime).await, true)
    }

    async fn cold_create(
        &self,
        language: Language,
        runtime: IsolationRuntime,
    ) -> Result<crate::pool::PooledContainer, String> {
        let profile = registry::profile(language);
        let name = format!("sandbox-exec-{}", Uuid::new_v4());

        self.engine
            .create(
                profile.image,
                vec!["sleep".to_string(), "600".to_string()],
                runtime,
                "/app",
                &name,
            )
            .await
            .map(|handle| {
                let now = Instant::now();
                crate::pool::PooledContainer {
                    handle,
                    language,
                    runtime,
                    created_at: now,
                    last_used: now,
                }
            })
            .map_err(|e| e.to_string())
    }

    /// Pool containers are always destroyed on release, never returned.
    /// See `WarmPool`'s doc comment. Cold-started containers are stopped
    /// and removed directly.
    async fn teardown(&self, container: crate::pool::PooledContainer, _succeeded: bool) {
        if self.config.pool_enabled && container.runtime.poolable() {
            self.pool.release(container).await;
        } else {
            self.engine.stop(&container.handle, 5).await;
            self.engine.remove(&container.handle).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FunctionCreate;
    use crate::test_support::{ExecBehavior, MockEngine};

    fn make_executor(behavior: ExecBehavior) -> (SandboxExecutor, Arc<WarmPool>) {
        let engine: Arc<dyn ContainerEngine> = Arc::new(MockEngine::new(behavior));
        let mut config = Config::default();
        config.enable_audit_log = false;
        let pool = Arc::new(WarmPool::new(engine.clone(), config.clone()));
        let metrics = Arc::new(MetricsStore::new());
        (
            SandboxExecutor::new(engine, pool.clone(), metrics, config),
            pool,
        )
    }

    fn sample_function(language: &str, timeout: u32) -> FunctionRecord {
        FunctionRecord::new(FunctionCreate {
            name: "f".to_string(),
            language: language.to_string(),
            code: "print(1)".to_string(),
            timeout,
        })
    }

    #[tokio::test]
    async fn cold_start_success_reports_success_and_positive_timings() {
        let (executor, _pool) = make_executor(ExecBehavior::Success);
        let function = sample_function("python", 30);
        let result = executor.execute(&function, IsolationRuntime::Default, false).await;
        assert_eq!(result.status, ExecutionStatus::Success);
        assert!(result.metrics.cold_start);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "Hello, World!\n");
    }

    #[tokio::test]
    async fn non_zero_exit_reports_error_status() {
        let (executor, _pool) = make_executor(ExecBehavior::NonZeroExit(2));
        let function = sample_function("python", 30);
        let result = executor.execute(&function, IsolationRuntime::Default, false).await;
        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(result.exit_code, 2);
        assert_eq!(result.metrics.error.as_deref(), Some("exit_code_2"));
    }

    #[tokio::test]
    async fn exec_that_never_returns_is_classified_as_timeout() {
        let (executor, _pool) = make_executor(ExecBehavior::HangForever);
        let function = sample_function("python", 1);
        let result = executor.execute(&function, IsolationRuntime::Default, false).await;
        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert_eq!(result.exit_code, -1);
        assert!(result.stderr.contains("timed out"));
    }

    #[tokio::test]
    async fn engine_exec_failure_is_reported_as_error_not_a_panic() {
        let (executor, _pool) = make_executor(ExecBehavior::Fail);
        let function = sample_function("python", 30);
        let result = executor.execute(&function, IsolationRuntime::Default, false).await;
        assert_eq!(result.status, ExecutionStatus::Error);
    }

    #[tokio::test]
    async fn unsupported_language_short_circuits_with_zeroed_metrics() {
        let (executor, _pool) = make_executor(ExecBehavior::Success);
        let function = sample_function("ruby", 30);
        let result = executor.execute(&function, IsolationRuntime::Default, false).await;
        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(result.metrics.total_time_ms, 0);
    }

    #[tokio::test]
    async fn hardened_runtime_never_reuses_a_pooled_container() {
        let (executor, _pool) = make_executor(ExecBehavior::Success);
        let function = sample_function("python", 30);
        let result = executor.execute(&function, IsolationRuntime::Hardened, true).await;
        assert_eq!(result.status, ExecutionStatus::Success);
        assert!(result.metrics.cold_start, "hardened runtime always cold-starts");
    }

    #[tokio::test]
    async fn warm_start_from_a_seeded_pool_reports_cold_start_false() {
        let (executor, pool) = make_executor(ExecBehavior::Success);
        pool.seed_idle(crate::pool::PooledContainer {
            handle: crate::engine::ContainerHandle("warm".to_string()),
            language: Language::Python,
            runtime: IsolationRuntime::Default,
            created_at: Instant::now(),
            last_used: Instant::now(),
        })
        .await;

        let function = sample_function("python", 30);
        let result = executor.execute(&function, IsolationRuntime::Default, true).await;

        assert_eq!(result.status, ExecutionStatus::Success);
        assert!(!result.metrics.cold_start, "seeded container should be reused as a warm start");
    }

    #[tokio::test]
    async fn warm_start_with_empty_pool_falls_back_to_cold_create() {
        let (executor, _pool) = make_executor(ExecBehavior::Success);
        let function = sample_function("python", 30);
        let result = executor.execute(&function, IsolationRuntime::Default, true).await;
        assert_eq!(result.status, ExecutionStatus::Success);
        assert!(result.metrics.cold_start, "no idle container was available to reuse");
    }
}
