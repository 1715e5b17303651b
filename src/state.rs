use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use governor::{Quota, RateLimiter};
use tokio::sync::RwLock;

use crate::config::Config;
use crate::engine::ContainerEngine;
use crate::executor::SandboxExecutor;
use crate::functions::FunctionStore;
use crate::metrics::MetricsStore;
use crate::pool::WarmPool;

/// Unkeyed: one global budget for `/functions/execute/*`, not per
/// caller. The platform has no auth/identity layer to key on yet.
pub type ExecuteRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub engine: Arc<dyn ContainerEngine>,
    pub pool: Arc<WarmPool>,
    pub executor: Arc<SandboxExecutor>,
    pub functions: Arc<FunctionStore>,
    pub metrics: Arc<MetricsStore>,
    pub rate_limiter: Arc<ExecuteRateLimiter>,
    pub stats: Arc<RwLock<ServiceStats>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        engine: Arc<dyn ContainerEngine>,
        pool: Arc<WarmPool>,
        metrics: Arc<MetricsStore>,
    ) -> Self {
        let executor = Arc::new(SandboxExecutor::new(
            engine.clone(),
            pool.clone(),
            metrics.clone(),
            config.clone(),
        ));

        let per_minute = NonZeroU32::new(config.rate_limit_per_minute).unwrap_or(NonZeroU32::new(1).unwrap());
        let burst = NonZeroU32::new(config.rate_limit_burst).unwrap_or(per_minute);
        let quota = Quota::per_minute(per_minute).allow_burst(burst);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Self {
            config,
            engine,
            pool,
            executor,
            functions: Arc::new(FunctionStore::new()),
            metrics,
            rate_limiter,
            stats: Arc::new(RwLock::new(ServiceStats::default())),
            start_time: Instant::now(),
        }
    }

    pub async fn increment_executions(&self) {
        let mut stats = self.stats.write().await;
        stats.total_executions += 1;
        stats.active_executions += 1;
    }

    pub async fn decrement_active_executions(&self) {
        let mut stats = self.stats.write().await;
        if stats.active_executions > 0 {
            stats.active_executions -= 1;
        }
    }

    pub async fn record_outcome(&self, status: crate::models::ExecutionStatus) {
        use crate::models::ExecutionStatus;
        let mut stats = self.stats.write().await;
        match status {
            ExecutionStatus::Success => stats.successful_executions += 1,
            ExecutionStatus::Error => stats.failed_executions += 1,
            ExecutionStatus::Timeout => stats.timeout_executions += 1,
        }
    }

    pub async fn get_stats(&self) -> ServiceStats {
        self.stats.read().await.clone()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServiceStats {
    pub total_executions: u64,
    pub active_executions: usize,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub timeout_executions: u64,
}
