use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::{ContainerEngine, ContainerHandle};
use crate::error::PlatformResult;
use crate::models::{IsolationRuntime, Language};
use crate::registry;

/// A container sitting idle in a pool bucket.
#[derive(Debug, Clone)]
pub struct PooledContainer {
    pub handle: ContainerHandle,
    pub language: Language,
    pub runtime: IsolationRuntime,
    pub created_at: Instant,
    pub last_used: Instant,
}

#[derive(Debug, Default)]
struct Bucket {
    idle: VecDeque<PooledContainer>,
    last_accessed: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BucketKey(Language, IsolationRuntime);

/// Amortizes container startup for the default isolation runtime by
/// keeping a small set of idle containers ready per (language, runtime).
/// The hardened runtime never populates a bucket; it always cold-starts.
///
/// A checked-out container is never returned to the bucket: the
/// executor destroys it on release and a fresh replenishment takes its
/// place. The source this platform descends from had a dead branch that
/// looked like it returned containers to the pool for reuse but never
/// actually did; rather than resurrect that path, reuse is ruled out by
/// design. Running arbitrary user code in a container makes "reuse the
/// same container" and "guarantee no state leaked between executions"
/// mutually exclusive without a scrub step this platform doesn't have.
pub struct WarmPool {
    engine: Arc<dyn ContainerEngine>,
    config: Config,
    buckets: Mutex<HashMap<BucketKey, Bucket>>,
}

impl WarmPool {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: Config) -> Self {
        Self {
            engine,
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Returns an idle container if one is available, marking the bucket
    /// accessed either way. Triggers one background replenishment after
    /// a successful checkout.
    pub async fn checkout(
        self: &Arc<Self>,
        language: Language,
        runtime: IsolationRuntime,
    ) -> Option<PooledContainer> {
        if !self.config.pool_enabled || !runtime.poolable() {
            return None;
        }

        let key = BucketKey(language, runtime);
        let container = {
            let mut buckets = self.buckets.lock().await;
            let bucket = buckets.entry(key).or_default();
            bucket.last_accessed = Some(Instant::now());
            bucket.idle.pop_front()
        };

        if container.is_some() {
            let pool = Arc::clone(self);
            tokio::spawn(async move {
                pool.replenish_one(language, runtime).await;
            });
        }

        container
    }

    /// Creates the bucket if absent and launches up to `pool_initial_fill`
    /// asynchronous replenishments.
    pub async fn ensure_bucket(self: &Arc<Self>, language: Language, runtime: IsolationRuntime) {
        if !self.config.pool_enabled || !runtime.poolable() {
            return;
        }

        let key = BucketKey(language, runtime);
        let is_new = {
            let mut buckets = self.buckets.lock().await;
            let existed = buckets.contains_key(&key);
            buckets.entry(key).or_default().last_accessed = Some(Instant::now());
            !existed
        };

        if is_new {
            for _ in 0..self.config.pool_initial_fill {
                let pool = Arc::clone(self);
                tokio::spawn(async move {
                    pool.replenish_one(language, runtime).await;
                });
            }
        }
    }

    /// Destroys a checked-out container. The pool maintains population,
    /// not specific containers.
    pub async fn release(&self, container: PooledContainer) {
        self.engine.stop(&container.handle, 5).await;
        self.engine.remove(&container.handle).await;
    }

    async fn replenish_one(&self, language: Language, runtime: IsolationRuntime) {
        let key = BucketKey(language, runtime);

        let current_len = {
            let buckets = self.buckets.lock().await;
            buckets.get(&key).map(|b| b.idle.len()).unwrap_or(0)
        };
        if current_len >= self.config.pool_max_size {
            return;
        }

        match self.create_idle_container(language, runtime).await {
            Ok(container) => {
                let mut buckets = self.buckets.lock().await;
                let bucket = buckets.entry(key).or_default();
                bucket.last_accessed = Some(Instant::now());
                if bucket.idle.len() < self.config.pool_max_size {
                    bucket.idle.push_back(container);
                } else {
                    drop(buckets);
                    self.engine.stop(&container.handle, 5).await;
                    self.engine.remove(&container.handle).await;
                }
            }
            Err(e) => warn!("pool replenish failed for {:?}/{:?}: {}", language, runtime, e),
        }
    }

    async fn create_idle_container(
        &self,
        language: Language,
        runtime: IsolationRuntime,
    ) -> PlatformResult<PooledContainer> {
        let profile = registry::profile(language);
        let name = format!("sandbox-warm-{}-{}", language.tag(), short_id());

        let handle = self
            .engine
            .create(
                profile.image,
                vec!["sleep".to_string(), "infinity".to_string()],
                runtime,
                "/app",
                &name,
            )
            .await?;

        let now = Instant::now();
        Ok(PooledContainer {
            handle,
            language,
            runtime,
            created_at: now,
            last_used: now,
        })
    }

    /// Destroys idle containers whose bucket hasn't been accessed within
    /// the idle TTL, and drops emptied buckets. Intended to run on a
    /// fixed cadence from `main.rs`, independent of request traffic.
    pub async fn sweep_idle(&self) {
        let ttl = Duration::from_secs(self.config.pool_idle_ttl_secs);
        let now = Instant::now();

        let expired: Vec<(BucketKey, Vec<PooledContainer>)> = {
            let mut buckets = self.buckets.lock().await;
            let mut expired = Vec::new();
            buckets.retain(|key, bucket| {
                let stale = bucket
                    .last_accessed
                    .map(|t| now.duration_since(t) > ttl)
                    .unwrap_or(false);
                if stale {
                    expired.push((*key, bucket.idle.drain(..).collect()));
                    false
                } else {
                    true
                }
            });
            expired
        };

        for (key, containers) in expired {
            if containers.is_empty() {
                continue;
            }
            debug!(
                "sweeping {} idle containers from expired bucket {:?}",
                containers.len(),
                key
            );
            for container in containers {
                self.engine.stop(&container.handle, 5).await;
                self.engine.remove(&container.handle).await;
            }
        }
    }

    /// Stops and removes every idle container. Called on shutdown.
    pub async fn shutdown(&self) {
        info!("shutting down warm pool");
        let all: Vec<PooledContainer> = {
            let mut buckets = self.buckets.lock().await;
            let drained = buckets
                .values_mut()
                .flat_map(|b| b.idle.drain(..))
                .collect();
            buckets.clear();
            drained
        };
        for container in all {
            self.engine.stop(&container.handle, 5).await;
            self.engine.remove(&container.handle).await;
        }
    }

    #[cfg(test)]
    pub async fn idle_count(&self, language: Language, runtime: IsolationRuntime) -> usize {
        let buckets = self.buckets.lock().await;
        buckets
            .get(&BucketKey(language, runtime))
            .map(|b| b.idle.len())
            .unwrap_or(0)
    }

    /// Seeds a bucket's idle list directly, bypassing the create path.
    /// Lets tests assert warm-checkout behavior without racing a real
    /// background replenishment.
    #[cfg(test)]
    pub async fn seed_idle(&self, container: PooledContainer) {
        let key = BucketKey(container.language, container.runtime);
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(key).or_default();
        bucket.last_accessed = Some(Instant::now());
        bucket.idle.push_back(container);
    }
}

fn short_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ExecBehavior, MockEngine};

    fn seeded(language: Language, runtime: IsolationRuntime) -> PooledContainer {
        let now = Instant::now();
        PooledContainer {
            handle: ContainerHandle("seed".to_string()),
            language,
            runtime,
            created_at: now,
            last_used: now,
        }
    }

    fn make_pool(config: Config) -> Arc<WarmPool> {
        let engine: Arc<dyn ContainerEngine> = Arc::new(MockEngine::new(ExecBehavior::Success));
        Arc::new(WarmPool::new(engine, config))
    }

    #[tokio::test]
    async fn checkout_returns_none_when_bucket_empty() {
        let pool = make_pool(Config::default());
        let got = pool.checkout(Language::Python, IsolationRuntime::Default).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn seeded_container_is_returned_by_checkout() {
        let pool = make_pool(Config::default());
        pool.seed_idle(seeded(Language::Python, IsolationRuntime::Default)).await;
        assert_eq!(pool.idle_count(Language::Python, IsolationRuntime::Default).await, 1);

        let got = pool.checkout(Language::Python, IsolationRuntime::Default).await;
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn hardened_runtime_never_checks_out_a_pooled_container() {
        let pool = make_pool(Config::default());
        pool.seed_idle(seeded(Language::Python, IsolationRuntime::Hardened)).await;
        let got = pool.checkout(Language::Python, IsolationRuntime::Hardened).await;
        assert!(got.is_none(), "hardened runtime must always cold-start");
    }

    #[tokio::test]
    async fn replenishment_never_grows_a_bucket_past_max_size() {
        let mut config = Config::default();
        config.pool_max_size = 2;
        config.pool_initial_fill = 5;
        let pool = make_pool(config);

        pool.ensure_bucket(Language::Python, IsolationRuntime::Default).await;
        // Replenishment is spawned on background tasks; give them a beat
        // to land before asserting the bound.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let count = pool.idle_count(Language::Python, IsolationRuntime::Default).await;
        assert!(count <= 2, "idle count {} exceeded max size 2", count);
    }

    #[tokio::test]
    async fn sweep_idle_evicts_a_bucket_past_its_ttl() {
        let mut config = Config::default();
        config.pool_idle_ttl_secs = 0;
        let pool = make_pool(config);
        pool.seed_idle(seeded(Language::Python, IsolationRuntime::Default)).await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        pool.sweep_idle().await;

        assert_eq!(pool.idle_count(Language::Python, IsolationRuntime::Default).await, 0);
    }
}
