mod docker;

pub use docker::DockerEngine;

use async_trait::async_trait;

use crate::error::PlatformResult;
use crate::models::IsolationRuntime;

/// Opaque handle to a running container. Cheap to clone; the engine is
/// the only thing that interprets its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle(pub String);

impl std::fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Thin abstraction over a container daemon. Every other component that
/// touches a container goes through this trait, never through `bollard`
/// directly. `DockerEngine` is the only impl today, but the seam is what
/// lets a future `runc`/`containerd` backend slot in without touching
/// the pool, executor, or comparator.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Creates a container under the given isolation runtime and returns
    /// only once it is ready to accept `exec`. Does not itself start a
    /// user program; `command` is expected to be a long-running no-op
    /// (a sleep) that keeps the container alive for subsequent execs.
    async fn create(
        &self,
        image: &str,
        command: Vec<String>,
        runtime: IsolationRuntime,
        workdir: &str,
        name: &str,
    ) -> PlatformResult<ContainerHandle>;

    /// Writes `content` to `target_path` inside the container.
    async fn copy_in(
        &self,
        handle: &ContainerHandle,
        content: &[u8],
        target_path: &str,
    ) -> PlatformResult<()>;

    /// Runs `argv` to completion inside the container and returns its
    /// exit code and captured output. Does not implement a timeout;
    /// that is the caller's responsibility.
    async fn exec(
        &self,
        handle: &ContainerHandle,
        argv: Vec<String>,
        workdir: &str,
    ) -> PlatformResult<ExecOutput>;

    /// Idempotent best-effort stop; never fatal to the caller.
    async fn stop(&self, handle: &ContainerHandle, grace_secs: u64);

    async fn remove(&self, handle: &ContainerHandle);

    async fn is_running(&self, handle: &ContainerHandle) -> bool;

    async fn health_check(&self) -> PlatformResult<String>;
}
