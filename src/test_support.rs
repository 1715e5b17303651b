//! Mock `ContainerEngine` shared by unit tests across modules (executor,
//! comparator) so scenario coverage doesn't require a real Docker daemon.
//! Mirrors the teacher's habit of keeping fakes colocated with the code
//! they exercise rather than in a separate integration-test crate.

use async_trait::async_trait;

use crate::engine::{ContainerEngine, ContainerHandle, ExecOutput};
use crate::error::{PlatformError, PlatformResult};
use crate::models::IsolationRuntime;

/// Behavior a `MockEngine` fakes out for `exec`. Every exec call returns
/// the same outcome regardless of which container it targets.
pub enum ExecBehavior {
    Success,
    NonZeroExit(i32),
    HangForever,
    Fail,
}

pub struct MockEngine {
    pub behavior: ExecBehavior,
}

impl MockEngine {
    pub fn new(behavior: ExecBehavior) -> Self {
        Self { behavior }
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn create(
        &self,
        _image: &str,
        _command: Vec<String>,
        _runtime: IsolationRuntime,
        _workdir: &str,
        name: &str,
    ) -> PlatformResult<ContainerHandle> {
        Ok(ContainerHandle(name.to_string()))
    }

    async fn copy_in(&self, _handle: &ContainerHandle, _content: &[u8], _target_path: &str) -> PlatformResult<()> {
        Ok(())
    }

    async fn exec(
        &self,
        _handle: &ContainerHandle,
        _argv: Vec<String>,
        _workdir: &str,
    ) -> PlatformResult<ExecOutput> {
        match self.behavior {
            ExecBehavior::Success => Ok(ExecOutput {
                exit_code: 0,
                stdout: "Hello, World!\n".to_string(),
                stderr: String::new(),
            }),
            ExecBehavior::NonZeroExit(code) => Ok(ExecOutput {
                exit_code: code,
                stdout: String::new(),
                stderr: "boom".to_string(),
            }),
            ExecBehavior::HangForever => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
            ExecBehavior::Fail => Err(PlatformError::EngineExec("exec failed".to_string())),
        }
    }

    async fn stop(&self, _handle: &ContainerHandle, _grace_secs: u64) {}
    async fn remove(&self, _handle: &ContainerHandle) {}
    async fn is_running(&self, _handle: &ContainerHandle) -> bool {
        true
    }
    async fn health_check(&self) -> PlatformResult<String> {
        Ok("mock".to_string())
    }
}
