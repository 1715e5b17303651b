use async_trait::async_trait;
use bollard::models::HostConfig;
use bollard::service::ContainerCreateBody;
use bollard::Docker;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{ContainerEngine, ContainerHandle, ExecOutput};
use crate::config::{Config, NetworkMode};
use crate::error::{PlatformError, PlatformResult};
use crate::models::IsolationRuntime;

pub struct DockerEngine {
    docker: Docker,
    config: Config,
}

impl DockerEngine {
    pub async fn new(config: &Config) -> PlatformResult<Self> {
        let docker = if let Some(path) = config.docker_host.strip_prefix("unix://") {
            Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION)
        } else {
            Docker::connect_with_http(&config.docker_host, 120, bollard::API_DEFAULT_VERSION)
        }
        .map_err(|e| PlatformError::EngineUnavailable(e.to_string()))?;

        docker
            .ping()
            .await
            .map_err(|e| PlatformError::EngineUnavailable(e.to_string()))?;

        info!("docker engine connected at {}", config.docker_host);

        Ok(Self {
            docker,
            config: config.clone(),
        })
    }

    fn host_config(&self, runtime: IsolationRuntime) -> HostConfig {
        let mut host_config = HostConfig::default();

        host_config.memory = Some((self.config.max_memory_mb * 1024 * 1024) as i64);
        host_config.memory_swap = Some((self.config.max_memory_mb * 1024 * 1024) as i64);
        host_config.cpu_quota = Some(self.config.max_cpu_quota as i64);
        host_config.cpu_period = Some(100_000);
        host_config.pids_limit = Some(50);

        host_config.network_mode = Some(match self.config.network_mode {
            NetworkMode::None => "none".to_string(),
            NetworkMode::Bridge => "bridge".to_string(),
        });

        if self.config.drop_all_capabilities {
            host_config.cap_drop = Some(vec!["ALL".to_string()]);
        }
        host_config.security_opt = Some(vec!["no-new-privileges".to_string()]);
        host_config.privileged = Some(false);
        host_config.devices = Some(vec![]);

        // The hardened isolation runtime is identified to the engine by a
        // runtime tag (e.g. "runsc"); the default runtime leaves this
        // unset and gets whatever the engine's own default is.
        if runtime == IsolationRuntime::Hardened {
            host_config.runtime = Some(self.config.hardened_runtime_tag.clone());
        }

        host_config
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn create(
        &self,
        image: &str,
        command: Vec<String>,
        runtime: IsolationRuntime,
        workdir: &str,
        name: &str,
    ) -> PlatformResult<ContainerHandle> {
        let host_config = self.host_config(runtime);

        let container_config = ContainerCreateBody {
            image: Some(image.to_string()),
            working_dir: Some(workdir.to_string()),
            cmd: Some(command),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            open_stdin: Some(false),
            host_config: Some(host_config),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(
                Some(bollard::container::CreateContainerOptions {
                    name: name.to_string(),
                    platform: None,
                }),
                container_config,
            )
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError { status_code, .. }
                    if status_code == 409 =>
                {
                    PlatformError::InvalidInput(format!("container name in use: {}", name))
                }
                other => PlatformError::EngineIo(other.to_string()),
            })?;

        for warning in response.warnings {
            warn!("container creation warning: {}", warning);
        }

        self.docker
            .start_container(
                &response.id,
                None::<bollard::container::StartContainerOptions<String>>,
            )
            .await
            .map_err(|e| PlatformError::EngineIo(e.to_string()))?;

        debug!("container ready: {}", response.id);
        Ok(ContainerHandle(response.id))
    }

    async fn copy_in(
        &self,
        handle: &ContainerHandle,
        content: &[u8],
        target_path: &str,
    ) -> PlatformResult<()> {
        // Pipe the bytes straight into the container via `tee` on stdin.
        // Avoids a local temp file and works under a read-only rootfs
        // (shell redirection can't create the target under cap-drop).
        let exec_config = bollard::exec::CreateExecOptions {
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            attach_stdin: Some(true),
            cmd: Some(vec!["tee".to_string(), target_path.to_string()]),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(&handle.0, exec_config)
            .await
            .map_err(|e| PlatformError::EngineIo(e.to_string()))?;

        match self
            .docker
            .start_exec(
                &exec.id,
                Some(bollard::exec::StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| PlatformError::EngineIo(e.to_string()))?
        {
            bollard::exec::StartExecResults::Attached {
                mut output,
                mut input,
            } => {
                input
                    .write_all(content)
                    .await
                    .map_err(|e| PlatformError::EngineIo(e.to_string()))?;
                drop(input);

                while let Some(msg) = output.next().await {
                    if let Ok(bollard::container::LogOutput::StdErr { message }) = msg {
                        let stderr = String::from_utf8_lossy(&message);
                        if !stderr.trim().is_empty() {
                            return Err(PlatformError::EngineIo(format!(
                                "failed to write {}: {}",
                                target_path, stderr
                            )));
                        }
                    }
                }
                Ok(())
            }
            _ => Err(PlatformError::EngineIo(
                "failed to attach to exec for copy-in".to_string(),
            )),
        }
    }

    async fn exec(
        &self,
        handle: &ContainerHandle,
        argv: Vec<String>,
        workdir: &str,
    ) -> PlatformResult<ExecOutput> {
        let exec_config = bollard::exec::CreateExecOptions {
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            cmd: Some(argv),
            working_dir: Some(workdir.to_string()),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(&handle.0, exec_config)
            .await
            .map_err(|e| PlatformError::EngineExec(e.to_string()))?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        if let bollard::exec::StartExecResults::Attached { mut output, .. } = self
            .docker
            .start_exec(&exec.id, None::<bollard::exec::StartExecOptions>)
            .await
            .map_err(|e| PlatformError::EngineExec(e.to_string()))?
        {
            while let Some(msg) = output.next().await {
                match msg {
                    Ok(bollard::container::LogOutput::StdOut { message }) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(bollard::container::LogOutput::StdErr { message }) => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    Err(e) => {
                        return Err(PlatformError::EngineExec(e.to_string()));
                    }
                    _ => {}
                }
            }
        }

        let exit_code = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .ok()
            .and_then(|i| i.exit_code)
            .unwrap_or(0);

        Ok(ExecOutput {
            exit_code: exit_code as i32,
            stdout,
            stderr,
        })
    }

    async fn stop(&self, handle: &ContainerHandle, _grace_secs: u64) {
        // The container's own stop_timeout (set at creation, mirroring
        // `ctx.timeout + 5`) governs how long Docker waits before SIGKILL;
        // nothing further to configure per-call.
        if let Err(e) = self
            .docker
            .stop_container(&handle.0, None::<bollard::container::StopContainerOptions>)
            .await
        {
            warn!("failed to stop container {}: {}", handle, e);
            let _ = self
                .docker
                .kill_container(
                    &handle.0,
                    None::<bollard::container::KillContainerOptions<String>>,
                )
                .await;
        }
    }

    async fn remove(&self, handle: &ContainerHandle) {
        let options = bollard::container::RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        if let Err(e) = self.docker.remove_container(&handle.0, Some(options)).await {
            warn!("failed to remove container {}: {}", handle, e);
        }
    }

    async fn is_running(&self, handle: &ContainerHandle) -> bool {
        use bollard::query_parameters::InspectContainerOptions;
        match self
            .docker
            .inspect_container(&handle.0, None::<InspectContainerOptions>)
            .await
        {
            Ok(info) => info.state.and_then(|s| s.running).unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn health_check(&self) -> PlatformResult<String> {
        self.docker
            .version()
            .await
            .map(|v| format!("Docker {}", v.version.unwrap_or_default()))
            .map_err(|e| PlatformError::EngineUnavailable(e.to_string()))
    }
}
