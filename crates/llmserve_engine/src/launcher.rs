//! Spawning and supervising the engine executor process.

use crate::client::check_health;
use crate::config::EngineConfig;
use crate::hub::{HF_TOKEN_ENV, HubAuth};
use crate::traits::{EngineLauncher, EngineProcess};
use async_trait::async_trait;
use derive_getters::Getters;
use llmserve_error::{ServeError, ServeErrorKind, ServeResult};
use reqwest::Client;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Interval between readiness probes.
const READY_PROBE_INTERVAL: Duration = Duration::from_millis(500);

/// How to start an executor.
#[derive(Debug, Clone, PartialEq, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct ExecutorConfig {
    /// Executor program to run
    #[builder(default = "ExecutorConfig::DEFAULT_COMMAND.to_string()")]
    command: String,
    /// Interface the executor binds to
    #[builder(default = "\"127.0.0.1\".to_string()")]
    host: String,
    /// Port the executor listens on
    #[builder(default = "ExecutorConfig::DEFAULT_PORT")]
    port: u16,
    /// Engine configuration passed as flags
    engine: EngineConfig,
    /// Hub credentials forwarded through the environment
    #[builder(default)]
    auth: HubAuth,
}

impl ExecutorConfig {
    /// Executor program used when none is configured.
    pub const DEFAULT_COMMAND: &'static str = "trtllm-executor";
    /// Executor port used when none is configured.
    pub const DEFAULT_PORT: u16 = 8001;

    /// Create a new builder.
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::default()
    }

    /// Base URL the executor will serve on.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Full argument list: engine flags plus bind address.
    pub fn args(&self) -> Vec<String> {
        let mut args = self.engine.executor_args();
        args.extend([
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
        ]);
        args
    }
}

/// Launches executors as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorLauncher;

impl EngineLauncher for ExecutorLauncher {
    type Process = ExecutorProcess;
    type Config = ExecutorConfig;

    #[instrument(skip(config), fields(command = %config.command, port = config.port))]
    fn start(config: ExecutorConfig) -> ServeResult<ExecutorProcess> {
        let args = config.args();
        debug!(args = ?args, "Spawning executor");

        let mut command = Command::new(&config.command);
        command
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(token) = config.auth.token() {
            command.env(HF_TOKEN_ENV, token);
        }

        let child = command.spawn().map_err(|e| {
            ServeError::new(ServeErrorKind::Engine(format!(
                "Failed to spawn executor '{}': {e}",
                config.command
            )))
        })?;
        info!(pid = ?child.id(), "Executor process started");

        Ok(ExecutorProcess {
            child: Mutex::new(child),
            port: config.port,
            base_url: config.base_url(),
            client: Client::new(),
        })
    }
}

/// A running executor child process.
#[derive(Debug)]
pub struct ExecutorProcess {
    child: Mutex<Child>,
    port: u16,
    base_url: String,
    client: Client,
}

impl ExecutorProcess {
    /// Exit status, if the process has already exited.
    fn exit_status(&self) -> ServeResult<Option<std::process::ExitStatus>> {
        let mut child = self.child.lock().map_err(|_| {
            ServeError::new(ServeErrorKind::Engine("Executor handle poisoned".into()))
        })?;
        Ok(child.try_wait()?)
    }
}

#[async_trait]
impl EngineProcess for ExecutorProcess {
    fn port(&self) -> u16 {
        self.port
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    async fn health_check(&self) -> ServeResult<()> {
        check_health(&self.client, &self.base_url).await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn wait_until_ready(&self, timeout: Duration) -> ServeResult<()> {
        let deadline = Instant::now() + timeout;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.health_check().await {
                Ok(()) => {
                    info!(attempts, "Executor ready");
                    return Ok(());
                }
                Err(e) => debug!(attempts, error = %e, "Executor not ready yet"),
            }

            if let Some(status) = self.exit_status()? {
                return Err(ServeError::new(ServeErrorKind::Engine(format!(
                    "Executor exited during startup: {status}"
                ))));
            }
            if Instant::now() >= deadline {
                warn!(attempts, "Executor did not become ready in time");
                return Err(ServeError::new(ServeErrorKind::Timeout(timeout)));
            }
            tokio::time::sleep(READY_PROBE_INTERVAL).await;
        }
    }

    fn stop(self) -> ServeResult<()> {
        let mut child = self.child.into_inner().map_err(|_| {
            ServeError::new(ServeErrorKind::Engine("Executor handle poisoned".into()))
        })?;
        if child.try_wait()?.is_none() {
            info!(pid = ?child.id(), "Stopping executor");
            child.start_kill()?;
        }
        Ok(())
    }
}
