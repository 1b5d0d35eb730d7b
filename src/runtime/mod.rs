// Model runtime
// Makes sure an Ollama server is answering before the pipeline talks to it, spawning one if allowed

#[cfg(test)]
mod tests;

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::config::settings::HOST_ENV_VAR;
use crate::config::{Config, ServerConfig};
use crate::embeddings::OllamaClient;
use crate::{RagError, Result};

const POLL_INTERVAL_MILLIS: u64 = 250;
const PROBE_TIMEOUT_SECONDS: u64 = 2;

/// How [`ModelRuntime::start`] found the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeStatus {
    /// Something was already answering at the configured address
    AlreadyRunning,
    /// A child `ollama serve` process was launched
    Spawned,
    /// Nothing is answering and spawning is disabled
    Unmanaged,
}

/// Owns the background `ollama serve` process, if this run started one.
///
/// The child is killed when the runtime is dropped.
#[derive(Debug)]
pub struct ModelRuntime {
    server: ServerConfig,
    host_port: String,
    probe: OllamaClient,
    child: Option<Child>,
}

impl ModelRuntime {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let probe = OllamaClient::new(&config.ollama)?
            .with_timeout(Duration::from_secs(PROBE_TIMEOUT_SECONDS))
            .with_retry_attempts(1);

        Ok(Self {
            server: config.server.clone(),
            host_port: config.ollama.host_port(),
            probe,
            child: None,
        })
    }

    #[inline]
    pub const fn has_child(&self) -> bool {
        self.child.is_some()
    }

    /// Check whether the server answers a ping right now
    #[inline]
    pub async fn is_responsive(&self) -> bool {
        let probe = self.probe.clone();
        tokio::task::spawn_blocking(move || probe.ping().is_ok())
            .await
            .unwrap_or(false)
    }

    /// Launch `ollama serve` unless a server already answers or management is disabled.
    ///
    /// Does not wait for a spawned server to come up; see [`Self::wait_until_ready`].
    #[inline]
    pub async fn start(&mut self) -> Result<RuntimeStatus> {
        if self.is_responsive().await {
            debug!("Ollama already answering at {}", self.host_port);
            return Ok(RuntimeStatus::AlreadyRunning);
        }

        if !self.server.manage {
            warn!(
                "No Ollama server at {} and server management is disabled",
                self.host_port
            );
            return Ok(RuntimeStatus::Unmanaged);
        }

        info!(
            "Starting {} serve on {}",
            self.server.binary.display(),
            self.host_port
        );
        let child = Command::new(&self.server.binary)
            .arg("serve")
            .env(HOST_ENV_VAR, &self.host_port)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RagError::Runtime(format!(
                    "Failed to start {}: {}",
                    self.server.binary.display(),
                    e
                ))
            })?;

        self.child = Some(child);
        Ok(RuntimeStatus::Spawned)
    }

    /// Poll until the server answers, the spawned child exits, or `timeout` elapses
    #[inline]
    pub async fn wait_until_ready(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        loop {
            if self.is_responsive().await {
                info!("Ollama is ready at {}", self.host_port);
                return Ok(());
            }

            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    self.child = None;
                    return Err(RagError::Runtime(format!(
                        "{} exited before becoming ready ({})",
                        self.server.binary.display(),
                        status
                    )));
                }
            }

            if Instant::now() >= deadline {
                return Err(RagError::Runtime(format!(
                    "Ollama did not answer at {} within {:?}",
                    self.host_port, timeout
                )));
            }

            sleep(Duration::from_millis(POLL_INTERVAL_MILLIS)).await;
        }
    }

    /// Start the server if needed and wait for it using the configured timeout
    #[inline]
    pub async fn ensure_ready(&mut self) -> Result<RuntimeStatus> {
        let status = self.start().await?;
        match status {
            RuntimeStatus::AlreadyRunning => {}
            RuntimeStatus::Spawned => {
                self.wait_until_ready(Duration::from_secs(self.server.ready_timeout_secs))
                    .await?;
            }
            RuntimeStatus::Unmanaged => {
                return Err(RagError::Runtime(format!(
                    "No Ollama server is answering at {}",
                    self.host_port
                )));
            }
        }
        Ok(status)
    }

    /// Stop the spawned server, if any
    #[inline]
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            debug!("Stopping background Ollama server");
            child.kill().await?;
        }
        Ok(())
    }
}
