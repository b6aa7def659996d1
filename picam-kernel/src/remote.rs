//! Remote command execution on the camera hosts.
//!
//! [`CommandExecutor`] is the seam the poller and the orchestrator depend on.
//! [`SshCommandExecutor`] shells out to the system `ssh` client, one connection
//! per call, no retry.

use crate::config::CameraConfig;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// `ssh` sort en 255 pour ses propres erreurs (connexion, auth, host key)
const SSH_ERROR_EXIT: i32 = 255;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteExecutionError {
    #[error("connection to {host} failed: {message}")]
    Connection { host: String, message: String },
    #[error("authentication failed for {user}@{host}: {message}")]
    Authentication { user: String, host: String, message: String },
    #[error("Command exited with code {code}: {output}")]
    NonZeroExit { code: i32, output: String },
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to spawn ssh: {0}")]
    Spawn(String),
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Sortie (stdout + stderr, trimée) si le code retour est 0
    async fn execute(&self, device: &CameraConfig, command: &str) -> Result<String, RemoteExecutionError>;
}

pub struct SshCommandExecutor {
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl Default for SshCommandExecutor {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(20),
        }
    }
}

impl SshCommandExecutor {
    pub fn new(connect_timeout: Duration, command_timeout: Duration) -> Self {
        Self { connect_timeout, command_timeout }
    }

    fn ssh_args(&self, device: &CameraConfig, command: &str) -> Vec<String> {
        let ssh = &device.ssh;
        vec![
            "-o".into(),
            "BatchMode=yes".into(),
            "-o".into(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            "-o".into(),
            "StrictHostKeyChecking=accept-new".into(),
            "-i".into(),
            ssh.private_key.display().to_string(),
            "-p".into(),
            ssh.port.to_string(),
            format!("{}@{}", ssh.username, ssh.host),
            "--".into(),
            command.to_string(),
        ]
    }
}

#[async_trait]
impl CommandExecutor for SshCommandExecutor {
    async fn execute(&self, device: &CameraConfig, command: &str) -> Result<String, RemoteExecutionError> {
        debug!(device = %device.id, %command, "ssh exec");

        let output = tokio::time::timeout(
            self.command_timeout,
            AsyncCommand::new("ssh")
                .args(self.ssh_args(device, command))
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| RemoteExecutionError::Timeout(self.command_timeout))?
        .map_err(|e| RemoteExecutionError::Spawn(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{stdout}{stderr}").trim().to_string();

        classify_exit(device, output.status.code().unwrap_or(-1), combined, &stderr)
    }
}

fn classify_exit(
    device: &CameraConfig,
    code: i32,
    combined: String,
    stderr: &str,
) -> Result<String, RemoteExecutionError> {
    match code {
        0 => Ok(combined),
        SSH_ERROR_EXIT if stderr.contains("Permission denied") => Err(RemoteExecutionError::Authentication {
            user: device.ssh.username.clone(),
            host: device.ssh.host.clone(),
            message: stderr.trim().to_string(),
        }),
        SSH_ERROR_EXIT => Err(RemoteExecutionError::Connection {
            host: device.ssh.host.clone(),
            message: stderr.trim().to_string(),
        }),
        code => Err(RemoteExecutionError::NonZeroExit { code, output: combined }),
    }
}
