//! Local tunnel process lifecycle.
//!
//! The tunnel exposes a locally served test page to the remote grid. It is
//! started before any session and stopped only after the last session has
//! completed.

use regex::Regex;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::config::{Credentials, TunnelConfig};

/// Exit code the tunnel binary reports when it is shut down from outside
/// (SIGTERM). Startup ending this way is operator-initiated, not a launch
/// error.
const TERMINATED_EXIT_CODE: i32 = 143;

#[derive(Debug, Error)]
pub enum TunnelError {
    /// The tunnel was shut down before it became ready.
    #[error("tunnel terminated before ready")]
    Terminated,

    /// The tunnel exited before signalling ready.
    #[error("tunnel failed to launch: {0}")]
    Launch(String),

    #[error("invalid tunnel ready pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A running tunnel process, ready for traffic.
pub struct Tunnel {
    child: Child,
}

impl Tunnel {
    /// Launch the tunnel and wait until it signals ready on stdout.
    ///
    /// Credentials go through the child's environment, matching the tunnel
    /// binary's own convention.
    pub async fn start(
        config: &TunnelConfig,
        credentials: &Credentials,
    ) -> Result<Self, TunnelError> {
        let ready = Regex::new(&config.ready_pattern)?;

        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .env("SAUCE_USERNAME", &credentials.user)
            .env("SAUCE_ACCESS_KEY", &credentials.key)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if config.verbose {
            command.arg("-v");
        }

        let mut child = command.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TunnelError::Launch("no stdout handle".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        loop {
            match lines.next_line().await? {
                Some(line) => {
                    log::debug!("tunnel: {}", line);
                    if ready.is_match(&line) {
                        // Keep draining stdout so the child never stalls on
                        // a full pipe.
                        tokio::spawn(async move {
                            while let Ok(Some(line)) = lines.next_line().await {
                                log::debug!("tunnel: {}", line);
                            }
                        });
                        return Ok(Self { child });
                    }
                }
                None => {
                    // stdout closed: the process exited before ready
                    let status = child.wait().await?;
                    return Err(match status.code() {
                        Some(TERMINATED_EXIT_CODE) | None => TunnelError::Terminated,
                        Some(code) => TunnelError::Launch(format!("exit code {}", code)),
                    });
                }
            }
        }
    }

    /// Stop the tunnel process and wait for it to exit.
    pub async fn close(mut self) {
        if let Err(e) = self.child.kill().await {
            log::warn!("Failed to stop tunnel: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_tunnel(script: &str, ready_pattern: &str) -> TunnelConfig {
        TunnelConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            ready_pattern: ready_pattern.to_string(),
            verbose: false,
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            user: "user".to_string(),
            key: "key".to_string(),
        }
    }

    #[tokio::test]
    async fn test_ready_detection() {
        let config = shell_tunnel("echo starting; echo 'tunnel is up'; sleep 30", "tunnel is up");
        let tunnel = Tunnel::start(&config, &credentials()).await.unwrap();
        tunnel.close().await;
    }

    #[tokio::test]
    async fn test_exit_before_ready_is_launch_error() {
        let config = shell_tunnel("echo denied; exit 7", "tunnel is up");
        match Tunnel::start(&config, &credentials()).await {
            Err(TunnelError::Launch(msg)) => assert!(msg.contains("7")),
            other => panic!("expected launch error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_terminated_exit_code_is_expected() {
        let config = shell_tunnel("exit 143", "tunnel is up");
        assert!(matches!(
            Tunnel::start(&config, &credentials()).await,
            Err(TunnelError::Terminated)
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let config = TunnelConfig {
            command: "definitely-not-a-tunnel-binary".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Tunnel::start(&config, &credentials()).await,
            Err(TunnelError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_credentials_reach_child_environment() {
        let config = shell_tunnel(
            "if [ \"$SAUCE_USERNAME\" = user ]; then echo 'tunnel is up'; sleep 30; else exit 1; fi",
            "tunnel is up",
        );
        let tunnel = Tunnel::start(&config, &credentials()).await.unwrap();
        tunnel.close().await;
    }
}
