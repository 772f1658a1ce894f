//! Native executor that shells out to configured commands.
//!
//! Each native operation maps to an argv vector. The operation succeeds when
//! the command exits with status 0; `status` exiting 0 means "running".

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::PlatformError;
use crate::{NativeClient, NativeExecutor};

/// Commands backing each native operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCommands {
    #[serde(default)]
    pub start: Vec<String>,
    #[serde(default)]
    pub stop: Vec<String>,
    #[serde(default)]
    pub status: Vec<String>,
    /// Optional. `"1"` or `"0"` is appended as the last argument.
    #[serde(default)]
    pub enable_input: Vec<String>,
}

/// [`NativeExecutor`] backed by external commands.
pub struct CommandExecutor {
    commands: NativeCommands,
}

impl CommandExecutor {
    pub fn new(commands: NativeCommands) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl NativeExecutor for CommandExecutor {
    async fn create_client(&self) -> Result<Arc<dyn NativeClient>, PlatformError> {
        for (name, argv) in [
            ("start", &self.commands.start),
            ("stop", &self.commands.stop),
            ("status", &self.commands.status),
        ] {
            if argv.is_empty() {
                return Err(PlatformError::Config(format!(
                    "native.{name} command is not configured"
                )));
            }
        }
        Ok(Arc::new(CommandClient {
            commands: self.commands.clone(),
        }))
    }
}

struct CommandClient {
    commands: NativeCommands,
}

impl CommandClient {
    async fn run(&self, argv: &[String], extra: Option<&str>) -> Result<bool, PlatformError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(PlatformError::Config("empty command".to_string()));
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .args(extra)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = command
            .status()
            .await
            .map_err(|e| PlatformError::Native(format!("{program}: {e}")))?;
        debug!(program = %program, ?status, "native command exited");
        Ok(status.success())
    }

    async fn run_checked(&self, argv: &[String], extra: Option<&str>) -> Result<(), PlatformError> {
        if self.run(argv, extra).await? {
            Ok(())
        } else {
            Err(PlatformError::Native(format!(
                "{} exited unsuccessfully",
                argv.join(" ")
            )))
        }
    }
}

#[async_trait]
impl NativeClient for CommandClient {
    async fn start(&self) -> Result<(), PlatformError> {
        self.run_checked(&self.commands.start, None).await
    }

    async fn stop(&self) -> Result<(), PlatformError> {
        self.run_checked(&self.commands.stop, None).await
    }

    async fn is_running(&self) -> Result<bool, PlatformError> {
        self.run(&self.commands.status, None).await
    }

    async fn set_input_enabled(&self, enabled: bool) -> Result<(), PlatformError> {
        if self.commands.enable_input.is_empty() {
            return Ok(());
        }
        let flag = if enabled { "1" } else { "0" };
        self.run_checked(&self.commands.enable_input, Some(flag))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn missing_commands_are_rejected() {
        let executor = CommandExecutor::new(NativeCommands::default());
        match executor.create_client().await {
            Err(PlatformError::Config(msg)) => assert!(msg.contains("native.start")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a configuration error"),
        }
    }

    #[tokio::test]
    async fn exit_status_drives_results() {
        let executor = CommandExecutor::new(NativeCommands {
            start: argv(&["true"]),
            stop: argv(&["false"]),
            status: argv(&["true"]),
            enable_input: Vec::new(),
        });
        let client = executor.create_client().await.unwrap();

        assert!(client.start().await.is_ok());
        assert!(matches!(client.stop().await, Err(PlatformError::Native(_))));
        assert!(client.is_running().await.unwrap());
        // No routing command configured: nothing to do.
        assert!(client.set_input_enabled(true).await.is_ok());
    }

    #[tokio::test]
    async fn enable_input_appends_flag() {
        let executor = CommandExecutor::new(NativeCommands {
            start: argv(&["true"]),
            stop: argv(&["true"]),
            status: argv(&["false"]),
            enable_input: argv(&["test", "1", "="]),
        });
        let client = executor.create_client().await.unwrap();

        assert!(!client.is_running().await.unwrap());
        assert!(client.set_input_enabled(true).await.is_ok());
        assert!(client.set_input_enabled(false).await.is_err());
    }

    #[tokio::test]
    async fn unknown_program_is_a_native_error() {
        let executor = CommandExecutor::new(NativeCommands {
            start: argv(&["/nonexistent/perspectived"]),
            stop: argv(&["true"]),
            status: argv(&["true"]),
            enable_input: Vec::new(),
        });
        let client = executor.create_client().await.unwrap();
        assert!(matches!(client.start().await, Err(PlatformError::Native(_))));
    }
}
