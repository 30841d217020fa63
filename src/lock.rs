//! Lock command invocation.
//!
//! Runs the configured lock command to completion. Failures are reported in
//! the outcome and logged, never returned as errors.

use std::process::ExitStatus;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

/// Result of one lock attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum LockOutcome {
    /// Command exited successfully.
    Locked,
    /// Command ran but exited unsuccessfully.
    Failed(ExitStatus),
    /// Command could not be started.
    SpawnFailed(String),
    /// Dry run: nothing was executed.
    Skipped,
}

/// Runs the lock command.
#[async_trait]
pub trait LockInvoker: Send {
    /// Run the lock command once and wait for it to exit.
    async fn invoke(&mut self) -> LockOutcome;
}

/// Lock invoker that executes an external command.
#[derive(Debug)]
pub struct CommandLocker {
    /// Program followed by its arguments.
    command: Vec<String>,

    /// Dry run mode.
    dry_run: bool,
}

impl CommandLocker {
    /// Create a locker from a tokenized command. `command` must not be empty.
    pub fn new(command: Vec<String>, dry_run: bool) -> Self {
        debug_assert!(!command.is_empty());
        Self { command, dry_run }
    }

    /// The command line as a single string for logging.
    pub fn display(&self) -> String {
        self.command.join(" ")
    }
}

#[async_trait]
impl LockInvoker for CommandLocker {
    async fn invoke(&mut self) -> LockOutcome {
        if self.dry_run {
            info!("[DRY RUN] Would execute: {}", self.display());
            return LockOutcome::Skipped;
        }

        let Some((program, args)) = self.command.split_first() else {
            error!("Lock command is empty");
            return LockOutcome::SpawnFailed("empty command".to_string());
        };

        info!("Locking now: {}", self.display());

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();

        let output = match child {
            Ok(child) => child.wait_with_output().await,
            Err(e) => {
                error!("Failed to spawn lock command '{}': {}", program, e);
                return LockOutcome::SpawnFailed(e.to_string());
            }
        };

        match output {
            Ok(output) if output.status.success() => {
                debug!("Lock command exited successfully");
                LockOutcome::Locked
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(
                    "Lock command failed (exit code {:?}): {}",
                    output.status.code(),
                    stderr.trim()
                );
                LockOutcome::Failed(output.status)
            }
            Err(e) => {
                error!("Failed to wait for lock command: {}", e);
                LockOutcome::SpawnFailed(e.to_string())
            }
        }
    }
}
