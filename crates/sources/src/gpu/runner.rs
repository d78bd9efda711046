//! Subprocess execution for the shell backend

use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::runtime::Builder;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} did not finish within {timeout_ms} ms")]
    Timeout { program: String, timeout_ms: u64 },
    #[error("Failed to run {program}: {message}")]
    Worker { program: String, message: String },
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` if the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(exit_code),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr, trimmed
    pub fn text(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (_, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{}\n{}", stdout, stderr),
        }
    }
}

/// Runs external commands on behalf of the shell backend
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, RunError>;
}

/// Runs commands as real subprocesses with a per-command timeout
///
/// Each command is driven on its own worker thread with a private
/// current-thread runtime, so callers may be plain threads or tasks inside
/// any tokio runtime flavor.
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn run_blocking(&self, program: &str, args: &[String]) -> Result<CommandOutput, RunError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RunError::Worker {
                program: program.to_string(),
                message: e.to_string(),
            })?;
        runtime.block_on(self.run_async(program, args))
    }

    async fn run_async(&self, program: &str, args: &[String]) -> Result<CommandOutput, RunError> {
        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| RunError::Timeout {
                program: program.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|source| RunError::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, RunError> {
        log::trace!("Running {} {}", program, args.join(" "));
        let result = std::thread::scope(|scope| {
            scope
                .spawn(|| self.run_blocking(program, args))
                .join()
                .unwrap_or_else(|_| {
                    Err(RunError::Worker {
                        program: program.to_string(),
                        message: "worker thread panicked".to_string(),
                    })
                })
        });
        if let Err(e) = &result {
            log::debug!("{}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_merges_streams() {
        let output = CommandOutput {
            stdout: "  61\n".into(),
            stderr: String::new(),
            exit_code: Some(0),
        };
        assert_eq!(output.text(), "61");
        assert!(output.success());

        let output = CommandOutput {
            stdout: String::new(),
            stderr: "No devices were found\n".into(),
            exit_code: Some(6),
        };
        assert_eq!(output.text(), "No devices were found");
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_program_is_spawn_error() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let result = runner.run("gpu-no-such-tool", &[]);
        assert!(matches!(result, Err(RunError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_exit_code() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let output = runner
            .run("sh", &["-c".to_string(), "echo out; exit 3".to_string()])
            .unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.text(), "out");
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout() {
        let runner = SystemRunner::new(Duration::from_millis(100));
        let result = runner.run("sleep", &["5".to_string()]);
        assert!(matches!(result, Err(RunError::Timeout { timeout_ms: 100, .. })));
    }
    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_runs_inside_multi_thread_runtime() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let output = runner.run("sh", &["-c".to_string(), "echo 61".to_string()]).unwrap();
        assert_eq!(output.text(), "61");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_inside_current_thread_runtime() {
        let runner = SystemRunner::new(Duration::from_millis(100));
        let result = runner.run("sleep", &["5".to_string()]);
        assert!(matches!(result, Err(RunError::Timeout { timeout_ms: 100, .. })));
    }
}
