//! External process execution
//!
//! Commands are argument vectors, never shell strings. [`ProcessRunner`]
//! is the seam between orchestration and the OS so the launcher can be
//! driven against a recording runner in tests.

use std::fmt;
use std::path::Path;
use std::process::Stdio;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Process errors
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Command `{command}` exited with status {code}")]
    Failed { command: String, code: i32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Command for an executable given by path
    pub fn from_path(program: &Path) -> Self {
        Self::new(program.to_string_lossy())
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// True if `flag` appears as an argument
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Argument following `flag`, if any
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Renders the command for logs; arguments with spaces are single-quoted.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Executes external commands
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to exit; a non-zero status is an error
    async fn check_call(&self, command: &CommandSpec) -> Result<(), ProcessError>;

    /// Start in the background without waiting
    async fn spawn(&self, command: &CommandSpec) -> Result<(), ProcessError>;

    /// Run with stdout piped, drain it and wait. The exit status is not checked.
    async fn run_to_completion(&self, command: &CommandSpec) -> Result<(), ProcessError>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

fn spawn_error(command: &CommandSpec, source: std::io::Error) -> ProcessError {
    ProcessError::Spawn {
        command: command.to_string(),
        source,
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn check_call(&self, command: &CommandSpec) -> Result<(), ProcessError> {
        debug!("check_call: {}", command);

        let status = command
            .to_command()
            .status()
            .await
            .map_err(|e| spawn_error(command, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(ProcessError::Failed {
                command: command.to_string(),
                code: status.code().unwrap_or(-1),
            })
        }
    }

    async fn spawn(&self, command: &CommandSpec) -> Result<(), ProcessError> {
        let child = command
            .to_command()
            .spawn()
            .map_err(|e| spawn_error(command, e))?;

        info!("Started {} (pid {:?})", command.program, child.id());
        Ok(())
    }

    async fn run_to_completion(&self, command: &CommandSpec) -> Result<(), ProcessError> {
        let mut child = command
            .to_command()
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(command, e))?;

        // Output is not guaranteed to be UTF-8; read raw lines so the child
        // is always waited on.
        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut line = Vec::new();
            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line).await {
                    Ok(0) => break,
                    Ok(_) => debug!(
                        "{}: {}",
                        command.program,
                        String::from_utf8_lossy(&line).trim_end()
                    ),
                    Err(e) => {
                        warn!("Failed to read output of {}: {}", command.program, e);
                        break;
                    }
                }
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            warn!("{} exited with {}", command.program, status);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// How a recorded command was invoked
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum CallKind {
        Checked,
        Spawned,
        Completed,
    }

    /// Records commands instead of running them
    #[derive(Default)]
    pub(crate) struct RecordingRunner {
        pub calls: Mutex<Vec<(CallKind, CommandSpec)>>,
        pub fail_program: Option<String>,
    }

    impl RecordingRunner {
        pub fn failing(program: &str) -> Self {
            Self {
                fail_program: Some(program.to_string()),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<(CallKind, CommandSpec)> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, kind: CallKind, command: &CommandSpec) -> Result<(), ProcessError> {
            self.calls.lock().unwrap().push((kind, command.clone()));
            match &self.fail_program {
                Some(program) if *program == command.program => Err(ProcessError::Failed {
                    command: command.to_string(),
                    code: 1,
                }),
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ProcessRunner for RecordingRunner {
        async fn check_call(&self, command: &CommandSpec) -> Result<(), ProcessError> {
            self.record(CallKind::Checked, command)
        }

        async fn spawn(&self, command: &CommandSpec) -> Result<(), ProcessError> {
            self.record(CallKind::Spawned, command)
        }

        async fn run_to_completion(&self, command: &CommandSpec) -> Result<(), ProcessError> {
            self.record(CallKind::Completed, command)
        }
    }

    #[test]
    fn test_display_quotes_spaces() {
        let cmd = CommandSpec::new("avdmanager")
            .args(["create", "avd"])
            .arg("-d")
            .arg("Nexus 5");
        assert_eq!(cmd.to_string(), "avdmanager create avd -d 'Nexus 5'");
    }

    #[test]
    fn test_value_of() {
        let cmd = CommandSpec::new("appium").args(["-p", "4723", "--relaxed-security"]);
        assert_eq!(cmd.value_of("-p"), Some("4723"));
        assert_eq!(cmd.value_of("--relaxed-security"), None);
        assert!(cmd.has_arg("--relaxed-security"));
        assert!(!cmd.has_arg("--nodeconfig"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_check_call_reports_exit_status() {
        let runner = SystemRunner::new();

        runner.check_call(&CommandSpec::new("true")).await.unwrap();

        let err = runner.check_call(&CommandSpec::new("false")).await.unwrap_err();
        assert!(matches!(err, ProcessError::Failed { code: 1, .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let runner = SystemRunner::new();
        let err = runner
            .check_call(&CommandSpec::new("definitely-not-a-real-program-avd-node"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_to_completion_ignores_status() {
        let runner = SystemRunner::new();
        let cmd = CommandSpec::new("sh").args(["-c", "echo booting; exit 3"]);
        runner.run_to_completion(&cmd).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_to_completion_tolerates_invalid_utf8() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("done");
        let script = format!(
            "printf 'boot\\377\\n'; sleep 1; echo done; touch '{}'",
            marker.display()
        );

        let runner = SystemRunner::new();
        let cmd = CommandSpec::new("sh").args(["-c", script.as_str()]);
        runner.run_to_completion(&cmd).await.unwrap();

        assert!(marker.exists());
    }
}
