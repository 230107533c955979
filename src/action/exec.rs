use super::ActionHandler;
use crate::error::{DeckError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Run a program with fixed arguments, no shell involved.
#[derive(Debug, Clone)]
pub struct ExecAction {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ExecAction {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the command and return its combined stdout and stderr.
    ///
    /// # Errors
    /// `DeckError::Spawn` if the program cannot be started, `DeckError::Exec`
    /// on a non-zero exit, `DeckError::Timeout` if it outlives the timeout
    /// (the child is killed).
    pub async fn run(&self) -> Result<String> {
        let command = self.describe();
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DeckError::Spawn {
                command: command.clone(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| DeckError::Timeout {
                what: command.clone(),
                after: self.timeout,
            })??;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = combined.trim_end().to_string();

        if output.status.success() {
            Ok(combined)
        } else {
            Err(DeckError::Exec {
                command,
                code: output.status.code(),
                output: combined,
            })
        }
    }
}

#[async_trait]
impl ActionHandler for ExecAction {
    fn describe(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(quote(&self.program));
        parts.extend(self.args.iter().map(|a| quote(a)));
        parts.join(" ")
    }

    async fn invoke(&self) -> Result<()> {
        let output = self.run().await?;
        if !output.is_empty() {
            debug!("{}: {output}", self.program);
        }
        Ok(())
    }
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        format!("\"{arg}\"")
    } else {
        arg.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_quotes_spaced_args() {
        let a = ExecAction::new("xdotool", ["search", "--name", "Meet - *", "key", "ctrl+d"]);
        assert_eq!(a.describe(), "xdotool search --name \"Meet - *\" key ctrl+d");
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let a = ExecAction::new("deckplug-no-such-binary", Vec::<String>::new());
        let err = a.run().await.unwrap_err();
        assert!(matches!(err, DeckError::Spawn { .. }));
        assert!(err.to_string().contains("deckplug-no-such-binary"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_captures_code_and_output() {
        let a = ExecAction::new("sh", ["-c", "echo out; echo err >&2; exit 3"]);
        match a.run().await.unwrap_err() {
            DeckError::Exec { code, output, .. } => {
                assert_eq!(code, Some(3));
                assert!(output.contains("out"));
                assert!(output.contains("err"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn success_returns_output() {
        let a = ExecAction::new("sh", ["-c", "echo hello"]);
        assert_eq!(a.run().await.unwrap(), "hello");
        assert!(a.invoke().await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let a = ExecAction::new("sleep", ["5"]).with_timeout(Duration::from_millis(50));
        assert!(matches!(a.run().await, Err(DeckError::Timeout { .. })));
    }
}
