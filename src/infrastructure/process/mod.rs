//! Subprocess execution shared by the command-line collaborators.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error talking to {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },
}

/// Captured result of a finished subprocess.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Replace `{name}` placeholders in each argument.
pub fn expand_args(args: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), value)
            })
        })
        .collect()
}

/// Run `program` to completion, feeding `stdin` and killing it on timeout.
pub async fn run(
    program: &str,
    args: &[String],
    stdin: Option<&[u8]>,
    limit: Duration,
) -> Result<ProcessOutput, ProcessError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let writer = match (stdin, child.stdin.take()) {
        (Some(bytes), Some(mut handle)) => {
            let bytes = bytes.to_vec();
            Some(tokio::spawn(async move {
                // Dropping the handle closes stdin and signals end of input.
                handle.write_all(&bytes).await
            }))
        }
        _ => None,
    };

    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| ProcessError::Io {
            program: program.to_string(),
            source,
        })?,
        Err(_) => {
            return Err(ProcessError::Timeout {
                program: program.to_string(),
                secs: limit.as_secs(),
            })
        }
    };

    if let Some(writer) = writer {
        match writer.await {
            Ok(Ok(())) => {}
            // The child may exit without reading all of its input.
            Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
            Ok(Err(source)) => {
                return Err(ProcessError::Io {
                    program: program.to_string(),
                    source,
                })
            }
            Err(e) => tracing::warn!(error = %e, "stdin writer task failed"),
        }
    }

    Ok(ProcessOutput {
        status: output.status,
        stdout: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_args() {
        let args = vec!["--out".to_string(), "{output}".to_string(), "d={duration}".to_string()];
        let expanded = expand_args(&args, &[("output", "/tmp/x.wav"), ("duration", "30")]);
        assert_eq!(expanded, vec!["--out", "/tmp/x.wav", "d=30"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_pipes_stdin_to_stdout() {
        let output = run("cat", &[], Some(b"hello"), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, b"hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out() {
        let args = vec!["-c".to_string(), "sleep 5".to_string()];
        let result = run("sh", &args, None, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(ProcessError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let result = run("coverloop-no-such-binary", &[], None, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }
}
