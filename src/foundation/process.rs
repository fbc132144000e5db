use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::foundation::cancel::CancelToken;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of an external tool that ran to completion.
#[derive(Debug)]
pub(crate) struct ToolOutput {
    pub(crate) status: ExitStatus,
    pub(crate) stdout: Vec<u8>,
    pub(crate) stderr: Vec<u8>,
}

impl ToolOutput {
    pub(crate) fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum ToolFailure {
    #[error("failed to spawn '{program}' (is it installed and on PATH?): {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("i/o error while running '{program}': {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
    #[error("'{program}' timed out after {:.1}s", after.as_secs_f64())]
    TimedOut { program: String, after: Duration },
    #[error("'{program}' was cancelled")]
    Cancelled { program: String },
}

/// Run `cmd` to completion, killing it on cancellation or when `timeout` elapses.
///
/// stdout and stderr are drained on helper threads so a chatty child can never block on a full
/// pipe while we poll for its exit.
pub(crate) fn run_tool(
    mut cmd: Command,
    cancel: &CancelToken,
    timeout: Option<Duration>,
) -> Result<ToolOutput, ToolFailure> {
    let program = cmd.get_program().to_string_lossy().to_string();
    if cancel.is_cancelled() {
        return Err(ToolFailure::Cancelled { program });
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| ToolFailure::Spawn {
        program: program.clone(),
        source,
    })?;

    let stdout_drain = child.stdout.take().map(drain);
    let stderr_drain = child.stderr.take().map(drain);

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolFailure::Io { program, source });
            }
        }

        if cancel.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolFailure::Cancelled { program });
        }
        if let Some(limit) = timeout
            && started.elapsed() >= limit
        {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolFailure::TimedOut {
                program,
                after: limit,
            });
        }

        std::thread::sleep(POLL_INTERVAL);
    };

    let stdout = join_drain(stdout_drain).map_err(|source| ToolFailure::Io {
        program: program.clone(),
        source,
    })?;
    let stderr = join_drain(stderr_drain).map_err(|source| ToolFailure::Io {
        program: program.clone(),
        source,
    })?;

    Ok(ToolOutput {
        status,
        stdout,
        stderr,
    })
}

/// Whether `program -version` runs successfully.
pub fn is_tool_on_path(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(bytes)
    })
}

fn join_drain(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> std::io::Result<Vec<u8>> {
    match handle {
        None => Ok(Vec::new()),
        Some(h) => h
            .join()
            .map_err(|_| std::io::Error::other("output drain thread panicked"))?,
    }
}
