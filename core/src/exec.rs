//! Subprocess execution
//!
//! Runs a command string under a shell interpreter with independent stdout
//! and stderr capture, a hard wall-clock timeout and caller cancellation.
//! On timeout or cancellation the whole process group is killed and the
//! shell reaped before returning, so nothing the command started outlives
//! the call.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::tools::context::ToolError;

/// Per-stream capture limit.
pub const MAX_CAPTURE_BYTES: usize = 1024 * 1024;

/// Appended to stderr when the deadline kills the command.
pub const TIMEOUT_NOTICE: &str = "\nCommand execution timed out";

const TRUNCATION_NOTICE: &str = "\n[output truncated]";

/// How long to keep draining pipes after the shell exits. Background jobs
/// may hold them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct ExecRequest {
  pub command: String,
  pub cwd: PathBuf,
  pub timeout: Duration,
}

/// Outcome of a command that started.
///
/// When `interrupted` is true the deadline fired and `exit_code` is left at 0;
/// callers must treat `interrupted` as authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecOutput {
  pub stdout: String,
  pub stderr: String,
  pub exit_code: i32,
  pub interrupted: bool,
  #[serde(skip)]
  pub pid: Option<u32>,
}

enum Outcome {
  Exited(std::io::Result<ExitStatus>),
  TimedOut,
  Cancelled,
}

/// Spawn `request.command` and wait for it, the deadline or `cancel`,
/// whichever comes first.
///
/// Spawn failures are errors; a started command always yields an
/// [`ExecOutput`] unless cancelled. The process group is killed once the
/// shell exits, so jobs backgrounded with `&` do not survive the call.
pub async fn run(request: &ExecRequest, cancel: &CancellationToken) -> Result<ExecOutput, ToolError> {
  let mut command = shell_command(&request.command);
  command
    .current_dir(&request.cwd)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);
  #[cfg(unix)]
  command.process_group(0);

  let mut child = command
    .spawn()
    .map_err(|e| ToolError::Spawn(format!("{}: {e}", request.command)))?;
  let pid = child.id();
  let mut group = ProcessGroupGuard::new(pid);
  debug!(pid, command = %request.command, cwd = %request.cwd.display(), "spawned process");

  let stop_reading = CancellationToken::new();
  let stdout = child
    .stdout
    .take()
    .ok_or_else(|| ToolError::Spawn("stdout pipe unavailable".to_string()))?;
  let stderr = child
    .stderr
    .take()
    .ok_or_else(|| ToolError::Spawn("stderr pipe unavailable".to_string()))?;
  let stdout_task = tokio::spawn(read_capped(stdout, MAX_CAPTURE_BYTES, stop_reading.clone()));
  let stderr_task = tokio::spawn(read_capped(stderr, MAX_CAPTURE_BYTES, stop_reading.clone()));

  let outcome = tokio::select! {
    status = child.wait() => Outcome::Exited(status),
    _ = tokio::time::sleep(request.timeout) => Outcome::TimedOut,
    _ = cancel.cancelled() => Outcome::Cancelled,
  };

  let mut output = ExecOutput {
    pid,
    ..ExecOutput::default()
  };
  match outcome {
    Outcome::Exited(Ok(status)) => {
      // Background jobs the command left behind go with the shell.
      group.kill();
      output.exit_code = exit_code(status);
      info!(pid, exit_code = output.exit_code, "process exited");
    }
    Outcome::Exited(Err(err)) => {
      terminate(&mut child, &mut group).await;
      stop_reading.cancel();
      return Err(ToolError::Execution(format!("failed to wait for process: {err}")));
    }
    Outcome::TimedOut => {
      warn!(pid, timeout = ?request.timeout, "process timed out; killing process group");
      terminate(&mut child, &mut group).await;
      output.interrupted = true;
    }
    Outcome::Cancelled => {
      warn!(pid, "execution cancelled; killing process group");
      terminate(&mut child, &mut group).await;
      stop_reading.cancel();
      return Err(ToolError::Cancelled);
    }
  }

  output.stdout = drain(stdout_task, &stop_reading).await;
  output.stderr = drain(stderr_task, &stop_reading).await;
  if output.interrupted {
    output.stderr.push_str(TIMEOUT_NOTICE);
  }
  Ok(output)
}

#[cfg(unix)]
fn shell_command(script: &str) -> Command {
  let mut command = Command::new("bash");
  command.arg("-c").arg(script);
  command
}

#[cfg(not(unix))]
fn shell_command(script: &str) -> Command {
  let mut command = Command::new("cmd");
  command.arg("/C").arg(script);
  command
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
  use std::os::unix::process::ExitStatusExt;

  status
    .code()
    .or_else(|| status.signal().map(|signal| 128 + signal))
    .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
  status.code().unwrap_or(-1)
}

/// Kill the group, then the shell itself, then reap it.
async fn terminate(child: &mut Child, group: &mut ProcessGroupGuard) {
  group.kill();
  if let Err(err) = child.kill().await {
    debug!(error = %err, "kill after group signal");
  }
}

async fn drain(mut task: JoinHandle<Captured>, stop: &CancellationToken) -> String {
  let captured = tokio::select! {
    joined = &mut task => joined,
    _ = tokio::time::sleep(DRAIN_GRACE) => {
      stop.cancel();
      task.await
    }
  };
  match captured {
    Ok(captured) => captured.into_string(),
    Err(err) => {
      warn!(error = %err, "output reader failed");
      String::new()
    }
  }
}

#[derive(Debug, Default)]
struct Captured {
  bytes: Vec<u8>,
  truncated: bool,
}

impl Captured {
  fn push(&mut self, chunk: &[u8], limit: usize) {
    let room = limit.saturating_sub(self.bytes.len());
    if chunk.len() > room {
      self.truncated = true;
    }
    self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
  }

  fn into_string(self) -> String {
    let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
    if self.truncated {
      text.push_str(TRUNCATION_NOTICE);
    }
    text
  }
}

/// Read to EOF, keeping at most `limit` bytes. Reading continues past the
/// limit so the writer never blocks on a full pipe.
async fn read_capped<R>(mut reader: R, limit: usize, stop: CancellationToken) -> Captured
where
  R: AsyncRead + Unpin,
{
  let mut captured = Captured::default();
  let mut chunk = vec![0u8; READ_CHUNK];
  loop {
    let read = tokio::select! {
      biased;
      _ = stop.cancelled() => break,
      read = reader.read(&mut chunk) => read,
    };
    match read {
      Ok(0) => break,
      Ok(n) => captured.push(&chunk[..n], limit),
      Err(err) => {
        debug!(error = %err, "pipe read failed");
        break;
      }
    }
  }
  captured
}

/// Kills the child's process group on drop.
struct ProcessGroupGuard {
  pgid: Option<i32>,
}

impl ProcessGroupGuard {
  fn new(pid: Option<u32>) -> Self {
    Self {
      pgid: pid.and_then(|pid| i32::try_from(pid).ok()),
    }
  }

  fn kill(&mut self) {
    if let Some(pgid) = self.pgid.take() {
      kill_group(pgid);
    }
  }
}

impl Drop for ProcessGroupGuard {
  fn drop(&mut self) {
    self.kill();
  }
}

#[cfg(unix)]
fn kill_group(pgid: i32) {
  // SAFETY: killpg has no memory-safety preconditions.
  let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
  if rc != 0 {
    debug!(pgid, error = %std::io::Error::last_os_error(), "killpg");
  }
}

#[cfg(not(unix))]
fn kill_group(_pgid: i32) {}
