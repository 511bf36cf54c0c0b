//! One request/response round trip against a fresh child process.
//!
//! Every call spawns the server, writes one envelope to its stdin, closes
//! stdin, and drains stdout and stderr concurrently with the write so neither
//! side can stall on a full pipe. Whatever happens, the child is waited on
//! before `run` returns.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use super::errors::ProbeError;
use super::types::{CapturedOutput, ExchangeResult, ExitState, JsonRpcRequest, ProcessSpec};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Read buffer size per stream.
const DRAIN_CHUNK_SIZE: usize = 8 * 1024;

// ─── Runner ──────────────────────────────────────────────────────────────────

/// Runs exchanges. Holds configuration only; no state carries between calls.
#[derive(Debug, Clone, Default)]
pub struct ExchangeRunner {
    timeout: Option<Duration>,
}

/// Why the I/O phase stopped before completing.
enum Interrupt {
    Deadline,
    Cancelled,
}

type StreamOutcome = (
    std::io::Result<()>,
    std::io::Result<()>,
    std::io::Result<()>,
);

impl ExchangeRunner {
    /// A runner that waits as long as the child takes.
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner that kills the child once `timeout` elapses.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run one exchange to completion.
    pub async fn run(
        &self,
        request: JsonRpcRequest,
        spec: &ProcessSpec,
    ) -> Result<ExchangeResult, ProbeError> {
        self.run_until(request, spec, std::future::pending::<()>()).await
    }

    /// Run one exchange, giving up when `cancel` resolves.
    ///
    /// On cancellation the child is killed and reaped and
    /// [`ProbeError::Cancelled`] is returned with the output gathered so far.
    pub async fn run_until<C>(
        &self,
        request: JsonRpcRequest,
        spec: &ProcessSpec,
        cancel: C,
    ) -> Result<ExchangeResult, ProbeError>
    where
        C: Future<Output = ()>,
    {
        let started = Instant::now();
        let payload = request.to_wire()?;
        spec.validate()?;

        let mut child = spawn(spec)?;
        let pid = child.id();
        tracing::debug!(
            command = %spec.command,
            pid,
            id = %request.id,
            method = %request.method,
            "spawned exchange process"
        );

        let (stdin, stdout, stderr) = match take_pipes(&mut child, spec) {
            Ok(pipes) => pipes,
            Err(e) => {
                terminate(&mut child, &spec.command).await;
                return Err(e);
            }
        };

        let mut out = Vec::new();
        let mut err = Vec::new();

        let phase = {
            let io = async {
                let streams: StreamOutcome = tokio::join!(
                    deliver(stdin, payload.as_bytes()),
                    drain(stdout, &mut out),
                    drain(stderr, &mut err),
                );
                if streams.1.is_err() || streams.2.is_err() {
                    // A broken reader means the rest of the output is lost anyway.
                    let _ = child.start_kill();
                }
                let status = child.wait().await;
                (streams, status)
            };

            tokio::select! {
                done = io => Ok(done),
                _ = deadline(self.timeout) => Err(Interrupt::Deadline),
                _ = cancel => Err(Interrupt::Cancelled),
            }
        };

        let output = CapturedOutput::from_bytes(&out, &err);
        let command = spec.command.clone();

        let ((write, read_out, read_err), status) = match phase {
            Ok(done) => done,
            Err(Interrupt::Deadline) => {
                terminate(&mut child, &command).await;
                let timeout_ms = self.timeout.map(|t| t.as_millis() as u64).unwrap_or(0);
                tracing::warn!(command = %command, pid, timeout_ms, "exchange timed out, process killed");
                return Err(ProbeError::Timeout {
                    command,
                    timeout_ms,
                    pid,
                    output,
                });
            }
            Err(Interrupt::Cancelled) => {
                terminate(&mut child, &command).await;
                tracing::info!(command = %command, pid, "exchange cancelled, process killed");
                return Err(ProbeError::Cancelled {
                    command,
                    pid,
                    output,
                });
            }
        };

        if let Err(e) = read_out {
            return Err(read_failed(command, "stdout", e, output));
        }
        if let Err(e) = read_err {
            return Err(read_failed(command, "stderr", e, output));
        }

        let exit = match status {
            Ok(status) => ExitState::from(status),
            Err(e) => {
                // Last resort: the runtime reaps it once the handle drops.
                terminate(&mut child, &command).await;
                return Err(read_failed(command, "exit status", e, output));
            }
        };

        if let Err(e) = write {
            tracing::warn!(command = %command, pid, %exit, error = %e, "request was not fully delivered");
            return Err(ProbeError::WriteFailed {
                command,
                reason: e.to_string(),
                output,
            });
        }

        let result = ExchangeResult {
            output,
            exit,
            pid,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        tracing::debug!(
            command = %command,
            pid,
            %exit,
            stdout_bytes = result.output.stdout.len(),
            stderr_bytes = result.output.stderr.len(),
            elapsed_ms = result.elapsed_ms,
            "exchange finished"
        );

        if !exit.success() {
            return Err(ProbeError::ProcessExitedAbnormally { command, result });
        }

        Ok(result)
    }
}

// ─── Process Plumbing ────────────────────────────────────────────────────────

/// Spawn the child with all three streams piped.
fn spawn(spec: &ProcessSpec) -> Result<Child, ProbeError> {
    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args);

    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }

    // Windows: prevent console window from appearing for child processes
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.kill_on_drop(true);

    cmd.spawn().map_err(|e| spec.spawn_error(&e.to_string()))
}

fn take_pipes(
    child: &mut Child,
    spec: &ProcessSpec,
) -> Result<(ChildStdin, ChildStdout, ChildStderr), ProbeError> {
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| spec.spawn_error("failed to capture stdin"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| spec.spawn_error("failed to capture stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| spec.spawn_error("failed to capture stderr"))?;
    Ok((stdin, stdout, stderr))
}

/// Write the envelope, then close stdin by dropping it.
async fn deliver(mut stdin: ChildStdin, payload: &[u8]) -> std::io::Result<()> {
    stdin.write_all(payload).await?;
    stdin.flush().await?;
    Ok(())
}

/// Read `reader` to EOF, appending to `sink` as bytes arrive.
///
/// Appends chunk by chunk so `sink` keeps everything read so far if the
/// future is dropped mid-way.
async fn drain<R>(mut reader: R, sink: &mut Vec<u8>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; DRAIN_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        sink.extend_from_slice(&chunk[..n]);
    }
}

/// Resolves after `timeout`, or never.
async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

/// Kill the child and wait for it so no zombie is left behind.
async fn terminate(child: &mut Child, command: &str) {
    if let Err(e) = child.start_kill() {
        // Already exited; the wait below still reaps it.
        tracing::debug!(command, error = %e, "kill skipped");
    }
    match child.wait().await {
        Ok(status) => {
            tracing::debug!(command, exit = %ExitState::from(status), "process reaped");
        }
        Err(e) => {
            tracing::warn!(command, error = %e, "failed to reap process");
        }
    }
}

fn read_failed(
    command: String,
    stream: &'static str,
    e: std::io::Error,
    output: CapturedOutput,
) -> ProbeError {
    tracing::warn!(command = %command, stream, error = %e, "exchange read failed");
    ProbeError::ReadFailed {
        command,
        stream,
        reason: e.to_string(),
        output,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
