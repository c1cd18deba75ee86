//! Centralizes process wiring, writer precedence, and the run-and-collect
//! loop shared by every strategy.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};

use crate::buffer::BoundedBuffer;
use crate::descriptor::CommandDescriptor;
use crate::result::RunResult;
use crate::scope::Scope;
use crate::sink::{MultiSink, OutputSink, StdinSource};

const READ_CHUNK: usize = 8192;

/// Fresh capture buffers for one run, returned by
/// [`CommandBuilder::build_with_capture`].
pub struct CaptureHandles {
    pub stdout: BoundedBuffer,
    pub stderr: BoundedBuffer,
}

/// How the run-and-collect loop should dispose of the child's stdout/stderr.
pub enum OutputPlan {
    /// Collect into fresh bounded buffers only.
    Capture(CaptureHandles),
    /// Collect into bounded buffers and also fan each chunk out to the
    /// caller's own sinks (used by `Executor`'s capture-mode dispatch).
    CaptureWithFanout {
        handles: CaptureHandles,
        stdout_sink: Option<Arc<dyn OutputSink>>,
        stderr_sink: Option<Arc<dyn OutputSink>>,
    },
    /// Forward chunks straight to caller-supplied sinks; nothing is
    /// buffered inside the engine.
    Stream {
        stdout: Option<Arc<dyn OutputSink>>,
        stderr: Option<Arc<dyn OutputSink>>,
    },
    /// stdout/stderr are already wired to the engine's own stdio
    /// (`Stdio::inherit()`); no reader tasks are needed.
    Inherit,
}

fn resolve_sink(
    direct: Option<Arc<dyn OutputSink>>,
    option: Option<Arc<dyn OutputSink>>,
    fallback: Option<Arc<dyn OutputSink>>,
) -> Option<Arc<dyn OutputSink>> {
    direct.or(option).or(fallback)
}

/// Builds launch objects from a descriptor and assembles results once a run
/// completes. The descriptor is read-only throughout.
pub struct CommandBuilder<'a> {
    descriptor: &'a CommandDescriptor,
    buffer_cap: usize,
    global_env: &'a [String],
}

impl<'a> CommandBuilder<'a> {
    pub fn new(descriptor: &'a CommandDescriptor, buffer_cap: usize) -> Self {
        Self {
            descriptor,
            buffer_cap,
            global_env: &[],
        }
    }

    /// Attach `ExecutorOptions::global_env` entries — applied before the
    /// descriptor's own `env`, so a descriptor can override a global entry
    /// with the same key.
    pub fn with_global_env(mut self, global_env: &'a [String]) -> Self {
        self.global_env = global_env;
        self
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.descriptor.name);
        cmd.args(&self.descriptor.args);
        if let Some(dir) = &self.descriptor.working_dir {
            cmd.current_dir(dir);
        }
        if !self.descriptor.inherit_env {
            cmd.env_clear();
        }
        for entry in self.global_env.iter().chain(self.descriptor.env.iter()) {
            if let Some((key, value)) = entry.split_once('=') {
                cmd.env(key, value);
            }
        }
        cmd.kill_on_drop(true);
        cmd
    }

    fn wire_stdin(&self, cmd: &mut Command) {
        if self.descriptor.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }
    }

    /// No stdout/stderr set; stdin wired.
    pub fn build(&self) -> Command {
        let mut cmd = self.base_command();
        self.wire_stdin(&mut cmd);
        cmd
    }

    /// stdout and stderr each a fresh bounded buffer.
    pub fn build_with_capture(&self) -> (Command, CaptureHandles) {
        let mut cmd = self.build();
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        let handles = CaptureHandles {
            stdout: BoundedBuffer::new(self.buffer_cap),
            stderr: BoundedBuffer::new(self.buffer_cap),
        };
        (cmd, handles)
    }

    /// stdout/stderr = resolved writers from the precedence rule: direct
    /// sink overrides options sink overrides the supplied fallback.
    pub fn build_with_streaming(
        &self,
        fallback_stdout: Option<Arc<dyn OutputSink>>,
        fallback_stderr: Option<Arc<dyn OutputSink>>,
    ) -> (Command, Option<Arc<dyn OutputSink>>, Option<Arc<dyn OutputSink>>) {
        let mut cmd = self.build();
        let stdout = resolve_sink(
            self.descriptor.stdout_sink.clone(),
            self.descriptor.options.stdout_sink.clone(),
            fallback_stdout,
        );
        let stderr = resolve_sink(
            self.descriptor.stderr_sink.clone(),
            self.descriptor.options.stderr_sink.clone(),
            fallback_stderr,
        );
        cmd.stdout(if stdout.is_some() { Stdio::piped() } else { Stdio::null() });
        cmd.stderr(if stderr.is_some() { Stdio::piped() } else { Stdio::null() });
        (cmd, stdout, stderr)
    }

    /// Capture if `options.capture || descriptor.capture`; otherwise stream
    /// via option/direct sinks, falling back to no-op (`Stdio::null()`)
    /// sinks so every caller sees a uniform return shape.
    pub fn build_with_mixed_output(&self) -> (Command, OutputPlan) {
        let wants_capture = self.descriptor.options.capture || self.descriptor.capture;
        if wants_capture {
            let (cmd, handles) = self.build_with_capture();
            (cmd, OutputPlan::Capture(handles))
        } else {
            let (cmd, stdout, stderr) = self.build_with_streaming(None, None);
            (cmd, OutputPlan::Stream { stdout, stderr })
        }
    }
}

enum WaitOutcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    Cancelled,
}

/// Run `cmd` to completion under `scope`, feeding `stdin` and disposing of
/// stdout/stderr per `plan`, then assemble a [`RunResult`].
///
/// `on_spawn`, if given, is invoked once with the child's PID immediately
/// after a successful spawn — the executor's pass-through dispatch uses this
/// to install a signal forwarder before awaiting exit.
pub async fn run_and_collect(
    mut cmd: Command,
    scope: &Scope,
    stdin: Option<StdinSource>,
    plan: OutputPlan,
    on_spawn: Option<Box<dyn FnOnce(u32) + Send>>,
) -> RunResult {
    let start = Instant::now();

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return RunResult {
                exit_code: -1,
                stdout: Vec::new(),
                stderr: Vec::new(),
                duration: start.elapsed(),
                timeout: false,
                error: Some(format!("failed to launch command: {e}")),
            };
        }
    };

    if let (Some(pid), Some(callback)) = (child.id(), on_spawn) {
        callback(pid);
    }

    if let Some(source) = stdin {
        if let Some(handle) = child.stdin.take() {
            spawn_stdin_writer(handle, source);
        }
    }

    let (stdout_sink, stderr_sink) = match &plan {
        OutputPlan::Capture(handles) => (
            Some(Arc::new(handles.stdout.clone()) as Arc<dyn OutputSink>),
            Some(Arc::new(handles.stderr.clone()) as Arc<dyn OutputSink>),
        ),
        OutputPlan::CaptureWithFanout {
            handles,
            stdout_sink,
            stderr_sink,
        } => (
            Some(fanout(handles.stdout.clone(), stdout_sink.clone())),
            Some(fanout(handles.stderr.clone(), stderr_sink.clone())),
        ),
        OutputPlan::Stream { stdout, stderr } => (stdout.clone(), stderr.clone()),
        OutputPlan::Inherit => (None, None),
    };

    let stdout_task = stdout_sink
        .zip(child.stdout.take())
        .map(|(sink, pipe)| spawn_reader(pipe, sink));
    let stderr_task = stderr_sink
        .zip(child.stderr.take())
        .map(|(sink, pipe)| spawn_reader(pipe, sink));

    let outcome = tokio::select! {
        status = child.wait() => WaitOutcome::Exited(status),
        _ = scope.wait_until_done() => WaitOutcome::Cancelled,
    };

    let (status, timed_out) = match outcome {
        WaitOutcome::Exited(status) => (status, false),
        WaitOutcome::Cancelled => {
            kill_child(&mut child);
            (child.wait().await, true)
        }
    };

    if let Some(task) = stdout_task {
        let _ = task.await;
    }
    if let Some(task) = stderr_task {
        let _ = task.await;
    }

    let duration = start.elapsed();
    let (stdout_bytes, stderr_bytes) = match &plan {
        OutputPlan::Capture(handles) => (handles.stdout.bytes(), handles.stderr.bytes()),
        OutputPlan::CaptureWithFanout { handles, .. } => (handles.stdout.bytes(), handles.stderr.bytes()),
        OutputPlan::Stream { .. } | OutputPlan::Inherit => (Vec::new(), Vec::new()),
    };

    match status {
        Ok(status) => {
            let exit_code = status.code().unwrap_or(-1);
            let (timeout, error) = if timed_out {
                (true, Some(format!("command timed out after {duration:?}")))
            } else if exit_code != 0 {
                (false, Some(format!("exit status {exit_code}")))
            } else {
                (false, None)
            };
            RunResult {
                exit_code,
                stdout: stdout_bytes,
                stderr: stderr_bytes,
                duration,
                timeout,
                error,
            }
        }
        Err(e) => RunResult {
            exit_code: -1,
            stdout: stdout_bytes,
            stderr: stderr_bytes,
            duration,
            timeout: timed_out,
            error: Some(format!("failed to wait for command: {e}")),
        },
    }
}

fn fanout(buffer: BoundedBuffer, extra: Option<Arc<dyn OutputSink>>) -> Arc<dyn OutputSink> {
    match extra {
        Some(sink) => Arc::new(MultiSink::new(vec![Arc::new(buffer) as Arc<dyn OutputSink>, sink])),
        None => Arc::new(buffer),
    }
}

fn spawn_reader<R>(mut pipe: R, sink: Arc<dyn OutputSink>) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match pipe.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if sink.write(&buf[..n]).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    })
}

fn spawn_stdin_writer(mut stdin: ChildStdin, source: StdinSource) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match source {
            StdinSource::Bytes(bytes) => {
                let _ = stdin.write_all(&bytes).await;
            }
            StdinSource::Reader(reader) => {
                let (tx, mut rx) = tokio::sync::mpsc::channel::<Vec<u8>>(8);
                tokio::task::spawn_blocking(move || {
                    let mut buf = [0u8; READ_CHUNK];
                    loop {
                        let read = {
                            let mut guard = reader.lock().unwrap();
                            guard.read(&mut buf)
                        };
                        match read {
                            Ok(0) => break,
                            Ok(n) if tx.blocking_send(buf[..n].to_vec()).is_ok() => {}
                            _ => break,
                        }
                    }
                });
                while let Some(chunk) = rx.recv().await {
                    if stdin.write_all(&chunk).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = stdin.shutdown().await;
    })
}

/// Kill the child with `SIGKILL`.
///
/// `Command` here never places the child in its own process group (no
/// `setsid`/`process_group(0)`), so a negative-PID group kill would target a
/// group that doesn't exist and fail silently — `Child::start_kill` sends
/// the signal straight to the child's own PID instead.
fn kill_child(child: &mut Child) {
    let _ = child.start_kill();
}
