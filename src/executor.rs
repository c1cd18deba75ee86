//! The public facade: mode-based legacy dispatch, strategy-based dispatch,
//! signal forwarding for pass-through runs, and convenience one-shot helpers.

use std::process::Stdio;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::builder::{run_and_collect, CommandBuilder, OutputPlan};
use crate::buffer::DEFAULT_BUFFER_CAP;
use crate::descriptor::{CommandDescriptor, Mode};
use crate::error::EngineError;
use crate::result::RunResult;
use crate::scope::Scope;
use crate::selector::Selector;

/// Hook for interactive mode's TTY allocation. The engine never multiplexes
/// a terminal itself — this trait exists so a caller can plug one in; the
/// default implementation is a documented no-op stub.
pub trait TtyAllocator: Send + Sync {
    fn allocate(&self, descriptor: &CommandDescriptor) {
        let _ = descriptor;
    }
}

/// Does nothing. Interactive mode otherwise behaves exactly like
/// pass-through.
pub struct NoopTtyAllocator;

impl TtyAllocator for NoopTtyAllocator {}

/// Ambient configuration for an [`Executor`]: the knobs every strategy and
/// dispatch path draws its defaults from.
///
/// Only `verbose` and `global_env` are currently honoured outside of the
/// defaults fed to the strategy selector — the sanitizer is deliberately
/// not one of these knobs; it is a step callers run themselves before
/// constructing a descriptor, never something `execute` applies for them.
pub struct ExecutorOptions {
    pub buffer_cap: usize,
    pub default_timeout: Duration,
    /// `KEY=VALUE` entries applied to every spawned child, before the
    /// descriptor's own `env` (which can override a global entry).
    pub global_env: Vec<String>,
    pub verbose: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            buffer_cap: DEFAULT_BUFFER_CAP,
            default_timeout: Duration::from_secs(30),
            global_env: Vec::new(),
            verbose: false,
        }
    }
}

/// Top-level entry point. Dispatches a descriptor either by `mode` (the
/// legacy pass-through/capture/interactive/background switch) or, when
/// `descriptor.use_strategy` is set, through the [`Selector`].
pub struct Executor {
    options: ExecutorOptions,
    selector: Selector,
    tty: Arc<dyn TtyAllocator>,
}

impl Executor {
    pub fn new(options: ExecutorOptions) -> Self {
        let selector = Selector::new(options.default_timeout, options.buffer_cap);
        Self {
            options,
            selector,
            tty: Arc::new(NoopTtyAllocator),
        }
    }

    pub fn with_tty_allocator(mut self, tty: Arc<dyn TtyAllocator>) -> Self {
        self.tty = tty;
        self
    }

    /// Run `descriptor` to completion under a fresh root scope.
    #[instrument(skip(self, descriptor), fields(name = %descriptor.name, mode = descriptor.mode.as_str()))]
    pub async fn execute(&self, descriptor: &CommandDescriptor) -> Result<RunResult, EngineError> {
        self.execute_with_scope(&Scope::new(), descriptor).await
    }

    /// Run `descriptor` to completion under a caller-supplied scope, so a
    /// caller can cancel or time out a whole batch of runs together.
    pub async fn execute_with_scope(
        &self,
        scope: &Scope,
        descriptor: &CommandDescriptor,
    ) -> Result<RunResult, EngineError> {
        if descriptor.name.is_empty() {
            return Err(EngineError::InvalidDescriptor);
        }

        if self.options.verbose {
            debug!(command = %descriptor, "executing command");
        }

        if descriptor.use_strategy {
            let strategy = self.selector.select(descriptor);
            debug!(strategy = strategy.name(), "dispatching via strategy selector");
            return Ok(strategy.execute(scope, descriptor).await);
        }

        let timeout = descriptor.options.timeout.or(descriptor.timeout);
        let effective_scope = match timeout {
            Some(timeout) => scope.child_with_deadline(timeout),
            None => scope.clone(),
        };

        match descriptor.mode {
            Mode::PassThrough => self.execute_passthrough(&effective_scope, descriptor).await,
            Mode::Capture => Ok(self.execute_capture(&effective_scope, descriptor).await),
            Mode::Interactive => self.execute_interactive(&effective_scope, descriptor).await,
            Mode::Background => self.execute_background(descriptor).await,
        }
    }

    /// Inherits the engine's own stdio and forwards SIGINT/SIGTERM to the
    /// child while it runs, when `descriptor.signal_forward` is set.
    async fn execute_passthrough(
        &self,
        scope: &Scope,
        descriptor: &CommandDescriptor,
    ) -> Result<RunResult, EngineError> {
        let builder = CommandBuilder::new(descriptor, self.options.buffer_cap)
            .with_global_env(&self.options.global_env);
        let mut cmd = builder.build();
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        let pid_slot = Arc::new(AtomicI32::new(0));
        let forward = descriptor.signal_forward;
        let guard_slot = pid_slot.clone();
        let _guard = forward.then(|| SignalForwarderGuard::spawn(guard_slot));

        let on_spawn: Option<Box<dyn FnOnce(u32) + Send>> = forward.then(|| {
            let pid_slot = pid_slot.clone();
            Box::new(move |pid: u32| pid_slot.store(pid as i32, Ordering::SeqCst)) as Box<dyn FnOnce(u32) + Send>
        });

        Ok(run_and_collect(
            cmd,
            scope,
            descriptor.stdin.clone(),
            OutputPlan::Inherit,
            on_spawn,
        )
        .await)
    }

    /// Captures stdout/stderr into bounded buffers, additionally fanning
    /// each chunk out to any sinks wired directly on the descriptor.
    async fn execute_capture(&self, scope: &Scope, descriptor: &CommandDescriptor) -> RunResult {
        let builder = CommandBuilder::new(descriptor, self.options.buffer_cap)
            .with_global_env(&self.options.global_env);
        let (cmd, handles) = builder.build_with_capture();
        let plan = OutputPlan::CaptureWithFanout {
            handles,
            stdout_sink: descriptor.stdout_sink.clone(),
            stderr_sink: descriptor.stderr_sink.clone(),
        };
        run_and_collect(cmd, scope, descriptor.stdin.clone(), plan, None).await
    }

    /// Identical to pass-through; the TTY hook is invoked first so a caller
    /// that supplied a real allocator gets a chance to set one up, but the
    /// engine itself never multiplexes a terminal.
    async fn execute_interactive(
        &self,
        scope: &Scope,
        descriptor: &CommandDescriptor,
    ) -> Result<RunResult, EngineError> {
        self.tty.allocate(descriptor);
        self.execute_passthrough(scope, descriptor).await
    }

    /// Launches the child and returns immediately with `exit_code = 0` and
    /// no further status — the engine does not track background processes
    /// after launch. A launch failure is reported as an error rather than a
    /// fabricated success result.
    async fn execute_background(&self, descriptor: &CommandDescriptor) -> Result<RunResult, EngineError> {
        let builder = CommandBuilder::new(descriptor, self.options.buffer_cap)
            .with_global_env(&self.options.global_env);
        let mut cmd = builder.build();
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        // A background run must outlive this call — don't let tokio kill
        // the child when its `Child` handle is dropped right below.
        cmd.kill_on_drop(false);

        let start = std::time::Instant::now();
        match cmd.spawn() {
            Ok(_child) => Ok(RunResult {
                exit_code: 0,
                stdout: Vec::new(),
                stderr: Vec::new(),
                duration: start.elapsed(),
                timeout: false,
                error: None,
            }),
            Err(e) => {
                warn!(error = %e, "background launch failed");
                Err(EngineError::Launch(e.to_string()))
            }
        }
    }

    /// Pass-through execution. A non-zero exit or launch error becomes a
    /// returned `Err`.
    pub async fn run(&self, name: &str, args: &[&str]) -> anyhow::Result<RunResult> {
        let descriptor = CommandDescriptor::passthrough(name, args.iter().map(|a| a.to_string()));
        let result = self.execute(&descriptor).await?;
        if result.exit_code != 0 {
            anyhow::bail!(
                "{name} exited with code {}: {}",
                result.exit_code,
                result.error.as_deref().unwrap_or("no error detail")
            );
        }
        Ok(result)
    }

    /// Capture execution. On zero exit, returns the result with stdout
    /// populated; on non-zero exit, returns an error carrying stderr.
    pub async fn run_capture(&self, name: &str, args: &[&str]) -> anyhow::Result<RunResult> {
        let descriptor = CommandDescriptor::new(name, args.iter().map(|a| a.to_string()));
        let result = self.execute(&descriptor).await?;
        if result.exit_code != 0 {
            anyhow::bail!(
                "{name} exited with code {}: {}",
                result.exit_code,
                result.stderr_string()
            );
        }
        Ok(result)
    }

    /// Pass-through execution with `timeout` attached to the descriptor and
    /// to the scope the run executes under.
    pub async fn run_with_timeout(
        &self,
        name: &str,
        args: &[&str],
        timeout: Duration,
    ) -> anyhow::Result<RunResult> {
        let descriptor = CommandDescriptor::passthrough(name, args.iter().map(|a| a.to_string()))
            .with_timeout(timeout);
        let scope = Scope::with_deadline(timeout);
        Ok(self.execute_with_scope(&scope, &descriptor).await?)
    }
}

/// Forwards SIGINT/SIGTERM received by this process on to a tracked child
/// PID for as long as it is alive, for the duration of pass-through mode.
///
/// Generalizes the teacher's process-group kill on timeout into a signal
/// relay: rather than killing, it just relays the same signal number to the
/// child so the child's own handler decides what to do.
struct SignalForwarderGuard {
    handle: tokio::task::JoinHandle<()>,
}

impl SignalForwarderGuard {
    fn spawn(pid_slot: Arc<AtomicI32>) -> Self {
        let handle = tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigint = match signal(SignalKind::interrupt()) {
                    Ok(s) => s,
                    Err(_) => return,
                };
                let mut sigterm = match signal(SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => return,
                };
                loop {
                    let sig = tokio::select! {
                        _ = sigint.recv() => libc::SIGINT,
                        _ = sigterm.recv() => libc::SIGTERM,
                    };
                    let pid = pid_slot.load(Ordering::SeqCst);
                    if pid > 0 {
                        unsafe {
                            libc::kill(pid, sig);
                        }
                    }
                }
            }
        });
        Self { handle }
    }
}

impl Drop for SignalForwarderGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
