//! Execution strategies: the pluggable "how to run a descriptor" policies
//! behind the uniform [`Strategy::execute`] contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::buffer::DEFAULT_BUFFER_CAP;
use crate::builder::{run_and_collect, CommandBuilder, OutputPlan};
use crate::descriptor::CommandDescriptor;
use crate::result::RunResult;
use crate::scope::Scope;
use crate::sink::OutputSink;

/// A pluggable execution policy. Implementations must not mutate the
/// descriptor they are given — any wiring adjustment (see [`PipeStrategy`])
/// happens on an owned clone.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, scope: &Scope, descriptor: &CommandDescriptor) -> RunResult;
}

/// Spawn, wait, collect — no timeout, no stdin wiring beyond what the
/// descriptor already specifies, no strategy-level default sinks.
pub struct BasicStrategy {
    pub buffer_cap: usize,
}

impl Default for BasicStrategy {
    fn default() -> Self {
        Self {
            buffer_cap: DEFAULT_BUFFER_CAP,
        }
    }
}

#[async_trait]
impl Strategy for BasicStrategy {
    fn name(&self) -> &'static str {
        "basic"
    }

    async fn execute(&self, scope: &Scope, descriptor: &CommandDescriptor) -> RunResult {
        let builder = CommandBuilder::new(descriptor, self.buffer_cap);
        let (cmd, plan) = builder.build_with_mixed_output();
        run_and_collect(cmd, scope, descriptor.stdin.clone(), plan, None).await
    }
}

/// Derives a child scope bounded by the descriptor's timeout (falling back
/// to `default_timeout`) from the *caller's* scope, then delegates to
/// [`BasicStrategy`]. The child scope is never a fresh background scope —
/// cancelling the caller's scope always cancels the timed run too.
pub struct TimeoutStrategy {
    pub default_timeout: Duration,
    pub buffer_cap: usize,
}

impl Default for TimeoutStrategy {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            buffer_cap: DEFAULT_BUFFER_CAP,
        }
    }
}

#[async_trait]
impl Strategy for TimeoutStrategy {
    fn name(&self) -> &'static str {
        "timeout"
    }

    async fn execute(&self, scope: &Scope, descriptor: &CommandDescriptor) -> RunResult {
        let timeout = descriptor
            .options
            .timeout
            .or(descriptor.timeout)
            .unwrap_or(self.default_timeout);
        let child_scope = scope.child_with_deadline(timeout);
        let inner = BasicStrategy {
            buffer_cap: self.buffer_cap,
        };
        inner.execute(&child_scope, descriptor).await
    }
}

/// Forwards stdout/stderr straight to caller-supplied sinks (falling back to
/// the strategy's defaults) instead of buffering them.
pub struct StreamingStrategy {
    pub default_stdout: Option<Arc<dyn OutputSink>>,
    pub default_stderr: Option<Arc<dyn OutputSink>>,
    pub buffer_cap: usize,
}

impl Default for StreamingStrategy {
    fn default() -> Self {
        Self {
            default_stdout: None,
            default_stderr: None,
            buffer_cap: DEFAULT_BUFFER_CAP,
        }
    }
}

#[async_trait]
impl Strategy for StreamingStrategy {
    fn name(&self) -> &'static str {
        "streaming"
    }

    async fn execute(&self, scope: &Scope, descriptor: &CommandDescriptor) -> RunResult {
        let builder = CommandBuilder::new(descriptor, self.buffer_cap);
        let (cmd, stdout, stderr) =
            builder.build_with_streaming(self.default_stdout.clone(), self.default_stderr.clone());
        let plan = OutputPlan::Stream { stdout, stderr };
        run_and_collect(cmd, scope, descriptor.stdin.clone(), plan, None).await
    }
}

/// Guarantees the child has *some* stdin attached — a descriptor with no
/// stdin source gets one synthesized from `default_stdin` (empty bytes if
/// unset) on a defensive clone, so concurrent callers sharing one
/// `CommandDescriptor` never race on mutating the original.
pub struct PipeStrategy {
    pub default_stdin: Vec<u8>,
    pub buffer_cap: usize,
}

impl Default for PipeStrategy {
    fn default() -> Self {
        Self {
            default_stdin: Vec::new(),
            buffer_cap: DEFAULT_BUFFER_CAP,
        }
    }
}

#[async_trait]
impl Strategy for PipeStrategy {
    fn name(&self) -> &'static str {
        "pipe"
    }

    async fn execute(&self, scope: &Scope, descriptor: &CommandDescriptor) -> RunResult {
        let mut effective = descriptor.clone();
        if effective.stdin.is_none() {
            effective.stdin = Some(crate::sink::StdinSource::from_bytes(self.default_stdin.clone()));
        }
        let inner = BasicStrategy {
            buffer_cap: self.buffer_cap,
        };
        inner.execute(scope, &effective).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn basic_strategy_runs_echo() {
        let descriptor = CommandDescriptor::new("echo", ["ok"]).with_stdout_sink(Arc::new(
            crate::buffer::BoundedBuffer::new(DEFAULT_BUFFER_CAP),
        ) as Arc<dyn OutputSink>);
        let strategy = BasicStrategy::default();
        let result = strategy.execute(&Scope::new(), &descriptor).await;
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn timeout_strategy_marks_timeout_on_slow_child() {
        let descriptor = CommandDescriptor::new("sleep", ["2"]).with_timeout(Duration::from_millis(50));
        let strategy = TimeoutStrategy::default();
        let result = strategy.execute(&Scope::new(), &descriptor).await;
        assert!(result.timeout);
    }

    #[tokio::test]
    async fn timeout_strategy_child_scope_is_cancelled_when_caller_scope_is() {
        let descriptor = CommandDescriptor::new("sleep", ["2"]);
        let strategy = TimeoutStrategy {
            default_timeout: Duration::from_secs(30),
            buffer_cap: DEFAULT_BUFFER_CAP,
        };
        let scope = Scope::new();
        let caller_scope = scope.clone();
        let run = tokio::spawn(async move { strategy.execute(&caller_scope, &descriptor).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        scope.cancel();
        let result = run.await.unwrap();
        assert!(result.timeout);
    }

    #[tokio::test]
    async fn pipe_strategy_synthesizes_stdin_without_mutating_the_original() {
        let descriptor = CommandDescriptor::new("cat", Vec::<String>::new());
        let strategy = PipeStrategy {
            default_stdin: b"fallback\n".to_vec(),
            buffer_cap: DEFAULT_BUFFER_CAP,
        };
        let result = strategy.execute(&Scope::new(), &descriptor).await;
        assert_eq!(result.stdout_string(), "fallback\n");
        assert!(descriptor.stdin.is_none());
    }

    #[tokio::test]
    async fn concurrent_pipe_runs_against_a_shared_descriptor_do_not_interfere() {
        let descriptor = Arc::new(CommandDescriptor::new("cat", Vec::<String>::new()));
        let strategy = Arc::new(PipeStrategy {
            default_stdin: b"shared\n".to_vec(),
            buffer_cap: DEFAULT_BUFFER_CAP,
        });
        let mut handles = Vec::new();
        for _ in 0..4 {
            let strategy = strategy.clone();
            let descriptor = descriptor.clone();
            handles.push(tokio::spawn(async move {
                strategy.execute(&Scope::new(), &descriptor).await
            }));
        }
        for handle in handles {
            let result = handle.await.unwrap();
            assert_eq!(result.stdout_string(), "shared\n");
        }
    }
}
