//! Picks which [`Strategy`] handles a descriptor when `use_strategy` is set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::descriptor::CommandDescriptor;
use crate::strategy::{BasicStrategy, PipeStrategy, Strategy, StreamingStrategy, TimeoutStrategy};

/// Precedence-ordered registry of named strategies, plus the defaults used
/// to build the four built-in ones.
pub struct Selector {
    pub default_timeout: Duration,
    registry: HashMap<String, Arc<dyn Strategy>>,
}

impl Selector {
    /// Registers the four built-in strategies under their `name()`s.
    pub fn new(default_timeout: Duration, buffer_cap: usize) -> Self {
        let mut selector = Self {
            default_timeout,
            registry: HashMap::new(),
        };
        selector.register(Arc::new(BasicStrategy { buffer_cap }));
        selector.register(Arc::new(TimeoutStrategy {
            default_timeout,
            buffer_cap,
        }));
        selector.register(Arc::new(StreamingStrategy {
            default_stdout: None,
            default_stderr: None,
            buffer_cap,
        }));
        selector.register(Arc::new(PipeStrategy {
            default_stdin: Vec::new(),
            buffer_cap,
        }));
        selector
    }

    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        self.registry.insert(strategy.name().to_string(), strategy);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Strategy>> {
        self.registry.get(name).cloned()
    }

    /// Picks a strategy for `descriptor` using the fixed precedence order:
    /// a timeout is set (option or top-level) → `"timeout"`; else a stream
    /// flag is set (option or top-level) → `"streaming"`; else stdin is
    /// wired → `"pipe"`; otherwise `"basic"`.
    pub fn select(&self, descriptor: &CommandDescriptor) -> Arc<dyn Strategy> {
        let name = if descriptor.timeout.is_some() || descriptor.options.timeout.is_some() {
            "timeout"
        } else if descriptor.stream || descriptor.options.stream {
            "streaming"
        } else if descriptor.stdin.is_some() {
            "pipe"
        } else {
            "basic"
        };
        self.lookup(name).expect("built-in strategy always registered")
    }
}
