//! Subprocess execution engine: sandboxed command descriptors, bounded
//! output capture, cancellation-aware execution strategies, and a
//! shell-injection sanitizer.
//!
//! The engine never shells out through `/bin/sh` — every command is handed
//! to the OS as an argv vector via [`tokio::process::Command`]. The
//! [`sanitizer`] module exists as defense in depth for callers that might
//! later forward arguments into a shell of their own, not because this
//! crate needs it to be safe from injection.

pub mod buffer;
pub mod builder;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod fmt;
pub mod result;
pub mod sanitizer;
pub mod scope;
pub mod selector;
pub mod sink;
pub mod strategy;

pub use buffer::{BoundedBuffer, BufferError, DEFAULT_BUFFER_CAP};
pub use descriptor::{CommandDescriptor, Mode, Options};
pub use error::EngineError;
pub use executor::{Executor, ExecutorOptions, NoopTtyAllocator, TtyAllocator};
pub use fmt::join_args;
pub use result::RunResult;
pub use sanitizer::{SanitizeError, SanitizeMode, SanitizerConfig};
pub use scope::Scope;
pub use selector::Selector;
pub use sink::{MultiSink, OutputSink, StdinSource};
pub use strategy::{BasicStrategy, PipeStrategy, Strategy, StreamingStrategy, TimeoutStrategy};
