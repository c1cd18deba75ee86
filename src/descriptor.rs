//! The immutable-by-convention record describing a command to run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::sink::{OutputSink, StdinSource};

/// Execution mode. Serializes to the bit-exact strings the spec promises for
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[serde(rename = "passthrough")]
    PassThrough,
    Capture,
    Interactive,
    Background,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::PassThrough => "passthrough",
            Mode::Capture => "capture",
            Mode::Interactive => "interactive",
            Mode::Background => "background",
        }
    }
}

/// The "dual source of truth" nested options record. When a field here is
/// set it wins over the matching top-level field on [`CommandDescriptor`] —
/// see the builder's writer-precedence rule for the exact algorithm.
#[derive(Clone, Default)]
pub struct Options {
    pub capture: bool,
    pub stream: bool,
    pub timeout: Option<Duration>,
    pub stdout_sink: Option<Arc<dyn OutputSink>>,
    pub stderr_sink: Option<Arc<dyn OutputSink>>,
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("capture", &self.capture)
            .field("stream", &self.stream)
            .field("timeout", &self.timeout)
            .field("stdout_sink", &self.stdout_sink.is_some())
            .field("stderr_sink", &self.stderr_sink.is_some())
            .finish()
    }
}

/// A plain data value describing *what* to run. Treated as immutable by the
/// engine: strategies that need different wiring (currently only the pipe
/// strategy) operate on a `clone()`, never on `&mut`.
#[derive(Clone)]
pub struct CommandDescriptor {
    pub name: String,
    pub args: Vec<String>,
    pub mode: Mode,
    pub working_dir: Option<PathBuf>,
    /// Ordered `KEY=VALUE` strings appended to the inherited environment.
    pub env: Vec<String>,
    pub timeout: Option<Duration>,
    pub stdin: Option<StdinSource>,
    pub stdout_sink: Option<Arc<dyn OutputSink>>,
    pub stderr_sink: Option<Arc<dyn OutputSink>>,
    pub inherit_env: bool,
    pub signal_forward: bool,
    pub allocate_tty: bool,
    /// When true, dispatch via the strategy selector instead of by `mode`.
    pub use_strategy: bool,
    /// Top-level mirror of `options.capture`; OR'd together when deciding
    /// whether a mixed-output build captures.
    pub capture: bool,
    /// Top-level mirror of `options.stream`.
    pub stream: bool,
    pub options: Options,
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("mode", &self.mode)
            .field("working_dir", &self.working_dir)
            .field("env", &self.env)
            .field("timeout", &self.timeout)
            .field("stdin", &self.stdin)
            .field("stdout_sink", &self.stdout_sink.is_some())
            .field("stderr_sink", &self.stderr_sink.is_some())
            .field("inherit_env", &self.inherit_env)
            .field("signal_forward", &self.signal_forward)
            .field("allocate_tty", &self.allocate_tty)
            .field("use_strategy", &self.use_strategy)
            .field("capture", &self.capture)
            .field("stream", &self.stream)
            .field("options", &self.options)
            .finish()
    }
}

impl CommandDescriptor {
    /// mode = capture, inherit_env = true, signal_forward = true.
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
            mode: Mode::Capture,
            working_dir: None,
            env: Vec::new(),
            timeout: None,
            stdin: None,
            stdout_sink: None,
            stderr_sink: None,
            inherit_env: true,
            signal_forward: true,
            allocate_tty: false,
            use_strategy: false,
            capture: false,
            stream: false,
            options: Options::default(),
        }
    }

    /// Same as `new`, but mode = pass-through.
    pub fn passthrough(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut d = Self::new(name, args);
        d.mode = Mode::PassThrough;
        d
    }

    /// mode = interactive, allocate_tty = true.
    pub fn interactive(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut d = Self::new(name, args);
        d.mode = Mode::Interactive;
        d.allocate_tty = true;
        d
    }

    /// mode = background. Not part of the stable construction surface but
    /// kept for symmetry with the other three modes.
    pub fn background(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut d = Self::new(name, args);
        d.mode = Mode::Background;
        d
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Appends `KEY=VALUE` strings to the environment additions.
    pub fn with_env(mut self, entries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.env.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn with_stdin(mut self, stdin: StdinSource) -> Self {
        self.stdin = Some(stdin);
        self
    }

    pub fn with_stdout_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.stdout_sink = Some(sink);
        self
    }

    pub fn with_stderr_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.stderr_sink = Some(sink);
        self
    }
}

impl std::fmt::Display for CommandDescriptor {
    /// `name [arg [arg ...]]`, double-quoting any argument that contains a
    /// space or tab. Display form only — not shell-safe; use
    /// [`crate::fmt::join_args`] for that.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            if arg.contains(' ') || arg.contains('\t') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults_match_spec() {
        let d = CommandDescriptor::new("echo", ["hi"]);
        assert_eq!(d.mode, Mode::Capture);
        assert!(d.inherit_env);
        assert!(d.signal_forward);
    }

    #[test]
    fn passthrough_sets_mode_only() {
        let d = CommandDescriptor::passthrough("echo", ["hi"]);
        assert_eq!(d.mode, Mode::PassThrough);
        assert!(!d.allocate_tty);
    }

    #[test]
    fn interactive_sets_mode_and_tty_hint() {
        let d = CommandDescriptor::interactive("bash", Vec::<String>::new());
        assert_eq!(d.mode, Mode::Interactive);
        assert!(d.allocate_tty);
    }

    #[test]
    fn display_quotes_args_with_whitespace() {
        let d = CommandDescriptor::new("echo", ["hello world", "plain"]);
        assert_eq!(d.to_string(), "echo \"hello world\" plain");
    }

    #[test]
    fn mode_as_str_matches_the_bit_exact_diagnostic_strings() {
        assert_eq!(Mode::PassThrough.as_str(), "passthrough");
        assert_eq!(Mode::Capture.as_str(), "capture");
        assert_eq!(Mode::Interactive.as_str(), "interactive");
        assert_eq!(Mode::Background.as_str(), "background");
    }

    #[test]
    fn fluent_setters_chain() {
        let d = CommandDescriptor::new("echo", ["hi"])
            .with_timeout(Duration::from_secs(1))
            .with_working_dir("/tmp")
            .with_env(["FOO=bar"]);
        assert_eq!(d.timeout, Some(Duration::from_secs(1)));
        assert_eq!(d.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(d.env, vec!["FOO=bar".to_string()]);
    }
}
