//! The uniform outcome record every strategy returns.

use std::time::Duration;

/// Outcome of a single run, regardless of which strategy produced it.
///
/// Invariants: `timeout == true` implies `error` is `Some` and contains
/// `"timed out"`; a non-zero `exit_code` with no timeout and no launch
/// failure implies `error` describes the exit status; `duration` is always
/// set.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// 0 on success, the child's exit status on non-zero exit, -1 on
    /// launch/OS failure.
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration: Duration,
    pub timeout: bool,
    pub error: Option<String>,
}

impl RunResult {
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.timeout && self.error.is_none()
    }
}
