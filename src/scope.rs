//! Cancellation + deadline handle passed down to every strategy.
//!
//! Generalizes the ad hoc `tokio::select!` idle-timeout race used throughout
//! the process-management code this crate is grounded on into a reusable
//! primitive: a [`tokio_util::sync::CancellationToken`] paired with an
//! optional deadline.

use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// A cancellation + deadline handle. Corresponds to a `Context` in runtimes
/// that have one.
#[derive(Clone)]
pub struct Scope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Derive a child scope bounded by `timeout` from now. The effective
    /// deadline is the earlier of `timeout` and the parent's own deadline —
    /// a child scope can never outlive its parent's.
    pub fn child_with_deadline(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) => candidate.min(parent),
            None => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Resolves when the scope is cancelled or its deadline passes,
    /// whichever happens first. `None` deadline means "wait for
    /// cancellation only".
    pub async fn wait_until_done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn child_scope_deadline_is_the_earlier_of_the_two() {
        let parent = Scope::with_deadline(Duration::from_secs(10));
        let child = parent.child_with_deadline(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(child.is_expired());
        assert!(!parent.is_expired());
    }

    #[tokio::test]
    async fn child_scope_cannot_outlive_a_tighter_parent() {
        let parent = Scope::with_deadline(Duration::from_millis(20));
        let child = parent.child_with_deadline(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(child.is_expired());
    }

    #[tokio::test]
    async fn cancelling_parent_cancels_child() {
        let parent = Scope::new();
        let child = parent.child_with_deadline(Duration::from_secs(10));
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn wait_until_done_resolves_on_cancel_without_a_deadline() {
        let scope = Scope::new();
        scope.cancel();
        scope.wait_until_done().await;
    }
}
