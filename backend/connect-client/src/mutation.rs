//! Request state of a single user action
//!
//! A `Mutation` goes idle -> pending -> success | error. While pending,
//! further submissions are refused so a double tap sends one request.

use std::future::Future;

use tracing::debug;

use crate::error::Result;
use crate::notice::{Action, Notice};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState<T> {
    Idle,
    Pending,
    Success(T),
    Error(Notice),
}

#[derive(Debug)]
pub struct Mutation<T> {
    action: Action,
    state: MutationState<T>,
}

/// Returned by [`Mutation::begin`] when a request is already pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyPending;

impl<T> Mutation<T> {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            state: MutationState::Idle,
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn state(&self) -> &MutationState<T> {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, MutationState::Pending)
    }

    pub fn begin(&mut self) -> std::result::Result<(), AlreadyPending> {
        if self.is_pending() {
            return Err(AlreadyPending);
        }
        self.state = MutationState::Pending;
        Ok(())
    }

    /// Record the outcome and return the notice to show, if any.
    /// Outcomes arriving when nothing is pending are ignored.
    pub fn settle(&mut self, result: Result<T>) -> Option<Notice> {
        if !self.is_pending() {
            debug!(action = ?self.action, "Ignoring outcome of a request that is not pending");
            return None;
        }

        match result {
            Ok(value) => {
                self.state = MutationState::Success(value);
                Notice::for_success(self.action)
            }
            Err(e) => {
                let notice = Notice::from_error(self.action, &e);
                self.state = MutationState::Error(notice.clone());
                Some(notice)
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = MutationState::Idle;
    }

    /// Run `request` unless one is already pending.
    ///
    /// Returns `None` when refused, otherwise the notice from [`settle`](Self::settle).
    pub async fn run<F, Fut>(&mut self, request: F) -> Option<Option<Notice>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.begin().ok()?;
        let result = request().await;
        Some(self.settle(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    #[test]
    fn test_second_begin_is_refused_while_pending() {
        let mut mutation: Mutation<()> = Mutation::new(Action::Like);
        assert!(mutation.begin().is_ok());
        assert_eq!(mutation.begin(), Err(AlreadyPending));
    }

    #[test]
    fn test_settle_success_and_error() {
        let mut mutation = Mutation::new(Action::DeletePost);
        mutation.begin().unwrap();
        assert_eq!(
            mutation.settle(Ok(())),
            Some(Notice::success("Post deleted"))
        );
        assert_eq!(mutation.state(), &MutationState::Success(()));

        mutation.begin().unwrap();
        let notice = mutation.settle(Err(ClientError::Decode("bad".to_string())));
        assert_eq!(notice, Some(Notice::error("Failed to delete post")));
        assert!(matches!(mutation.state(), MutationState::Error(_)));
    }

    #[test]
    fn test_outcome_without_pending_is_ignored() {
        let mut mutation: Mutation<u32> = Mutation::new(Action::Follow);
        assert_eq!(mutation.settle(Ok(1)), None);
        assert_eq!(mutation.state(), &MutationState::Idle);
    }

    #[tokio::test]
    async fn test_run_reports_notice() {
        let mut mutation = Mutation::new(Action::Follow);
        let outcome = mutation.run(|| async { Ok(7u32) }).await;
        assert_eq!(outcome, Some(Some(Notice::success("Following"))));
        assert_eq!(mutation.state(), &MutationState::Success(7));
    }
}
