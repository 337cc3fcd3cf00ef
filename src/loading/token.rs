use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;

/// Lifecycle of a load attempt.
///
/// `Pending` moves to exactly one of the other states and never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenState {
    Pending,
    Completed,
    TimedOut,
    Superseded,
}

impl TokenState {
    pub fn is_terminal(self) -> bool {
        self != TokenState::Pending
    }
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Superseded => write!(f, "superseded"),
        }
    }
}

/// Handle to one load attempt issued by a
/// [`LoadCoordinator`](super::LoadCoordinator).
///
/// Clones refer to the same attempt. Only the coordinator changes the state;
/// holders can read it and pass the token back to the coordinator.
#[derive(Clone)]
pub struct LoadToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    id: u64,
    created_at: Instant,
    deadline: Instant,
    state: Mutex<TokenState>,
}

impl LoadToken {
    pub(crate) fn new(id: u64, created_at: Instant, deadline: Instant) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                id,
                created_at,
                deadline,
                state: Mutex::new(TokenState::Pending),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn created_at(&self) -> Instant {
        self.inner.created_at
    }

    pub fn deadline(&self) -> Instant {
        self.inner.deadline
    }

    pub fn state(&self) -> TokenState {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_pending(&self) -> bool {
        self.state() == TokenState::Pending
    }

    /// Move from `Pending` to `to`. Returns false, leaving the state
    /// untouched, if the token already reached a terminal state.
    pub(crate) fn transition(&self, to: TokenState) -> bool {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *state != TokenState::Pending || to == TokenState::Pending {
            return false;
        }
        *state = to;
        true
    }
}

impl PartialEq for LoadToken {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for LoadToken {}

impl fmt::Debug for LoadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadToken")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use std::time::Duration;

    fn token(id: u64) -> LoadToken {
        let now = Instant::now();
        LoadToken::new(id, now, now + Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_token__starts_pending() {
        let t = token(1);
        assert_eq!(t.state(), TokenState::Pending);
        assert!(t.is_pending());
        assert_eq!(t.deadline() - t.created_at(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_token__transition_is_one_shot() {
        let t = token(1);

        assert!(t.transition(TokenState::Completed));
        assert_eq!(t.state(), TokenState::Completed);

        assert!(!t.transition(TokenState::TimedOut));
        assert!(!t.transition(TokenState::Superseded));
        assert!(!t.transition(TokenState::Pending));
        assert_eq!(t.state(), TokenState::Completed);
    }

    #[tokio::test]
    async fn test_token__cannot_transition_to_pending() {
        let t = token(1);
        assert!(!t.transition(TokenState::Pending));
        assert!(t.is_pending());
    }

    #[tokio::test]
    async fn test_token__clones_share_state() {
        let a = token(7);
        let b = a.clone();

        assert_eq!(a, b);
        assert!(b.transition(TokenState::Superseded));
        assert_eq!(a.state(), TokenState::Superseded);
        assert_ne!(a, token(7));
    }

    #[test]
    fn test_token_state__is_terminal() {
        assert!(!TokenState::Pending.is_terminal());
        assert!(TokenState::Completed.is_terminal());
        assert!(TokenState::TimedOut.is_terminal());
        assert!(TokenState::Superseded.is_terminal());
        assert_eq!(TokenState::TimedOut.to_string(), "timed out");
    }
}
