use log::debug;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, sleep_until};

use super::token::{LoadToken, TokenState};

/// Stand-in deadline for timeouts too large to represent (about 30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Callback run when the current attempt hits its deadline
pub type TimeoutHandler = Box<dyn FnOnce(&LoadToken) + Send + 'static>;

/// Decides which of several overlapping load attempts may still touch
/// shared state.
///
/// Only the most recently created token is ever current. Starting a new
/// attempt supersedes the previous one immediately, whatever order the
/// underlying fetches finish in. Cancellation is cooperative: a superseded
/// fetch is left running, but `is_current` and `complete` answer false for
/// its token so the result gets discarded.
///
/// Clones share the same current-token slot.
#[derive(Clone, Default)]
pub struct LoadCoordinator {
    inner: Arc<Mutex<CoordinatorState>>,
}

#[derive(Default)]
struct CoordinatorState {
    current: Option<Slot>,
    next_id: u64,
}

struct Slot {
    token: LoadToken,
    timer: Option<JoinHandle<()>>,
    on_timeout: Option<TimeoutHandler>,
}

impl Slot {
    /// Move the token to a terminal state and disarm its deadline.
    fn retire(mut self, state: TokenState) -> Option<TimeoutHandler> {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.token.transition(state);
        self.on_timeout.take()
    }
}

impl LoadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new attempt with the given deadline.
    ///
    /// Any pending attempt becomes `Superseded` and its `on_timeout` is
    /// dropped without being called. Must be called from within a tokio
    /// runtime, which drives the deadline timer.
    pub fn create_token<F>(&self, timeout: Duration, on_timeout: F) -> LoadToken
    where
        F: FnOnce(&LoadToken) + Send + 'static,
    {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let mut state = self.lock();

        let superseded = state.current.take().map(|previous| {
            debug!("Load #{} superseded", previous.token.id());
            previous.retire(TokenState::Superseded)
        });

        state.next_id += 1;
        let token = LoadToken::new(state.next_id, now, deadline);

        // The timer blocks on this lock until the slot is installed.
        let timer = tokio::spawn(fire_deadline(Arc::downgrade(&self.inner), token.clone()));

        state.current = Some(Slot {
            token: token.clone(),
            timer: Some(timer),
            on_timeout: Some(Box::new(on_timeout)),
        });
        drop(state);
        drop(superseded);

        debug!("Load #{} started with {}ms deadline", token.id(), timeout.as_millis());
        token
    }

    /// True iff `token` is the current attempt and still pending.
    pub fn is_current(&self, token: &LoadToken) -> bool {
        let state = self.lock();
        is_current_in(&state, token)
    }

    /// Mark the current attempt as finished.
    ///
    /// Returns true if the caller may act on its result. For a stale,
    /// timed-out or already completed token nothing changes and false is
    /// returned.
    pub fn complete(&self, token: &LoadToken) -> bool {
        let unused = {
            let mut state = self.lock();
            if !is_current_in(&state, token) {
                return false;
            }
            state
                .current
                .take()
                .map(|slot| slot.retire(TokenState::Completed))
        };

        // Dropped outside the lock
        drop(unused);
        debug!("Load #{} completed", token.id());
        true
    }

    /// Time out the current attempt and run its `on_timeout` callback.
    ///
    /// The deadline timer calls this on its own. A caller whose await
    /// already observed the deadline may call it too; the callback still
    /// runs at most once.
    pub fn expire(&self, token: &LoadToken) -> bool {
        expire_in(&self.inner, token)
    }

    /// Supersede the current attempt without starting a new one.
    pub fn cancel_current(&self) -> Option<LoadToken> {
        let slot = self.lock().current.take()?;
        let token = slot.token.clone();
        drop(slot.retire(TokenState::Superseded));
        debug!("Load #{} cancelled", token.id());
        Some(token)
    }

    /// The current pending attempt, if any.
    pub fn current(&self) -> Option<LoadToken> {
        self.lock().current.as_ref().map(|slot| slot.token.clone())
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for LoadCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadCoordinator")
            .field("current", &self.current())
            .finish()
    }
}

fn is_current_in(state: &CoordinatorState, token: &LoadToken) -> bool {
    state
        .current
        .as_ref()
        .is_some_and(|slot| slot.token == *token && slot.token.is_pending())
}

fn expire_in(inner: &Mutex<CoordinatorState>, token: &LoadToken) -> bool {
    let handler = {
        let mut state = inner.lock().unwrap_or_else(PoisonError::into_inner);
        if !is_current_in(&state, token) {
            return false;
        }
        match state.current.take() {
            Some(slot) => slot.retire(TokenState::TimedOut),
            None => return false,
        }
    };

    debug!("Load #{} timed out", token.id());
    // Lock released: the callback may start a new attempt.
    if let Some(handler) = handler {
        handler(token);
    }
    true
}

async fn fire_deadline(inner: Weak<Mutex<CoordinatorState>>, token: LoadToken) {
    sleep_until(token.deadline()).await;
    if let Some(inner) = inner.upgrade() {
        expire_in(&inner, &token);
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce(&LoadToken) + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = count.clone();
        (count, move |_: &LoadToken| {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_token__is_current_and_pending() {
        let coordinator = LoadCoordinator::new();
        let token = coordinator.create_token(Duration::from_secs(10), |_| {});

        assert!(coordinator.is_current(&token));
        assert_eq!(token.state(), TokenState::Pending);
        assert_eq!(coordinator.current(), Some(token.clone()));
        assert_eq!(token.deadline() - token.created_at(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_token__huge_timeout_does_not_overflow() {
        let coordinator = LoadCoordinator::new();
        let (fired, on_timeout) = counter();
        let token = coordinator.create_token(Duration::MAX, on_timeout);

        assert!(coordinator.is_current(&token));
        assert!(token.deadline() - token.created_at() >= FAR_FUTURE);

        sleep(Duration::from_secs(86_400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(coordinator.complete(&token));
    }

    /// Reads the coordinator while being dropped together with a handler
    struct PeekOnDrop {
        coordinator: LoadCoordinator,
        seen: Arc<Mutex<Vec<Option<u64>>>>,
    }

    impl Drop for PeekOnDrop {
        fn drop(&mut self) {
            let current = self.coordinator.current().map(|token| token.id());
            self.seen.lock().unwrap().push(current);
        }
    }

    fn peeking_handler(
        coordinator: &LoadCoordinator,
        seen: &Arc<Mutex<Vec<Option<u64>>>>,
    ) -> impl FnOnce(&LoadToken) + Send + 'static {
        let peek = PeekOnDrop {
            coordinator: coordinator.clone(),
            seen: seen.clone(),
        };
        move |_: &LoadToken| {
            let _keep = &peek;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unused_handler__is_dropped_outside_the_lock() {
        let coordinator = LoadCoordinator::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let timeout = Duration::from_secs(10);

        let _a = coordinator.create_token(timeout, peeking_handler(&coordinator, &seen));
        let b = coordinator.create_token(timeout, peeking_handler(&coordinator, &seen));
        // Superseding drops A's handler, which sees B already installed
        assert_eq!(*seen.lock().unwrap(), vec![Some(b.id())]);

        assert!(coordinator.complete(&b));
        assert_eq!(*seen.lock().unwrap(), vec![Some(b.id()), None]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_token__ids_increase() {
        let coordinator = LoadCoordinator::new();
        let a = coordinator.create_token(Duration::from_secs(1), |_| {});
        let b = coordinator.create_token(Duration::from_secs(1), |_| {});
        assert!(b.id() > a.id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete__current_token() {
        let coordinator = LoadCoordinator::new();
        let (fired, on_timeout) = counter();
        let token = coordinator.create_token(Duration::from_millis(100), on_timeout);

        assert!(coordinator.complete(&token));
        assert_eq!(token.state(), TokenState::Completed);
        assert!(!coordinator.is_current(&token));
        assert_eq!(coordinator.current(), None);

        // Deadline is disarmed
        sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(token.state(), TokenState::Completed);

        // Completing twice is a no-op
        assert!(!coordinator.complete(&token));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_token__supersedes_pending_token() {
        let coordinator = LoadCoordinator::new();
        let (fired_a, on_timeout_a) = counter();
        let a = coordinator.create_token(Duration::from_millis(100), on_timeout_a);
        let b = coordinator.create_token(Duration::from_secs(10), |_| {});

        assert_eq!(a.state(), TokenState::Superseded);
        assert!(!coordinator.is_current(&a));
        assert!(coordinator.is_current(&b));

        // A's deadline passes without effect
        sleep(Duration::from_millis(500)).await;
        assert_eq!(fired_a.load(Ordering::SeqCst), 0);
        assert_eq!(a.state(), TokenState::Superseded);

        assert!(!coordinator.complete(&a));
        assert!(coordinator.is_current(&b));
        assert!(coordinator.complete(&b));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline__times_out_and_calls_handler_once() {
        let coordinator = LoadCoordinator::new();
        let (fired, on_timeout) = counter();
        let token = coordinator.create_token(Duration::from_millis(100), on_timeout);

        sleep(Duration::from_millis(150)).await;

        assert_eq!(token.state(), TokenState::TimedOut);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_current(&token));
        assert!(!coordinator.complete(&token));
        assert_eq!(token.state(), TokenState::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire__manual_and_timer_fire_only_once() {
        let coordinator = LoadCoordinator::new();
        let (fired, on_timeout) = counter();
        let token = coordinator.create_token(Duration::from_millis(100), on_timeout);

        assert!(coordinator.expire(&token));
        assert!(!coordinator.expire(&token));

        sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(token.state(), TokenState::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire__stale_token_is_ignored() {
        let coordinator = LoadCoordinator::new();
        let (fired, on_timeout) = counter();
        let a = coordinator.create_token(Duration::from_millis(100), on_timeout);
        let _b = coordinator.create_token(Duration::from_secs(10), |_| {});

        assert!(!coordinator.expire(&a));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(a.state(), TokenState::Superseded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_handler__may_start_a_new_attempt() {
        let coordinator = LoadCoordinator::new();
        let restarted = Arc::new(Mutex::new(None));

        let handle = coordinator.clone();
        let slot = restarted.clone();
        let first = coordinator.create_token(Duration::from_millis(50), move |_| {
            let next = handle.create_token(Duration::from_secs(10), |_| {});
            *slot.lock().unwrap() = Some(next);
        });

        sleep(Duration::from_millis(100)).await;

        assert_eq!(first.state(), TokenState::TimedOut);
        let next = restarted.lock().unwrap().clone().expect("handler did not run");
        assert!(coordinator.is_current(&next));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_current() {
        let coordinator = LoadCoordinator::new();
        let (fired, on_timeout) = counter();
        let token = coordinator.create_token(Duration::from_millis(100), on_timeout);

        assert_eq!(coordinator.cancel_current(), Some(token.clone()));
        assert_eq!(token.state(), TokenState::Superseded);
        assert_eq!(coordinator.cancel_current(), None);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_coordinator__timer_does_nothing() {
        let (fired, on_timeout) = counter();
        let token = {
            let coordinator = LoadCoordinator::new();
            coordinator.create_token(Duration::from_millis(50), on_timeout)
        };

        sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(token.state(), TokenState::Pending);
    }
}
