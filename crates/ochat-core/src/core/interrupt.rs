//! Interrupt handling.
//!
//! Two layers: [`TurnCanceller`] aborts the in-flight turn, and a process-wide
//! flag records a Ctrl+C that arrived with no turn running. A turn snapshots
//! the current token when it starts. Aborting cancels that token and
//! immediately installs a fresh one, so the next turn is never born cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INTERRUPT_NOTIFY: OnceLock<Notify> = OnceLock::new();

/// Returned by loops that stopped because of Ctrl+C.
#[derive(Debug)]
pub struct InterruptedError;

impl std::fmt::Display for InterruptedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interrupted")
    }
}

impl std::error::Error for InterruptedError {}

fn notifier() -> &'static Notify {
    INTERRUPT_NOTIFY.get_or_init(Notify::new)
}

/// Records a Ctrl+C outside a turn, force-exiting on a second one.
///
/// Only sets a flag; whoever waits on it unwinds and exits.
pub fn trigger_ctrl_c() {
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        // Second interrupt before the first was handled.
        std::process::exit(130);
    }
    notifier().notify_waiters();
}

/// Checks if an interrupt has been requested.
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Waits until an interrupt is triggered.
pub async fn wait_for_interrupt() {
    loop {
        let notified = notifier().notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if is_interrupted() {
            return;
        }
        notified.await;
    }
}

/// Resets the interrupt flag.
pub fn reset() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

#[derive(Debug)]
struct Inner {
    token: Mutex<CancellationToken>,
    active: AtomicBool,
}

/// Shared handle for cancelling the in-flight turn.
///
/// Clones share state; hand one to the signal handler and keep one in the
/// session.
#[derive(Debug, Clone)]
pub struct TurnCanceller {
    inner: Arc<Inner>,
}

impl Default for TurnCanceller {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnCanceller {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                token: Mutex::new(CancellationToken::new()),
                active: AtomicBool::new(false),
            }),
        }
    }

    /// Marks a turn as started and returns its token.
    pub fn arm(&self) -> CancellationToken {
        let token = self
            .inner
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.inner.active.store(true, Ordering::SeqCst);
        token
    }

    /// Marks the turn as finished.
    pub fn disarm(&self) {
        self.inner.active.store(false, Ordering::SeqCst);
    }

    /// Whether a turn is in flight.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Cancels the in-flight turn, if any, and re-arms a fresh token.
    ///
    /// Returns `false` when no turn was active; nothing is cancelled then.
    pub fn abort(&self) -> bool {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        let mut token = self
            .inner
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        token.cancel();
        *token = CancellationToken::new();
        tracing::debug!("turn aborted");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_cancels_current_turn_only() {
        let canceller = TurnCanceller::new();
        let first = canceller.arm();
        assert!(canceller.abort());
        assert!(first.is_cancelled());

        let second = canceller.arm();
        assert!(!second.is_cancelled());
        assert!(canceller.is_active());
    }

    #[test]
    fn test_abort_when_idle_is_noop() {
        let canceller = TurnCanceller::new();
        assert!(!canceller.abort());
        let token = canceller.arm();
        canceller.disarm();
        assert!(!canceller.abort());
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_wait_for_interrupt_wakes_on_trigger() {
        reset();
        let waiter = tokio::spawn(wait_for_interrupt());
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        trigger_ctrl_c();
        waiter.await.unwrap();
        assert!(is_interrupted());

        reset();
        assert!(!is_interrupted());
    }

    #[test]
    fn test_clones_share_state() {
        let canceller = TurnCanceller::new();
        let handle = canceller.clone();
        let token = canceller.arm();
        assert!(handle.abort());
        assert!(token.is_cancelled());
        assert!(!canceller.is_active());
    }
}
