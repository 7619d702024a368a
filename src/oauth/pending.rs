//! Usage: Single-resolution correlator for one login attempt.
//!
//! A `PendingLogin` owns the expected session id, the outcome slot, the timeout timer and the
//! listener's shutdown handle. The phase moves `Pending -> Resolved | Rejected | TimedOut` exactly
//! once; whichever event source reaches the transition first wins and every later delivery is a
//! no-op. Each transition (or dropping a still-pending attempt) runs cleanup exactly once: the
//! timer task is aborted and the listener is told to shut down.

use super::callback::CallbackResult;
use crate::shared::error::{AppError, AppResult, ErrorKind};
use crate::shared::mutex_ext::MutexExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPhase {
    Pending,
    Resolved,
    Rejected,
    TimedOut,
}

impl LoginPhase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

type Outcome = AppResult<CallbackResult>;

struct PendingInner {
    phase: LoginPhase,
    outcome_tx: Option<oneshot::Sender<Outcome>>,
    timer: Option<JoinHandle<()>>,
    listener_shutdown: Option<oneshot::Sender<()>>,
}

pub struct PendingLogin {
    expected_id: String,
    timeout: Duration,
    inner: Mutex<PendingInner>,
    cleanup_runs: AtomicUsize,
}

/// Receiving half of a `PendingLogin`; resolves once with the attempt's outcome.
pub struct PendingOutcome {
    rx: oneshot::Receiver<Outcome>,
}

impl PendingOutcome {
    pub async fn wait(self) -> Outcome {
        self.rx.await.unwrap_or_else(|_| {
            Err(AppError::new(
                ErrorKind::Internal,
                "login attempt was abandoned before an outcome was produced",
            ))
        })
    }
}

impl PendingLogin {
    /// Creates the correlator and starts its timeout timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(expected_id: impl Into<String>, timeout: Duration) -> (Arc<Self>, PendingOutcome) {
        let (outcome_tx, rx) = oneshot::channel();
        let pending = Arc::new(Self {
            expected_id: expected_id.into(),
            timeout,
            inner: Mutex::new(PendingInner {
                phase: LoginPhase::Pending,
                outcome_tx: Some(outcome_tx),
                timer: None,
                listener_shutdown: None,
            }),
            cleanup_runs: AtomicUsize::new(0),
        });

        let weak = Arc::downgrade(&pending);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(pending) = weak.upgrade() {
                pending.time_out();
            }
        });

        {
            let mut inner = pending.inner.lock_or_recover();
            if inner.phase.is_terminal() {
                timer.abort();
            } else {
                inner.timer = Some(timer);
            }
        }

        (pending, PendingOutcome { rx })
    }

    pub fn expected_id(&self) -> &str {
        &self.expected_id
    }

    pub fn phase(&self) -> LoginPhase {
        self.inner.lock_or_recover().phase
    }

    /// How many times cleanup has run. Stays at 0 while pending, then 1 forever.
    pub fn cleanup_runs(&self) -> usize {
        self.cleanup_runs.load(Ordering::SeqCst)
    }

    /// Hands over the listener's shutdown trigger. Fires immediately if already terminal.
    pub(crate) fn attach_listener(&self, shutdown: oneshot::Sender<()>) {
        let mut inner = self.inner.lock_or_recover();
        if inner.phase.is_terminal() {
            drop(inner);
            let _ = shutdown.send(());
            return;
        }
        inner.listener_shutdown = Some(shutdown);
    }

    pub fn resolve(&self, result: CallbackResult) -> bool {
        self.settle(LoginPhase::Resolved, Ok(result))
    }

    pub fn reject(&self, err: AppError) -> bool {
        self.settle(LoginPhase::Rejected, Err(err))
    }

    pub fn time_out(&self) -> bool {
        self.settle(
            LoginPhase::TimedOut,
            Err(AppError::timed_out(self.timeout)),
        )
    }

    /// Delivers a callback evaluation: `Ok` resolves, `Err` rejects.
    pub(crate) fn deliver(&self, outcome: Outcome) -> bool {
        match outcome {
            Ok(result) => self.resolve(result),
            Err(err) => self.reject(err),
        }
    }

    fn settle(&self, phase: LoginPhase, outcome: Outcome) -> bool {
        let (outcome_tx, timer, shutdown) = {
            let mut inner = self.inner.lock_or_recover();
            if inner.phase.is_terminal() {
                tracing::debug!(
                    current = ?inner.phase,
                    attempted = ?phase,
                    "oauth login already settled; ignoring late event"
                );
                return false;
            }
            inner.phase = phase;
            (
                inner.outcome_tx.take(),
                inner.timer.take(),
                inner.listener_shutdown.take(),
            )
        };

        self.cleanup(timer, shutdown);
        tracing::debug!(phase = ?phase, "oauth login settled");

        if let Some(tx) = outcome_tx {
            let _ = tx.send(outcome);
        }
        true
    }

    fn cleanup(&self, timer: Option<JoinHandle<()>>, shutdown: Option<oneshot::Sender<()>>) {
        if let Some(timer) = timer {
            timer.abort();
        }
        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(());
        }
        self.cleanup_runs.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for PendingLogin {
    fn drop(&mut self) {
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if inner.phase.is_terminal() {
            return;
        }
        inner.phase = LoginPhase::Rejected;
        let timer = inner.timer.take();
        let shutdown = inner.listener_shutdown.take();
        tracing::debug!("oauth login dropped while pending; cleaning up");
        self.cleanup(timer, shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::callback::{CodeType, LoginCredential};
    use crate::oauth::state::EchoedState;

    fn callback(code: &str) -> CallbackResult {
        CallbackResult {
            code: LoginCredential::AuthorizationCode(code.to_string()),
            code_type: CodeType::AuthCode,
            state: EchoedState::default(),
        }
    }

    #[tokio::test]
    async fn first_resolution_wins_and_later_events_are_ignored() {
        let (pending, outcome) = PendingLogin::start("abcd", Duration::from_secs(30));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        pending.attach_listener(shutdown_tx);

        assert!(pending.resolve(callback("first")));
        assert!(!pending.resolve(callback("second")));
        assert!(!pending.reject(AppError::new(ErrorKind::StateMismatch, "late")));
        assert!(!pending.time_out());

        let result = outcome.wait().await.expect("resolved");
        assert_eq!(result.code.as_authorization_code(), Some("first"));
        assert_eq!(pending.phase(), LoginPhase::Resolved);
        assert_eq!(pending.cleanup_runs(), 1);
        shutdown_rx.await.expect("listener told to shut down");
    }

    #[tokio::test]
    async fn rejection_is_terminal() {
        let (pending, outcome) = PendingLogin::start("abcd", Duration::from_secs(30));
        assert!(pending.reject(AppError::new(ErrorKind::StateMismatch, "error code=x")));
        assert!(!pending.resolve(callback("too-late")));

        let err = outcome.wait().await.expect_err("rejected");
        assert_eq!(err.kind(), ErrorKind::StateMismatch);
        assert_eq!(pending.phase(), LoginPhase::Rejected);
        assert_eq!(pending.cleanup_runs(), 1);
    }

    #[tokio::test]
    async fn timer_fires_when_nothing_arrives() {
        let (pending, outcome) = PendingLogin::start("abcd", Duration::from_millis(50));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        pending.attach_listener(shutdown_tx);

        let err = outcome.wait().await.expect_err("timed out");
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(pending.phase(), LoginPhase::TimedOut);
        assert_eq!(pending.cleanup_runs(), 1);
        shutdown_rx.await.expect("listener told to shut down");
        assert!(!pending.resolve(callback("after-timeout")));
        assert_eq!(pending.cleanup_runs(), 1);
    }

    #[tokio::test]
    async fn resolution_cancels_the_timer() {
        let (pending, outcome) = PendingLogin::start("abcd", Duration::from_millis(50));
        assert!(pending.resolve(callback("fast")));
        outcome.wait().await.expect("resolved");

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(pending.phase(), LoginPhase::Resolved);
        assert_eq!(pending.cleanup_runs(), 1);
    }

    #[tokio::test]
    async fn late_listener_attach_is_shut_down_immediately() {
        let (pending, _outcome) = PendingLogin::start("abcd", Duration::from_secs(30));
        pending.reject(AppError::new(ErrorKind::TransportError, "boom"));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        pending.attach_listener(shutdown_tx);
        shutdown_rx.await.expect("shutdown sent");
        assert_eq!(pending.cleanup_runs(), 1);
    }

    #[tokio::test]
    async fn dropping_a_pending_attempt_cleans_up() {
        let (pending, outcome) = PendingLogin::start("abcd", Duration::from_secs(30));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        pending.attach_listener(shutdown_tx);
        drop(pending);

        shutdown_rx.await.expect("listener told to shut down");
        let err = outcome.wait().await.expect_err("abandoned");
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn concurrent_deliveries_settle_once() {
        let (pending, outcome) = PendingLogin::start("abcd", Duration::from_secs(30));
        let mut handles = Vec::new();
        for i in 0..16 {
            let pending = Arc::clone(&pending);
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    pending.resolve(callback(&format!("code-{i}")))
                } else {
                    pending.reject(AppError::new(ErrorKind::StateMismatch, "x"))
                }
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.expect("join") {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(pending.cleanup_runs(), 1);
        let _ = outcome.wait().await;
    }
}
