//! Single-flight renewal state machine
//!
//! All callers that hit a first 401 land here. Whoever finds the coordinator
//! `Idle` flips it to `Refreshing` and spawns the renewal task; everyone else
//! just joins the waiter queue. The renewal task is the only code that drains
//! the queue, and it does so in the same critical section that returns the
//! state to `Idle`, so a caller either makes it into the current drain or
//! starts the next cycle. It can never be in both or neither.
//!
//! Transitions:
//! - Idle → Refreshing (first auth failure: enqueue, spawn renewal)
//! - Refreshing → Refreshing (further auth failures: enqueue)
//! - Refreshing → Idle (renewal succeeded: store credential, resolve all)
//! - Refreshing → Idle (renewal failed or timed out: clear session, reject all)
//!
//! The renewal runs on its own task rather than on the first caller's future,
//! so a caller that gives up cannot leave the coordinator stuck in `Refreshing`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use session_store::{Credential, CredentialStore, InvalidationReason};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::renewer::{RenewalError, Renewer};

/// Whether a renewal call is currently outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

impl RefreshState {
    pub fn label(&self) -> &'static str {
        match self {
            RefreshState::Idle => "idle",
            RefreshState::Refreshing => "refreshing",
        }
    }
}

type Outcome = std::result::Result<Credential, RenewalError>;

/// A suspended caller. Resolved exactly once, by the drain that removes it.
struct Waiter {
    request_id: Uuid,
    completion: oneshot::Sender<Outcome>,
}

/// State and queue share one lock; neither is ever touched without it.
struct Shared {
    state: RefreshState,
    waiters: VecDeque<Waiter>,
}

struct Inner {
    shared: Mutex<Shared>,
    renewer: Arc<dyn Renewer>,
    store: Arc<CredentialStore>,
    timeout: Duration,
}

/// Cloneable handle; clones share one state machine.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    /// `timeout` bounds each renewal call; elapsing counts as a failed renewal.
    pub fn new(renewer: Arc<dyn Renewer>, store: Arc<CredentialStore>, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    state: RefreshState::Idle,
                    waiters: VecDeque::new(),
                }),
                renewer,
                store,
                timeout,
            }),
        }
    }

    pub async fn state(&self) -> RefreshState {
        self.inner.shared.lock().await.state
    }

    /// Number of callers waiting on the in-flight renewal.
    pub async fn pending(&self) -> usize {
        self.inner.shared.lock().await.waiters.len()
    }

    /// Suspend until the current (or a newly started) renewal resolves.
    ///
    /// Returns the renewed credential, or `AuthExpired` if renewal failed.
    pub async fn await_renewal(&self, request_id: Uuid) -> Result<Credential> {
        let (completion, outcome) = oneshot::channel();

        let start_renewal = {
            let mut shared = self.inner.shared.lock().await;
            shared.waiters.push_back(Waiter {
                request_id,
                completion,
            });
            match shared.state {
                RefreshState::Refreshing => {
                    debug!(
                        %request_id,
                        state = shared.state.label(),
                        waiters = shared.waiters.len(),
                        "renewal in flight, queued"
                    );
                    false
                }
                RefreshState::Idle => {
                    shared.state = RefreshState::Refreshing;
                    info!(%request_id, "credential rejected, starting renewal");
                    true
                }
            }
        };

        // No await between the transition and the spawn: once `Refreshing` is
        // observable, a renewal task is guaranteed to exist.
        if start_renewal {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.run_renewal().await });
        }

        match outcome.await {
            Ok(Ok(credential)) => Ok(credential),
            Ok(Err(e)) => {
                debug!(%request_id, error = %e, "renewal failed, rejecting request");
                Err(Error::AuthExpired)
            }
            Err(_) => {
                warn!(%request_id, "renewal task dropped waiter without resolving it");
                Err(Error::AuthExpired)
            }
        }
    }
}

impl Inner {
    /// Perform the renewal, publish its outcome, drain the queue.
    async fn run_renewal(&self) {
        let started = Instant::now();
        let outcome = self.renew_bounded().await;

        // Store before waking anyone so replays never read a stale credential.
        let outcome = match outcome {
            Ok(credential) => match self.store.set(&credential).await {
                Ok(()) => Ok(credential),
                Err(e) => Err(RenewalError::Storage(e.to_string())),
            },
            Err(e) => Err(e),
        };

        if let Err(e) = &outcome {
            warn!(error = %e, "credential renewal failed, invalidating session");
            if let Err(clear_err) = self.store.clear(InvalidationReason::RenewalFailed).await {
                warn!(error = %clear_err, "failed to clear session after renewal failure");
            }
        }

        let waiters = {
            let mut shared = self.shared.lock().await;
            shared.state = RefreshState::Idle;
            std::mem::take(&mut shared.waiters)
        };

        let label = match &outcome {
            Ok(_) => "success",
            Err(RenewalError::TimedOut(_)) => "timeout",
            Err(_) => "failure",
        };
        crate::metrics::record_renewal(label, waiters.len(), started.elapsed().as_secs_f64());
        info!(
            outcome = label,
            waiters = waiters.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "renewal resolved, releasing waiters"
        );

        for waiter in waiters {
            if waiter.completion.send(outcome.clone()).is_err() {
                debug!(request_id = %waiter.request_id, "waiter abandoned before renewal resolved");
            }
        }
    }

    /// Run the renewer on its own task under the timeout. A panic or timeout
    /// becomes an ordinary renewal failure.
    async fn renew_bounded(&self) -> Outcome {
        let renewer = Arc::clone(&self.renewer);
        let mut task = tokio::spawn(async move { renewer.renew().await });

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => Err(RenewalError::Aborted(join_err.to_string())),
            Err(_) => {
                task.abort();
                Err(RenewalError::TimedOut(self.timeout))
            }
        }
    }
}
