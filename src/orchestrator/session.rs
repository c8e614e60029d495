use crate::core::{AgentError, AgentResult, PendingTransaction};
use dashmap::DashMap;
use ethers::types::H256;
use log::{debug, error};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// A session whose progress is driven by a pure reducer.
pub trait SessionState: Clone + Debug + Send + Sync + 'static {
    type Event: Debug + Send;

    fn idle(id: u64) -> Self;

    fn id(&self) -> u64;

    /// Started and neither complete nor failed.
    fn is_in_flight(&self) -> bool;

    fn is_failed(&self) -> bool;

    fn reduce(&self, event: Self::Event) -> AgentResult<Self>;

    /// Forces the terminal error step.
    fn fail(&self, error: AgentError) -> Self;

    fn tx_submitted(tx: PendingTransaction) -> Self::Event;

    fn tx_confirmed(hash: H256) -> Self::Event;

    fn tx_failed(hash: H256, error: AgentError) -> Self::Event;

    fn failed(error: AgentError) -> Self::Event;
}

/// Holds the single session of an orchestrator and publishes every change.
///
/// Sessions that finish or get reset are parked in `settled` until their
/// driver collects them, so a driver never reads a later session's state.
pub struct SessionCell<S: SessionState> {
    state: watch::Sender<S>,
    settled: DashMap<u64, S>,
    next_id: AtomicU64,
}

impl<S: SessionState> SessionCell<S> {
    pub fn new() -> Self {
        let (state, _) = watch::channel(S::idle(0));
        Self {
            state,
            settled: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn current(&self) -> S {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.state.subscribe()
    }

    /// Starts a new session with `start` applied to a fresh idle session.
    ///
    /// Fails with `SessionInFlight` if the current session has not finished.
    pub fn begin(&self, start: S::Event) -> AgentResult<S> {
        let mut outcome = None;
        self.state.send_if_modified(|current| {
            if current.is_in_flight() {
                outcome = Some(Err(AgentError::SessionInFlight(format!(
                    "session {}",
                    current.id()
                ))));
                return false;
            }

            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let next = S::idle(id).reduce(start).unwrap_or_else(|e| S::idle(id).fail(e));
            debug!("Session {} started", id);
            outcome = Some(Ok(next.clone()));
            *current = next;
            true
        });
        outcome.unwrap_or_else(|| Err(AgentError::SessionInFlight("unknown".to_string())))
    }

    /// Applies `event` to session `id`.
    ///
    /// Returns `None` when that session has been replaced by a reset or a newer
    /// session, in which case the event is dropped. A rejected transition
    /// moves the session to its error step.
    pub fn apply(&self, id: u64, event: S::Event) -> Option<S> {
        let mut outcome = None;
        self.state.send_if_modified(|current| {
            if current.id() != id {
                debug!("Dropping {:?} for superseded session {}", event, id);
                return false;
            }

            let next = match current.reduce(event) {
                Ok(next) => next,
                Err(e) => {
                    error!("Session {}: {}", id, e);
                    current.fail(e)
                }
            };
            if !next.is_in_flight() {
                self.settled.insert(id, next.clone());
            }
            outcome = Some(next.clone());
            *current = next;
            true
        });
        outcome
    }

    /// Replaces whatever session is current with a fresh idle one.
    pub fn reset(&self) -> S {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let idle = S::idle(id);
        let replaced = self.state.send_replace(idle.clone());
        if replaced.is_in_flight() {
            self.settled.insert(replaced.id(), idle.clone());
        }
        debug!("Session reset, now {}", id);
        idle
    }

    /// Final state of session `id` once its driver has stopped: its terminal
    /// state, or the idle session that replaced it on reset.
    pub fn settle(&self, id: u64) -> S {
        if let Some((_, session)) = self.settled.remove(&id) {
            return session;
        }
        let current = self.current();
        if current.id() != id {
            debug!("Session {} left no final state, returning {}", id, current.id());
        }
        current
    }

    /// Resolves once session `id` is no longer the current session.
    pub async fn superseded(&self, id: u64) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|current| current.id() != id).await;
    }
}

impl<S: SessionState> Default for SessionCell<S> {
    fn default() -> Self {
        Self::new()
    }
}
