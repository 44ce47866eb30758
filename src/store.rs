//! The auth state store.
//!
//! Holds the single authoritative [`AuthState`] and publishes every
//! change to subscribers. The only writer is the session controller;
//! everything else sees a read-only projection.

use crate::actions::AuthAction;
use crate::state::AuthState;
use tokio::sync::watch;

/// Observable holder of the authoritative [`AuthState`].
///
/// Backed by a watch channel: a dispatch replaces the held value with
/// the pure transition result and wakes subscribers. Dispatches are
/// synchronous value swaps, applied in dispatch order with no batching,
/// and each is fully visible to subscribers before the next one.
#[derive(Debug)]
pub struct AuthStateStore {
    tx: watch::Sender<AuthState>,
}

impl AuthStateStore {
    /// Create a store holding the `Initializing` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AuthState::Initializing);
        Self { tx }
    }

    /// The currently held state.
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// Subscribe to state changes.
    ///
    /// The receiver observes every dispatched state in order. Reading
    /// the receiver yields the current value immediately, so a late
    /// subscriber never misses the present state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    /// Await the next state that is not `Initializing`.
    ///
    /// Resolves immediately if the held state is already settled. This
    /// is the one-shot notification route guards should use instead of
    /// polling the loading flag.
    pub async fn settled(&self) -> AuthState {
        let mut rx = self.tx.subscribe();
        let settled = match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            // The sender lives as long as `self`; this arm is unreachable
            // while the store exists, but fall back to the held value.
            Err(_) => self.current(),
        };
        settled
    }

    /// Apply an action: replace the held state with the pure transition
    /// result and notify subscribers.
    ///
    /// Crate-private: the session controller is the sole caller.
    pub(crate) fn dispatch(&self, action: AuthAction) {
        let next = action.into_state();
        tracing::debug!(
            authenticated = next.is_authenticated(),
            loading = next.is_loading(),
            errored = next.error().is_some(),
            "auth state transition"
        );
        self.tx.send_replace(next);
    }
}

impl Default for AuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}
