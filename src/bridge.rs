//! Event bridge.
//!
//! Translates the protocol engine's asynchronous lifecycle notifications
//! into state transitions, independent of any in-flight controller
//! operation. Handlers are fire-and-forget: each notification becomes a
//! single, complete dispatch.

use crate::actions::AuthAction;
use crate::config::ErrorCallback;
use crate::error::SessionError;
use crate::providers::EngineEvent;
use crate::state::SessionUser;
use crate::store::AuthStateStore;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Spawn the bridge task draining `events` into the store.
///
/// Background failures are never thrown to a caller; they surface only
/// as the `Errored` state and through the configured error callback.
pub(crate) fn spawn_event_bridge(
    mut events: broadcast::Receiver<EngineEvent>,
    store: Arc<AuthStateStore>,
    on_error: Option<ErrorCallback>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => handle_event(event, &store, on_error.as_ref()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event bridge lagged behind engine notifications");
                },
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("engine event channel closed, stopping bridge");
                    break;
                },
            }
        }
    })
}

fn handle_event(event: EngineEvent, store: &AuthStateStore, on_error: Option<&ErrorCallback>) {
    match event {
        EngineEvent::UserLoaded(session) => {
            tracing::debug!("engine loaded a user, refreshing session state");
            store.dispatch(AuthAction::TokenRefreshed {
                user: SessionUser::from_session(session),
            });
        },
        EngineEvent::UserUnloaded => {
            tracing::info!("engine unloaded the user, session ended");
            store.dispatch(AuthAction::LogoutCompleted);
        },
        EngineEvent::SilentRenewFailed(cause) => {
            tracing::warn!(%cause, "background silent renewal failed");
            let error = SessionError::token_refresh_caused("silent renewal failed", cause);
            store.dispatch(AuthAction::Errored {
                error: error.clone(),
            });
            if let Some(callback) = on_error {
                callback(&error);
            }
        },
        EngineEvent::AccessTokenExpired => {
            tracing::info!("access token expired without renewal, session ended");
            store.dispatch(AuthAction::LogoutCompleted);
        },
    }
}
