//! Protocol engine trait.
//!
//! The OIDC/OAuth protocol machinery (authorization-request construction,
//! PKCE, token-endpoint exchange, JWT validation, persisted-session
//! storage) lives behind this trait. The session controller calls into it
//! and listens to its lifecycle events; it never reimplements any of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::future::Future;
use tokio::sync::broadcast;
use url::Url;

use crate::error::EngineError;

/// Result type for engine calls.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// A session as the protocol engine reports it.
///
/// Raw claims plus token material; the controller's mapping step turns
/// this into a [`SessionUser`](crate::state::SessionUser).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSession {
    /// Validated claims from the identity assertion.
    pub claims: Map<String, Value>,

    /// Raw signed identity assertion.
    pub id_token: String,

    /// Bearer credential.
    pub access_token: String,

    /// Renewal credential, when offline access was granted.
    pub refresh_token: Option<String>,

    /// Absolute access-token expiry, when the engine knows it.
    pub expires_at: Option<DateTime<Utc>>,

    /// Space-separated granted scopes, as returned by the token endpoint.
    pub scope: Option<String>,
}

impl EngineSession {
    /// Returns `true` if the session's access token has expired at `now`.
    ///
    /// A session without a known expiry is treated as unexpired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Result of exchanging a redirect callback for tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackExchange {
    /// The established session.
    pub session: EngineSession,

    /// `return_to` recovered from the opaque transport state, if the
    /// login request carried one.
    pub return_to: Option<String>,
}

/// Parameters for an authorization request.
///
/// `query` holds the provider-routing parameters with caller extras
/// already merged on top; `return_to` rides inside the opaque transport
/// state and comes back in [`CallbackExchange`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorizeParams {
    /// Extra query parameters for the authorization request.
    pub query: BTreeMap<String, String>,

    /// Application-level address to restore after the round trip.
    pub return_to: Option<String>,
}

/// Popup surface dimensions for interactive login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupOptions {
    /// Popup width in pixels.
    pub width: u32,

    /// Popup height in pixels.
    pub height: u32,
}

impl PopupOptions {
    /// Create popup options with explicit dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for PopupOptions {
    fn default() -> Self {
        Self::new(400, 600)
    }
}

/// A request to end the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndSessionRequest {
    /// Also end the session at the identity provider.
    pub federated: bool,

    /// Post-logout destination overriding the configured one.
    pub return_to: Option<String>,
}

/// Lifecycle notification from the protocol engine.
///
/// Emitted on the engine's own schedule (background silent renewal,
/// expiry timers, cross-tab unload), independent of any in-flight
/// controller operation.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A session was (re)established, e.g. after a background renewal.
    UserLoaded(EngineSession),

    /// The session was removed.
    UserUnloaded,

    /// A background silent renewal failed.
    SilentRenewFailed(EngineError),

    /// The access token expired without a renewal.
    AccessTokenExpired,
}

/// The OIDC protocol engine.
///
/// One instance is owned by exactly one
/// [`SessionController`](crate::controller::SessionController).
pub trait ProtocolEngine: Send + Sync {
    /// Start an interactive login via a full-page redirect.
    ///
    /// Resolves once the navigation has been initiated; the page is
    /// expected to unload afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the authorization request cannot be built or
    /// the navigation cannot be initiated.
    fn authorize_redirect(
        &self,
        params: AuthorizeParams,
    ) -> impl Future<Output = EngineResult<()>> + Send;

    /// Run an interactive login in a popup surface.
    ///
    /// Resolves with the established session once the popup completes
    /// the flow. A popup the user abandons is the engine's to time out.
    ///
    /// # Errors
    ///
    /// Returns an error if the popup cannot be opened or the flow fails.
    fn authorize_popup(
        &self,
        params: AuthorizeParams,
        popup: PopupOptions,
    ) -> impl Future<Output = EngineResult<EngineSession>> + Send;

    /// Fetch the persisted session, if any.
    ///
    /// May return an expired session; callers decide whether expiry
    /// warrants a renewal.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage adapter fails.
    fn stored_session(&self) -> impl Future<Output = EngineResult<Option<EngineSession>>> + Send;

    /// Perform a silent (non-interactive) renewal.
    ///
    /// Resolves with the renewed session, or `None` if the engine could
    /// not produce one without interaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the renewal request fails.
    fn silent_renew(&self) -> impl Future<Output = EngineResult<Option<EngineSession>>> + Send;

    /// Exchange the authorization response in `callback_url` for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are missing, already consumed
    /// or rejected by the token endpoint.
    fn exchange_callback(
        &self,
        callback_url: &Url,
    ) -> impl Future<Output = EngineResult<CallbackExchange>> + Send;

    /// End the session and navigate to the post-logout destination.
    ///
    /// Completion of the logout itself is observed via
    /// [`EngineEvent::UserUnloaded`], not this call's resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if session termination cannot be initiated.
    fn end_session(
        &self,
        request: EndSessionRequest,
    ) -> impl Future<Output = EngineResult<()>> + Send;

    /// Subscribe to the engine's lifecycle notifications.
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
}
