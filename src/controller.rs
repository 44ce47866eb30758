//! The session controller.
//!
//! Orchestrates the session lifecycle: builds the protocol engine from
//! configuration, wires the event bridge, runs initialization
//! (rehydrate-or-callback), and exposes the public operations. It is the
//! sole writer of the [`AuthStateStore`].

use crate::actions::AuthAction;
use crate::bridge::spawn_event_bridge;
use crate::callback::CallbackProcessor;
use crate::config::{EngineConfig, SessionConfig};
use crate::error::{EngineError, Result, SessionError};
use crate::providers::{
    AuthorizeParams, EndSessionRequest, NavigationContext, PopupOptions, ProtocolEngine,
};
use crate::state::{AuthState, SessionUser};
use crate::store::AuthStateStore;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Options for an interactive login.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginOptions {
    /// Organization to establish the session under.
    pub organization_id: Option<String>,

    /// Connection to route the login through.
    pub connection_id: Option<String>,

    /// Hint for the provider's account picker.
    pub login_hint: Option<String>,

    /// Application-level address to restore after the round trip;
    /// carried inside the opaque transport state.
    pub return_to: Option<String>,

    /// Caller-supplied passthrough parameters, shallow-merged over the
    /// routing parameters (caller values win on key collision).
    pub extra_params: Vec<(String, String)>,
}

impl LoginOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the organization id.
    #[must_use]
    pub fn with_organization_id(mut self, id: impl Into<String>) -> Self {
        self.organization_id = Some(id.into());
        self
    }

    /// Set the connection id.
    #[must_use]
    pub fn with_connection_id(mut self, id: impl Into<String>) -> Self {
        self.connection_id = Some(id.into());
        self
    }

    /// Set the login hint.
    #[must_use]
    pub fn with_login_hint(mut self, hint: impl Into<String>) -> Self {
        self.login_hint = Some(hint.into());
        self
    }

    /// Set the post-login return address.
    #[must_use]
    pub fn with_return_to(mut self, return_to: impl Into<String>) -> Self {
        self.return_to = Some(return_to.into());
        self
    }

    /// Add a passthrough parameter.
    #[must_use]
    pub fn with_extra_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((key.into(), value.into()));
        self
    }

    /// Build the authorization parameters: routing parameters first,
    /// caller extras merged on top.
    fn into_params(self) -> AuthorizeParams {
        let mut query = BTreeMap::new();
        if let Some(id) = self.organization_id {
            query.insert("organization_id".to_owned(), id);
        }
        if let Some(id) = self.connection_id {
            query.insert("connection_id".to_owned(), id);
        }
        if let Some(hint) = self.login_hint {
            query.insert("login_hint".to_owned(), hint);
        }
        for (key, value) in self.extra_params {
            query.insert(key, value);
        }
        AuthorizeParams {
            query,
            return_to: self.return_to,
        }
    }
}

/// Options for ending the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogoutOptions {
    /// Also end the session at the identity provider.
    pub federated: bool,

    /// Post-logout destination overriding the configured one.
    pub return_to: Option<String>,
}

/// Options for token retrieval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetTokenOptions {
    /// Renew even if the persisted session is unexpired.
    pub force_refresh: bool,
}

/// Orchestrator of the session lifecycle.
///
/// One instance per application. Owns the protocol engine and the state
/// store exclusively; all other collaborators are readers or event
/// sources.
pub struct SessionController<P, N> {
    config: SessionConfig,
    engine: Arc<P>,
    navigation: Arc<N>,
    store: Arc<AuthStateStore>,
    callback: CallbackProcessor<N>,
    initialized: AtomicBool,
    /// Serializes silent renewals so racing callers share one in-flight
    /// renewal instead of each triggering their own.
    refresh_gate: Mutex<()>,
    bridge: JoinHandle<()>,
}

impl<P, N> SessionController<P, N>
where
    P: ProtocolEngine + 'static,
    N: NavigationContext + 'static,
{
    /// Construct the controller and start initialization.
    ///
    /// Validates the configuration synchronously, builds the protocol
    /// engine from the derived [`EngineConfig`], registers the event
    /// bridge before any asynchronous step, then spawns
    /// initialization. Initialization failures never surface here, since
    /// no caller is awaiting them; they appear as the `Errored` state and
    /// through the configured error callback.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if a required field is
    /// missing or malformed, or if the engine cannot be built. Nothing
    /// network-capable is constructed in that case.
    pub fn start<F>(config: SessionConfig, navigation: N, build_engine: F) -> Result<Arc<Self>>
    where
        F: FnOnce(EngineConfig) -> std::result::Result<P, EngineError>,
    {
        let engine_config = config.engine_config()?;
        let engine = Arc::new(build_engine(engine_config).map_err(|cause| {
            SessionError::configuration(format!("cannot build protocol engine: {cause}"))
        })?);

        let store = Arc::new(AuthStateStore::new());
        let navigation = Arc::new(navigation);
        let bridge = spawn_event_bridge(
            engine.subscribe(),
            Arc::clone(&store),
            config.on_error.clone(),
        );

        let controller = Arc::new(Self {
            callback: CallbackProcessor::new(Arc::clone(&navigation)),
            config,
            engine,
            navigation,
            store,
            initialized: AtomicBool::new(false),
            refresh_gate: Mutex::new(()),
            bridge,
        });

        let init = Arc::clone(&controller);
        tokio::spawn(async move { init.initialize().await });

        Ok(controller)
    }

    /// The current session state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.store.current()
    }

    /// Subscribe to session state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.store.subscribe()
    }

    /// Await the next state that is not `Initializing`.
    pub async fn settled(&self) -> AuthState {
        self.store.settled().await
    }

    /// The state store, as a read-only projection.
    #[must_use]
    pub fn store(&self) -> Arc<AuthStateStore> {
        Arc::clone(&self.store)
    }

    /// Start an interactive login via a full-page redirect.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotInitialized`] before initialization
    /// completes, or [`SessionError::Login`] if the engine cannot
    /// initiate the redirect; login failures also move the state to
    /// `Errored` and are never silently swallowed.
    #[tracing::instrument(skip(self, options))]
    pub async fn login_with_redirect(&self, options: LoginOptions) -> Result<()> {
        self.ensure_initialized()?;
        self.store.dispatch(AuthAction::LoginStarted);
        match self.engine.authorize_redirect(options.into_params()).await {
            Ok(()) => Ok(()),
            Err(cause) => self.fail(SessionError::login("cannot initiate redirect login", cause)),
        }
    }

    /// Run an interactive login in a popup surface.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotInitialized`] before initialization
    /// completes, or [`SessionError::Login`] if the popup flow fails.
    #[tracing::instrument(skip(self, options, popup))]
    pub async fn login_with_popup(
        &self,
        options: LoginOptions,
        popup: PopupOptions,
    ) -> Result<SessionUser> {
        self.ensure_initialized()?;
        self.store.dispatch(AuthAction::LoginStarted);
        match self.engine.authorize_popup(options.into_params(), popup).await {
            Ok(session) => {
                let user = SessionUser::from_session(session);
                tracing::info!(subject = %user.profile.subject, "popup login completed");
                self.store.dispatch(AuthAction::LoginCompleted { user: user.clone() });
                Ok(user)
            },
            Err(cause) => self.fail(SessionError::login("popup login failed", cause)),
        }
    }

    /// End the session and navigate to the post-logout destination.
    ///
    /// Does not itself transition the state: the actual logout is a
    /// page navigation this process does not observe, so
    /// `LogoutCompleted` is driven exclusively by the engine's
    /// user-unloaded notification.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotInitialized`] before initialization
    /// completes, or [`SessionError::Logout`] if termination cannot be
    /// initiated.
    #[tracing::instrument(skip(self, options))]
    pub async fn logout(&self, options: LogoutOptions) -> Result<()> {
        self.ensure_initialized()?;
        let request = EndSessionRequest {
            federated: options.federated,
            return_to: options.return_to,
        };
        match self.engine.end_session(request).await {
            Ok(()) => Ok(()),
            Err(cause) => self.fail(SessionError::logout("cannot end session", cause)),
        }
    }

    /// Get an access token for API calls.
    ///
    /// Returns the persisted token without any network call when it is
    /// unexpired and `force_refresh` was not requested; otherwise
    /// performs a silent renewal. Concurrent callers racing past the
    /// expiry check coalesce behind one in-flight renewal.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotInitialized`] before initialization completes.
    /// - [`SessionError::NotAuthenticated`] when no session exists;
    ///   terminal, never rewrapped.
    /// - [`SessionError::TokenRefresh`] when renewal fails or yields no
    ///   session; also moves the state to `Errored`.
    #[tracing::instrument(skip(self, options))]
    pub async fn get_access_token(&self, options: GetTokenOptions) -> Result<String> {
        self.ensure_initialized()?;

        let session = match self.engine.stored_session().await {
            Ok(session) => session,
            Err(cause) => {
                return self.fail(SessionError::token_refresh_caused(
                    "cannot read persisted session",
                    cause,
                ))
            },
        };
        let Some(session) = session else {
            return Err(SessionError::NotAuthenticated);
        };
        if !options.force_refresh && !session.is_expired_at(Utc::now()) {
            return Ok(session.access_token);
        }

        let _gate = self.refresh_gate.lock().await;

        // A coalesced caller may find the session already renewed.
        if !options.force_refresh {
            if let Ok(Some(session)) = self.engine.stored_session().await {
                if !session.is_expired_at(Utc::now()) {
                    return Ok(session.access_token);
                }
            }
        }

        match self.engine.silent_renew().await {
            Ok(Some(renewed)) => {
                let access_token = renewed.access_token.clone();
                self.store.dispatch(AuthAction::TokenRefreshed {
                    user: SessionUser::from_session(renewed),
                });
                Ok(access_token)
            },
            Ok(None) => self.fail(SessionError::token_refresh(
                "silent renewal produced no session",
            )),
            Err(cause) => {
                self.fail(SessionError::token_refresh_caused("silent renewal failed", cause))
            },
        }
    }

    /// Proactively renew the session, best effort.
    ///
    /// Resolves to `None` (not an error) when called before
    /// initialization completes or when the engine cannot renew without
    /// interaction.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TokenRefresh`] if the renewal request
    /// fails; also moves the state to `Errored`.
    #[tracing::instrument(skip(self))]
    pub async fn refresh_token(&self) -> Result<Option<SessionUser>> {
        if !self.initialized.load(Ordering::Acquire) {
            return Ok(None);
        }

        let _gate = self.refresh_gate.lock().await;
        match self.engine.silent_renew().await {
            Ok(Some(renewed)) => {
                let user = SessionUser::from_session(renewed);
                self.store.dispatch(AuthAction::TokenRefreshed { user: user.clone() });
                Ok(Some(user))
            },
            Ok(None) => Ok(None),
            Err(cause) => {
                self.fail(SessionError::token_refresh_caused("silent renewal failed", cause))
            },
        }
    }

    /// Consume the pending authorization response exactly once.
    ///
    /// Exchanges the callback parameters for tokens, publishes the
    /// resulting user, and strips the one-time parameters from the
    /// address. A second call finds nothing to strip and fails the
    /// exchange: a redirect response cannot be replayed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotInitialized`] before initialization
    /// completes, or [`SessionError::Callback`] if the exchange fails;
    /// callback failures are terminal for that redirect.
    #[tracing::instrument(skip(self))]
    pub async fn handle_redirect_callback(&self) -> Result<SessionUser> {
        self.ensure_initialized()?;
        match self.exchange_redirect_callback().await {
            Ok((user, _)) => {
                self.store.dispatch(AuthAction::LoginCompleted { user: user.clone() });
                Ok(user)
            },
            Err(error) => self.fail(error),
        }
    }

    /// Initialization: rehydrate-or-callback. Runs once, spawned from
    /// [`Self::start`].
    async fn initialize(&self) {
        if let Err(error) = self.run_initialization().await {
            self.initialized.store(true, Ordering::Release);
            tracing::error!(code = error.code(), %error, "initialization failed");
            self.store.dispatch(AuthAction::Errored {
                error: error.clone(),
            });
            self.emit_error(&error);
        }
    }

    async fn run_initialization(&self) -> Result<()> {
        if self.config.auto_handle_callback && self.callback.detect() {
            if let Some(response) = self.callback.read_error() {
                tracing::warn!(error = %response.error, "provider returned an error response");
                self.callback.consume();
                return Err(SessionError::callback(response.message()));
            }

            let (user, return_to) = self.exchange_redirect_callback().await?;
            self.initialized.store(true, Ordering::Release);
            self.store.dispatch(AuthAction::LoginCompleted { user: user.clone() });
            if let Some(callback) = &self.config.on_redirect_callback {
                callback(&user, return_to.as_deref());
            }
            return Ok(());
        }

        let session = self.engine.stored_session().await.map_err(|cause| {
            SessionError::token_refresh_caused("cannot read persisted session", cause)
        })?;
        let user = session
            .filter(|session| !session.is_expired_at(Utc::now()))
            .map(SessionUser::from_session);

        tracing::debug!(rehydrated = user.is_some(), "initialization complete");
        self.initialized.store(true, Ordering::Release);
        self.store.dispatch(AuthAction::Initialized { user });
        Ok(())
    }

    /// Exchange the authorization response in the current address and
    /// strip the one-time parameters. Does not dispatch.
    async fn exchange_redirect_callback(&self) -> Result<(SessionUser, Option<String>)> {
        let url = self.navigation.current_url();
        let exchange = self.engine.exchange_callback(&url).await.map_err(|cause| {
            SessionError::callback_caused("cannot exchange authorization response", cause)
        })?;
        let user = SessionUser::from_session(exchange.session);
        self.callback.consume();
        Ok((user, exchange.return_to))
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(SessionError::NotInitialized)
        }
    }

    /// Move the state to `Errored` and rethrow.
    fn fail<T>(&self, error: SessionError) -> Result<T> {
        tracing::warn!(code = error.code(), %error, "session operation failed");
        self.store.dispatch(AuthAction::Errored {
            error: error.clone(),
        });
        Err(error)
    }

    fn emit_error(&self, error: &SessionError) {
        if let Some(callback) = &self.config.on_error {
            callback(error);
        }
    }
}

impl<P, N> Drop for SessionController<P, N> {
    fn drop(&mut self) {
        self.bridge.abort();
    }
}

impl<P, N> std::fmt::Debug for SessionController<P, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("config", &self.config)
            .field("initialized", &self.initialized.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}
