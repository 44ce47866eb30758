//! Mock protocol engine.

use crate::error::EngineError;
use crate::providers::engine::EngineResult;
use crate::providers::{
    AuthorizeParams, CallbackExchange, EndSessionRequest, EngineEvent, EngineSession,
    PopupOptions, ProtocolEngine,
};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use url::Url;

/// Scripted outcome for a mock engine call.
#[derive(Debug, Clone)]
enum Scripted<T> {
    Ok(T),
    Fail(String),
}

impl<T: Clone> Scripted<T> {
    fn resolve(&self) -> EngineResult<T> {
        match self {
            Self::Ok(value) => Ok(value.clone()),
            Self::Fail(message) => Err(EngineError::new(message)),
        }
    }
}

#[derive(Debug)]
struct Inner {
    stored: Option<EngineSession>,
    renew: Scripted<Option<EngineSession>>,
    popup: Scripted<EngineSession>,
    exchange: Scripted<CallbackExchange>,
    redirect: Scripted<()>,
    end_session: Scripted<()>,
    last_authorize_params: Option<AuthorizeParams>,
    last_end_session: Option<EndSessionRequest>,
    renew_calls: usize,
    redirect_calls: usize,
    popup_calls: usize,
    exchange_calls: usize,
    end_session_calls: usize,
}

/// Mock protocol engine with scriptable responses.
///
/// Successful logins, exchanges and renewals also update the mock's
/// persisted session, mirroring how a real engine writes through to its
/// storage adapter.
#[derive(Debug, Clone)]
pub struct MockProtocolEngine {
    inner: Arc<Mutex<Inner>>,
    events: broadcast::Sender<EngineEvent>,
}

impl MockProtocolEngine {
    /// Create an engine with no persisted session and nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                stored: None,
                renew: Scripted::Ok(None),
                popup: Scripted::Fail("no popup flow scripted".to_owned()),
                exchange: Scripted::Fail("no callback exchange scripted".to_owned()),
                redirect: Scripted::Ok(()),
                end_session: Scripted::Ok(()),
                last_authorize_params: None,
                last_end_session: None,
                renew_calls: 0,
                redirect_calls: 0,
                popup_calls: 0,
                exchange_calls: 0,
                end_session_calls: 0,
            })),
            events,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script a persisted session.
    #[must_use]
    pub fn with_stored_session(self, session: EngineSession) -> Self {
        self.lock().stored = Some(session);
        self
    }

    /// Script a successful silent renewal.
    #[must_use]
    pub fn with_renewed_session(self, session: EngineSession) -> Self {
        self.lock().renew = Scripted::Ok(Some(session));
        self
    }

    /// Script a silent renewal that yields no session.
    #[must_use]
    pub fn with_empty_renewal(self) -> Self {
        self.lock().renew = Scripted::Ok(None);
        self
    }

    /// Script a failing silent renewal.
    #[must_use]
    pub fn failing_renew(self, message: impl Into<String>) -> Self {
        self.lock().renew = Scripted::Fail(message.into());
        self
    }

    /// Script a successful popup login.
    #[must_use]
    pub fn with_popup_session(self, session: EngineSession) -> Self {
        self.lock().popup = Scripted::Ok(session);
        self
    }

    /// Script a failing popup login.
    #[must_use]
    pub fn failing_popup(self, message: impl Into<String>) -> Self {
        self.lock().popup = Scripted::Fail(message.into());
        self
    }

    /// Script a successful callback exchange.
    #[must_use]
    pub fn with_exchange(self, exchange: CallbackExchange) -> Self {
        self.lock().exchange = Scripted::Ok(exchange);
        self
    }

    /// Script a successful callback exchange with no `return_to`.
    #[must_use]
    pub fn with_exchange_session(self, session: EngineSession) -> Self {
        self.with_exchange(CallbackExchange {
            session,
            return_to: None,
        })
    }

    /// Script a failing callback exchange.
    #[must_use]
    pub fn failing_exchange(self, message: impl Into<String>) -> Self {
        self.lock().exchange = Scripted::Fail(message.into());
        self
    }

    /// Script a failing redirect login.
    #[must_use]
    pub fn failing_redirect(self, message: impl Into<String>) -> Self {
        self.lock().redirect = Scripted::Fail(message.into());
        self
    }

    /// Script a failing session termination.
    #[must_use]
    pub fn failing_end_session(self, message: impl Into<String>) -> Self {
        self.lock().end_session = Scripted::Fail(message.into());
        self
    }

    /// Emit a lifecycle event to subscribers.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    /// Number of silent renewals performed.
    #[must_use]
    pub fn renew_calls(&self) -> usize {
        self.lock().renew_calls
    }

    /// Number of redirect logins initiated.
    #[must_use]
    pub fn redirect_calls(&self) -> usize {
        self.lock().redirect_calls
    }

    /// Number of popup logins performed.
    #[must_use]
    pub fn popup_calls(&self) -> usize {
        self.lock().popup_calls
    }

    /// Number of callback exchanges performed.
    #[must_use]
    pub fn exchange_calls(&self) -> usize {
        self.lock().exchange_calls
    }

    /// Number of session terminations initiated.
    #[must_use]
    pub fn end_session_calls(&self) -> usize {
        self.lock().end_session_calls
    }

    /// The parameters of the last authorization request, if any.
    #[must_use]
    pub fn last_authorize_params(&self) -> Option<AuthorizeParams> {
        self.lock().last_authorize_params.clone()
    }

    /// The last end-session request, if any.
    #[must_use]
    pub fn last_end_session(&self) -> Option<EndSessionRequest> {
        self.lock().last_end_session.clone()
    }
}

impl Default for MockProtocolEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolEngine for MockProtocolEngine {
    fn authorize_redirect(
        &self,
        params: AuthorizeParams,
    ) -> impl Future<Output = EngineResult<()>> + Send {
        let this = self.clone();
        async move {
            let mut inner = this.lock();
            inner.redirect_calls += 1;
            inner.last_authorize_params = Some(params);
            inner.redirect.resolve()
        }
    }

    fn authorize_popup(
        &self,
        params: AuthorizeParams,
        _popup: PopupOptions,
    ) -> impl Future<Output = EngineResult<EngineSession>> + Send {
        let this = self.clone();
        async move {
            let mut inner = this.lock();
            inner.popup_calls += 1;
            inner.last_authorize_params = Some(params);
            let session = inner.popup.resolve()?;
            inner.stored = Some(session.clone());
            Ok(session)
        }
    }

    fn stored_session(&self) -> impl Future<Output = EngineResult<Option<EngineSession>>> + Send {
        let this = self.clone();
        async move { Ok(this.lock().stored.clone()) }
    }

    fn silent_renew(&self) -> impl Future<Output = EngineResult<Option<EngineSession>>> + Send {
        let this = self.clone();
        async move {
            let mut inner = this.lock();
            inner.renew_calls += 1;
            let renewed = inner.renew.resolve()?;
            if let Some(session) = &renewed {
                inner.stored = Some(session.clone());
            }
            Ok(renewed)
        }
    }

    fn exchange_callback(
        &self,
        _callback_url: &Url,
    ) -> impl Future<Output = EngineResult<CallbackExchange>> + Send {
        let this = self.clone();
        async move {
            let mut inner = this.lock();
            inner.exchange_calls += 1;
            let exchange = inner.exchange.resolve()?;
            inner.stored = Some(exchange.session.clone());
            Ok(exchange)
        }
    }

    fn end_session(
        &self,
        request: EndSessionRequest,
    ) -> impl Future<Output = EngineResult<()>> + Send {
        let this = self.clone();
        async move {
            let mut inner = this.lock();
            inner.end_session_calls += 1;
            inner.last_end_session = Some(request);
            inner.end_session.resolve()
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }
}
