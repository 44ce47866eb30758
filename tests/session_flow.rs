//! Integration tests for the full session lifecycle.

use chrono::{Duration, Utc};
use oidc_session::{
    mocks::{MockNavigation, MockProtocolEngine},
    AuthState, CallbackExchange, EngineEvent, EngineSession, GetTokenOptions, LoginOptions,
    NavigationContext, PopupOptions, SessionConfig, SessionController, SessionError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Create a test configuration with the required fields.
fn test_config() -> SessionConfig {
    SessionConfig::new(
        "https://auth.example.com",
        "client_123",
        "https://app.example.com/callback",
    )
}

/// Create an engine session carrying the standard test claims.
fn test_session(access_token: &str) -> EngineSession {
    let claims = serde_json::json!({
        "sub": "user_123",
        "email": "ada@example.com",
        "name": "Ada Lovelace",
        "org_id": "org_456",
        "roles": ["admin", "editor"],
    });
    let claims = match claims {
        serde_json::Value::Object(map) => map,
        _ => unreachable!("claims literal is an object"),
    };
    EngineSession {
        claims,
        id_token: "id.token".to_owned(),
        access_token: access_token.to_owned(),
        refresh_token: Some("refresh.token".to_owned()),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        scope: Some("openid profile email".to_owned()),
    }
}

fn expired_test_session(access_token: &str) -> EngineSession {
    EngineSession {
        expires_at: Some(Utc::now() - Duration::minutes(5)),
        ..test_session(access_token)
    }
}

fn start(
    config: SessionConfig,
    engine: MockProtocolEngine,
    url: &str,
) -> Arc<SessionController<MockProtocolEngine, MockNavigation>> {
    SessionController::start(config, MockNavigation::new(url), |_| Ok(engine))
        .unwrap_or_else(|error| panic!("controller must start: {error}"))
}

#[tokio::test]
async fn test_invalid_configuration_fails_before_building_engine() {
    let config = SessionConfig::new("https://auth.example.com", "", "https://app.example.com/cb");
    let factory_calls = Arc::new(AtomicUsize::new(0));

    let result = {
        let factory_calls = Arc::clone(&factory_calls);
        SessionController::start(config, MockNavigation::new("https://app.example.com/"), |_| {
            factory_calls.fetch_add(1, Ordering::SeqCst);
            Ok(MockProtocolEngine::new())
        })
    };

    assert_eq!(
        result.err().map(|e| e.code()),
        Some("configuration_error"),
        "missing client_id must fail synchronously"
    );
    assert_eq!(
        factory_calls.load(Ordering::SeqCst),
        0,
        "nothing network-capable is built on invalid configuration"
    );
}

#[tokio::test]
async fn test_redirect_callback_is_auto_handled_and_consumed() {
    let engine = MockProtocolEngine::new().with_exchange(CallbackExchange {
        session: test_session("tok"),
        return_to: Some("/dashboard".to_owned()),
    });

    let observed = Arc::new(Mutex::new(None::<(String, Option<String>)>));
    let config = {
        let observed = Arc::clone(&observed);
        test_config().with_on_redirect_callback(move |user, return_to| {
            let mut slot = observed.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *slot = Some((
                user.profile.subject.clone(),
                return_to.map(ToOwned::to_owned),
            ));
        })
    };

    let controller = start(
        config,
        engine.clone(),
        "https://app.example.com/callback?code=abc123&state=xyz&session_state=s1",
    );

    let state = controller.settled().await;
    assert!(state.is_authenticated());
    assert_eq!(
        state.user().map(|u| u.profile.email.as_deref()),
        Some(Some("ada@example.com"))
    );
    assert_eq!(engine.exchange_calls(), 1);

    // The redirect-completion callback saw the user and the recovered
    // application address.
    let observed = observed
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone();
    assert_eq!(
        observed,
        Some(("user_123".to_owned(), Some("/dashboard".to_owned())))
    );
}

#[tokio::test]
async fn test_redirect_parameters_are_stripped_exactly_once() {
    let engine = MockProtocolEngine::new().with_exchange_session(test_session("tok"));
    let navigation = Arc::new(MockNavigation::new(
        "https://app.example.com/callback?code=abc123&state=xyz&tab=settings",
    ));

    let controller = {
        let engine = engine.clone();
        SessionController::start(test_config(), Arc::clone(&navigation), |_| Ok(engine))
            .unwrap_or_else(|error| panic!("controller must start: {error}"))
    };
    controller.settled().await;

    // The one-time parameters are gone; application parameters survive.
    assert_eq!(
        navigation.current_url().as_str(),
        "https://app.example.com/callback?tab=settings"
    );
    assert_eq!(navigation.replacements(), 1);
    assert_eq!(engine.exchange_calls(), 1);
}

#[tokio::test]
async fn test_provider_error_response_surfaces_as_callback_error() {
    let engine = MockProtocolEngine::new();
    let errors = Arc::new(AtomicUsize::new(0));
    let config = {
        let errors = Arc::clone(&errors);
        test_config().with_on_error(move |error| {
            assert_eq!(error.code(), "callback_error");
            errors.fetch_add(1, Ordering::SeqCst);
        })
    };

    let controller = start(
        config,
        engine.clone(),
        "https://app.example.com/callback?error=access_denied&error_description=User+cancelled",
    );

    let state = controller.settled().await;
    assert_eq!(
        state.error().map(SessionError::code),
        Some("callback_error")
    );
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    // The error response was consumed, never exchanged.
    assert_eq!(engine.exchange_calls(), 0);
}

#[tokio::test]
async fn test_valid_token_is_returned_without_renewal() {
    let engine = MockProtocolEngine::new().with_stored_session(test_session("cached"));
    let controller = start(test_config(), engine.clone(), "https://app.example.com/");
    controller.settled().await;

    let token = controller.get_access_token(GetTokenOptions::default()).await;
    assert_eq!(token.ok().as_deref(), Some("cached"));
    assert_eq!(engine.renew_calls(), 0, "unexpired token needs no renewal");
}

#[tokio::test]
async fn test_expired_token_is_renewed_transparently() {
    let engine = MockProtocolEngine::new()
        .with_stored_session(expired_test_session("stale"))
        .with_renewed_session(test_session("fresh"));
    let controller = start(test_config(), engine.clone(), "https://app.example.com/");

    // An expired persisted session rehydrates as unauthenticated.
    assert_eq!(controller.settled().await, AuthState::Unauthenticated);

    let token = controller.get_access_token(GetTokenOptions::default()).await;
    assert_eq!(token.ok().as_deref(), Some("fresh"));
    assert_eq!(engine.renew_calls(), 1);

    // The renewal republished the session.
    assert!(controller.state().is_authenticated());
    assert_eq!(
        controller.state().user().map(|u| u.access_token.clone()),
        Some("fresh".to_owned())
    );
}

#[tokio::test]
async fn test_concurrent_expired_token_fetches_share_one_renewal() {
    let engine = MockProtocolEngine::new()
        .with_stored_session(expired_test_session("stale"))
        .with_renewed_session(test_session("fresh"));
    let controller = start(test_config(), engine.clone(), "https://app.example.com/");
    controller.settled().await;

    let (a, b, c) = tokio::join!(
        controller.get_access_token(GetTokenOptions::default()),
        controller.get_access_token(GetTokenOptions::default()),
        controller.get_access_token(GetTokenOptions::default()),
    );
    assert_eq!(a.ok().as_deref(), Some("fresh"));
    assert_eq!(b.ok().as_deref(), Some("fresh"));
    assert_eq!(c.ok().as_deref(), Some("fresh"));
    assert_eq!(engine.renew_calls(), 1, "racing callers coalesce");
}

#[tokio::test]
async fn test_get_access_token_without_session_is_not_authenticated() {
    let engine = MockProtocolEngine::new();
    let controller = start(test_config(), engine, "https://app.example.com/");
    controller.settled().await;

    let err = controller.get_access_token(GetTokenOptions::default()).await;
    assert_eq!(err.err(), Some(SessionError::NotAuthenticated));
    // Terminal, not an internal failure: the state is untouched.
    assert_eq!(controller.state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn test_popup_login_then_token_from_storage() {
    let engine = MockProtocolEngine::new().with_popup_session(test_session("popup.tok"));
    let controller = start(test_config(), engine.clone(), "https://app.example.com/");
    assert_eq!(controller.settled().await, AuthState::Unauthenticated);

    let user = controller
        .login_with_popup(
            LoginOptions::new().with_login_hint("ada@example.com"),
            PopupOptions::default(),
        )
        .await;
    assert_eq!(
        user.ok().map(|u| u.profile.subject),
        Some("user_123".to_owned())
    );
    assert!(controller.state().is_authenticated());

    // The popup persisted the session; retrieval hits storage only.
    let token = controller.get_access_token(GetTokenOptions::default()).await;
    assert_eq!(token.ok().as_deref(), Some("popup.tok"));
    assert_eq!(engine.popup_calls(), 1);
    assert_eq!(engine.renew_calls(), 0);
}

#[tokio::test]
async fn test_failed_popup_login_errors_state() {
    let engine = MockProtocolEngine::new().failing_popup("popup closed by user");
    let controller = start(test_config(), engine, "https://app.example.com/");
    controller.settled().await;

    let err = controller
        .login_with_popup(LoginOptions::new(), PopupOptions::default())
        .await;
    assert_eq!(err.err().map(|e| e.code()), Some("login_error"));
    assert_eq!(
        controller.state().error().map(SessionError::code),
        Some("login_error")
    );
}

#[tokio::test]
async fn test_failed_logout_surfaces_logout_error() {
    let engine = MockProtocolEngine::new()
        .with_stored_session(test_session("tok"))
        .failing_end_session("end-session endpoint unreachable");
    let controller = start(test_config(), engine.clone(), "https://app.example.com/");
    assert!(controller.settled().await.is_authenticated());

    let err = controller.logout(Default::default()).await;
    assert_eq!(err.err().map(|e| e.code()), Some("logout_error"));
    assert_eq!(
        controller.state().error().map(SessionError::code),
        Some("logout_error")
    );
    assert_eq!(engine.end_session_calls(), 1);
}

#[tokio::test]
async fn test_renewal_engine_failure_carries_the_cause() {
    use std::error::Error as _;

    let engine = MockProtocolEngine::new()
        .with_stored_session(expired_test_session("stale"))
        .failing_renew("token endpoint returned 400");
    let controller = start(test_config(), engine.clone(), "https://app.example.com/");
    controller.settled().await;

    let err = controller.get_access_token(GetTokenOptions::default()).await;
    let err = err.expect_err("renewal failure must reject");
    assert_eq!(err.code(), "token_refresh_error");
    assert_eq!(
        err.source().map(ToString::to_string).as_deref(),
        Some("token endpoint returned 400")
    );
    assert_eq!(
        controller.state().error().map(SessionError::code),
        Some("token_refresh_error")
    );

    // Proactive refresh hits the same engine failure.
    let err = controller.refresh_token().await;
    assert_eq!(err.err().map(|e| e.code()), Some("token_refresh_error"));
    assert_eq!(engine.renew_calls(), 2);
}

#[tokio::test]
async fn test_failed_callback_exchange_is_callback_error() {
    let engine = MockProtocolEngine::new().failing_exchange("authorization code already consumed");
    let controller = start(
        test_config().with_auto_handle_callback(false),
        engine.clone(),
        "https://app.example.com/callback?code=abc123&state=xyz",
    );
    assert_eq!(controller.settled().await, AuthState::Unauthenticated);

    let err = controller.handle_redirect_callback().await;
    assert_eq!(err.err().map(|e| e.code()), Some("callback_error"));
    assert_eq!(
        controller.state().error().map(SessionError::code),
        Some("callback_error")
    );
    assert_eq!(engine.exchange_calls(), 1);
    assert_eq!(engine.redirect_calls(), 0, "no login was ever initiated");
}

#[tokio::test]
async fn test_background_renewal_failure_is_observable() {
    let engine = MockProtocolEngine::new().with_stored_session(test_session("tok"));
    let errors = Arc::new(AtomicUsize::new(0));
    let config = {
        let errors = Arc::clone(&errors);
        test_config().with_on_error(move |error| {
            assert_eq!(error.code(), "token_refresh_error");
            errors.fetch_add(1, Ordering::SeqCst);
        })
    };
    let controller = start(config, engine.clone(), "https://app.example.com/");
    assert!(controller.settled().await.is_authenticated());

    let mut states = controller.subscribe();
    engine.emit(EngineEvent::SilentRenewFailed(
        oidc_session::EngineError::new("renew endpoint unreachable"),
    ));

    let errored = tokio::time::timeout(
        std::time::Duration::from_secs(1),
        states.wait_for(|state| state.error().is_some()),
    )
    .await;
    let errored = errored
        .ok()
        .and_then(std::result::Result::ok)
        .map(|state| state.clone());
    assert_eq!(
        errored.as_ref().and_then(AuthState::error).map(SessionError::code),
        Some("token_refresh_error")
    );
    assert_eq!(errors.load(Ordering::SeqCst), 1);

    // A later successful renewal recovers the session.
    engine.emit(EngineEvent::UserLoaded(test_session("tok2")));
    let recovered = tokio::time::timeout(
        std::time::Duration::from_secs(1),
        states.wait_for(AuthState::is_authenticated),
    )
    .await;
    assert!(matches!(recovered, Ok(Ok(_))));
}

#[tokio::test]
async fn test_logout_completes_via_engine_notification() {
    let engine = MockProtocolEngine::new().with_stored_session(test_session("tok"));
    let controller = start(test_config(), engine.clone(), "https://app.example.com/");
    assert!(controller.settled().await.is_authenticated());

    let mut states = controller.subscribe();
    assert!(controller.logout(Default::default()).await.is_ok());
    assert!(controller.state().is_authenticated(), "logout is a navigation");

    // The engine reports the unload once the session storage clears.
    engine.emit(EngineEvent::UserUnloaded);
    let unauthenticated = tokio::time::timeout(
        std::time::Duration::from_secs(1),
        states.wait_for(|state| *state == AuthState::Unauthenticated),
    )
    .await;
    assert!(matches!(unauthenticated, Ok(Ok(_))));
}

#[tokio::test]
async fn test_claims_are_lifted_into_profile_and_metadata() {
    let engine = MockProtocolEngine::new().with_stored_session(test_session("tok"));
    let controller = start(test_config(), engine, "https://app.example.com/");

    let state = controller.settled().await;
    let Some(user) = state.user() else {
        panic!("expected an authenticated user");
    };

    assert_eq!(user.profile.subject, "user_123");
    assert_eq!(user.profile.name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(user.metadata.organization_id.as_deref(), Some("org_456"));
    assert_eq!(
        user.metadata.roles,
        Some(vec!["admin".to_owned(), "editor".to_owned()])
    );
    assert_eq!(user.scopes, vec!["openid", "profile", "email"]);
}
