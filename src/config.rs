//! Session configuration.
//!
//! [`SessionConfig`] is the immutable input captured at controller
//! construction. It is validated once, synchronously, before any
//! network-capable object is built; [`SessionConfig::engine_config`]
//! derives the protocol-engine configuration (endpoint URLs, storage
//! namespace) from it.

use crate::error::{Result, SessionError};
use crate::state::SessionUser;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: [&str; 4] = ["openid", "profile", "email", "offline_access"];

/// Namespace prefix for all persisted session records.
///
/// Keys are `{prefix}.{client_id}.*`, so applications or environments
/// sharing a storage backend do not collide.
pub const STORAGE_KEY_PREFIX: &str = "oidc.session";

/// Invoked with the resulting user (and recovered `return_to`, if any)
/// after an auto-handled redirect callback completes.
pub type RedirectCallback = Arc<dyn Fn(&SessionUser, Option<&str>) + Send + Sync>;

/// Invoked for failures no caller is awaiting (initialization errors,
/// background silent-renew failures).
pub type ErrorCallback = Arc<dyn Fn(&SessionError) + Send + Sync>;

/// Where the protocol engine persists session records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageKind {
    /// Persistent across browser restarts.
    Local,

    /// Scoped to the browsing session (default).
    #[default]
    Session,

    /// Process memory only; lost on reload.
    Memory,
}

/// Immutable controller configuration.
#[derive(Clone)]
pub struct SessionConfig {
    /// Issuer base URL; all provider endpoints are derived from it.
    pub environment_url: String,

    /// OAuth client identifier.
    pub client_id: String,

    /// Absolute URL the provider redirects back to after login.
    pub redirect_uri: String,

    /// Scopes to request. Defaults to [`DEFAULT_SCOPES`].
    pub scopes: Vec<String>,

    /// Absolute URL to land on after logout, if any.
    pub post_logout_redirect_uri: Option<String>,

    /// Storage backing for persisted session records.
    pub storage: StorageKind,

    /// Consume redirect-callback parameters automatically during
    /// initialization (default `true`).
    pub auto_handle_callback: bool,

    /// Let the engine renew tokens on its own timer (default `true`).
    pub automatic_silent_renew: bool,

    /// Invoked after an auto-handled redirect callback completes.
    pub on_redirect_callback: Option<RedirectCallback>,

    /// Invoked for failures no caller is awaiting.
    pub on_error: Option<ErrorCallback>,
}

impl SessionConfig {
    /// Create a configuration with the required fields and defaults for
    /// everything else.
    pub fn new(
        environment_url: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            environment_url: environment_url.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
            post_logout_redirect_uri: None,
            storage: StorageKind::default(),
            auto_handle_callback: true,
            automatic_silent_renew: true,
            on_redirect_callback: None,
            on_error: None,
        }
    }

    /// Set the requested scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the post-logout redirect URI.
    #[must_use]
    pub fn with_post_logout_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.post_logout_redirect_uri = Some(uri.into());
        self
    }

    /// Set the storage kind.
    #[must_use]
    pub const fn with_storage(mut self, storage: StorageKind) -> Self {
        self.storage = storage;
        self
    }

    /// Enable or disable automatic redirect-callback handling.
    #[must_use]
    pub const fn with_auto_handle_callback(mut self, enabled: bool) -> Self {
        self.auto_handle_callback = enabled;
        self
    }

    /// Enable or disable engine-driven silent renewal.
    #[must_use]
    pub const fn with_automatic_silent_renew(mut self, enabled: bool) -> Self {
        self.automatic_silent_renew = enabled;
        self
    }

    /// Set the redirect-completion callback.
    #[must_use]
    pub fn with_on_redirect_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&SessionUser, Option<&str>) + Send + Sync + 'static,
    {
        self.on_redirect_callback = Some(Arc::new(callback));
        self
    }

    /// Set the error callback.
    #[must_use]
    pub fn with_on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&SessionError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] naming the first field
    /// that is missing or does not parse as an absolute URL.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(SessionError::configuration("client_id is required"));
        }
        parse_absolute("environment_url", &self.environment_url)?;
        parse_absolute("redirect_uri", &self.redirect_uri)?;
        if let Some(uri) = &self.post_logout_redirect_uri {
            parse_absolute("post_logout_redirect_uri", uri)?;
        }
        Ok(())
    }

    /// Derive the protocol-engine configuration.
    ///
    /// Endpoint URLs are fixed path suffixes under `environment_url`;
    /// persisted records are namespaced under
    /// `{STORAGE_KEY_PREFIX}.{client_id}`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if validation fails.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        self.validate()?;

        let base = parse_absolute("environment_url", &self.environment_url)?;
        let redirect_uri = parse_absolute("redirect_uri", &self.redirect_uri)?;
        let post_logout_redirect_uri = self
            .post_logout_redirect_uri
            .as_deref()
            .map(|uri| parse_absolute("post_logout_redirect_uri", uri))
            .transpose()?;

        Ok(EngineConfig {
            endpoints: EngineEndpoints::under(&base)?,
            client_id: self.client_id.clone(),
            redirect_uri,
            post_logout_redirect_uri,
            scopes: self.scopes.clone(),
            storage: self.storage,
            storage_key_prefix: format!("{STORAGE_KEY_PREFIX}.{}", self.client_id),
            automatic_silent_renew: self.automatic_silent_renew,
        })
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("environment_url", &self.environment_url)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("post_logout_redirect_uri", &self.post_logout_redirect_uri)
            .field("storage", &self.storage)
            .field("auto_handle_callback", &self.auto_handle_callback)
            .field("automatic_silent_renew", &self.automatic_silent_renew)
            .field("on_redirect_callback", &self.on_redirect_callback.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Provider endpoints derived from the environment base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEndpoints {
    /// Authorization endpoint.
    pub authorization: Url,
    /// Token endpoint.
    pub token: Url,
    /// Userinfo endpoint.
    pub userinfo: Url,
    /// End-session endpoint.
    pub end_session: Url,
    /// JWKS endpoint.
    pub jwks: Url,
    /// Token revocation endpoint.
    pub revocation: Url,
    /// Token introspection endpoint.
    pub introspection: Url,
}

impl EngineEndpoints {
    fn under(base: &Url) -> Result<Self> {
        Ok(Self {
            authorization: join(base, "oauth2/authorize")?,
            token: join(base, "oauth2/token")?,
            userinfo: join(base, "oauth2/userinfo")?,
            end_session: join(base, "oauth2/logout")?,
            jwks: join(base, "oauth2/jwks")?,
            revocation: join(base, "oauth2/revoke")?,
            introspection: join(base, "oauth2/introspect")?,
        })
    }
}

/// Configuration handed to the protocol-engine factory.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Derived provider endpoints.
    pub endpoints: EngineEndpoints,
    /// OAuth client identifier.
    pub client_id: String,
    /// Redirect URI, parsed.
    pub redirect_uri: Url,
    /// Post-logout redirect URI, parsed.
    pub post_logout_redirect_uri: Option<Url>,
    /// Scopes to request.
    pub scopes: Vec<String>,
    /// Storage backing.
    pub storage: StorageKind,
    /// Key prefix for persisted session records.
    pub storage_key_prefix: String,
    /// Whether the engine should renew tokens on its own timer.
    pub automatic_silent_renew: bool,
}

fn parse_absolute(field: &str, value: &str) -> Result<Url> {
    if value.trim().is_empty() {
        return Err(SessionError::configuration(format!("{field} is required")));
    }
    Url::parse(value).map_err(|err| {
        SessionError::configuration(format!("{field} is not an absolute URL: {err}"))
    })
}

/// Join a fixed suffix under the base URL, preserving any path prefix
/// the environment URL carries.
fn join(base: &Url, suffix: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(suffix).map_err(|err| {
        SessionError::configuration(format!("cannot derive {suffix} endpoint: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig::new(
            "https://auth.example.com",
            "client_123",
            "https://app.example.com/callback",
        )
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(
            config.scopes,
            vec!["openid", "profile", "email", "offline_access"]
        );
        assert_eq!(config.storage, StorageKind::Session);
        assert!(config.auto_handle_callback);
        assert!(config.automatic_silent_renew);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_client_id_fails_validation() {
        let config = SessionConfig::new(
            "https://auth.example.com",
            "",
            "https://app.example.com/callback",
        );
        let err = config.validate();
        assert_eq!(
            err.as_ref().err().map(SessionError::code),
            Some("configuration_error")
        );
    }

    #[test]
    fn test_relative_urls_fail_validation() {
        let config = SessionConfig::new(
            "auth.example.com",
            "client_123",
            "https://app.example.com/callback",
        );
        assert!(config.validate().is_err());

        let config = SessionConfig::new(
            "https://auth.example.com",
            "client_123",
            "/callback",
        );
        assert!(config.validate().is_err());

        let config = config_with_post_logout("not a url");
        assert!(config.validate().is_err());
    }

    fn config_with_post_logout(uri: &str) -> SessionConfig {
        config().with_post_logout_redirect_uri(uri)
    }

    #[test]
    fn test_endpoint_derivation() {
        let engine = config().engine_config().map_err(|e| e.to_string());
        let engine = match engine {
            Ok(engine) => engine,
            Err(message) => return assert_eq!(message, ""),
        };

        assert_eq!(
            engine.endpoints.authorization.as_str(),
            "https://auth.example.com/oauth2/authorize"
        );
        assert_eq!(
            engine.endpoints.token.as_str(),
            "https://auth.example.com/oauth2/token"
        );
        assert_eq!(
            engine.endpoints.end_session.as_str(),
            "https://auth.example.com/oauth2/logout"
        );
        assert_eq!(engine.storage_key_prefix, "oidc.session.client_123");
    }

    #[test]
    fn test_endpoint_derivation_preserves_path_prefix() {
        let config = SessionConfig::new(
            "https://auth.example.com/tenants/acme",
            "client_123",
            "https://app.example.com/callback",
        );

        let authorization = config
            .engine_config()
            .map(|engine| engine.endpoints.authorization.to_string())
            .unwrap_or_default();
        assert_eq!(
            authorization,
            "https://auth.example.com/tenants/acme/oauth2/authorize"
        );
    }

    #[test]
    fn test_builder_overrides() {
        let config = config()
            .with_scopes(["openid", "profile"])
            .with_storage(StorageKind::Memory)
            .with_auto_handle_callback(false)
            .with_automatic_silent_renew(false);

        assert_eq!(config.scopes, vec!["openid", "profile"]);
        assert_eq!(config.storage, StorageKind::Memory);
        assert!(!config.auto_handle_callback);
        assert!(!config.automatic_silent_renew);
    }
}
