//! Error types for session lifecycle operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Opaque failure reported by the protocol engine.
///
/// The engine is an external collaborator; its failures cross the trait
/// boundary as a plain message and are attached to [`SessionError`] as the
/// causal error.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    /// Create an engine error from any displayable cause.
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

/// Error taxonomy for the session state machine.
///
/// One kind per failure category, each with a stable machine-readable
/// code (see [`SessionError::code`]) and, where a protocol-engine call
/// was involved, the causal [`EngineError`].
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionError {
    /// Configuration is missing or malformed. Fatal: raised synchronously
    /// at construction, before any network-capable object exists.
    #[error("invalid configuration: {message}")]
    Configuration {
        /// What was missing or malformed.
        message: String,
    },

    /// Interactive login (redirect or popup) failed.
    #[error("login failed: {message}")]
    Login {
        /// Human-readable failure description.
        message: String,
        /// Underlying engine failure, if any.
        #[source]
        cause: Option<EngineError>,
    },

    /// Silent renewal failed or yielded no session.
    #[error("token refresh failed: {message}")]
    TokenRefresh {
        /// Human-readable failure description.
        message: String,
        /// Underlying engine failure, if any.
        #[source]
        cause: Option<EngineError>,
    },

    /// The engine could not initiate session termination.
    #[error("logout failed: {message}")]
    Logout {
        /// Human-readable failure description.
        message: String,
        /// Underlying engine failure, if any.
        #[source]
        cause: Option<EngineError>,
    },

    /// The redirect callback could not be exchanged for tokens, or the
    /// identity provider returned an error response.
    #[error("redirect callback failed: {message}")]
    Callback {
        /// Human-readable failure description. For provider error
        /// responses this is the `error_description` when present.
        message: String,
        /// Underlying engine failure, if any.
        #[source]
        cause: Option<EngineError>,
    },

    /// A public operation was invoked before initialization completed.
    #[error("session controller is not initialized")]
    NotInitialized,

    /// A token was requested with no active session. Terminal: never
    /// rewrapped by subsequent handling.
    #[error("no authenticated session")]
    NotAuthenticated,
}

impl SessionError {
    /// Stable machine-readable code for this error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Login { .. } => "login_error",
            Self::TokenRefresh { .. } => "token_refresh_error",
            Self::Logout { .. } => "logout_error",
            Self::Callback { .. } => "callback_error",
            Self::NotInitialized => "not_initialized",
            Self::NotAuthenticated => "not_authenticated",
        }
    }

    /// Returns `true` if this error can only be resolved by a fresh
    /// interactive login.
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::TokenRefresh { .. })
    }

    /// Configuration error with the given message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Login error wrapping an engine failure.
    pub fn login(message: impl Into<String>, cause: EngineError) -> Self {
        Self::Login {
            message: message.into(),
            cause: Some(cause),
        }
    }

    /// Token refresh error with no engine cause.
    pub fn token_refresh(message: impl Into<String>) -> Self {
        Self::TokenRefresh {
            message: message.into(),
            cause: None,
        }
    }

    /// Token refresh error wrapping an engine failure.
    pub fn token_refresh_caused(message: impl Into<String>, cause: EngineError) -> Self {
        Self::TokenRefresh {
            message: message.into(),
            cause: Some(cause),
        }
    }

    /// Logout error wrapping an engine failure.
    pub fn logout(message: impl Into<String>, cause: EngineError) -> Self {
        Self::Logout {
            message: message.into(),
            cause: Some(cause),
        }
    }

    /// Callback error with no engine cause.
    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback {
            message: message.into(),
            cause: None,
        }
    }

    /// Callback error wrapping an engine failure.
    pub fn callback_caused(message: impl Into<String>, cause: EngineError) -> Self {
        Self::Callback {
            message: message.into(),
            cause: Some(cause),
        }
    }
}
