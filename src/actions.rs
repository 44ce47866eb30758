//! Session transition requests.
//!
//! [`AuthAction`] is the sole vocabulary for mutating the
//! [`AuthState`](crate::state::AuthState): every lifecycle event the
//! controller or the event bridge observes is expressed as one of these
//! actions and folded into state by the pure [`AuthAction::into_state`]
//! transition.

use crate::error::SessionError;
use crate::state::{AuthState, SessionUser};
use serde::{Deserialize, Serialize};

/// A state transition request.
///
/// Each action maps deterministically to exactly one resulting
/// [`AuthState`]; the transition never branches on the prior state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuthAction {
    /// Initialization has (re)started.
    Initializing,

    /// Initialization finished, with a rehydrated user if one was found.
    Initialized {
        /// The rehydrated session user, if a persisted unexpired
        /// session existed.
        user: Option<SessionUser>,
    },

    /// An interactive login began.
    LoginStarted,

    /// An interactive login completed.
    LoginCompleted {
        /// The freshly authenticated user.
        user: SessionUser,
    },

    /// The session ended (logout, unload or hard expiry).
    LogoutCompleted,

    /// A silent renewal produced a new session.
    TokenRefreshed {
        /// The renewed session user.
        user: SessionUser,
    },

    /// A lifecycle operation failed.
    Errored {
        /// The failure to surface.
        error: SessionError,
    },
}

impl AuthAction {
    /// The pure transition: fold this action into its resulting state.
    #[must_use]
    pub fn into_state(self) -> AuthState {
        match self {
            Self::Initializing | Self::LoginStarted => AuthState::Initializing,
            Self::Initialized { user: Some(user) }
            | Self::LoginCompleted { user }
            | Self::TokenRefreshed { user } => AuthState::Authenticated { user },
            Self::Initialized { user: None } | Self::LogoutCompleted => {
                AuthState::Unauthenticated
            },
            Self::Errored { error } => AuthState::Errored { error },
        }
    }
}
