//! Session state types.
//!
//! [`AuthState`] is the single authoritative value held by the
//! [`AuthStateStore`](crate::store::AuthStateStore). It is a tagged union
//! with exactly four variants; transitions replace the value wholesale.

use crate::error::SessionError;
use crate::providers::EngineSession;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims the mapping step lifts into [`UserProfile`] / [`UserMetadata`]
/// rather than leaving in the opaque extension map.
const KNOWN_CLAIMS: [&str; 9] = [
    "sub",
    "email",
    "name",
    "locale",
    "org_id",
    "connection_id",
    "idp_id",
    "roles",
    "groups",
];

/// Authoritative session state.
///
/// The variants are mutually exclusive and exhaustive:
///
/// | Variant           | loading | authenticated | user | error |
/// |-------------------|---------|---------------|------|-------|
/// | `Initializing`    | yes     | no            | none | none  |
/// | `Unauthenticated` | no      | no            | none | none  |
/// | `Authenticated`   | no      | yes           | some | none  |
/// | `Errored`         | no      | no            | none | some  |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuthState {
    /// Initialization or an interactive login is in flight.
    Initializing,

    /// No active session.
    Unauthenticated,

    /// An authenticated principal is present.
    Authenticated {
        /// The current session user.
        user: SessionUser,
    },

    /// A lifecycle operation failed.
    Errored {
        /// The failure that put the session into this state.
        error: SessionError,
    },
}

impl AuthState {
    /// Returns `true` while initialization or login is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Initializing)
    }

    /// Returns `true` iff a session user is present and no error is held.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// The session user, if authenticated.
    #[must_use]
    pub const fn user(&self) -> Option<&SessionUser> {
        match self {
            Self::Authenticated { user } => Some(user),
            _ => None,
        }
    }

    /// The held error, if errored.
    #[must_use]
    pub const fn error(&self) -> Option<&SessionError> {
        match self {
            Self::Errored { error } => Some(error),
            _ => None,
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::Initializing
    }
}

/// Identity claims of the authenticated principal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Subject identifier (`sub` claim).
    pub subject: String,

    /// Email address, if released by the provider.
    pub email: Option<String>,

    /// Display name, if released by the provider.
    pub name: Option<String>,

    /// Locale, if released by the provider.
    pub locale: Option<String>,

    /// Remaining claims, passed through opaquely.
    pub claims: Map<String, Value>,
}

/// Deployment-specific routing facts about the principal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    /// Organization the session was established under.
    pub organization_id: Option<String>,

    /// Connection the principal authenticated through.
    pub connection_id: Option<String>,

    /// Upstream identity provider.
    pub identity_provider_id: Option<String>,

    /// Roles granted to the principal.
    pub roles: Option<Vec<String>>,

    /// Groups the principal belongs to.
    pub groups: Option<Vec<String>>,
}

/// An authenticated principal and its credentials.
///
/// Constructed fresh from protocol-engine output on every successful
/// login, refresh or rehydration; never mutated in place. Superseded
/// wholesale by the next successful event, or replaced by nothing on
/// logout, unload or error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Identity claims.
    pub profile: UserProfile,

    /// Deployment-specific routing facts.
    pub metadata: UserMetadata,

    /// Signed identity assertion, opaque to this crate.
    pub id_token: String,

    /// Bearer credential for API calls, opaque to this crate.
    pub access_token: String,

    /// Absolute expiry of the access token, when known.
    pub expires_at: Option<DateTime<Utc>>,

    /// Credential for non-interactive renewal. Present only when
    /// offline access was granted.
    pub refresh_token: Option<String>,

    /// Granted scopes. Order follows the engine's `scope` field;
    /// membership is what matters.
    pub scopes: Vec<String>,
}

impl SessionUser {
    /// Map protocol-engine output into a session user.
    ///
    /// Known claims are lifted into [`UserProfile`] and [`UserMetadata`];
    /// everything else stays in the opaque extension map. The `scope`
    /// field is whitespace-split; an absent field yields an empty set.
    #[must_use]
    pub fn from_session(session: EngineSession) -> Self {
        let EngineSession {
            claims,
            id_token,
            access_token,
            refresh_token,
            expires_at,
            scope,
        } = session;

        let profile = UserProfile {
            subject: string_claim(&claims, "sub").unwrap_or_default(),
            email: string_claim(&claims, "email"),
            name: string_claim(&claims, "name"),
            locale: string_claim(&claims, "locale"),
            claims: claims
                .iter()
                .filter(|(key, _)| !KNOWN_CLAIMS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        };

        let metadata = UserMetadata {
            organization_id: string_claim(&claims, "org_id"),
            connection_id: string_claim(&claims, "connection_id"),
            identity_provider_id: string_claim(&claims, "idp_id"),
            roles: string_list_claim(&claims, "roles"),
            groups: string_list_claim(&claims, "groups"),
        };

        let scopes = scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();

        Self {
            profile,
            metadata,
            id_token,
            access_token,
            expires_at,
            refresh_token,
            scopes,
        }
    }

    /// Returns `true` if the access token has expired at `now`.
    ///
    /// A session without a known expiry is treated as unexpired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

fn string_claim(claims: &Map<String, Value>, key: &str) -> Option<String> {
    claims.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn string_list_claim(claims: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    claims.get(key).and_then(Value::as_array).map(|values| {
        values
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect()
    })
}
