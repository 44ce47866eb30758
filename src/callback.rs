//! Redirect-callback detection and consumption.
//!
//! After the identity provider redirects back, the navigation context
//! carries one-time authorization-response parameters. This module
//! detects them, reads a provider error response if one is present, and
//! strips the whole parameter set with a history replacement so a
//! reload cannot replay the response.

use crate::providers::NavigationContext;
use std::sync::Arc;
use url::Url;

/// The full set of OIDC redirect parameters, stripped together.
const REDIRECT_PARAMS: [&str; 5] = ["code", "state", "error", "error_description", "session_state"];

/// A structured provider error response from the redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationError {
    /// Provider error code (e.g. `access_denied`).
    pub error: String,

    /// Human-readable description, when the provider sent one.
    pub description: Option<String>,
}

impl AuthorizationError {
    /// The message to surface: the description when present, else the
    /// error code.
    #[must_use]
    pub fn message(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.error)
    }
}

/// Reads and consumes one-time redirect parameters from the navigation
/// context.
#[derive(Debug, Clone)]
pub struct CallbackProcessor<N> {
    navigation: Arc<N>,
}

impl<N: NavigationContext> CallbackProcessor<N> {
    /// Create a processor over the given navigation context.
    pub const fn new(navigation: Arc<N>) -> Self {
        Self { navigation }
    }

    /// Returns `true` iff the current address carries an authorization
    /// code or a provider error code.
    #[must_use]
    pub fn detect(&self) -> bool {
        let url = self.navigation.current_url();
        url.query_pairs()
            .any(|(key, _)| key == "code" || key == "error")
    }

    /// The structured provider error response, if one is present.
    #[must_use]
    pub fn read_error(&self) -> Option<AuthorizationError> {
        let url = self.navigation.current_url();
        let mut error = None;
        let mut description = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {},
            }
        }
        error.map(|error| AuthorizationError { error, description })
    }

    /// Strip the redirect parameters from the address with a history
    /// replacement. Idempotent: a no-op when none are present.
    pub fn consume(&self) {
        let url = self.navigation.current_url();
        let Some(cleaned) = strip_redirect_params(&url) else {
            return;
        };
        tracing::debug!("stripping redirect parameters from address");
        self.navigation.replace_url(&cleaned);
    }
}

/// The address with redirect parameters removed, or `None` when there
/// is nothing to strip.
fn strip_redirect_params(url: &Url) -> Option<Url> {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !REDIRECT_PARAMS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if retained.len() == url.query_pairs().count() {
        return None;
    }

    let mut cleaned = url.clone();
    cleaned.set_query(None);
    if !retained.is_empty() {
        let mut pairs = cleaned.query_pairs_mut();
        for (key, value) in &retained {
            pairs.append_pair(key, value);
        }
    }
    Some(cleaned)
}
