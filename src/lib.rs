//! # OIDC Session
//!
//! A client-side session state machine and token-lifecycle controller
//! for OIDC/OAuth2 single-page applications.
//!
//! ## Features
//!
//! - **Single source of truth**: one observable [`AuthState`] value,
//!   written only through the controller's transition vocabulary
//! - **Engine-agnostic**: the protocol mechanics (PKCE, token
//!   endpoints, storage) live behind the [`ProtocolEngine`] trait
//! - **Token lifecycle**: cached access tokens, silent renewal with
//!   coalescing, proactive refresh
//! - **Redirect handling**: one-time callback detection, exchange and
//!   consumption
//! - **Testable**: scriptable mocks run the whole lifecycle at memory
//!   speed
//!
//! ## Architecture
//!
//! ```text
//! Operation → Engine call → AuthAction → AuthStateStore → Subscribers
//!                  ↑
//!            Engine events ──────┘ (via the event bridge)
//! ```
//!
//! ## Example: startup and token retrieval
//!
//! ```rust,ignore
//! use oidc_session::*;
//!
//! let config = SessionConfig::new(
//!     "https://auth.example.com",
//!     "client_123",
//!     "https://app.example.com/callback",
//! );
//!
//! let controller = SessionController::start(config, navigation, |engine_config| {
//!     MyEngine::new(engine_config)
//! })?;
//!
//! // Await rehydration or callback handling, then call APIs.
//! if controller.settled().await.is_authenticated() {
//!     let token = controller.get_access_token(GetTokenOptions::default()).await?;
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod actions;
pub mod callback;
pub mod config;
pub mod controller;
pub mod error;
pub mod providers;
pub mod state;
pub mod store;

mod bridge;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use actions::AuthAction;
pub use callback::{AuthorizationError, CallbackProcessor};
pub use config::{EngineConfig, EngineEndpoints, SessionConfig, StorageKind};
pub use controller::{GetTokenOptions, LoginOptions, LogoutOptions, SessionController};
pub use error::{EngineError, Result, SessionError};
pub use providers::{
    AuthorizeParams, CallbackExchange, EndSessionRequest, EngineEvent, EngineSession,
    NavigationContext, PopupOptions, ProtocolEngine,
};
pub use state::{AuthState, SessionUser, UserMetadata, UserProfile};
pub use store::AuthStateStore;
