//! Collaborator interfaces.
//!
//! This module defines traits for the external collaborators the session
//! controller depends on: the OIDC protocol engine and the navigation
//! context. They are interfaces, not implementations. The controller
//! depends on the traits, the embedding application provides concrete
//! implementations, and tests use the in-memory mocks from
//! [`crate::mocks`].

pub mod engine;
pub mod navigation;

pub use engine::{
    AuthorizeParams, CallbackExchange, EndSessionRequest, EngineEvent, EngineSession,
    PopupOptions, ProtocolEngine,
};
pub use navigation::NavigationContext;
