//! Mock collaborators for testing.
//!
//! Scriptable, in-memory implementations of the provider traits. They
//! count calls so tests can assert latency-sensitive properties such as
//! "this token came from storage, not from a renewal".

pub mod engine;
pub mod navigation;

pub use engine::MockProtocolEngine;
pub use navigation::MockNavigation;
