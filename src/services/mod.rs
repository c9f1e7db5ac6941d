//! Service layer
//!
//! Gating logic independent of HTTP plumbing:
//! - request classification
//! - authorization cache
//! - authorization gate

pub mod authorization_cache;
pub mod authorization_gate;
pub mod request_classifier;

pub use authorization_cache::AuthorizationCache;
pub use authorization_gate::AuthorizationGate;
pub use request_classifier::{has_dot_segments, RequestClassifier};
