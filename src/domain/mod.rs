//! Domain layer for the image gate
//!
//! This module contains core models, error types and port traits.

pub mod error;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use error::{ForwardError, GateError, SessionQueryError};
