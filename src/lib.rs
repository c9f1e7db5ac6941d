//! Emby Image Gate - session-gated reverse proxy for Emby
//!
//! Sits in front of an Emby server and only serves primary item images to
//! client addresses that currently hold a live session on the backend.
//! Everything else is forwarded untouched.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and the session source port
//! - **Service Layer** (`services`): Request classification, authorization cache and gate
//! - **Infrastructure Layer** (`infrastructure`): Emby client, forwarder, HTTP server, config, logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use emby_image_gate::infrastructure::{config::ConfigLoader, server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load(None)?;
//!     server::serve(&config).await
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{ClientAddress, Config, GateDecision, PassReason, SessionRecord};
pub use domain::ports::SessionSource;
pub use domain::{ForwardError, GateError, SessionQueryError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::server::{serve, GateServer};
pub use services::{AuthorizationCache, AuthorizationGate, RequestClassifier};
