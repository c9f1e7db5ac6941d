//! Infrastructure layer module
//!
//! This module contains all infrastructure adapters and external integrations:
//! - Emby session API client
//! - Request forwarding to the backend
//! - HTTP listener and routing
//! - Configuration management
//! - Logging infrastructure
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod emby;
pub mod logging;
pub mod proxy;
pub mod server;
