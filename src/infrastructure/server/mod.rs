//! HTTP server
//!
//! Binds the listener (plain or TLS), routes `/ping`, and installs the
//! authorization gate in front of the forwarder.

pub mod client_ip;
pub mod router;
pub mod serve;

pub use client_ip::resolve_client;
pub use router::{router, AppState};
pub use serve::{build_state, serve, shutdown_signal, GateServer};
