//! Forwarding layer
//!
//! Relays every admitted request to the backend origin with streamed
//! bodies, passthrough redirects and upgrade tunnelling.

pub mod forwarder;
pub mod headers;

pub use forwarder::{bad_gateway, ErrorHook, Forwarder, ForwarderConfig};
