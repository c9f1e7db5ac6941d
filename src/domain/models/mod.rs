pub mod client_address;
pub mod config;
pub mod decision;
pub mod duration;
pub mod session;

pub use client_address::ClientAddress;
pub use config::{BackendConfig, CacheConfig, Config, LoggingConfig, ServerConfig, TlsConfig};
pub use decision::{GateDecision, PassReason};
pub use duration::{DurationParseError, HumanDuration};
pub use session::SessionRecord;
