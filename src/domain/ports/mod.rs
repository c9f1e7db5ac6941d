//! Port trait definitions (Hexagonal Architecture)
//!
//! - SessionSource: backend session listing used by the authorization gate

pub mod session_source;

pub use session_source::SessionSource;
