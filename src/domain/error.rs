use std::time::Duration;
use thiserror::Error;

/// Errors raised while listing sessions on the backend
#[derive(Error, Debug)]
pub enum SessionQueryError {
    /// Backend could not be reached (DNS, connection refused, I/O)
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Session query exceeded its time budget
    #[error("Session query timed out after {0:?}")]
    Timeout(Duration),

    /// Backend answered with a non-success status
    #[error("Unexpected backend status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Backend answered with something that is not a session list
    #[error("Malformed session list: {0}")]
    Malformed(String),
}

impl SessionQueryError {
    /// Returns true if the backend could not be reached at all
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// Errors that stop the gate from reaching a decision
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Cannot confirm authorization: {0}")]
    Backend(#[from] SessionQueryError),
}

/// Errors raised while relaying a request to the backend
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Invalid forward target: {0}")]
    InvalidTarget(String),

    #[error("Backend transport failure: {0}")]
    Transport(String),
}
