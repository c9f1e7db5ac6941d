use std::fmt;

/// Why a request was allowed through the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    /// The request is not a protected resource
    Ungated,
    /// A fresh authorization was found in the cache
    CacheHit,
    /// The backend reported a live session for the client address
    SessionConfirmed,
}

impl PassReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ungated => "ungated",
            Self::CacheHit => "cache_hit",
            Self::SessionConfirmed => "session_confirmed",
        }
    }
}

/// Outcome of evaluating one request against the authorization gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Forward the request unchanged
    Pass(PassReason),
    /// Terminate the request with `401 Unauthorized`
    Deny,
}

impl GateDecision {
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass(_))
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass(reason) => write!(f, "pass ({})", reason.as_str()),
            Self::Deny => write!(f, "deny"),
        }
    }
}
