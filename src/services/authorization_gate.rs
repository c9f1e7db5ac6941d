//! Authorization gate for primary image requests.
//!
//! One linear decision per request:
//! classify -> cache check -> (miss) session query -> record -> decide.
//! The session query is the only suspension point.

use axum::http::Method;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::error::GateError;
use crate::domain::models::{ClientAddress, GateDecision, PassReason};
use crate::domain::ports::SessionSource;
use crate::services::authorization_cache::AuthorizationCache;
use crate::services::request_classifier::RequestClassifier;

/// Decides whether a request may be forwarded to the backend
#[derive(Clone)]
pub struct AuthorizationGate {
    classifier: RequestClassifier,
    cache: Arc<AuthorizationCache>,
    sessions: Arc<dyn SessionSource>,
    ttl: Duration,
}

impl AuthorizationGate {
    /// Create a gate from its collaborators
    ///
    /// # Arguments
    /// * `classifier` - Selects the requests that need gating
    /// * `cache` - Shared authorization cache
    /// * `sessions` - Backend session listing
    /// * `ttl` - How long a confirmed address skips re-confirmation
    pub fn new(
        classifier: RequestClassifier,
        cache: Arc<AuthorizationCache>,
        sessions: Arc<dyn SessionSource>,
        ttl: Duration,
    ) -> Self {
        Self {
            classifier,
            cache,
            sessions,
            ttl,
        }
    }

    /// Returns true if the request must be authorized before forwarding
    pub fn requires_gating(&self, method: &Method, path: &str) -> bool {
        self.classifier.requires_gating(method, path)
    }

    /// Evaluate one request
    ///
    /// Backend failures are returned as errors so the caller can fail
    /// closed with a status distinct from a denial.
    pub async fn evaluate(
        &self,
        method: &Method,
        path: &str,
        address: ClientAddress,
    ) -> Result<GateDecision, GateError> {
        if !self.requires_gating(method, path) {
            return Ok(GateDecision::Pass(PassReason::Ungated));
        }

        self.authorize(address).await
    }

    /// Authorize a gated request from `address`
    pub async fn authorize(&self, address: ClientAddress) -> Result<GateDecision, GateError> {
        if self.cache.is_fresh(&address) {
            debug!(%address, "authorization cached and not expired");
            return Ok(GateDecision::Pass(PassReason::CacheHit));
        }

        let sessions = self.sessions.list_sessions().await.map_err(|e| {
            warn!(%address, error = %e, "session query failed, failing closed");
            GateError::from(e)
        })?;

        debug!(
            count = sessions.len(),
            sessions = %sessions.iter().map(|s| s.label()).collect::<Vec<_>>().join(", "),
            "fetched backend sessions"
        );

        let Some(session) = sessions.iter().find(|s| s.originates_from(&address)) else {
            debug!(%address, "no active session for address");
            return Ok(GateDecision::Deny);
        };

        self.cache.record(address, self.ttl);
        debug!(
            %address,
            user_id = session.user_id.as_deref().unwrap_or("-"),
            ttl = ?self.ttl,
            "session confirmed, authorization cached"
        );

        Ok(GateDecision::Pass(PassReason::SessionConfirmed))
    }

    pub fn cache(&self) -> &Arc<AuthorizationCache> {
        &self.cache
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }
}
