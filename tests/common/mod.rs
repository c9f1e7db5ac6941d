//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and test utilities used across
//! multiple integration test files.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use emby_image_gate::domain::error::SessionQueryError;
use emby_image_gate::domain::models::SessionRecord;
use emby_image_gate::domain::ports::SessionSource;
use emby_image_gate::services::{AuthorizationCache, AuthorizationGate, RequestClassifier};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A session record reported from `endpoint`
pub fn session(endpoint: &str, user_id: &str) -> SessionRecord {
    SessionRecord {
        id: Some(format!("session-{user_id}")),
        remote_endpoint: Some(endpoint.to_string()),
        user_id: Some(user_id.to_string()),
        user_name: Some(user_id.to_string()),
        device_name: Some("Living Room TV".to_string()),
        client: Some("Emby Theater".to_string()),
    }
}

/// Session source whose answer can be changed mid-test
#[derive(Default)]
pub struct ScriptedSessions {
    sessions: Mutex<Vec<SessionRecord>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedSessions {
    pub fn with_sessions(sessions: Vec<SessionRecord>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(sessions),
            ..Default::default()
        })
    }

    pub fn set_sessions(&self, sessions: Vec<SessionRecord>) {
        *self.sessions.lock().unwrap() = sessions;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of session queries issued so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionSource for ScriptedSessions {
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, SessionQueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SessionQueryError::UnexpectedStatus {
                status: 500,
                body: "Internal Server Error".to_string(),
            });
        }
        Ok(self.sessions.lock().unwrap().clone())
    }
}

/// Gate over `sessions` with the default `emby` route prefix
pub fn gate(sessions: Arc<ScriptedSessions>, ttl: Duration) -> AuthorizationGate {
    AuthorizationGate::new(
        RequestClassifier::new("emby").unwrap(),
        Arc::new(AuthorizationCache::default()),
        sessions,
        ttl,
    )
}
