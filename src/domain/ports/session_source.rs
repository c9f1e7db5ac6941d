/// Session source port (trait) for dependency injection.
///
/// The authorization gate depends on this trait rather than on the HTTP
/// client, so tests can substitute scripted or counting implementations.
use crate::domain::error::SessionQueryError;
use crate::domain::models::SessionRecord;
use async_trait::async_trait;

/// Lists the sessions currently active on the backend
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Fetches the active session list
    ///
    /// # Errors
    /// Returns error if:
    /// - The backend cannot be reached or times out
    /// - The backend answers with a non-success status
    /// - The response is not a session list
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, SessionQueryError>;
}
