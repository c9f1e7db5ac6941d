use serde::{Deserialize, Serialize};

use super::ClientAddress;

/// One entry of the backend's active session listing.
///
/// Only `remote_endpoint` drives authorization; the remaining fields are kept
/// for diagnostics. Records are transient and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier assigned by the backend
    #[serde(rename = "Id", default)]
    pub id: Option<String>,

    /// Address the session was opened from
    #[serde(rename = "RemoteEndPoint", default)]
    pub remote_endpoint: Option<String>,

    /// User owning the session
    #[serde(rename = "UserId", default)]
    pub user_id: Option<String>,

    #[serde(rename = "UserName", default)]
    pub user_name: Option<String>,

    #[serde(rename = "DeviceName", default)]
    pub device_name: Option<String>,

    #[serde(rename = "Client", default)]
    pub client: Option<String>,
}

impl SessionRecord {
    /// Returns true if this session was opened from `address`
    pub fn originates_from(&self, address: &ClientAddress) -> bool {
        self.remote_endpoint
            .as_deref()
            .is_some_and(|endpoint| address.matches_endpoint(endpoint))
    }

    /// `endpoint:user` label used in debug logs
    pub fn label(&self) -> String {
        format!(
            "{}:{}",
            self.remote_endpoint.as_deref().unwrap_or("-"),
            self.user_id.as_deref().unwrap_or("-")
        )
    }
}
