// Authentication types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh credential pair. Always written and cleared together; the
/// store never holds one half without the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Body of POST /auth/refresh
#[derive(Debug, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response from the token-issuing endpoints (login, register, refresh)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<u64>,
    pub user: Option<SessionUser>,
}

impl AuthResponse {
    /// Wall-clock expiry of the access token, when the backend reported one
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs as i64))
    }
}

/// Authenticated user as reported by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: u64,
    pub username: String,
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}
