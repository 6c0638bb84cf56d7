// Session models - Identity Toolkit (Firebase Authentication REST API)

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Email/password form body for sign-up and sign-in
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Credentials that passed the empty-field check
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub const MISSING_CREDENTIALS_MESSAGE: &str = "Please fill in all fields.";

impl CredentialsRequest {
    /// Both fields must be present and non-empty
    /// The password is not trimmed
    pub fn validate(self) -> Result<Credentials, String> {
        let email = self
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        let password = self.password.filter(|p| !p.is_empty());

        match (email, password) {
            (Some(email), Some(password)) => Ok(Credentials { email, password }),
            _ => Err(MISSING_CREDENTIALS_MESSAGE.to_string()),
        }
    }
}

/// Raw response from accounts:signUp / accounts:signInWithPassword
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityTokenResponse {
    pub id_token: String,
    pub refresh_token: String,
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Seconds, encoded as a string by the API
    pub expires_in: String,
}

/// An authenticated session handed back to the client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub uid: String,
    pub email: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl IdentityTokenResponse {
    pub fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_in: i64 = self.expires_in.parse().unwrap_or(3600);
        Session {
            uid: self.local_id,
            email: self.email,
            id_token: self.id_token,
            refresh_token: self.refresh_token,
            expires_at: now + Duration::seconds(expires_in),
        }
    }
}

/// Response for sign-up / sign-in
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub session: Session,
    pub notification: super::Notification,
}

/// Response for GET /v1/auth/session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSession {
    pub uid: String,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}
