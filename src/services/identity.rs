// Identity service - email/password accounts via the Identity Toolkit REST API
// (the API behind Firebase Authentication)

use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::models::{Credentials, IdentityTokenResponse, Session};

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

pub struct IdentityService {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl IdentityService {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, IDENTITY_TOOLKIT_URL.to_string())
    }

    pub fn with_base_url(api_key: Option<String>, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Create an account and sign it in (accounts:signUp)
    pub async fn create_account(&self, credentials: &Credentials) -> Result<Session, AppError> {
        let session = self.password_request("accounts:signUp", credentials).await?;
        tracing::info!("Created account {}", session.uid);
        Ok(session)
    }

    /// Sign in with email and password (accounts:signInWithPassword)
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AppError> {
        let session = self
            .password_request("accounts:signInWithPassword", credentials)
            .await?;
        tracing::info!("Signed in {}", session.uid);
        Ok(session)
    }

    fn endpoint(&self, method: &str) -> Result<String, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("FIREBASE_API_KEY not set".to_string()))?;
        Ok(format!(
            "{}/{}?key={}",
            self.base_url,
            method,
            urlencoding::encode(api_key)
        ))
    }

    async fn password_request(
        &self,
        method: &str,
        credentials: &Credentials,
    ) -> Result<Session, AppError> {
        let url = self.endpoint(method)?;
        let body = json!({
            "email": credentials.email,
            "password": credentials.password,
            "returnSecureToken": true
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Identity(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!("Identity Toolkit {} rejected: {}", method, error_text);
            return Err(AppError::Identity(provider_message(&error_text)));
        }

        let token: IdentityTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Identity(format!("Invalid response: {}", e)))?;

        Ok(token.into_session(Utc::now()))
    }
}

/// The provider's own message from `{"error": {"message": "..."}}`, shown verbatim
pub fn provider_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error")?.get("message")?.as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_message_is_verbatim() {
        let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS","errors":[{"message":"EMAIL_EXISTS","domain":"global","reason":"invalid"}]}}"#;
        assert_eq!(provider_message(body), "EMAIL_EXISTS");

        let body = r#"{"error":{"code":400,"message":"WEAK_PASSWORD : Password should be at least 6 characters"}}"#;
        assert_eq!(
            provider_message(body),
            "WEAK_PASSWORD : Password should be at least 6 characters"
        );

        assert_eq!(provider_message("upstream timeout\n"), "upstream timeout");
    }

    #[test]
    fn test_endpoint_requires_api_key() {
        let service = IdentityService::new(None);
        assert!(!service.is_configured());
        assert!(matches!(service.endpoint("accounts:signUp"), Err(AppError::Config(_))));

        let service = IdentityService::with_base_url(
            Some("key with space".to_string()),
            "http://localhost:9099/identitytoolkit.googleapis.com/v1".to_string(),
        );
        assert_eq!(
            service.endpoint("accounts:signUp").unwrap(),
            "http://localhost:9099/identitytoolkit.googleapis.com/v1/accounts:signUp?key=key%20with%20space"
        );
    }

    #[tokio::test]
    async fn test_sign_in_without_api_key_fails_before_network() {
        let service = IdentityService::new(None);
        let credentials = Credentials {
            email: "a@b.c".to_string(),
            password: "secret".to_string(),
        };
        assert!(matches!(
            service.sign_in(&credentials).await,
            Err(AppError::Config(_))
        ));
    }
}
