// Firebase ID token verification and the authenticated-user extractor
// Keys come from Google's JWK endpoint for securetoken@system.gserviceaccount.com

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    Extension,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::AppError;

/// Public keys used to sign Firebase ID tokens, in JWK format
const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Issuer prefix, followed by the project ID
const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Bounds for the key cache lifetime (seconds)
const MIN_CACHE_TTL_SECS: i64 = 300;
const DEFAULT_CACHE_TTL_SECS: i64 = 3600;

/// An unknown key ID triggers at most one refetch per this many seconds
const MIN_REFRESH_INTERVAL_SECS: i64 = 60;

struct CachedKeys {
    keys: JwkSet,
    fetched_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Claims of a Firebase ID token that we use
#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseClaims {
    /// Firebase user UID
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub email: Option<String>,
}

/// Verifies ID tokens and tracks signed-out sessions
pub struct FirebaseAuth {
    project_id: String,
    client: Client,
    cached_keys: RwLock<Option<CachedKeys>>,
    /// uid -> unix time of the last sign-out; older tokens are rejected
    revoked_before: RwLock<HashMap<String, i64>>,
}

impl FirebaseAuth {
    pub fn new(project_id: String) -> Self {
        Self {
            project_id,
            client: Client::new(),
            cached_keys: RwLock::new(None),
            revoked_before: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch the current signing keys
    pub async fn refresh_keys(&self) -> Result<(), AppError> {
        tracing::info!("Fetching Firebase public keys");

        let response = self
            .client
            .get(FIREBASE_JWKS_URL)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch Firebase keys: {}", e)))?;

        let cache_ttl = response
            .headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_CACHE_TTL_SECS)
            .max(MIN_CACHE_TTL_SECS);

        let keys: JwkSet = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Firebase keys: {}", e)))?;

        tracing::info!("Cached {} Firebase keys for {}s", keys.keys.len(), cache_ttl);
        self.store_keys(keys, cache_ttl).await;
        Ok(())
    }

    async fn store_keys(&self, keys: JwkSet, ttl_secs: i64) {
        let now = Utc::now();
        *self.cached_keys.write().await = Some(CachedKeys {
            keys,
            fetched_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
        });
    }

    /// Valid keys fetched less than MIN_REFRESH_INTERVAL_SECS ago
    async fn refreshed_recently(&self) -> bool {
        let now = Utc::now();
        self.cached_keys.read().await.as_ref().is_some_and(|c| {
            c.expires_at > now && now - c.fetched_at < Duration::seconds(MIN_REFRESH_INTERVAL_SECS)
        })
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AppError> {
        if let Some(key) = self.cached_key(kid).await? {
            return Ok(key);
        }

        if self.refreshed_recently().await {
            tracing::debug!("Unknown Firebase key ID {}, keys are fresh - not refetching", kid);
            return Err(AppError::Unauthorized("Unknown token signing key".to_string()));
        }

        self.refresh_keys().await?;

        self.cached_key(kid)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unknown token signing key".to_string()))
    }

    async fn cached_key(&self, kid: &str) -> Result<Option<DecodingKey>, AppError> {
        let cache = self.cached_keys.read().await;
        let Some(cached) = cache.as_ref().filter(|c| c.expires_at > Utc::now()) else {
            return Ok(None);
        };
        cached
            .keys
            .find(kid)
            .map(|jwk| {
                DecodingKey::from_jwk(jwk)
                    .map_err(|e| AppError::Internal(format!("Invalid Firebase key {}: {}", kid, e)))
            })
            .transpose()
    }

    /// Verify signature, issuer, audience and expiry, then check for sign-out
    pub async fn verify_id_token(&self, token: &str) -> Result<FirebaseClaims, AppError> {
        let header = decode_header(token)
            .map_err(|_| AppError::Unauthorized("Invalid token format".to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AppError::Unauthorized("Token missing key ID".to_string()))?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!("{}{}", FIREBASE_ISSUER_PREFIX, self.project_id)]);

        let claims = decode::<FirebaseClaims>(token, &key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Unauthorized("Session expired".to_string()),
                _ => {
                    tracing::debug!("Firebase token rejected: {}", e);
                    AppError::Unauthorized("Invalid token".to_string())
                }
            })?
            .claims;

        if self.is_revoked(&claims.sub, claims.iat).await {
            return Err(AppError::Unauthorized("Signed out".to_string()));
        }

        Ok(claims)
    }

    /// Sign out: tokens issued before now stop being accepted
    pub async fn revoke_sessions(&self, uid: &str) {
        self.revoke_sessions_at(uid, Utc::now().timestamp()).await;
    }

    async fn revoke_sessions_at(&self, uid: &str, at: i64) {
        self.revoked_before.write().await.insert(uid.to_string(), at);
        tracing::info!("Revoked sessions for user {}", uid);
    }

    async fn is_revoked(&self, uid: &str, issued_at: i64) -> bool {
        self.revoked_before
            .read()
            .await
            .get(uid)
            .is_some_and(|&revoked_at| issued_at < revoked_at)
    }
}

/// Layer making `FirebaseAuth` available to the `AuthUser` extractor
pub fn firebase_auth_extension(auth: Arc<FirebaseAuth>) -> Extension<Arc<FirebaseAuth>> {
    Extension(auth)
}

/// Parse max-age from Cache-Control ("public, max-age=19845, must-revalidate")
fn parse_max_age(cache_control: &str) -> Option<i64> {
    cache_control
        .split(',')
        .map(str::trim)
        .find_map(|s| s.strip_prefix("max-age="))
        .and_then(|s| s.parse().ok())
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The caller, taken from a verified `Authorization: Bearer <ID token>` header
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl From<FirebaseClaims> for AuthUser {
    fn from(claims: FirebaseClaims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Not signed in".to_string()))?
            .to_string();

        let auth = parts
            .extensions
            .get::<Arc<FirebaseAuth>>()
            .cloned()
            .ok_or_else(|| AppError::Internal("FirebaseAuth extension missing".to_string()))?;

        let claims = auth.verify_id_token(&token).await?;
        Ok(AuthUser::from(claims))
    }
}
