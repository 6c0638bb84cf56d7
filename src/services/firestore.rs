// Firestore service - services collection
// Uses Firestore REST API for simplicity and compatibility

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::ServiceStore;
use crate::error::AppError;
use crate::models::{NewService, ServiceDB, TimeWindow};

/// Service account credentials from JSON file
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    client_email: String,
    private_key: String,
    token_uri: Option<String>,
}

/// JWT claims for Google OAuth2
#[derive(Debug, Serialize)]
struct GoogleJwtClaims {
    iss: String,      // Service account email
    scope: String,    // OAuth scopes
    aud: String,      // Token endpoint
    iat: i64,         // Issued at
    exp: i64,         // Expiration
}

/// Cached access token with expiration
struct CachedToken {
    token: String,
    expires_at: i64,
}

/// Firestore collection paths
pub const SERVICES_COLLECTION: &str = "services";

/// Document field names (persisted shape)
pub const FIELD_NAME: &str = "name";
pub const FIELD_PLACE: &str = "place";
pub const FIELD_BEGIN_TIME: &str = "beginTime";
pub const FIELD_END_TIME: &str = "endTime";
pub const FIELD_USER_ID: &str = "userID";

/// Firestore REST API client
pub struct FirestoreService {
    client: Client,
    project_id: String,
    /// `host:port` of a local emulator; no OAuth when set
    emulator_host: Option<String>,
    credentials: Option<ServiceAccountCredentials>,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl FirestoreService {
    /// Create a new Firestore service
    pub async fn new(
        project_id: String,
        credentials_path: Option<&str>,
        emulator_host: Option<String>,
    ) -> Result<Self, AppError> {
        let client = Client::new();

        let credentials = if emulator_host.is_some() {
            None
        } else {
            Self::load_credentials(credentials_path)?
        };

        let service = Self {
            client,
            project_id,
            emulator_host,
            credentials,
            cached_token: Arc::new(RwLock::new(None)),
        };

        // Pre-fetch an access token
        if service.emulator_host.is_none() {
            if let Err(e) = service.get_access_token().await {
                tracing::warn!("Failed to get initial access token: {}", e);
            }
        }

        Ok(service)
    }

    /// Load service account credentials from JSON file
    fn load_credentials(path: Option<&str>) -> Result<Option<ServiceAccountCredentials>, AppError> {
        let creds_path = match path {
            Some(path) => path.to_string(),
            None => {
                // Try default location in current directory
                if std::path::Path::new("google-credentials.json").exists() {
                    "google-credentials.json".to_string()
                } else {
                    tracing::warn!("No GOOGLE_APPLICATION_CREDENTIALS set and no google-credentials.json found");
                    return Ok(None);
                }
            }
        };

        tracing::info!("Loading service account credentials from: {}", creds_path);

        let creds_json = std::fs::read_to_string(&creds_path).map_err(|e| {
            AppError::Config(format!("Failed to read credentials file {}: {}", creds_path, e))
        })?;

        let credentials: ServiceAccountCredentials = serde_json::from_str(&creds_json)
            .map_err(|e| AppError::Config(format!("Failed to parse credentials JSON: {}", e)))?;

        tracing::info!("Loaded credentials for service account: {}", credentials.client_email);

        Ok(Some(credentials))
    }

    /// Get access token, using cache if valid or refreshing if needed
    async fn get_access_token(&self) -> Result<String, AppError> {
        // Check cached token
        {
            let cache = self.cached_token.read().await;
            if let Some(cached) = cache.as_ref() {
                let now = Utc::now().timestamp();
                // Use token if it has at least 60 seconds left
                if cached.expires_at > now + 60 {
                    return Ok(cached.token.clone());
                }
            }
        }

        let token = self.fetch_new_access_token().await?;

        // Tokens are valid for 1 hour, refresh after 55 minutes
        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at: Utc::now().timestamp() + 3300,
            });
        }

        Ok(token)
    }

    /// Fetch a new access token from Google OAuth
    async fn fetch_new_access_token(&self) -> Result<String, AppError> {
        if let Some(creds) = &self.credentials {
            let token = self.get_token_from_service_account(creds).await?;
            tracing::info!("Got access token from service account");
            return Ok(token);
        }

        // Fall back to metadata server (Cloud Run / GKE without credentials file)
        if let Ok(token) = self.try_metadata_server().await {
            tracing::info!("Got access token from GCP metadata server");
            return Ok(token);
        }

        Err(AppError::Config(
            "No valid authentication method available. Set GOOGLE_APPLICATION_CREDENTIALS or run on GCP."
                .to_string(),
        ))
    }

    /// Try to get token from GCP metadata server
    async fn try_metadata_server(&self) -> Result<String, AppError> {
        let metadata_url =
            "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

        let response = self
            .client
            .get(metadata_url)
            .header("Metadata-Flavor", "Google")
            .timeout(std::time::Duration::from_secs(2))
            .send()
            .await?;

        if response.status().is_success() {
            let token: TokenResponse = response.json().await?;
            return Ok(token.access_token);
        }

        Err(AppError::Config("Metadata server not available".to_string()))
    }

    /// Get access token using service account credentials (OAuth2 JWT flow)
    async fn get_token_from_service_account(
        &self,
        creds: &ServiceAccountCredentials,
    ) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let token_uri = creds
            .token_uri
            .as_deref()
            .unwrap_or("https://oauth2.googleapis.com/token");

        let claims = GoogleJwtClaims {
            iss: creds.client_email.clone(),
            scope: "https://www.googleapis.com/auth/datastore".to_string(),
            aud: token_uri.to_string(),
            iat: now,
            exp: now + 3600,
        };

        // Sign JWT with service account private key (RS256)
        let key = EncodingKey::from_rsa_pem(creds.private_key.as_bytes())
            .map_err(|e| AppError::Config(format!("Failed to parse private key: {}", e)))?;

        let jwt = encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| AppError::Internal(format!("Failed to encode JWT: {}", e)))?;

        // Exchange JWT for access token
        let response = self
            .client
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await
            .map_err(|e| AppError::Store(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Store(format!("Token exchange failed: {}", error_text)));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Store(format!("Failed to parse token response: {}", e)))?;

        Ok(token_response.access_token)
    }

    /// Build Firestore REST API base URL
    fn base_url(&self) -> String {
        match &self.emulator_host {
            Some(host) => format!(
                "http://{}/v1/projects/{}/databases/(default)/documents",
                host, self.project_id
            ),
            None => format!(
                "https://firestore.googleapis.com/v1/projects/{}/databases/(default)/documents",
                self.project_id
            ),
        }
    }

    /// Build request with auth header
    async fn build_request(
        &self,
        method: reqwest::Method,
        url: &str,
    ) -> Result<reqwest::RequestBuilder, AppError> {
        let req = self.client.request(method, url);
        if self.emulator_host.is_some() {
            // The emulator accepts this fixed token and bypasses security rules
            return Ok(req.bearer_auth("owner"));
        }
        let token = self.get_access_token().await?;
        Ok(req.bearer_auth(token))
    }

    /// Run a structured query against the database root and return the matching documents
    async fn run_query(&self, structured_query: Value) -> Result<Vec<Value>, AppError> {
        let query = json!({ "structuredQuery": structured_query });

        tracing::debug!(
            "Firestore query: {}",
            serde_json::to_string_pretty(&query).unwrap_or_default()
        );

        let response = self
            .build_request(reqwest::Method::POST, &format!("{}:runQuery", self.base_url()))
            .await?
            .json(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            tracing::error!("Firestore query error: {}", error_text);
            return Err(AppError::Store(store_error_message(&error_text)));
        }

        let results: Vec<Value> = response.json().await?;
        Ok(results
            .into_iter()
            .filter_map(|row| row.get("document").cloned())
            .collect())
    }

    // =========================================================================
    // SERVICES
    // =========================================================================

    /// Get services for a user, optionally restricted to a beginTime window
    /// Path: services where userID == uid
    pub async fn get_services(
        &self,
        uid: &str,
        window: TimeWindow,
    ) -> Result<Vec<ServiceDB>, AppError> {
        let documents = self.run_query(services_query(uid, window)).await?;
        let services: Vec<ServiceDB> = documents
            .iter()
            .filter_map(|doc| match parse_service(doc) {
                Ok(service) => Some(service),
                Err(e) => {
                    tracing::warn!("Failed to parse service: {}", e);
                    None
                }
            })
            .collect();

        tracing::info!("Retrieved {} services for user {}", services.len(), uid);
        Ok(services)
    }

    /// Get the nearest service starting after `now`
    pub async fn get_upcoming_service(
        &self,
        uid: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ServiceDB>, AppError> {
        let documents = self.run_query(upcoming_service_query(uid, now)).await?;
        let service = documents.first().map(parse_service).transpose()?;

        tracing::info!(
            "Upcoming service for user {}: {:?}",
            uid,
            service.as_ref().map(|s| s.id.as_str())
        );
        Ok(service)
    }

    /// Create a service document
    /// Path: services/{service_id}
    pub async fn create_service(
        &self,
        uid: &str,
        service: NewService,
    ) -> Result<ServiceDB, AppError> {
        let service_id = uuid::Uuid::new_v4().to_string();

        let url = format!(
            "{}/{}?documentId={}",
            self.base_url(),
            SERVICES_COLLECTION,
            urlencoding::encode(&service_id)
        );

        let doc = json!({ "fields": service_fields(uid, &service) });

        let response = self
            .build_request(reqwest::Method::POST, &url)
            .await?
            .json(&doc)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            tracing::error!("Firestore create error: {}", error_text);
            return Err(AppError::Store(store_error_message(&error_text)));
        }

        // Parse and return the created document
        let created_doc: Value = response.json().await?;
        let created = parse_service(&created_doc)?;

        tracing::info!("Created service {} for user {}", created.id, uid);
        Ok(created)
    }
}

#[async_trait]
impl ServiceStore for FirestoreService {
    async fn list_services(&self, uid: &str, window: TimeWindow) -> Result<Vec<ServiceDB>, AppError> {
        self.get_services(uid, window).await
    }

    async fn upcoming_service(
        &self,
        uid: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ServiceDB>, AppError> {
        self.get_upcoming_service(uid, now).await
    }

    async fn insert_service(&self, uid: &str, service: NewService) -> Result<ServiceDB, AppError> {
        self.create_service(uid, service).await
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

// =========================================================================
// QUERY BUILDERS
// =========================================================================

fn field_filter(field: &str, op: &str, value: Value) -> Value {
    json!({
        "fieldFilter": {
            "field": {"fieldPath": field},
            "op": op,
            "value": value
        }
    })
}

fn timestamp_value(time: DateTime<Utc>) -> Value {
    json!({"timestampValue": time.to_rfc3339()})
}

/// Combine filters: a single filter stays as-is, several go into an AND composite
fn where_clause(mut filters: Vec<Value>) -> Option<Value> {
    match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(json!({
            "compositeFilter": {
                "op": "AND",
                "filters": filters
            }
        })),
    }
}

/// services where userID == uid [and from <= beginTime < until], ordered by beginTime when bounded
pub fn services_query(uid: &str, window: TimeWindow) -> Value {
    let mut filters = vec![field_filter(FIELD_USER_ID, "EQUAL", json!({"stringValue": uid}))];

    if let Some(from) = window.from {
        filters.push(field_filter(
            FIELD_BEGIN_TIME,
            "GREATER_THAN_OR_EQUAL",
            timestamp_value(from),
        ));
    }
    if let Some(until) = window.until {
        filters.push(field_filter(FIELD_BEGIN_TIME, "LESS_THAN", timestamp_value(until)));
    }

    let mut structured_query = json!({
        "from": [{"collectionId": SERVICES_COLLECTION}],
    });

    if let Some(where_filter) = where_clause(filters) {
        structured_query["where"] = where_filter;
    }

    // Ordering on beginTime drops documents without it, so the full list stays unordered
    if !window.is_unbounded() {
        structured_query["orderBy"] =
            json!([{"field": {"fieldPath": FIELD_BEGIN_TIME}, "direction": "ASCENDING"}]);
    }

    structured_query
}

/// services where userID == uid and beginTime > now, nearest first, limit 1
pub fn upcoming_service_query(uid: &str, now: DateTime<Utc>) -> Value {
    let filters = vec![
        field_filter(FIELD_USER_ID, "EQUAL", json!({"stringValue": uid})),
        field_filter(FIELD_BEGIN_TIME, "GREATER_THAN", timestamp_value(now)),
    ];

    let mut structured_query = json!({
        "from": [{"collectionId": SERVICES_COLLECTION}],
        "orderBy": [{"field": {"fieldPath": FIELD_BEGIN_TIME}, "direction": "ASCENDING"}],
        "limit": 1
    });

    if let Some(where_filter) = where_clause(filters) {
        structured_query["where"] = where_filter;
    }

    structured_query
}

/// Document fields for a new service; userID comes from the session, never the form
fn service_fields(uid: &str, service: &NewService) -> Value {
    json!({
        FIELD_NAME: {"stringValue": service.name()},
        FIELD_PLACE: {"stringValue": service.place()},
        FIELD_BEGIN_TIME: timestamp_value(service.begin_time()),
        FIELD_END_TIME: timestamp_value(service.end_time()),
        FIELD_USER_ID: {"stringValue": uid}
    })
}

// =========================================================================
// PARSING
// =========================================================================

/// Parse a service from a Firestore document
/// Missing optional fields are tolerated, a missing name/owner is an error
pub fn parse_service(doc: &Value) -> Result<ServiceDB, AppError> {
    let name = doc
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| AppError::Store("Missing document name".to_string()))?;

    let id = name.rsplit('/').next().unwrap_or_default().to_string();

    let fields = doc
        .get("fields")
        .ok_or_else(|| AppError::Store(format!("Missing fields in service {}", id)))?;

    let user_id = parse_string(fields, FIELD_USER_ID)
        .ok_or_else(|| AppError::Store(format!("Missing userID in service {}", id)))?;

    Ok(ServiceDB {
        name: parse_string(fields, FIELD_NAME).unwrap_or_default(),
        place: parse_string(fields, FIELD_PLACE).unwrap_or_default(),
        begin_time: parse_timestamp_optional(fields, FIELD_BEGIN_TIME),
        end_time: parse_timestamp_optional(fields, FIELD_END_TIME),
        user_id,
        id,
    })
}

// Field parsing helpers
fn parse_string(fields: &Value, key: &str) -> Option<String> {
    fields.get(key)?.get("stringValue")?.as_str().map(|s| s.to_string())
}

fn parse_timestamp_optional(fields: &Value, key: &str) -> Option<DateTime<Utc>> {
    fields
        .get(key)
        .and_then(|v| v.get("timestampValue"))
        .and_then(|v| v.as_str())
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Extract `error.message` from a Google API error body, falling back to the raw text
fn store_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error")?.get("message")?.as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateServiceRequest;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn test_services_query_full_list() {
        let query = services_query("user-1", TimeWindow::all());
        assert_eq!(query["from"][0]["collectionId"], "services");
        assert_eq!(query["where"]["fieldFilter"]["field"]["fieldPath"], "userID");
        assert_eq!(query["where"]["fieldFilter"]["op"], "EQUAL");
        assert_eq!(query["where"]["fieldFilter"]["value"]["stringValue"], "user-1");
        assert!(query.get("orderBy").is_none());
    }

    #[test]
    fn test_services_query_with_window() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let query = services_query("user-1", TimeWindow::days(Some(day), Some(day)));

        let filters = query["where"]["compositeFilter"]["filters"].as_array().unwrap();
        assert_eq!(query["where"]["compositeFilter"]["op"], "AND");
        assert_eq!(filters.len(), 3);
        assert_eq!(filters[1]["fieldFilter"]["op"], "GREATER_THAN_OR_EQUAL");
        assert_eq!(
            filters[1]["fieldFilter"]["value"]["timestampValue"],
            "2024-05-01T00:00:00+00:00"
        );
        assert_eq!(filters[2]["fieldFilter"]["op"], "LESS_THAN");
        assert_eq!(
            filters[2]["fieldFilter"]["value"]["timestampValue"],
            "2024-05-02T00:00:00+00:00"
        );
        assert_eq!(query["orderBy"][0]["direction"], "ASCENDING");
    }

    #[test]
    fn test_upcoming_query_orders_nearest_first() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let query = upcoming_service_query("user-1", now);

        assert_eq!(query["limit"], 1);
        assert_eq!(query["orderBy"][0]["field"]["fieldPath"], "beginTime");
        assert_eq!(query["orderBy"][0]["direction"], "ASCENDING");
        let filters = query["where"]["compositeFilter"]["filters"].as_array().unwrap();
        assert_eq!(filters[1]["fieldFilter"]["op"], "GREATER_THAN");
        assert_eq!(filters[1]["fieldFilter"]["field"]["fieldPath"], "beginTime");
    }

    #[test]
    fn test_service_fields_stamp_owner() {
        let service = CreateServiceRequest {
            name: Some("Haircut".to_string()),
            place: Some("Salon".to_string()),
            begin_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
            end_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap()),
        }
        .validate()
        .unwrap();

        let fields = service_fields("user-1", &service);
        assert_eq!(fields["userID"]["stringValue"], "user-1");
        assert_eq!(fields["name"]["stringValue"], "Haircut");
        assert_eq!(fields["beginTime"]["timestampValue"], "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_parse_service_document() {
        let doc = json!({
            "name": "projects/p/databases/(default)/documents/services/abc123",
            "fields": {
                "name": {"stringValue": "Haircut"},
                "place": {"stringValue": "Salon"},
                "beginTime": {"timestampValue": "2024-05-01T10:00:00Z"},
                "endTime": {"timestampValue": "2024-05-01T11:00:00.000000Z"},
                "userID": {"stringValue": "user-1"}
            }
        });

        let service = parse_service(&doc).unwrap();
        assert_eq!(service.id, "abc123");
        assert_eq!(service.name, "Haircut");
        assert_eq!(service.user_id, "user-1");
        assert_eq!(
            service.begin_time,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(
            service.end_time,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_service_tolerates_missing_times() {
        let doc = json!({
            "name": "projects/p/databases/(default)/documents/services/legacy",
            "fields": {
                "name": {"stringValue": "Old"},
                "userID": {"stringValue": "user-1"}
            }
        });
        let service = parse_service(&doc).unwrap();
        assert!(service.begin_time.is_none());
        assert_eq!(service.place, "");
    }

    #[test]
    fn test_parse_service_requires_owner() {
        let doc = json!({
            "name": "projects/p/databases/(default)/documents/services/x",
            "fields": {"name": {"stringValue": "Orphan"}}
        });
        assert!(parse_service(&doc).is_err());
    }

    #[test]
    fn test_store_error_message() {
        let body = r#"{"error":{"code":403,"message":"Missing or insufficient permissions.","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(store_error_message(body), "Missing or insufficient permissions.");
        assert_eq!(store_error_message("  Bad Gateway "), "Bad Gateway");
    }
}
