// ServiceTracker Backend - Rust
// Scheduling API over Firebase Authentication and Cloud Firestore

use axum::{middleware, Router};
use std::fs::OpenOptions;
use std::io::LineWriter;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Custom time formatter: [HH:mm:ss] [backend]
#[derive(Clone)]
struct BackendTimer;

impl FormatTime for BackendTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(w, "[{}] [backend]", now.format("%H:%M:%S"))
    }
}

mod agenda;
mod auth;
mod config;
mod error;
mod models;
mod routes;
mod services;

use auth::{firebase_auth_extension, FirebaseAuth};
use config::Config;
use error::style_error_notifications;
use models::Theme;
use routes::{auth_routes, health_routes, services_routes, theme_routes};
use services::{
    FirestoreService, IdentityService, InMemoryServiceStore, SchedulingService, ServiceStore,
};

/// Project ID used for token verification when none is configured (nothing will verify)
const UNCONFIGURED_PROJECT_ID: &str = "service-tracker-unconfigured";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub scheduling: Arc<SchedulingService>,
    pub identity: Arc<IdentityService>,
    /// Default theme, used to style notifications
    pub theme: Theme,
}

/// Build the full router with auth extension and HTTP layers
fn build_router(state: AppState, firebase_auth: Arc<FirebaseAuth>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let theme = state.theme;

    Router::new()
        .merge(health_routes())
        .merge(auth_routes())
        .merge(services_routes())
        .merge(theme_routes())
        .with_state(state)
        .layer(middleware::map_response_with_state(theme, style_error_notifications))
        .layer(firebase_auth_extension(firebase_auth))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn build_store(config: &Config) -> Arc<dyn ServiceStore> {
    let Some(project_id) = config.firebase_project_id.clone() else {
        tracing::warn!("No Firebase project configured - using in-memory service store");
        return Arc::new(InMemoryServiceStore::new());
    };

    match FirestoreService::new(
        project_id,
        config.google_application_credentials.as_deref(),
        config.firestore_emulator_host.clone(),
    )
    .await
    {
        Ok(firestore) => Arc::new(firestore),
        Err(e) => {
            tracing::error!("Failed to initialize Firestore: {} - using in-memory service store", e);
            Arc::new(InMemoryServiceStore::new())
        }
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    // Log file is optional: stdout keeps working if it cannot be opened
    let file_writer = match OpenOptions::new().create(true).append(true).open(&config.log_file) {
        Ok(file) => Some(tracing_appender::non_blocking(LineWriter::new(file))),
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", config.log_file, e);
            None
        }
    };
    let (file_layer, _guard) = match file_writer {
        Some((non_blocking, guard)) => (
            Some(
                fmt::layer()
                    .with_timer(BackendTimer)
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(non_blocking),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    // Format: [HH:mm:ss] [backend] LEVEL message
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "service_tracker_backend=info,tower_http=info".into()),
        )
        .with(
            fmt::layer()
                .with_timer(BackendTimer)
                .with_target(false)
                .with_ansi(true),
        )
        .with(file_layer)
        .init();

    if let Err(e) = config.validate() {
        tracing::error!("Configuration error: {}", e);
        return;
    }

    let theme = config.color_scheme().unwrap_or_default().theme();

    // Initialize Firebase Auth
    let firebase_auth = Arc::new(FirebaseAuth::new(
        config
            .firebase_project_id
            .clone()
            .unwrap_or_else(|| UNCONFIGURED_PROJECT_ID.to_string()),
    ));

    if config.firebase_project_id.is_some() {
        if let Err(e) = firebase_auth.refresh_keys().await {
            tracing::warn!("Failed to fetch Firebase keys: {} - auth may not work", e);
        }
    }

    let store = build_store(&config).await;
    let scheduling = Arc::new(SchedulingService::new(store, config.services_poll_interval()));
    let identity = Arc::new(IdentityService::new(config.firebase_api_key.clone()));
    if !identity.is_configured() {
        tracing::warn!("FIREBASE_API_KEY not set - sign-up and sign-in will fail");
    }

    let state = AppState {
        scheduling,
        identity,
        theme,
    };

    let app = build_router(state, firebase_auth);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting ServiceTracker backend on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}

#[cfg(test)]
mod test_support {
    use super::*;
    use auth::AuthUser;
    use chrono::Utc;
    use std::time::Duration;

    /// State backed by an in-memory store, identity not configured
    pub fn test_state() -> (AppState, Arc<InMemoryServiceStore>) {
        let store = Arc::new(InMemoryServiceStore::new());
        let state = AppState {
            scheduling: Arc::new(SchedulingService::new(store.clone(), Duration::from_millis(10))),
            identity: Arc::new(IdentityService::new(None)),
            theme: models::ColorScheme::Light.theme(),
        };
        (state, store)
    }

    pub fn test_user(uid: &str) -> AuthUser {
        AuthUser {
            uid: uid.to_string(),
            email: Some(format!("{}@example.com", uid)),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        let (state, _) = test_support::test_state();
        build_router(state, Arc::new(FirebaseAuth::new("project".to_string())))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get(app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_services_require_sign_in() {
        let (status, body) = get(app(), "/v1/services").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["isError"], true);
        assert_eq!(body["message"], "Not signed in");
        assert_eq!(body["colors"]["background"], models::ColorScheme::Light.theme().error_container);
    }

    #[tokio::test]
    async fn test_theme_routes() {
        let (status, body) = get(app(), "/v1/theme/dark").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scheme"], "dark");

        let (status, body) = get(app(), "/v1/theme").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scheme"], "light");

        let (status, body) = get(app(), "/v1/theme/sepia").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Unknown color scheme: sepia");
    }
}
