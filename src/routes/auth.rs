// Auth routes - email/password accounts
// Endpoints: POST /v1/auth/signup, /v1/auth/signin, /v1/auth/signout, GET /v1/auth/session

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;

use crate::auth::{AuthUser, FirebaseAuth};
use crate::error::AppError;
use crate::models::{CredentialsRequest, CurrentSession, Notification, SessionResponse};
use crate::AppState;

/// POST /v1/auth/signup - Create an account and sign in
async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let credentials = request.validate().map_err(AppError::Validation)?;
    tracing::info!("Creating account for {}", credentials.email);

    let session = state
        .identity
        .create_account(&credentials)
        .await
        .map_err(|e| e.prefixed("Registration failed"))?;

    Ok(Json(SessionResponse {
        session,
        notification: Notification::info("User account created & signed in!").styled(&state.theme),
    }))
}

/// POST /v1/auth/signin - Sign in with email and password
async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let credentials = request.validate().map_err(AppError::Validation)?;
    tracing::info!("Signing in {}", credentials.email);

    let session = state
        .identity
        .sign_in(&credentials)
        .await
        .map_err(|e| e.prefixed("Sign in failed"))?;

    Ok(Json(SessionResponse {
        session,
        notification: Notification::info("User signed in!").styled(&state.theme),
    }))
}

/// POST /v1/auth/signout - Invalidate the caller's current tokens
async fn sign_out(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<FirebaseAuth>>,
    user: AuthUser,
) -> Json<Notification> {
    tracing::info!("Signing out user {}", user.uid);
    auth.revoke_sessions(&user.uid).await;
    Json(Notification::info("Signed out!").styled(&state.theme))
}

/// GET /v1/auth/session - The current session, if the token is still valid
async fn current_session(user: AuthUser) -> Json<CurrentSession> {
    Json(CurrentSession {
        uid: user.uid,
        email: user.email,
        expires_at: user.expires_at,
    })
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/auth/signup", post(sign_up))
        .route("/v1/auth/signin", post(sign_in))
        .route("/v1/auth/signout", post(sign_out))
        .route("/v1/auth/session", get(current_session))
}
