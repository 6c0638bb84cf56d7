// Error types shared by services and routes
// Every failure ends up as a dismissible notification on the client

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::{Notification, ServiceValidationError, Theme};

/// Application error
#[derive(Debug, Error)]
pub enum AppError {
    /// Form input rejected before any network call
    #[error("{0}")]
    Validation(String),
    /// Identity provider rejected the request (message is the provider's)
    #[error("{0}")]
    Identity(String),
    /// Document store rejected the request or was unreachable
    #[error("{0}")]
    Store(String),
    /// Missing, invalid, expired or revoked session
    #[error("{0}")]
    Unauthorized(String),
    /// A required setting is missing or invalid
    #[error("configuration error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Prefix a provider message for display ("Registration failed: EMAIL_EXISTS").
    /// Validation and internal errors are returned as-is.
    pub fn prefixed(self, prefix: &str) -> Self {
        match self {
            Self::Identity(msg) => Self::Identity(format!("{}: {}", prefix, msg)),
            Self::Store(msg) => Self::Store(format!("{}: {}", prefix, msg)),
            other => other,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Identity(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Store(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceValidationError> for AppError {
    fn from(err: ServiceValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                "Something went wrong, please try again".to_string()
            }
            Self::Config(detail) => {
                tracing::error!("Configuration error: {}", detail);
                self.to_string()
            }
            other => other.to_string(),
        };

        let notification = Notification::error(message);
        let mut response = (status, Json(notification.clone())).into_response();
        response.extensions_mut().insert(notification);
        response
    }
}

/// Response mapper: re-render error notifications with the theme's colors
pub async fn style_error_notifications(State(theme): State<Theme>, mut response: Response) -> Response {
    match response.extensions_mut().remove::<Notification>() {
        Some(notification) if notification.colors.is_none() => {
            (response.status(), Json(notification.styled(&theme))).into_response()
        }
        _ => response,
    }
}
