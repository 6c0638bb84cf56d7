// Theme routes
// Endpoints: GET /v1/theme, GET /v1/theme/:scheme

use axum::{extract::Path, extract::State, routing::get, Json, Router};

use crate::error::AppError;
use crate::models::{ColorScheme, Theme};
use crate::AppState;

/// GET /v1/theme - The server's default theme
async fn get_default_theme(State(state): State<AppState>) -> Json<Theme> {
    Json(state.theme)
}

/// GET /v1/theme/:scheme - Palette for "light" or "dark"
async fn get_theme(Path(scheme): Path<String>) -> Result<Json<Theme>, AppError> {
    let scheme: ColorScheme = scheme.parse().map_err(AppError::Validation)?;
    Ok(Json(scheme.theme()))
}

pub fn theme_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/theme", get(get_default_theme))
        .route("/v1/theme/:scheme", get(get_theme))
}
