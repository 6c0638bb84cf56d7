// Services routes
// Endpoints: GET/POST /v1/services, GET /v1/services/upcoming, /agenda, /stream

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;

use crate::agenda::{self, AgendaResponse, EMPTY_DAY_LABEL};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{
    CreateServiceRequest, CreateServiceResponse, Notification, ServiceDB, TimeWindow,
    UpcomingServiceResponse,
};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AgendaQuery {
    /// Client's current date (YYYY-MM-DD), defaults to the UTC date
    pub today: Option<String>,
    /// First day to include (YYYY-MM-DD)
    pub from: Option<String>,
    /// Last day to include (YYYY-MM-DD)
    pub to: Option<String>,
}

fn parse_optional_day(value: Option<&str>, param: &str) -> Result<Option<NaiveDate>, AppError> {
    value
        .map(|v| {
            agenda::parse_day(v).ok_or_else(|| {
                AppError::Validation(format!("Invalid {} date: {} (expected YYYY-MM-DD)", param, v))
            })
        })
        .transpose()
}

/// GET /v1/services - All services of the caller
async fn list_services(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ServiceDB>>, AppError> {
    tracing::info!("Getting services for user {}", user.uid);

    let services = state.scheduling.services_for(&user.uid).await?;
    Ok(Json(services))
}

/// POST /v1/services - Add a service for the caller
async fn create_service(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<CreateServiceResponse>), AppError> {
    tracing::info!("Adding service for user {}", user.uid);

    let service = state
        .scheduling
        .add_service(&user.uid, request)
        .await
        .map_err(|e| {
            tracing::error!("Failed to add service: {}", e);
            e.prefixed("Failed to add service")
        })?;

    Ok((
        StatusCode::CREATED,
        Json(CreateServiceResponse {
            service,
            notification: Notification::info("Service added!").styled(&state.theme),
        }),
    ))
}

/// GET /v1/services/upcoming - Nearest future service, or null
async fn get_upcoming_service(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UpcomingServiceResponse>, AppError> {
    tracing::info!("Getting upcoming service for user {}", user.uid);

    let service = state.scheduling.upcoming_for(&user.uid, Utc::now()).await?;
    Ok(Json(UpcomingServiceResponse {
        service,
        empty_label: EMPTY_DAY_LABEL,
    }))
}

/// GET /v1/services/agenda - Services grouped by day
async fn get_agenda(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AgendaQuery>,
) -> Result<Json<AgendaResponse>, AppError> {
    let today = parse_optional_day(query.today.as_deref(), "today")?
        .unwrap_or_else(|| Utc::now().date_naive());
    let from = parse_optional_day(query.from.as_deref(), "from")?;
    let to = parse_optional_day(query.to.as_deref(), "to")?;

    tracing::info!(
        "Getting agenda for user {} today={} from={:?} to={:?}",
        user.uid,
        today,
        from,
        to
    );

    let agenda = state
        .scheduling
        .agenda_for(&user.uid, TimeWindow::days(from, to), today)
        .await?;
    Ok(Json(AgendaResponse::new(agenda, today)))
}

/// GET /v1/services/stream - Full snapshots of the caller's services (SSE)
async fn stream_services(
    State(state): State<AppState>,
    user: AuthUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!("Opening service stream for user {}", user.uid);

    let events = state
        .scheduling
        .watch_services(user.uid)
        .map(|snapshot| {
            let event = match snapshot {
                Ok(services) => Event::default()
                    .event("snapshot")
                    .json_data(&services)
                    .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())),
                Err(e) => Event::default().event("error").data(e.to_string()),
            };
            Ok(event)
        });

    Sse::new(events).keep_alive(KeepAlive::default())
}

pub fn services_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/services", get(list_services).post(create_service))
        .route("/v1/services/upcoming", get(get_upcoming_service))
        .route("/v1/services/agenda", get(get_agenda))
        .route("/v1/services/stream", get(stream_services))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, test_user};
    use chrono::{DateTime, TimeZone};

    fn form(begin: DateTime<Utc>, end: DateTime<Utc>) -> CreateServiceRequest {
        CreateServiceRequest {
            name: Some("Haircut".to_string()),
            place: Some("Salon".to_string()),
            begin_time: Some(begin),
            end_time: Some(end),
        }
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let (state, _) = test_state();
        let begin = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();

        let (status, Json(created)) = create_service(
            State(state.clone()),
            test_user("user-1"),
            Json(form(begin, end)),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.notification.message, "Service added!");
        assert!(!created.notification.is_error);
        assert_eq!(created.service.user_id, "user-1");

        let Json(listed) = list_services(State(state), test_user("user-1")).await.unwrap();
        assert_eq!(listed, vec![created.service]);
    }

    #[tokio::test]
    async fn test_create_rejects_end_before_begin() {
        let (state, store) = test_state();
        let begin = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();

        let err = create_service(State(state), test_user("user-1"), Json(form(begin, end)))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "End time must be after begin time!");
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_upcoming_empty_state() {
        let (state, _) = test_state();
        let Json(response) = get_upcoming_service(State(state), test_user("user-1"))
            .await
            .unwrap();
        assert!(response.service.is_none());
        assert_eq!(response.empty_label, "No Service");
    }

    #[tokio::test]
    async fn test_agenda_with_explicit_today() {
        let (state, _) = test_state();
        let query = AgendaQuery {
            today: Some("2024-05-02".to_string()),
            ..AgendaQuery::default()
        };
        let Json(response) = get_agenda(State(state), test_user("user-1"), Query(query))
            .await
            .unwrap();
        assert_eq!(response.today, "2024-05-02");
        assert_eq!(response.days.len(), 1);
        assert!(response.days["2024-05-02"].is_empty());
    }

    #[tokio::test]
    async fn test_agenda_rejects_bad_date() {
        let (state, _) = test_state();
        let query = AgendaQuery {
            from: Some("May 1st".to_string()),
            ..AgendaQuery::default()
        };
        let err = get_agenda(State(state), test_user("user-1"), Query(query))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
