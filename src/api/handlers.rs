//! HTTP request handlers

use super::types::{ErrorResponse, InboundRequest, QueuedResponse, StatsQuery, StatsResponse};
use super::AppState;
use crate::analytics::{AnalyticsEvent, MAX_RETENTION_DAYS};
use crate::runtime::InboundMessage;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

const DEFAULT_STATS_DAYS: u32 = 7;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Transport gateway delivers inbound messages here
        .route("/api/inbound", post(receive_inbound))
        .route("/api/stats", get(get_stats))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Inbound messages
// ============================================================

async fn receive_inbound(
    State(state): State<AppState>,
    Json(req): Json<InboundRequest>,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    let sender = req.sender.trim();
    if sender.is_empty() {
        return Err(AppError::BadRequest("sender is required".to_string()));
    }

    let message = InboundMessage {
        timestamp: req.timestamp,
        from_me: req.from_me,
        ..InboundMessage::new(sender, req.text)
    };
    let queued = state
        .runtime
        .submit(message)
        .await
        .map_err(|e| AppError::Unavailable(e.to_string()))?;

    // Filtered messages are accepted but not queued
    Ok((StatusCode::ACCEPTED, Json(QueuedResponse { queued })))
}

// ============================================================
// Analytics
// ============================================================

async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    let days = query.days.unwrap_or(DEFAULT_STATS_DAYS);
    if days == 0 || i64::from(days) > MAX_RETENTION_DAYS {
        return Err(AppError::BadRequest(format!(
            "days must be between 1 and {MAX_RETENTION_DAYS}"
        )));
    }

    let chats = state
        .analytics
        .count(AnalyticsEvent::Chat, days)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let sessions = state
        .analytics
        .count(AnalyticsEvent::SessionStart, days)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(StatsResponse {
        days,
        chats,
        sessions,
    }))
}

async fn get_version() -> &'static str {
    concat!("switchboard ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
