use crate::{api::routes::AppState, db};
use axum::{extract::State, http::StatusCode, Json};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub db: &'static str,
}

/// GET /auth/health - Liveness probe with one database round-trip
///
/// A probe failure is reported to the caller as 503; it never takes the
/// process down.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    match db::ping(&state.db_pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                timestamp,
                db: "connected",
            }),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "error",
                    timestamp,
                    db: "disconnected",
                }),
            )
        }
    }
}
