use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres};
use tracing::error;
use utoipa::ToSchema;

use crate::app_state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// `healthy`, or `memory` when running without Postgres.
    pub database: String,
}

#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses(
        (status = 200, description = "Service and database are up", body = HealthResponse),
        (status = 503, description = "Database unreachable")
    )
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let database = match &state.db_pool {
        Some(pool) => {
            check_database_health(pool).await.map_err(|e| {
                error!(error = %e, "database health check failed");
                StatusCode::SERVICE_UNAVAILABLE
            })?;
            "healthy"
        }
        None => "memory",
    };

    Ok(Json(HealthResponse {
        status: "OK".to_string(),
        database: database.to_string(),
    }))
}

async fn check_database_health(pool: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").fetch_one(pool).await?;
    Ok(())
}
