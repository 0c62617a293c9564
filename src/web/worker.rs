use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{error, warn};
use utoipa::IntoParams;

use crate::app_state::AppState;
use crate::auth::dtos::ErrorResponse;
use crate::jobs::{RunReport, WORKER_SECRET_HEADER};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WorkerQuery {
    /// Alternative to the `x-worker-secret` header.
    pub secret: Option<String>,
}

fn presented_secret<'a>(headers: &'a HeaderMap, query: &'a WorkerQuery) -> Option<&'a str> {
    headers
        .get(WORKER_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .or(query.secret.as_deref())
        .filter(|s| !s.is_empty())
}

/// Run one batch of queued jobs.
#[utoipa::path(
    get,
    path = "/worker",
    tag = "worker",
    params(WorkerQuery),
    responses(
        (status = 200, description = "Batch finished", body = RunReport),
        (status = 401, description = "Missing or wrong secret", body = ErrorResponse),
        (status = 500, description = "Queue unavailable", body = ErrorResponse)
    )
)]
pub async fn trigger(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WorkerQuery>,
) -> Response {
    if presented_secret(&headers, &query) != Some(state.worker_secret.as_ref()) {
        warn!("worker trigger rejected");
        return (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new("Unauthorized"))).into_response();
    }

    // The batch outlives the request: a dropped connection must not strand
    // claimed jobs in `processing`.
    let runner = state.runner.clone();
    let batch = tokio::spawn(async move { runner.run_once().await });

    match batch.await {
        Ok(Ok(report)) => Json(report).into_response(),
        Ok(Err(e)) => {
            error!(error = ?e, "worker run failed");
            internal_error(e.to_string())
        }
        Err(e) => {
            error!(error = %e, "worker run aborted");
            internal_error("Worker run aborted".to_string())
        }
    }
}

fn internal_error(message: String) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::new(message))).into_response()
}
