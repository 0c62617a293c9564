//! HTTP surface: server-rendered pages, the worker trigger and health.

pub mod articles;
pub mod errors;
pub mod notice;
pub mod sources;
pub mod views;
pub mod worker;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::auth::{dtos::ErrorResponse, handlers as auth};
use crate::health::{self, HealthResponse};
use crate::jobs::RunReport;
use crate::middleware::{RateLimit, rate_limit_middleware};

const RATE_LIMIT_REQUESTS: u32 = 30;
const RATE_LIMIT_WINDOW_SECS: i64 = 60;

#[derive(OpenApi)]
#[openapi(
    paths(worker::trigger, health::health_check),
    components(schemas(RunReport, HealthResponse, ErrorResponse)),
    tags(
        (name = "worker", description = "Queue processing trigger"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Every route of the service. Needs `ConnectInfo<SocketAddr>` for the rate
/// limiter, so serve it with `into_make_service_with_connect_info`.
pub fn router(state: AppState) -> Router {
    let limiter = RateLimit::new(RATE_LIMIT_REQUESTS, RATE_LIMIT_WINDOW_SECS);

    let limited = Router::new()
        .route("/login", get(auth::login_page).post(auth::login_submit))
        .route("/worker", get(worker::trigger))
        .route_layer(from_fn_with_state(limiter, rate_limit_middleware));

    Router::new()
        .route("/", get(auth::index))
        .route("/logout", post(auth::logout))
        .route("/sources", get(sources::list).post(sources::create))
        .route("/sources/run-all", post(sources::run_all))
        .route("/sources/{id}/run", post(sources::run))
        .route("/sources/{id}/toggle", post(sources::toggle))
        .route("/articles", get(articles::list))
        .route("/articles/{id}", get(articles::detail))
        .route("/articles/{id}/rerun", post(articles::rerun))
        .route("/articles/{id}/delete", post(articles::delete))
        .route("/articles/{id}/used", post(articles::set_used))
        .route("/articles/{id}/download/{format}", get(articles::download))
        .route("/healthz", get(health::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(limited)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}
