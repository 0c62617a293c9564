use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use tracing::warn;

use crate::auth::dtos::ErrorResponse;

/// Fixed-window request counter per client IP.
#[derive(Clone)]
pub struct RateLimit {
    store: Arc<DashMap<IpAddr, Window>>,
    max_requests: u32,
    window: Duration,
}

#[derive(Debug, Clone)]
struct Window {
    count: u32,
    started: DateTime<Utc>,
}

impl RateLimit {
    pub fn new(max_requests: u32, window_seconds: i64) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            max_requests,
            window: Duration::seconds(window_seconds),
        }
    }

    /// Count one request; `Err` carries the seconds until the window resets.
    pub fn check(&self, ip: IpAddr, now: DateTime<Utc>) -> Result<(), i64> {
        let mut entry = self.store.entry(ip).or_insert_with(|| Window {
            count: 0,
            started: now,
        });
        let window = entry.value_mut();

        if now.signed_duration_since(window.started) >= self.window {
            window.count = 0;
            window.started = now;
        }
        window.count += 1;

        if window.count > self.max_requests {
            let retry_after = (window.started + self.window - now).num_seconds().max(1);
            return Err(retry_after);
        }
        Ok(())
    }
}

pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(rate_limit): State<RateLimit>,
    req: Request,
    next: Next,
) -> Response {
    if let Err(retry_after) = rate_limit.check(addr.ip(), Utc::now()) {
        warn!(ip = %addr.ip(), path = %req.uri().path(), "rate limit exceeded");
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse::new("Rate limit exceeded")),
        )
            .into_response();
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        return response;
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        extract::connect_info::MockConnectInfo,
        http::Request,
        middleware::from_fn_with_state,
        routing::get,
    };
    use std::net::Ipv4Addr;
    use tower::ServiceExt;

    const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

    #[test]
    fn window_resets_after_expiry() {
        let limit = RateLimit::new(2, 60);
        let start = Utc::now();

        assert!(limit.check(CLIENT, start).is_ok());
        assert!(limit.check(CLIENT, start).is_ok());
        assert_eq!(limit.check(CLIENT, start + Duration::seconds(15)), Err(45));
        assert!(limit.check(IpAddr::V4(Ipv4Addr::LOCALHOST), start).is_ok());
        assert!(limit.check(CLIENT, start + Duration::seconds(60)).is_ok());
    }

    #[tokio::test]
    async fn middleware_answers_429_with_retry_after() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route_layer(from_fn_with_state(RateLimit::new(1, 60), rate_limit_middleware))
            .layer(MockConnectInfo(SocketAddr::new(CLIENT, 4000)));

        let request = || Request::builder().uri("/").body(Body::empty()).unwrap();
        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key(RETRY_AFTER));
    }
}
