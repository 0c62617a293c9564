use crate::jobs::{RunReport, calculate_backoff_delay};
use anyhow::Result;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio::{signal, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub const WORKER_SECRET_HEADER: &str = "x-worker-secret";

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub worker_url: String,
    pub worker_secret: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl SchedulerConfig {
    pub fn new(worker_url: impl Into<String>, worker_secret: impl Into<String>) -> Self {
        Self {
            worker_url: worker_url.into(),
            worker_secret: worker_secret.into(),
            poll_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(600),
            base_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(600),
        }
    }
}

#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("worker endpoint rejected the secret")]
    Unauthorized,
    #[error("worker endpoint returned {0}")]
    Status(StatusCode),
    #[error("worker endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Calls the worker endpoint on a fixed cadence. It never runs jobs itself.
pub struct WorkerScheduler {
    client: Client,
    config: SchedulerConfig,
    shutdown_token: CancellationToken,
}

impl WorkerScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            config,
            shutdown_token: CancellationToken::new(),
        })
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// One authenticated `GET` of the worker endpoint.
    #[instrument(skip(self), fields(url = %self.config.worker_url))]
    pub async fn trigger_once(&self) -> Result<RunReport, TriggerError> {
        let response = self
            .client
            .get(&self.config.worker_url)
            .header(WORKER_SECRET_HEADER, &self.config.worker_secret)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(TriggerError::Unauthorized),
            status if !status.is_success() => Err(TriggerError::Status(status)),
            _ => Ok(response.json::<RunReport>().await?),
        }
    }

    /// Poll until Ctrl-C or until the shutdown token is cancelled.
    pub async fn run(self) -> Result<()> {
        info!(
            url = %self.config.worker_url,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "starting worker scheduler"
        );

        let shutdown_token = self.shutdown_token.clone();
        tokio::spawn(async move {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("Received shutdown signal, initiating graceful shutdown...");
            shutdown_token.cancel();
        });

        let mut consecutive_failures: u32 = 0;
        loop {
            let delay = match self.trigger_once().await {
                Ok(report) => {
                    consecutive_failures = 0;
                    debug!(
                        processed = report.processed,
                        attempted = report.attempted,
                        "worker run triggered"
                    );
                    self.config.poll_interval
                }
                Err(e) => {
                    let delay = calculate_backoff_delay(
                        consecutive_failures,
                        self.config.base_backoff,
                        self.config.max_backoff,
                    );
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    warn!(
                        error = %e,
                        failures = consecutive_failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "worker trigger failed"
                    );
                    delay
                }
            };

            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler shutting down");
                    break;
                }
                _ = sleep(delay) => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    fn scheduler(server: &MockServer) -> WorkerScheduler {
        let mut config = SchedulerConfig::new(format!("{}/worker", server.uri()), "s3cret");
        config.poll_interval = Duration::from_millis(20);
        config.base_backoff = Duration::from_millis(10);
        config.max_backoff = Duration::from_millis(50);
        WorkerScheduler::new(config).unwrap()
    }

    #[tokio::test]
    async fn trigger_sends_secret_and_reads_report() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/worker"))
            .and(header(WORKER_SECRET_HEADER, "s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "attempted": 2, "processed": 1, "requeued": 1, "failed": 0, "skipped": 0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let report = scheduler(&server).trigger_once().await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.requeued, 1);
    }

    #[tokio::test]
    async fn unauthorized_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "Unauthorized" })))
            .mount(&server)
            .await;

        let err = scheduler(&server).trigger_once().await.unwrap_err();
        assert!(matches!(err, TriggerError::Unauthorized));
    }

    #[tokio::test]
    async fn run_keeps_polling_until_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/worker"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let scheduler = scheduler(&server);
        let token = scheduler.shutdown_token();
        let handle = tokio::spawn(scheduler.run());

        sleep(Duration::from_millis(200)).await;
        token.cancel();
        handle.await.unwrap().unwrap();

        let calls = server.received_requests().await.unwrap().len();
        assert!(calls >= 2, "expected repeated triggers, got {calls}");
    }
}
