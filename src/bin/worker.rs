use anyhow::Result;
use newsdesk::{
    config::Config,
    jobs::{SchedulerConfig, WorkerScheduler},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();

    let config = Config::from_env()?;

    let mut scheduler_config = SchedulerConfig::new(config.worker_url(), config.worker_secret());
    scheduler_config.poll_interval = config.worker_poll_interval();

    WorkerScheduler::new(scheduler_config)?.run().await
}
