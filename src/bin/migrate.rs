use newsdesk::{config::Config, telemetry};
use sqlx::{Pool, Postgres, postgres::PgPoolOptions};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();
    let config = Config::from_env()?;

    let pool: Pool<Postgres> = PgPoolOptions::new()
        .max_connections(5)
        .connect(config.database_url())
        .await?;

    // no-op when already up to date
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("migrations applied");

    Ok(())
}
