//! Attar Storefront service entry point.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use attar_storefront::notify::{NoopNotifier, Notifier, RelayNotifier};
use attar_storefront::payment::RazorpayClient;
use attar_storefront::publisher::EventPublisher;
use attar_storefront::repository::{MemoryRepository, PgRepository, Repository};
use attar_storefront::{router, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;

    let repo: Arc<dyn Repository> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .context("connecting to Postgres")?;
            sqlx::migrate!("./migrations").run(&pool).await.context("running migrations")?;
            Arc::new(PgRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory repository");
            Arc::new(MemoryRepository::new())
        }
    };

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable; events will not be published");
                None
            }
        },
        None => None,
    };

    let notifier: Arc<dyn Notifier> = match &config.messaging_relay_url {
        Some(url) => Arc::new(RelayNotifier::new(url.clone())?),
        None => Arc::new(NoopNotifier),
    };
    let gateway = Arc::new(RazorpayClient::new(config.razorpay.clone())?);

    let addr = config.bind_address();
    let state = AppState::new(config, repo, gateway, notifier, EventPublisher::new(nats));
    let app = router(state);

    tracing::info!("Attar storefront listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
