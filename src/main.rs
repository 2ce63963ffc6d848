use mimalloc::MiMalloc;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use stockwatch::db::Storage;
use stockwatch::market::{MarketGateway, YahooFinance};
use stockwatch::{AppState, app_router};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &stockwatch::config::CONFIG;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.database.url,
        proxy = %cfg.market.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.basic.loglevel,
        requests_per_minute = cfg.market.requests_per_minute,
    );
    if cfg.auth.uses_dev_secret() {
        warn!("using the built-in development secret; set STOCKWATCH_AUTH__SECRET_KEY");
    }

    let storage = Storage::connect(&cfg.database.url).await?;
    let yahoo = YahooFinance::new(&cfg.market)?;
    let market = MarketGateway::new(Arc::new(yahoo), &cfg.market);

    let state = AppState::new(storage, Arc::new(market), (**cfg).clone());
    state
        .cache
        .spawn_sweeper(Duration::from_secs(cfg.market.cache_sweep_secs.max(1)));
    let app = app_router(state);

    let addr = cfg.basic.listen_addr.as_str();
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
