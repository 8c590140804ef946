// HTTP server for the sheriff sale map

use anyhow::{Context, Result};
use sheriff_sale_map::config::DEFAULT_OUTPUT;
use sheriff_sale_map::server::{router, AppState, ScrapeCommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sheriff_sale_map=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let _ = dotenvy::dotenv();
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let public_dir = std::env::var("PUBLIC_DIR").unwrap_or_else(|_| "public".to_string());

    let scrape = ScrapeCommand::sibling_binary("sheriff-sale-map")
        .context("Failed to locate scraper binary")?;
    let state = AppState::new(DEFAULT_OUTPUT, scrape);
    let app = router(state, &public_dir);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Sheriff sales map on http://localhost:{}", port);
    tracing::info!("Serving static files from {}", public_dir);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
