mod app;
mod config;
mod error;
mod ingestion;
mod lean;
mod models;
mod nli;
mod recommend;
mod scheduler;
mod schema;
mod summarize;
mod urlnorm;
mod vector;

use std::net::SocketAddr;

use axum::Router;
use mimalloc::MiMalloc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use app::App;
use config::ServerConfig;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = ServerConfig::new_from_env();
    let ctx = App::bootstrap(config).await?;

    scheduler::start(ctx.clone());

    let router = Router::new()
        .merge(recommend::routes::route())
        .merge(ingestion::routes::route())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
