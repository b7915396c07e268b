// ABOUTME: API server startup with CORS and request tracing
// ABOUTME: Resumes unfinished runs at startup and waits for in-flight runs on shutdown

use axum::http::{HeaderValue, Method};
use codingcat_api::{create_router, AppState};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::runtime::Services;

pub async fn run_server(config: Config) -> Result<()> {
    let services = Services::init(&config).await?;
    let (dispatcher, worker) = services.start_dispatcher(&config);
    dispatcher.resume_unfinished().await?;

    let cors = match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new().allow_origin(origin),
        Err(_) => {
            warn!("Invalid CORS origin '{}', allowing any origin", config.cors_origin);
            CorsLayer::new().allow_origin(Any)
        }
    }
    .allow_methods([Method::GET, Method::POST])
    .allow_headers(Any);

    let app = create_router(AppState::new(services.db.clone(), dispatcher.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, waiting for in-flight runs");
    dispatcher.shutdown(worker).await;
    info!("Runs drained");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
