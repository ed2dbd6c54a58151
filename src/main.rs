use std::sync::Arc;

use courier_route::api;
use courier_route::config::Config;
use courier_route::error::AppError;
use courier_route::observability::logging;
use courier_route::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    logging::init(&config);

    if config.intake_key.is_none() {
        tracing::warn!("INTAKE_KEY not set; order intake accepts unauthenticated requests");
    }

    let shared_state = Arc::new(
        AppState::in_memory(config.event_buffer_size, &config.photos)
            .with_intake_key(config.intake_key.clone()),
    );
    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        photo_bucket = %config.photos.bucket,
        photo_storage_enabled = config.photos.storage_enabled,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
