use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::runtime::Handle;
use tower_http::services::ServeDir;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use detection_feed::adapters::{
    http::{router, state::HttpState},
    inference::http_client::HttpInferenceClient,
    pipeline::capture_loop::CaptureLoop,
    v4l2::capture::V4l2FrameSource,
};
use detection_feed::application::{
    ledger::ResultLedger,
    ports::{FrameSourcePort, InferencePort, StreamPort},
    processor::FrameProcessor,
    services::StreamService,
};
use detection_feed::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG wins; info otherwise.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = AppConfig::parse();

    // A bad or missing backend is not fatal: frames pass through without detections.
    let inference: Option<Arc<dyn InferencePort>> = match cfg.inference() {
        Some(inf) => match HttpInferenceClient::new(&inf) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Inference backend unavailable, continuing without model: {:#}", e);
                None
            }
        },
        None => {
            warn!("No inference url configured, continuing without model");
            None
        }
    };

    let ledger = Arc::new(ResultLedger::new(cfg.ledger_capacity));
    let processor = Arc::new(FrameProcessor::new(inference, ledger, cfg.inference_timeout()));

    let cameras: Arc<dyn FrameSourcePort> = Arc::new(V4l2FrameSource::new(cfg.read_timeout()));
    let capture: Arc<dyn StreamPort> = Arc::new(CaptureLoop::new(
        cameras,
        processor.clone(),
        cfg.capture(),
        Handle::current(),
    ));

    let service = Arc::new(StreamService::new(processor, capture));
    let state = HttpState { service: service.clone(), jpeg_quality: cfg.jpeg_quality };

    let app = router(state, cfg.max_upload_bytes()).fallback_service(ServeDir::new(&cfg.static_dir));

    let addr = cfg.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    info!("Server listening on http://{}", addr);
    info!("Static files served from {}", cfg.static_dir.display());

    // Stopping capture ends every open MJPEG response, so graceful shutdown can drain.
    let on_shutdown = async move {
        shutdown_signal().await;
        let status = service.stop_capture().await;
        info!(state = ?status.state, "Capture released");
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(on_shutdown)
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
