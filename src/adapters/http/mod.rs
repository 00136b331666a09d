pub mod error;
pub mod mjpeg;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::adapters::http::state::HttpState;

pub fn router(state: HttpState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/video_feed", get(mjpeg::video_feed))
        .route("/toggle_camera", post(routes::toggle_camera).options(routes::preflight))
        .route("/detect", post(routes::detect).options(routes::preflight))
        .route("/download_csv", get(routes::download_csv))
        .route("/download_json", get(routes::download_json))
        .route("/get_results", get(routes::get_results))
        .route("/api/results", get(routes::get_results))
        .route(
            "/clear_results",
            get(routes::clear_results)
                .post(routes::clear_results)
                .options(routes::preflight),
        )
        .route("/health", get(routes::health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
