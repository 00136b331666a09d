use std::convert::Infallible;

use async_stream::stream;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::adapters::http::state::HttpState;
use crate::domain::stream::StreamEvent;

pub const BOUNDARY: &str = "frame";
const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Live annotated camera feed. Attaching starts the capture session when
/// none is running; the stream ends when the session stops or fails.
pub async fn video_feed(State(st): State<HttpState>) -> Response {
    // Subscribe before starting so a fast open failure is not missed.
    let mut rx = st.service.subscribe();
    let status = st.service.start_capture().await;
    let latest = st.service.latest_frame();
    info!(state = ?status.state, "Stream subscriber attached");

    let body = stream! {
        if let Some(frame) = latest {
            yield Ok::<Bytes, Infallible>(jpeg_part(&frame.jpeg));
        }
        loop {
            match rx.recv().await {
                Ok(StreamEvent::Frame(frame)) => yield Ok(jpeg_part(&frame.jpeg)),
                Ok(StreamEvent::Failed(msg)) => {
                    yield Ok(text_part(&format!("Camera unavailable: {msg}")));
                    break;
                }
                Ok(StreamEvent::Stopped) | Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Stream subscriber lagging, frames dropped");
                }
            }
        }
        debug!("Stream subscriber detached");
    };

    (
        [(CONTENT_TYPE, MJPEG_CONTENT_TYPE), (CACHE_CONTROL, "no-cache")],
        Body::from_stream(body),
    )
        .into_response()
}

fn jpeg_part(jpeg: &[u8]) -> Bytes {
    part("image/jpeg", jpeg)
}

fn text_part(msg: &str) -> Bytes {
    part("text/plain; charset=utf-8", msg.as_bytes())
}

fn part(content_type: &str, payload: &[u8]) -> Bytes {
    let mut buf = Vec::with_capacity(payload.len() + 96);
    buf.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    buf.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
    buf.extend_from_slice(format!("Content-Length: {}\r\n\r\n", payload.len()).as_bytes());
    buf.extend_from_slice(payload);
    buf.extend_from_slice(b"\r\n");
    Bytes::from(buf)
}
