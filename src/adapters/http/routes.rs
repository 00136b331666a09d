use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Form, Json,
};
use tracing::{debug, info};

use crate::adapters::http::{error::ApiError, state::HttpState};
use crate::adapters::imaging::codec;
use crate::application::{
    dto::{
        ClearResponse, DetectForm, DetectResponse, HealthResponse, StatusResponse, ToggleAction,
        ToggleRequest,
    },
    export::{ExportFile, ExportFormat},
    processor::ProcessedFrame,
};
use crate::domain::{detection::DetectionRecord, errors::DomainResult};

const NO_IMAGE: &str = "No image provided";

/// Runs one uploaded image through the pipeline and returns the annotated
/// frame with its detections.
pub async fn detect(State(st): State<HttpState>, req: Request) -> Result<Json<DetectResponse>, ApiError> {
    let bytes = read_image_field(&st, req).await?;
    debug!(bytes = bytes.len(), "Image received");

    let frame = blocking(move || codec::decode_upload(&bytes)).await?;
    let ProcessedFrame { frame, detections } = st.service.process_frame(frame).await;
    let quality = st.jpeg_quality;
    let image = blocking(move || codec::encode_base64_jpeg(&frame, quality)).await?;

    Ok(Json(DetectResponse { image, predictions: detections }))
}

/// Image codec work runs on the blocking pool, off the request workers.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> DomainResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("image task failed: {e}")))?
        .map_err(ApiError::from)
}

/// Pulls the `image` field out of a multipart or urlencoded body. File parts
/// are raw image bytes; text parts and form values carry base64.
async fn read_image_field(st: &HttpState, req: Request) -> Result<Vec<u8>, ApiError> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(req, st)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            if field.name() != Some("image") {
                continue;
            }
            let is_file = field.file_name().is_some();
            let data = field.bytes().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
            if data.is_empty() {
                return Err(ApiError::BadRequest(NO_IMAGE.into()));
            }
            if is_file {
                return Ok(data.to_vec());
            }
            // Text part: base64, but tolerate clients that post raw bytes without a filename.
            return match std::str::from_utf8(&data).map(codec::decode_base64_image) {
                Ok(Ok(decoded)) => Ok(decoded),
                _ => Ok(data.to_vec()),
            };
        }
        Err(ApiError::BadRequest(NO_IMAGE.into()))
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(form) = Form::<DetectForm>::from_request(req, st)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        match form.image.filter(|s| !s.trim().is_empty()) {
            Some(payload) => Ok(codec::decode_base64_image(&payload)?),
            None => Err(ApiError::BadRequest(NO_IMAGE.into())),
        }
    } else {
        Err(ApiError::BadRequest(NO_IMAGE.into()))
    }
}

/// Flips the capture session, or applies an explicit `{"action": ...}`.
pub async fn toggle_camera(
    State(st): State<HttpState>,
    body: Option<Json<ToggleRequest>>,
) -> Json<StatusResponse> {
    let requested = body.and_then(|Json(req)| req.action);
    let action = requested.unwrap_or_else(|| {
        if st.service.camera_status().active {
            ToggleAction::Stop
        } else {
            ToggleAction::Start
        }
    });

    let (status, text) = match action {
        ToggleAction::Start => (st.service.start_capture().await, "Camera started"),
        ToggleAction::Stop => (st.service.stop_capture().await, "Camera stopped"),
    };
    info!(?action, state = ?status.state, "Camera toggled");

    Json(StatusResponse { status: text.into(), camera_state: status.state })
}

pub async fn download_csv(State(st): State<HttpState>) -> Result<Response, ApiError> {
    Ok(attachment(st.service.export_results(ExportFormat::Csv)?))
}

pub async fn download_json(State(st): State<HttpState>) -> Result<Response, ApiError> {
    Ok(attachment(st.service.export_results(ExportFormat::Json)?))
}

fn attachment(file: ExportFile) -> Response {
    (
        [
            (CONTENT_TYPE, file.format.content_type().to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file.filename)),
        ],
        file.body,
    )
        .into_response()
}

pub async fn get_results(State(st): State<HttpState>) -> Json<Vec<DetectionRecord>> {
    Json(st.service.results())
}

pub async fn clear_results(State(st): State<HttpState>) -> Json<ClearResponse> {
    let cleared = st.service.clear_results();
    Json(ClearResponse { message: "Results cleared".into(), cleared })
}

pub async fn health(State(st): State<HttpState>) -> Json<HealthResponse> {
    Json(st.service.health())
}

/// Bare `OPTIONS` on mutating endpoints. CORS headers come from the layer.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}
