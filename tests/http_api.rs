use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use futures_util::StreamExt;
use image::{Rgb, RgbImage};
use serde_json::Value;
use tokio::runtime::Handle;
use tower::ServiceExt;

use detection_feed::adapters::{
    http::{router, state::HttpState},
    imaging::codec,
    inference::http_client::{HttpInferenceClient, InferenceConfig},
    pipeline::capture_loop::{CaptureLoop, CaptureLoopConfig},
};
use detection_feed::application::{
    ledger::ResultLedger,
    ports::{FrameSource, FrameSourcePort, InferencePort},
    processor::FrameProcessor,
    services::StreamService,
};
use detection_feed::domain::{
    camera::{CaptureSettings, FrameSize},
    detection::{DetectionRecord, RawDetection},
    errors::{DomainError, DomainResult},
};

const QUALITY: u8 = 80;

/// Cameras that either all work or all refuse to open.
struct Cameras {
    working: bool,
}

struct Grey;

impl FrameSourcePort for Cameras {
    fn open(&self, index: u32, _settings: &CaptureSettings) -> DomainResult<Box<dyn FrameSource>> {
        if self.working {
            Ok(Box::new(Grey))
        } else {
            Err(DomainError::Device(format!("/dev/video{index} missing")))
        }
    }
}

impl FrameSource for Grey {
    fn read(&mut self) -> DomainResult<RgbImage> {
        std::thread::sleep(Duration::from_millis(5));
        Ok(RgbImage::from_pixel(32, 24, Rgb([90, 90, 90])))
    }
}

/// Always finds the same gravel stone.
struct OneStone;

#[async_trait]
impl InferencePort for OneStone {
    async fn infer(&self, _frame: &RgbImage) -> DomainResult<Vec<RawDetection>> {
        Ok(vec![RawDetection {
            x: 5.0,
            y: 5.0,
            width: 4.0,
            height: 4.0,
            confidence: 0.75,
            class: "gravel".into(),
        }])
    }
}

fn app(inference: Option<Arc<dyn InferencePort>>, cameras: Cameras) -> Router {
    let ledger = Arc::new(ResultLedger::new(None));
    let processor = Arc::new(FrameProcessor::new(inference, ledger, Duration::from_secs(2)));
    let capture = Arc::new(CaptureLoop::new(
        Arc::new(cameras),
        processor.clone(),
        CaptureLoopConfig {
            settings: CaptureSettings {
                primary_index: 0,
                fallback_index: Some(1),
                size: FrameSize { width: 32, height: 24 },
                fourcc: "MJPG".into(),
            },
            jpeg_quality: QUALITY,
            min_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(100),
            channel_capacity: 8,
        },
        Handle::current(),
    ));
    let service = Arc::new(StreamService::new(processor, capture));
    router(HttpState { service, jpeg_quality: QUALITY }, 4 * 1024 * 1024)
}

fn unreachable_backend() -> Arc<dyn InferencePort> {
    let client = HttpInferenceClient::new(&InferenceConfig {
        url: "http://127.0.0.1:1/model/1".into(),
        api_key: Some("secret".into()),
        timeout: Duration::from_millis(500),
        jpeg_quality: QUALITY,
    })
    .unwrap();
    Arc::new(client)
}

fn black_jpeg() -> Vec<u8> {
    codec::encode_jpeg(&RgbImage::new(10, 10), 90).unwrap()
}

fn multipart_file(bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(b"--XBOUND\r\n");
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"image\"; filename=\"frame.jpg\"\r\n");
    body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n--XBOUND--\r\n");
    Request::post("/detect")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUND")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exports_without_results_are_not_found() {
    let app = app(None, Cameras { working: false });

    for uri in ["/download_csv", "/download_json"] {
        let res = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(res).await["error"], "No detection results available");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn health_at_startup() {
    let app = app(None, Cameras { working: true });

    let res = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["camera_active"], false);
    assert_eq!(body["camera_state"], "stopped");
    assert_eq!(body["results_count"], 0);
    assert!(body["fps"].is_null());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn detect_passes_the_frame_through_when_the_backend_is_down() {
    let app = app(Some(unreachable_backend()), Cameras { working: false });
    let jpeg = black_jpeg();

    let res = app.clone().oneshot(multipart_file(&jpeg)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["predictions"], Value::Array(vec![]));

    let expected = codec::encode_base64_jpeg(&codec::decode_upload(&jpeg).unwrap(), QUALITY).unwrap();
    assert_eq!(body["image"], expected);

    let health = json_body(app.oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(health["model_loaded"], true);
    assert_eq!(health["results_count"], 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn detect_accepts_a_base64_data_url_form() {
    let app = app(Some(Arc::new(OneStone)), Cameras { working: false });
    let b64 = codec::encode_base64_jpeg(&RgbImage::new(10, 10), 90).unwrap();
    let encoded = format!("data:image/jpeg;base64,{b64}")
        .replace('+', "%2B")
        .replace('/', "%2F")
        .replace('=', "%3D")
        .replace(':', "%3A")
        .replace(';', "%3B")
        .replace(',', "%2C");

    let req = Request::post("/detect")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("image={encoded}")))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = json_body(res).await;
    let preds = body["predictions"].as_array().unwrap();
    assert_eq!(preds.len(), 1);
    assert_eq!(preds[0]["class"], "gravel");
    assert_eq!(preds[0]["confidence"], 0.75);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn detect_without_an_image_is_a_bad_request() {
    let app = app(None, Cameras { working: false });

    let other_field = Request::post("/detect")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUND")
        .body(Body::from(
            "--XBOUND\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--XBOUND--\r\n",
        ))
        .unwrap();
    let no_body = Request::post("/detect").body(Body::empty()).unwrap();

    for req in [other_field, no_body] {
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["error"], "No image provided");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn detect_rejects_bytes_that_are_not_an_image() {
    let app = app(None, Cameras { working: false });

    let res = app.oneshot(multipart_file(b"definitely not a jpeg")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn results_accumulate_export_and_clear() {
    let app = app(Some(Arc::new(OneStone)), Cameras { working: false });

    for _ in 0..2 {
        let res = app.clone().oneshot(multipart_file(&black_jpeg())).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = app.clone().oneshot(get("/get_results")).await.unwrap();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let records: Vec<DetectionRecord> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.class == "gravel"));

    let res = app.clone().oneshot(get("/download_json")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let disposition = res.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"detection_results_"));
    assert!(disposition.ends_with(".json\""));
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let exported: Vec<DetectionRecord> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(exported, records);

    let res = app.clone().oneshot(get("/download_csv")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let csv = String::from_utf8(to_bytes(res.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
    assert_eq!(csv.lines().next(), Some("timestamp,class,confidence,x,y,width,height"));
    assert_eq!(csv.lines().count(), 3);

    let clear = || Request::post("/clear_results").body(Body::empty()).unwrap();
    let first = json_body(app.clone().oneshot(clear()).await.unwrap()).await;
    assert_eq!(first["cleared"], 2);
    let second = json_body(app.clone().oneshot(clear()).await.unwrap()).await;
    assert_eq!(second["cleared"], 0);

    let res = app.oneshot(get("/api/results")).await.unwrap();
    assert_eq!(json_body(res).await, Value::Array(vec![]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn toggle_flips_the_capture_session() {
    let app = app(None, Cameras { working: true });
    let toggle = || Request::post("/toggle_camera").body(Body::empty()).unwrap();

    let started = json_body(app.clone().oneshot(toggle()).await.unwrap()).await;
    assert_eq!(started["status"], "Camera started");

    let health = json_body(app.clone().oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(health["camera_active"], true);

    let stopped = json_body(app.clone().oneshot(toggle()).await.unwrap()).await;
    assert_eq!(stopped["status"], "Camera stopped");
    assert_eq!(stopped["camera_state"], "stopped");

    // An explicit stop while stopped stays stopped.
    let explicit = Request::post("/toggle_camera")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"action":"stop"}"#))
        .unwrap();
    let res = json_body(app.oneshot(explicit).await.unwrap()).await;
    assert_eq!(res["camera_state"], "stopped");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn video_feed_ends_with_a_diagnostic_when_no_camera_opens() {
    let app = app(None, Cameras { working: false });

    let res = app.clone().oneshot(get("/video_feed")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()[header::CONTENT_TYPE],
        "multipart/x-mixed-replace; boundary=frame"
    );

    let body = tokio::time::timeout(Duration::from_secs(5), to_bytes(res.into_body(), usize::MAX))
        .await
        .expect("stream should end once the camera fails")
        .unwrap();
    let text = String::from_utf8_lossy(&body);
    assert!(text.starts_with("--frame\r\nContent-Type: text/plain"));
    assert!(text.contains("Camera unavailable"));

    let health = json_body(app.oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(health["camera_state"], "failed");
    assert_eq!(health["camera_active"], false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn video_feed_streams_jpeg_parts() {
    let app = app(None, Cameras { working: true });

    let res = app.clone().oneshot(get("/video_feed")).await.unwrap();
    let mut body = res.into_body().into_data_stream();
    let first = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .expect("no frame within 5s")
        .unwrap()
        .unwrap();
    assert!(first.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n"));
    drop(body);

    let health = json_body(app.clone().oneshot(get("/health")).await.unwrap()).await;
    assert!(health["fps"].as_f64().is_some_and(|fps| fps > 0.0), "{health}");
    assert_eq!(health["frame_size"]["width"], 32);
    assert_eq!(health["frame_size"]["height"], 24);

    let stop = Request::post("/toggle_camera")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"action":"stop"}"#))
        .unwrap();
    let res = json_body(app.oneshot(stop).await.unwrap()).await;
    assert_eq!(res["camera_state"], "stopped");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn preflight_is_ok_with_cors_headers() {
    let app = app(None, Cameras { working: false });

    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/detect")
        .header(header::ORIGIN, "http://example.test")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
