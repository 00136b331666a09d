use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::RgbImage;
use reqwest::{header::CONTENT_TYPE, Url};
use serde::Deserialize;
use tracing::info;

use crate::adapters::imaging::codec::encode_base64_jpeg;
use crate::application::ports::InferencePort;
use crate::domain::{
    detection::RawDetection,
    errors::{DomainError, DomainResult},
};

/// Where and how to reach the hosted detection model.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub jpeg_quality: u8,
}

/// Client for a Roboflow-style hosted detector: the frame goes out as a
/// base64 JPEG body, predictions come back as center-based boxes.
pub struct HttpInferenceClient {
    client: reqwest::Client,
    endpoint: Url,
    jpeg_quality: u8,
}

impl HttpInferenceClient {
    pub fn new(cfg: &InferenceConfig) -> Result<Self> {
        let mut endpoint = Url::parse(&cfg.url)
            .with_context(|| format!("invalid inference url: {}", cfg.url))?;
        if let Some(key) = cfg.api_key.as_deref().filter(|k| !k.is_empty()) {
            endpoint.query_pairs_mut().append_pair("api_key", key);
        }
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("building inference http client")?;

        info!("Inference backend configured: {}", cfg.url);
        Ok(Self { client, endpoint, jpeg_quality: cfg.jpeg_quality })
    }
}

#[async_trait]
impl InferencePort for HttpInferenceClient {
    async fn infer(&self, frame: &RgbImage) -> DomainResult<Vec<RawDetection>> {
        let body = encode_base64_jpeg(frame, self.jpeg_quality)?;

        let res = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| DomainError::Unavailable(format!("request failed: {e}")))?;

        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| DomainError::Unavailable(format!("reading response: {e}")))?;
        if !status.is_success() {
            return Err(DomainError::Unavailable(format!(
                "service returned {}: {}",
                status,
                String::from_utf8_lossy(&bytes)
            )));
        }
        parse_response(&bytes)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireResponse {
    Single(WireResult),
    Batch(Vec<WireResult>),
}

#[derive(Debug, Default, Deserialize)]
struct WireResult {
    #[serde(default)]
    predictions: Vec<WirePrediction>,
}

#[derive(Debug, Deserialize)]
struct WirePrediction {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    confidence: f32,
    #[serde(alias = "label", alias = "class_name")]
    class: String,
}

/// Normalizes the service's reply. Missing predictions mean zero detections;
/// confidence is clamped to [0, 1] and non-finite boxes are dropped.
pub(crate) fn parse_response(bytes: &[u8]) -> DomainResult<Vec<RawDetection>> {
    let wire: WireResponse = serde_json::from_slice(bytes)
        .map_err(|e| DomainError::Unavailable(format!("unexpected response body: {e}")))?;
    let results = match wire {
        WireResponse::Single(r) => vec![r],
        WireResponse::Batch(rs) => rs,
    };

    Ok(results
        .into_iter()
        .flat_map(|r| r.predictions)
        .map(|p| RawDetection {
            x: p.x,
            y: p.y,
            width: p.width,
            height: p.height,
            confidence: p.confidence.clamp(0.0, 1.0),
            class: p.class,
        })
        .filter(RawDetection::is_finite)
        .collect())
}
