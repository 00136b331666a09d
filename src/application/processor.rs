use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use tracing::{debug, warn};

use crate::application::{annotator::FrameAnnotator, ledger::ResultLedger, ports::InferencePort};
use crate::domain::{
    detection::{DetectionRecord, RawDetection},
    errors::{DomainError, DomainResult},
};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Result of one pass through the processor. `frame` is the caller's buffer,
/// annotated in place when there was something to draw.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub frame: RgbImage,
    pub detections: Vec<DetectionRecord>,
}

/// Inference + annotation + ledger append for a single frame. Shared by the
/// upload endpoint and the capture loop.
pub struct FrameProcessor {
    inference: Option<Arc<dyn InferencePort>>,
    annotator: FrameAnnotator,
    ledger: Arc<ResultLedger>,
    inference_timeout: Duration,
}

impl FrameProcessor {
    pub fn new(
        inference: Option<Arc<dyn InferencePort>>,
        ledger: Arc<ResultLedger>,
        inference_timeout: Duration,
    ) -> Self {
        Self {
            inference,
            annotator: FrameAnnotator::default(),
            ledger,
            inference_timeout,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.inference.is_some()
    }

    pub fn ledger(&self) -> &Arc<ResultLedger> {
        &self.ledger
    }

    /// Never fails: when inference is unavailable the frame comes back
    /// untouched with no detections.
    pub async fn process(&self, mut frame: RgbImage) -> ProcessedFrame {
        let raw = match self.detect(&frame).await {
            Ok(raw) => raw,
            Err(e) => {
                if self.model_loaded() {
                    warn!("Inference skipped, passing frame through: {}", e);
                }
                return ProcessedFrame { frame, detections: Vec::new() };
            }
        };

        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let detections: Vec<DetectionRecord> =
            raw.into_iter().map(|r| r.into_record(&timestamp)).collect();

        if !detections.is_empty() {
            self.annotator.annotate(&mut frame, &detections);
            self.ledger.append(detections.clone());
            debug!(count = detections.len(), "Frame processed");
        }

        ProcessedFrame { frame, detections }
    }

    async fn detect(&self, frame: &RgbImage) -> DomainResult<Vec<RawDetection>> {
        let Some(inference) = self.inference.as_ref() else {
            return Err(DomainError::Unavailable("no inference backend loaded".into()));
        };
        match tokio::time::timeout(self.inference_timeout, inference.infer(frame)).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::Unavailable(format!(
                "inference timed out after {} ms",
                self.inference_timeout.as_millis()
            ))),
        }
    }
}
