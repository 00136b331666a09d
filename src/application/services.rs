use std::sync::Arc;

use image::RgbImage;
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    application::{
        dto::HealthResponse,
        export::{self, ExportFile, ExportFormat},
        ledger::ResultLedger,
        ports::StreamPort,
        processor::{FrameProcessor, ProcessedFrame},
    },
    domain::{
        camera::{CameraStatus, FrameSize},
        detection::DetectionRecord,
        errors::DomainResult,
        stream::{StreamEvent, StreamFrame},
    },
};

/// Process-wide entry point to the detection pipeline: single-frame
/// processing, the capture session and the detection ledger. All locking
/// lives behind these methods.
#[derive(Clone)]
pub struct StreamService {
    processor: Arc<FrameProcessor>,
    ledger: Arc<ResultLedger>,
    stream: Arc<dyn StreamPort>,
}

impl StreamService {
    pub fn new(processor: Arc<FrameProcessor>, stream: Arc<dyn StreamPort>) -> Self {
        let ledger = processor.ledger().clone();
        Self { processor, ledger, stream }
    }

    pub async fn process_frame(&self, frame: RgbImage) -> ProcessedFrame {
        self.processor.process(frame).await
    }

    /// Starts the capture session. Returns the current status unchanged when
    /// one is already running.
    pub async fn start_capture(&self) -> CameraStatus {
        self.stream.start().await
    }

    /// Stops the capture session and waits for the device to be released.
    /// A no-op when nothing is running.
    pub async fn stop_capture(&self) -> CameraStatus {
        self.stream.stop().await
    }

    pub fn camera_status(&self) -> CameraStatus {
        self.stream.status()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.stream.subscribe()
    }

    pub fn latest_frame(&self) -> Option<Arc<StreamFrame>> {
        self.stream.latest()
    }

    pub fn append_results(&self, records: Vec<DetectionRecord>) {
        self.ledger.append(records);
    }

    pub fn results(&self) -> Vec<DetectionRecord> {
        self.ledger.snapshot()
    }

    pub fn export_results(&self, format: ExportFormat) -> DomainResult<ExportFile> {
        export::export(&self.ledger.snapshot(), format)
    }

    pub fn clear_results(&self) -> usize {
        let cleared = self.ledger.clear();
        info!(cleared, "Detection results cleared");
        cleared
    }

    pub fn health(&self) -> HealthResponse {
        let camera = self.stream.status();
        let latest = self.stream.latest();
        HealthResponse {
            status: "healthy".into(),
            camera_active: camera.active,
            camera_state: camera.state,
            model_loaded: self.processor.model_loaded(),
            results_count: self.ledger.len(),
            fps: latest.as_ref().map(|f| f.fps_est),
            frame_size: latest.map(|f| FrameSize { width: f.width, height: f.height }),
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }
}
