use async_trait::async_trait;
use image::RgbImage;
use tokio::sync::broadcast;

use crate::domain::{
    camera::{CameraStatus, CaptureSettings},
    detection::RawDetection,
    errors::DomainResult,
    stream::{StreamEvent, StreamFrame},
};
use std::sync::Arc;

/// External object-detection service.
#[async_trait]
pub trait InferencePort: Send + Sync {
    /// Detections for one frame. The frame is only read.
    async fn infer(&self, frame: &RgbImage) -> DomainResult<Vec<RawDetection>>;
}

/// Opens camera devices. Blocking; called from the capture thread.
pub trait FrameSourcePort: Send + Sync {
    fn open(&self, index: u32, settings: &CaptureSettings) -> DomainResult<Box<dyn FrameSource>>;
}

/// An open camera handle, used only on the thread that opened it. Dropping it
/// releases the device.
pub trait FrameSource {
    fn read(&mut self) -> DomainResult<RgbImage>;
}

/// Lifecycle and fan-out of the single capture session.
#[async_trait]
pub trait StreamPort: Send + Sync {
    async fn start(&self) -> CameraStatus;
    async fn stop(&self) -> CameraStatus;
    fn status(&self) -> CameraStatus;
    fn subscribe(&self) -> broadcast::Receiver<StreamEvent>;
    fn latest(&self) -> Option<Arc<StreamFrame>>;
}
