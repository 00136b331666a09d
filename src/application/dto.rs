use serde::{Deserialize, Serialize};

use crate::domain::{
    camera::{CaptureState, FrameSize},
    detection::DetectionRecord,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    /// Base64 JPEG of the (annotated) frame.
    pub image: String,
    pub predictions: Vec<DetectionRecord>,
}

/// Urlencoded `/detect` body: a base64 image, optionally a data URL.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectForm {
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToggleRequest {
    pub action: Option<ToggleAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub camera_state: CaptureState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub message: String,
    pub cleared: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub camera_active: bool,
    pub camera_state: CaptureState,
    pub model_loaded: bool,
    pub results_count: usize,
    /// Smoothed capture rate of the running session, absent when no frame is held.
    pub fps: Option<f32>,
    pub frame_size: Option<FrameSize>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
