// src/domain/camera.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// Requested capture mode. The driver may adjust any of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    pub primary_index: u32,
    pub fallback_index: Option<u32>,
    pub size: FrameSize,
    pub fourcc: String,
}

impl CaptureSettings {
    /// Device indices in the order they should be tried.
    pub fn candidate_indices(&self) -> Vec<u32> {
        let mut out = vec![self.primary_index];
        if let Some(fallback) = self.fallback_index {
            if fallback != self.primary_index {
                out.push(fallback);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Stopped,
    Starting,
    Active,
    /// Device open but reads are failing.
    Degraded,
    /// Device could not be opened.
    Failed,
}

impl CaptureState {
    /// Whether a capture session currently owns (or is acquiring) the device.
    pub fn is_live(self) -> bool {
        matches!(self, CaptureState::Starting | CaptureState::Active | CaptureState::Degraded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraStatus {
    pub state: CaptureState,
    pub active: bool,
}

impl From<CaptureState> for CameraStatus {
    fn from(state: CaptureState) -> Self {
        Self { state, active: state.is_live() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_tried_after_primary() {
        let s = CaptureSettings {
            primary_index: 0,
            fallback_index: Some(1),
            size: FrameSize { width: 640, height: 480 },
            fourcc: "MJPG".into(),
        };
        assert_eq!(s.candidate_indices(), vec![0, 1]);
    }

    #[test]
    fn duplicate_fallback_is_skipped() {
        let s = CaptureSettings {
            primary_index: 2,
            fallback_index: Some(2),
            size: FrameSize { width: 640, height: 480 },
            fourcc: "MJPG".into(),
        };
        assert_eq!(s.candidate_indices(), vec![2]);
    }

    #[test]
    fn live_states() {
        assert!(!CaptureState::Stopped.is_live());
        assert!(!CaptureState::Failed.is_live());
        assert!(CaptureState::Degraded.is_live());
        assert!(CameraStatus::from(CaptureState::Active).active);
    }
}
