use serde::{Deserialize, Serialize};

/// One object instance as returned by the inference service, before it is
/// tied to a frame timestamp. Geometry is center-based, in pixels of the
/// frame that was sent for inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    pub class: String,
}

impl RawDetection {
    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.width, self.height, self.confidence]
            .iter()
            .all(|v| v.is_finite())
    }

    pub fn into_record(self, timestamp: &str) -> DetectionRecord {
        DetectionRecord {
            timestamp: timestamp.to_string(),
            class: self.class,
            confidence: self.confidence,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// A detection stamped with the processing time of the frame it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub timestamp: String,
    pub class: String,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl DetectionRecord {
    pub fn corners(&self) -> BoxCorners {
        BoxCorners::from_center(self.x, self.y, self.width, self.height)
    }

    pub fn label(&self) -> String {
        format!("{} {:.2}", self.class, self.confidence)
    }
}

/// Integer corner coordinates of a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxCorners {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoxCorners {
    /// Center-based geometry to corners, truncating toward zero.
    pub fn from_center(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x1: (x - width / 2.0) as i32,
            y1: (y - height / 2.0) as i32,
            x2: (x + width / 2.0) as i32,
            y2: (y + height / 2.0) as i32,
        }
    }
}
