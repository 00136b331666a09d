use std::collections::BTreeMap;
use std::sync::Arc;

use super::detection::DetectionRecord;

/// The latest annotated frame, as published by the capture loop.
#[derive(Debug, Clone)]
pub struct StreamFrame {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub fps_est: f32,
    pub detections: Vec<DetectionRecord>,
}

/// What stream subscribers receive from the capture loop.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Frame(Arc<StreamFrame>),
    /// Terminal: the device could not be opened.
    Failed(String),
    /// Terminal: the session was stopped.
    Stopped,
}

/// "2 gravel, 1 rock", classes in alphabetical order.
pub fn summarize_detections(detections: &[DetectionRecord]) -> String {
    let mut counts = BTreeMap::new();
    for det in detections {
        *counts.entry(det.class.as_str()).or_insert(0usize) += 1;
    }
    counts
        .iter()
        .map(|(class, count)| format!("{} {}", count, class))
        .collect::<Vec<_>>()
        .join(", ")
}
