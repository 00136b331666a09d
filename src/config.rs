use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use crate::adapters::inference::http_client::InferenceConfig;
use crate::adapters::pipeline::capture_loop::CaptureLoopConfig;
use crate::domain::camera::{CaptureSettings, FrameSize};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Object detection over HTTP with a live annotated camera feed")]
pub struct AppConfig {
    #[arg(long, env = "DETECT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory served for every path no route claims.
    #[arg(long, env = "STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Hosted detection endpoint. Without it frames pass through unannotated.
    #[arg(long, env = "INFERENCE_URL")]
    pub inference_url: Option<String>,

    #[arg(long, env = "INFERENCE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "INFERENCE_TIMEOUT_MS", default_value_t = 10_000)]
    pub inference_timeout_ms: u64,

    #[arg(long, env = "CAMERA_INDEX", default_value_t = 0)]
    pub camera_index: u32,

    /// Tried when the primary camera cannot be opened.
    #[arg(long, env = "FALLBACK_CAMERA_INDEX", default_value_t = 1)]
    pub fallback_camera_index: u32,

    #[arg(long, env = "CAPTURE_WIDTH", default_value_t = 640)]
    pub capture_width: u32,

    #[arg(long, env = "CAPTURE_HEIGHT", default_value_t = 480)]
    pub capture_height: u32,

    /// MJPG or YUYV.
    #[arg(long, env = "CAPTURE_FOURCC", default_value = "MJPG")]
    pub fourcc: String,

    #[arg(long, env = "READ_TIMEOUT_MS", default_value_t = 2_000)]
    pub read_timeout_ms: u64,

    #[arg(long, env = "MIN_BACKOFF_MS", default_value_t = 100)]
    pub min_backoff_ms: u64,

    #[arg(long, env = "MAX_BACKOFF_MS", default_value_t = 2_000)]
    pub max_backoff_ms: u64,

    #[arg(long, env = "JPEG_QUALITY", default_value_t = 80, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// Oldest detections are evicted past this many records. Unbounded when unset.
    #[arg(long, env = "LEDGER_CAPACITY")]
    pub ledger_capacity: Option<usize>,

    /// Frames buffered per stream subscriber before it starts skipping.
    #[arg(long, env = "STREAM_BUFFER", default_value_t = 16)]
    pub stream_buffer: usize,

    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 16)]
    pub max_upload_mb: usize,
}

impl AppConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    pub fn inference(&self) -> Option<InferenceConfig> {
        let url = self.inference_url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        Some(InferenceConfig {
            url: url.to_string(),
            api_key: self.api_key.clone(),
            timeout: self.inference_timeout(),
            jpeg_quality: self.jpeg_quality,
        })
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn capture(&self) -> CaptureLoopConfig {
        let min_backoff = Duration::from_millis(self.min_backoff_ms.max(1));
        CaptureLoopConfig {
            settings: CaptureSettings {
                primary_index: self.camera_index,
                fallback_index: Some(self.fallback_camera_index),
                size: FrameSize { width: self.capture_width, height: self.capture_height },
                fourcc: self.fourcc.to_ascii_uppercase(),
            },
            jpeg_quality: self.jpeg_quality,
            min_backoff,
            max_backoff: Duration::from_millis(self.max_backoff_ms).max(min_backoff),
            channel_capacity: self.stream_buffer,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> AppConfig {
        let mut argv = vec!["detection-feed"];
        argv.extend_from_slice(args);
        AppConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_leave_the_model_unloaded() {
        let cfg = parse(&[]);
        assert_eq!(cfg.port, 5000);
        assert!(cfg.inference().is_none());
        assert_eq!(cfg.bind_addr().unwrap().to_string(), "0.0.0.0:5000");
    }

    #[test]
    fn capture_settings_carry_the_fallback_camera() {
        let cfg = parse(&["--camera-index", "2", "--fallback-camera-index", "0", "--fourcc", "yuyv"]);
        let cap = cfg.capture();
        assert_eq!(cap.settings.candidate_indices(), vec![2, 0]);
        assert_eq!(cap.settings.fourcc, "YUYV");
        assert_eq!(cap.settings.size, FrameSize { width: 640, height: 480 });
    }

    #[test]
    fn max_backoff_never_drops_below_min() {
        let cfg = parse(&["--min-backoff-ms", "500", "--max-backoff-ms", "10"]);
        let cap = cfg.capture();
        assert_eq!(cap.max_backoff, Duration::from_millis(500));
    }

    #[test]
    fn blank_inference_url_means_no_model() {
        assert!(parse(&["--inference-url", "  "]).inference().is_none());
        let inf = parse(&["--inference-url", "http://localhost:9001/model/1", "--api-key", "k"])
            .inference()
            .unwrap();
        assert_eq!(inf.api_key.as_deref(), Some("k"));
        assert_eq!(inf.timeout, Duration::from_millis(10_000));
    }

    #[test]
    fn jpeg_quality_is_range_checked() {
        let argv = ["detection-feed", "--jpeg-quality", "0"];
        assert!(AppConfig::try_parse_from(argv).is_err());
    }
}
