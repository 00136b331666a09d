use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, RgbImage};
use tracing::info;
use v4l::format::FourCC;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::Device;

use crate::application::ports::{FrameSource, FrameSourcePort};
use crate::domain::{
    camera::CaptureSettings,
    errors::{DomainError, DomainResult},
};

/// Settings for opening one capture device.
pub struct CaptureConfig {
    pub camera_path: String,
    pub fourcc: String,
    pub width: u32,
    pub height: u32,
    pub read_timeout: Duration,
}

/// An open V4L2 device streaming through MMAP buffers.
pub struct V4l2Capture {
    stream: Stream<'static>,
    fourcc: FourCC,
    width: u32,
    height: u32,
    // Held so the device is closed together with the stream.
    _device: Device,
}

impl V4l2Capture {
    /// Opens the device and requests format and size. The driver may pick
    /// the closest mode it supports; the actual size is what gets decoded.
    pub fn open(cfg: &CaptureConfig) -> Result<Self> {
        let dev = Device::with_path(&cfg.camera_path)
            .with_context(|| format!("opening {}", cfg.camera_path))?;

        let mut fmt = dev.format().context("reading current format")?;
        let b = cfg.fourcc.as_bytes();
        if b.len() != 4 {
            return Err(anyhow!("fourcc must be 4 characters, got {:?}", cfg.fourcc));
        }
        fmt.fourcc = FourCC::new(&[b[0], b[1], b[2], b[3]]);
        fmt.width = cfg.width;
        fmt.height = cfg.height;
        let actual = dev.set_format(&fmt).context("setting capture format")?;

        let mut stream = Stream::with_buffers(&dev, v4l::buffer::Type::VideoCapture, 4)
            .context("creating mmap stream")?;
        stream.set_timeout(cfg.read_timeout);

        info!(
            "Camera opened: {} {}x{} [{}]",
            cfg.camera_path, actual.width, actual.height, actual.fourcc
        );

        Ok(Self {
            stream,
            fourcc: actual.fourcc,
            width: actual.width,
            height: actual.height,
            _device: dev,
        })
    }

    /// Blocks until the next frame (or the read timeout) and decodes it to RGB.
    pub fn next_rgb(&mut self) -> Result<RgbImage> {
        let (data, _) = self.stream.next().context("reading frame")?;
        let fcc = self.fourcc.str().map_err(|_| anyhow!("invalid fourcc"))?;

        match fcc {
            "MJPG" => {
                let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
                Ok(img.to_rgb8())
            }
            "YUYV" => Ok(yuyv_to_rgb(data, self.width, self.height)),
            other => Err(anyhow!("pixel format {} is not supported", other)),
        }
    }
}

impl FrameSource for V4l2Capture {
    fn read(&mut self) -> DomainResult<RgbImage> {
        self.next_rgb().map_err(|e| DomainError::Device(format!("{e:#}")))
    }
}

/// Opens `/dev/video{index}` devices.
pub struct V4l2FrameSource {
    read_timeout: Duration,
}

impl V4l2FrameSource {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl FrameSourcePort for V4l2FrameSource {
    fn open(&self, index: u32, settings: &CaptureSettings) -> DomainResult<Box<dyn FrameSource>> {
        let cfg = CaptureConfig {
            camera_path: format!("/dev/video{}", index),
            fourcc: settings.fourcc.clone(),
            width: settings.size.width,
            height: settings.size.height,
            read_timeout: self.read_timeout,
        };
        V4l2Capture::open(&cfg)
            .map(|cap| Box::new(cap) as Box<dyn FrameSource>)
            .map_err(|e| DomainError::Device(format!("{e:#}")))
    }
}

/// YUYV (YUV 4:2:2) to RGB, BT.601. Every 4 bytes `[Y0, U, Y1, V]` carry two pixels.
fn yuyv_to_rgb(yuyv: &[u8], w: u32, h: u32) -> RgbImage {
    let mut out = RgbImage::new(w, h);
    if w == 0 {
        return out;
    }

    for (i, chunk) in yuyv.chunks_exact(4).enumerate() {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;

        let pixel_idx = i as u32 * 2;
        let x = pixel_idx % w;
        let y = pixel_idx / w;
        if y >= h {
            break;
        }
        out.put_pixel(x, y, yuv_pixel(y0, u, v));
        if x + 1 < w {
            out.put_pixel(x + 1, y, yuv_pixel(y1, u, v));
        }
    }
    out
}

fn yuv_pixel(y: f32, u: f32, v: f32) -> image::Rgb<u8> {
    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
    image::Rgb([r, g, b])
}
