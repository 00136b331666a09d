use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tracing::{error, info, warn};

use crate::adapters::imaging::codec::encode_jpeg;
use crate::application::{
    ports::{FrameSource, FrameSourcePort, StreamPort},
    processor::FrameProcessor,
};
use crate::domain::{
    camera::{CameraStatus, CaptureSettings, CaptureState},
    errors::{DomainError, DomainResult},
    stream::{summarize_detections, StreamEvent, StreamFrame},
};

/// Granularity of backoff sleeps, so a stop request is noticed quickly.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct CaptureLoopConfig {
    pub settings: CaptureSettings,
    pub jpeg_quality: u8,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub channel_capacity: usize,
}

type FrameSlot = Arc<Mutex<Option<Arc<StreamFrame>>>>;

struct CaptureSession {
    active: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

/// Owns the single capture session. One worker thread drives the camera,
/// pushes every frame through the processor and publishes the result both
/// to the latest-frame slot and to all stream subscribers.
pub struct CaptureLoop {
    source: Arc<dyn FrameSourcePort>,
    processor: Arc<FrameProcessor>,
    cfg: Arc<CaptureLoopConfig>,
    runtime: Handle,
    state: Arc<RwLock<CaptureState>>,
    slot: FrameSlot,
    tx: broadcast::Sender<StreamEvent>,
    /// Held across a whole start or stop, including the join of the old
    /// worker, so lifecycle transitions never overlap.
    session: AsyncMutex<Option<CaptureSession>>,
}

impl CaptureLoop {
    pub fn new(
        source: Arc<dyn FrameSourcePort>,
        processor: Arc<FrameProcessor>,
        cfg: CaptureLoopConfig,
        runtime: Handle,
    ) -> Self {
        let (tx, _) = broadcast::channel(cfg.channel_capacity.max(1));
        Self {
            source,
            processor,
            cfg: Arc::new(cfg),
            runtime,
            state: Arc::new(RwLock::new(CaptureState::Stopped)),
            slot: Arc::new(Mutex::new(None)),
            tx,
            session: AsyncMutex::new(None),
        }
    }
}

#[async_trait]
impl StreamPort for CaptureLoop {
    async fn start(&self) -> CameraStatus {
        let mut session = self.session.lock().await;
        if let Some(running) = session.as_ref() {
            if !running.worker.is_finished() {
                return self.status();
            }
        }

        *self.state.write() = CaptureState::Starting;
        let active = Arc::new(AtomicBool::new(true));
        let worker = Worker {
            source: self.source.clone(),
            processor: self.processor.clone(),
            cfg: self.cfg.clone(),
            runtime: self.runtime.clone(),
            state: self.state.clone(),
            slot: self.slot.clone(),
            tx: self.tx.clone(),
            active: active.clone(),
        };

        match std::thread::Builder::new()
            .name("capture-loop".into())
            .spawn(move || worker.run())
        {
            Ok(handle) => {
                info!("Capture session starting");
                *session = Some(CaptureSession { active, worker: handle });
            }
            Err(e) => {
                error!("Could not spawn capture thread: {}", e);
                *self.state.write() = CaptureState::Failed;
                let _ = self.tx.send(StreamEvent::Failed(format!("capture thread: {e}")));
                *session = None;
            }
        }
        self.status()
    }

    async fn stop(&self) -> CameraStatus {
        let mut session = self.session.lock().await;
        let Some(running) = session.take() else {
            return self.status();
        };
        running.active.store(false, Ordering::SeqCst);

        let worker = running.worker;
        match tokio::task::spawn_blocking(move || worker.join()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => error!("Capture worker panicked"),
            Err(e) => error!("Waiting for capture worker failed: {}", e),
        }

        *self.state.write() = CaptureState::Stopped;
        *self.slot.lock() = None;
        let _ = self.tx.send(StreamEvent::Stopped);
        info!("Capture session stopped");
        self.status()
    }

    fn status(&self) -> CameraStatus {
        CameraStatus::from(*self.state.read())
    }

    fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }

    fn latest(&self) -> Option<Arc<StreamFrame>> {
        self.slot.lock().clone()
    }
}

struct Worker {
    source: Arc<dyn FrameSourcePort>,
    processor: Arc<FrameProcessor>,
    cfg: Arc<CaptureLoopConfig>,
    runtime: Handle,
    state: Arc<RwLock<CaptureState>>,
    slot: FrameSlot,
    tx: broadcast::Sender<StreamEvent>,
    active: Arc<AtomicBool>,
}

impl Worker {
    fn run(self) {
        let mut device = match self.open_device() {
            Ok(device) => device,
            Err(e) => {
                error!("Camera unavailable: {}", e);
                self.set_state(CaptureState::Failed);
                let _ = self.tx.send(StreamEvent::Failed(e.to_string()));
                return;
            }
        };
        self.set_state(CaptureState::Active);

        let mut backoff = Backoff::new(self.cfg.min_backoff, self.cfg.max_backoff);
        let mut fps_est: f32 = 0.0;
        let mut last_t = Instant::now();
        let mut last_summary = String::new();

        while self.is_active() {
            let frame = match device.read() {
                Ok(frame) => frame,
                Err(e) => {
                    if self.set_state(CaptureState::Degraded) != CaptureState::Degraded {
                        warn!("Camera read failing, retrying: {}", e);
                    }
                    self.sleep_while_active(backoff.next_delay());
                    continue;
                }
            };
            if self.set_state(CaptureState::Active) == CaptureState::Degraded {
                info!("Camera reads recovered");
            }
            backoff.reset();

            let processed = self.runtime.block_on(self.processor.process(frame));
            if !self.is_active() {
                break;
            }

            let jpeg = match encode_jpeg(&processed.frame, self.cfg.jpeg_quality) {
                Ok(jpeg) => jpeg,
                Err(e) => {
                    warn!("Dropping frame: {}", e);
                    continue;
                }
            };

            let dt = last_t.elapsed().as_secs_f32().max(0.001);
            last_t = Instant::now();
            fps_est = if fps_est == 0.0 { 1.0 / dt } else { 0.9 * fps_est + 0.1 * (1.0 / dt) };

            let summary = summarize_detections(&processed.detections);
            if summary != last_summary {
                if !summary.is_empty() {
                    info!("Detected: {}", summary);
                }
                last_summary = summary;
            }

            let packet = Arc::new(StreamFrame {
                jpeg,
                width: processed.frame.width(),
                height: processed.frame.height(),
                fps_est,
                detections: processed.detections,
            });
            *self.slot.lock() = Some(packet.clone());
            if self.tx.receiver_count() > 0 {
                let _ = self.tx.send(StreamEvent::Frame(packet));
            }
        }

        drop(device);
        info!("Capture loop exited, camera released");
    }

    /// Tries the primary device, then the fallback.
    fn open_device(&self) -> DomainResult<Box<dyn FrameSource>> {
        let mut last_err = None;
        for index in self.cfg.settings.candidate_indices() {
            match self.source.open(index, &self.cfg.settings) {
                Ok(device) => {
                    info!("Capturing from camera index {}", index);
                    return Ok(device);
                }
                Err(e) => {
                    warn!("Camera index {} failed to open: {}", index, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| DomainError::Device("no camera index configured".into())))
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Returns the previous state.
    fn set_state(&self, next: CaptureState) -> CaptureState {
        std::mem::replace(&mut *self.state.write(), next)
    }

    fn sleep_while_active(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while self.is_active() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

/// Doubling delay between failed reads, capped.
struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self { min, max, current: min }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.min;
    }
}
