//! Capture sources.
//!
//! `CaptureManager` owns the live device lifecycle (Inactive/Active) and is
//! the only place a live frame is sampled from. Uploads are validated and
//! decoded here too, but accepting an upload changes no state: the upload
//! becomes visible only after its detection cycle succeeds.
//!
//! Device collaborators, selected by URL scheme in `open_device`:
//! - `stub://name[?WIDTHxHEIGHT]` synthetic frames (demos, tests)
//! - `http(s)://...` JPEG snapshot endpoint, one fetch per frame
//! - `/dev/videoN` V4L2 devices (feature: capture-v4l2)

mod snapshot;
mod synthetic;
mod upload;
#[cfg(feature = "capture-v4l2")]
mod normalize;
#[cfg(feature = "capture-v4l2")]
mod v4l2;

use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{CaptureError, ValidationError};
use crate::frame::VisualFrame;
use crate::session::SessionContext;

pub use snapshot::SnapshotCamera;
pub use synthetic::{SyntheticCamera, SyntheticConfig};
pub use upload::{accept_upload, mime_for_path};
#[cfg(feature = "capture-v4l2")]
pub use v4l2::{V4l2Camera, V4l2Config};

/// A live video input that can be requested and released.
pub trait CaptureDevice: Send + Sync {
    /// Human-readable device identifier for logs.
    fn name(&self) -> String;

    /// Request the device. Fails on permission or availability problems.
    fn open(&self) -> Result<Box<dyn FrameStream>, CaptureError>;
}

/// A granted, continuously updating video input.
pub trait FrameStream: Send {
    /// The most recent visual.
    fn current_frame(&mut self) -> Result<VisualFrame, CaptureError>;

    /// Give the device back. Must be idempotent.
    fn release(&mut self);

    fn frames_captured(&self) -> u64;
}

/// Handle describing a started capture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamHandle {
    pub epoch: u64,
    pub device: String,
}

struct ActiveStream {
    epoch: u64,
    stream: Box<dyn FrameStream>,
}

/// Live capture lifecycle.
pub struct CaptureManager {
    device: Box<dyn CaptureDevice>,
    session: Arc<SessionContext>,
    active: Mutex<Option<ActiveStream>>,
}

impl CaptureManager {
    pub fn new(device: Box<dyn CaptureDevice>, session: Arc<SessionContext>) -> Self {
        Self {
            device,
            session,
            active: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveStream>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn device_name(&self) -> String {
        self.device.name()
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    /// Inactive -> Active. Starting an active capture returns the running handle.
    pub fn start_live_capture(&self) -> Result<StreamHandle, CaptureError> {
        let mut active = self.lock();
        if let Some(running) = active.as_ref() {
            return Ok(StreamHandle {
                epoch: running.epoch,
                device: self.device.name(),
            });
        }
        let stream = match self.device.open() {
            Ok(stream) => stream,
            Err(err) => {
                log::warn!("camera {} unavailable: {}", self.device.name(), err);
                self.session
                    .report_capture_error(format!("Error accessing camera: {}", err));
                return Err(err);
            }
        };
        let epoch = self.session.activate_capture();
        *active = Some(ActiveStream { epoch, stream });
        log::info!("live capture started on {} (epoch {})", self.device.name(), epoch);
        Ok(StreamHandle {
            epoch,
            device: self.device.name(),
        })
    }

    /// Active -> Inactive, releasing the device. No-op when Inactive.
    pub fn stop_live_capture(&self) {
        let mut active = self.lock();
        let Some(mut running) = active.take() else {
            return;
        };
        running.stream.release();
        self.session.deactivate_capture();
        log::info!(
            "live capture stopped on {} (epoch {}, {} frames)",
            self.device.name(),
            running.epoch,
            running.stream.frames_captured()
        );
    }

    /// Sample the current live visual.
    pub fn snapshot(&self) -> Result<VisualFrame, CaptureError> {
        let mut active = self.lock();
        match active.as_mut() {
            Some(running) => running.stream.current_frame(),
            None => Err(CaptureError::Inactive),
        }
    }

    /// Validate and decode an uploaded file. Mutates nothing.
    pub fn accept_upload(bytes: Vec<u8>, mime: &str) -> Result<VisualFrame, ValidationError> {
        accept_upload(bytes, mime)
    }
}

impl Drop for CaptureManager {
    fn drop(&mut self) {
        self.stop_live_capture();
    }
}

/// Pick a device collaborator for `url`.
pub fn open_device(url: &str) -> Result<Box<dyn CaptureDevice>> {
    let url = url.trim();
    if url.is_empty() {
        return Err(anyhow!("camera URL must not be empty"));
    }
    if url.starts_with("stub://") {
        return Ok(Box::new(SyntheticCamera::new(SyntheticConfig::from_url(url)?)));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(Box::new(SnapshotCamera::new(url)?));
    }
    if url.starts_with("/dev/") {
        #[cfg(feature = "capture-v4l2")]
        {
            return Ok(Box::new(V4l2Camera::new(V4l2Config {
                device: url.to_string(),
                ..V4l2Config::default()
            })));
        }
        #[cfg(not(feature = "capture-v4l2"))]
        {
            return Err(anyhow!("V4L2 cameras require the capture-v4l2 feature"));
        }
    }
    Err(anyhow!(
        "unsupported camera '{}'; expected stub://, http(s):// or /dev/video*",
        url
    ))
}
