//! HTTP snapshot camera.
//!
//! Many IP and microcontroller cameras expose a single-JPEG endpoint
//! (`/capture`, `/snapshot.jpg`). Each sampled frame is one GET; opening the
//! device performs a trial fetch so permission and availability problems
//! surface at start rather than on the first tick.

use anyhow::{Context, Result};
use std::io::Read;
use std::time::Duration;
use url::Url;

use super::{CaptureDevice, FrameStream};
use crate::error::CaptureError;
use crate::frame::VisualFrame;

const MAX_JPEG_BYTES: u64 = 5 * 1024 * 1024;
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SnapshotCamera {
    url: String,
    agent: ureq::Agent,
}

impl SnapshotCamera {
    pub fn new(url: &str) -> Result<Self> {
        Url::parse(url).context("parse snapshot camera url")?;
        Ok(Self {
            url: url.to_string(),
            agent: ureq::AgentBuilder::new().timeout(FETCH_TIMEOUT).build(),
        })
    }
}

impl CaptureDevice for SnapshotCamera {
    fn name(&self) -> String {
        self.url.clone()
    }

    fn open(&self) -> Result<Box<dyn FrameStream>, CaptureError> {
        let first = fetch_jpeg(&self.agent, &self.url)?;
        decode_snapshot(first)?;
        log::info!("SnapshotCamera: connected to {}", self.url);
        Ok(Box::new(SnapshotStream {
            url: self.url.clone(),
            agent: self.agent.clone(),
            frame_count: 0,
            released: false,
        }))
    }
}

struct SnapshotStream {
    url: String,
    agent: ureq::Agent,
    frame_count: u64,
    released: bool,
}

impl FrameStream for SnapshotStream {
    fn current_frame(&mut self) -> Result<VisualFrame, CaptureError> {
        if self.released {
            return Err(CaptureError::Inactive);
        }
        let frame = decode_snapshot(fetch_jpeg(&self.agent, &self.url)?)?;
        self.frame_count += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}

fn fetch_jpeg(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>, CaptureError> {
    let response = match agent.get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code @ (401 | 403), _)) => {
            return Err(CaptureError::PermissionDenied(format!(
                "{} answered {}",
                url, code
            )))
        }
        Err(ureq::Error::Status(code, _)) => {
            return Err(CaptureError::NoDevice(format!("{} answered {}", url, code)))
        }
        Err(ureq::Error::Transport(err)) => {
            return Err(CaptureError::NoDevice(format!("{}: {}", url, err)))
        }
    };
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES)
        .read_to_end(&mut bytes)
        .map_err(|e| CaptureError::Stream(format!("read snapshot: {}", e)))?;
    if bytes.is_empty() {
        return Err(CaptureError::Stream("empty snapshot".to_string()));
    }
    Ok(bytes)
}

fn decode_snapshot(bytes: Vec<u8>) -> Result<VisualFrame, CaptureError> {
    let pixels = image::load_from_memory(&bytes)
        .map_err(|e| CaptureError::Stream(format!("decode snapshot: {}", e)))?
        .into_rgb8();
    Ok(VisualFrame::from_image(pixels))
}
