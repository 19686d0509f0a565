//! Synthetic camera (`stub://`).
//!
//! Produces a moving gradient so successive frames differ. Used by the demo
//! binary and tests; never touches hardware.

use anyhow::{anyhow, Result};

use super::{CaptureDevice, FrameStream};
use crate::error::CaptureError;
use crate::frame::VisualFrame;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "stub://camera".to_string(),
            width: 640,
            height: 480,
        }
    }
}

impl SyntheticConfig {
    /// Parse `stub://name` or `stub://name?WIDTHxHEIGHT`.
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic camera URL must start with stub://"))?;
        let (_, size) = match rest.split_once('?') {
            Some((name, size)) => (name, Some(size)),
            None => (rest, None),
        };
        let mut cfg = Self {
            name: url.to_string(),
            ..Self::default()
        };
        if let Some(size) = size {
            let (w, h) = size
                .split_once('x')
                .ok_or_else(|| anyhow!("synthetic size must be WIDTHxHEIGHT, got '{}'", size))?;
            cfg.width = w
                .parse()
                .map_err(|_| anyhow!("invalid synthetic width '{}'", w))?;
            cfg.height = h
                .parse()
                .map_err(|_| anyhow!("invalid synthetic height '{}'", h))?;
            if cfg.width == 0 || cfg.height == 0 {
                return Err(anyhow!("synthetic frame size must be non-zero"));
            }
        }
        Ok(cfg)
    }
}

pub struct SyntheticCamera {
    config: SyntheticConfig,
}

impl SyntheticCamera {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }
}

impl CaptureDevice for SyntheticCamera {
    fn name(&self) -> String {
        self.config.name.clone()
    }

    fn open(&self) -> Result<Box<dyn FrameStream>, CaptureError> {
        log::info!(
            "SyntheticCamera: opened {} ({}x{})",
            self.config.name,
            self.config.width,
            self.config.height
        );
        Ok(Box::new(SyntheticStream {
            config: self.config.clone(),
            frame_count: 0,
            released: false,
        }))
    }
}

struct SyntheticStream {
    config: SyntheticConfig,
    frame_count: u64,
    released: bool,
}

impl SyntheticStream {
    fn generate_pixels(&self) -> Vec<u8> {
        let (w, h) = (self.config.width as u64, self.config.height as u64);
        let shift = self.frame_count.wrapping_mul(7);
        let mut pixels = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                pixels.push(((x + shift) % 256) as u8);
                pixels.push(((y + shift / 2) % 256) as u8);
                pixels.push(((x + y) % 256) as u8);
            }
        }
        pixels
    }
}

impl FrameStream for SyntheticStream {
    fn current_frame(&mut self) -> Result<VisualFrame, CaptureError> {
        if self.released {
            return Err(CaptureError::Inactive);
        }
        self.frame_count += 1;
        VisualFrame::from_rgb(self.config.width, self.config.height, self.generate_pixels())
            .map_err(|e| CaptureError::Stream(e.to_string()))
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}
