//! V4L2 camera (feature: capture-v4l2).
//!
//! Opens a local device node such as `/dev/video0`, requests RGB24 (keeping
//! the device's NV12 or YUYV format when refused) through mmap streaming, and
//! normalizes each buffer to RGB.

use ouroboros::self_referencing;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{CaptureDevice, FrameStream};
use crate::error::CaptureError;
use crate::frame::VisualFrame;

#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
        }
    }
}

pub struct V4l2Camera {
    config: V4l2Config,
}

impl V4l2Camera {
    pub fn new(config: V4l2Config) -> Self {
        Self { config }
    }
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

struct V4l2Stream {
    device: String,
    state: Option<DeviceState>,
    format: PixelFormat,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl CaptureDevice for V4l2Camera {
    fn name(&self) -> String {
        self.config.device.clone()
    }

    fn open(&self) -> Result<Box<dyn FrameStream>, CaptureError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device).map_err(|err| {
            match err.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    CaptureError::PermissionDenied(format!("{}: {}", self.config.device, err))
                }
                _ => CaptureError::NoDevice(format!("{}: {}", self.config.device, err)),
            }
        })?;

        let mut format = device
            .format()
            .map_err(|e| CaptureError::Stream(format!("read v4l2 format: {}", e)))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");
        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Camera: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .map_err(|e| CaptureError::Stream(format!("read v4l2 format: {}", e)))?
            }
        };
        let pixel_format = match &format.fourcc.repr {
            b"RGB3" => PixelFormat::Rgb24,
            b"NV12" => PixelFormat::Nv12,
            b"YUYV" => PixelFormat::Yuyv,
            other => {
                return Err(CaptureError::Stream(format!(
                    "unsupported v4l2 pixel format {}",
                    String::from_utf8_lossy(other)
                )))
            }
        };

        let state = DeviceStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
            },
        }
        .try_build()
        .map_err(|e| CaptureError::Stream(format!("create v4l2 buffer stream: {}", e)))?;

        log::info!(
            "V4l2Camera: opened {} ({}x{})",
            self.config.device,
            format.width,
            format.height
        );
        Ok(Box::new(V4l2Stream {
            device: self.config.device.clone(),
            state: Some(state),
            format: pixel_format,
            width: format.width,
            height: format.height,
            frame_count: 0,
        }))
    }
}

impl FrameStream for V4l2Stream {
    fn current_frame(&mut self) -> Result<VisualFrame, CaptureError> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().ok_or(CaptureError::Inactive)?;
        let pixels = state
            .with_stream_mut(|stream| {
                let (buf, _meta) = stream.next()?;
                Ok::<Vec<u8>, std::io::Error>(buf.to_vec())
            })
            .map_err(|e| CaptureError::Stream(format!("capture v4l2 frame: {}", e)))?;
        let rgb = normalize_to_rgb(&pixels, self.width, self.height, self.format)
            .map_err(|e| CaptureError::Stream(e.to_string()))?;
        self.frame_count += 1;
        VisualFrame::from_rgb(self.width, self.height, rgb)
            .map_err(|e| CaptureError::Stream(e.to_string()))
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("V4l2Camera: released {}", self.device);
        }
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}
