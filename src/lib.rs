//! Capture, detect, overlay.
//!
//! This crate samples visuals from a live camera or an uploaded image, sends
//! them to a remote object-detection service, and paints the returned boxes
//! and labels over the visual.
//!
//! # Pipeline
//!
//! 1. **Capture**: `CaptureManager` owns the camera lifecycle; uploads are
//!    validated and decoded without touching any state.
//! 2. **Detect**: `DetectionClient` submits a frame (inline JPEG data URI for
//!    live, multipart file for uploads) and normalizes the reply.
//! 3. **Schedule**: `PollingScheduler` runs at most one cycle per source,
//!    drives live detection every two seconds, and drops stale results.
//! 4. **Render**: `render` repaints a `Surface` with the frame and its
//!    detections; `OverlayRenderer` keeps one surface per source.
//!
//! All shared state lives in `SessionContext`. `Pipeline` wires the pieces
//! together for a front end.
//!
//! # Module Structure
//!
//! - `frame`: immutable captured visuals (`VisualFrame`)
//! - `capture`: camera devices, the capture manager, upload validation
//! - `detect`: wire client, response normalization, the service trait
//! - `session`: shared state and cycle guards
//! - `input`: live and upload input sources
//! - `scheduler`: detection cycles and the live timer
//! - `render`: overlay algorithm and raster surface
//! - `pipeline`: the facade
//! - `config`, `error`, `ui`: configuration, error types, CLI progress

pub mod capture;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod input;
pub mod pipeline;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod ui;

pub use capture::{
    accept_upload, open_device, CaptureDevice, CaptureManager, FrameStream, SnapshotCamera,
    StreamHandle, SyntheticCamera, SyntheticConfig,
};
#[cfg(feature = "capture-v4l2")]
pub use capture::{V4l2Camera, V4l2Config};
pub use config::AppConfig;
pub use detect::{
    normalize_response, BoundingBox, Detection, DetectionClient, DetectionReply,
    DetectionService, ImageInfo, ServiceStatus, Submission,
};
pub use error::{CaptureError, DetectionError, ValidationError};
pub use frame::VisualFrame;
pub use input::{InputSource, LiveInput, SourceKind, UploadInput};
pub use pipeline::Pipeline;
pub use render::{render, OverlayRenderer, OverlayStyle, Presenter, RasterSurface, Region, Surface};
pub use scheduler::{CycleOutcome, PollingHandle, PollingScheduler, LIVE_POLL_INTERVAL};
pub use session::{CaptureState, CycleState, SessionContext, SessionSnapshot, UploadedVisual};
