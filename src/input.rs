//! Input sources.
//!
//! The live camera and the uploaded image run the same detection cycle and
//! the same overlay algorithm. They differ only in where the frame comes
//! from, how it is submitted, and what may trigger a cycle (timer or manual
//! for live, manual only for uploads).

use std::sync::Arc;

use crate::capture::CaptureManager;
use crate::detect::Submission;
use crate::error::CaptureError;
use crate::frame::VisualFrame;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Live,
    Upload,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Live => f.write_str("live"),
            SourceKind::Upload => f.write_str("upload"),
        }
    }
}

/// A place the scheduler can pull one frame from.
pub trait InputSource {
    fn kind(&self) -> SourceKind;

    /// Snapshot the visual to run a cycle against.
    fn current_frame(&self) -> Result<VisualFrame, CaptureError>;

    /// Wire encoding used for this source.
    fn submission(&self) -> Submission;

    /// Name recorded with a committed upload.
    fn filename(&self) -> Option<&str> {
        None
    }
}

/// The running camera, sampled on demand.
#[derive(Clone)]
pub struct LiveInput {
    capture: Arc<CaptureManager>,
}

impl LiveInput {
    pub fn new(capture: Arc<CaptureManager>) -> Self {
        Self { capture }
    }
}

impl InputSource for LiveInput {
    fn kind(&self) -> SourceKind {
        SourceKind::Live
    }

    fn current_frame(&self) -> Result<VisualFrame, CaptureError> {
        self.capture.snapshot()
    }

    fn submission(&self) -> Submission {
        Submission::Inline
    }
}

/// An accepted, not yet committed upload.
pub struct UploadInput {
    frame: VisualFrame,
    filename: String,
}

impl UploadInput {
    pub fn new(frame: VisualFrame, filename: impl Into<String>) -> Self {
        Self {
            frame,
            filename: filename.into(),
        }
    }
}

impl InputSource for UploadInput {
    fn kind(&self) -> SourceKind {
        SourceKind::Upload
    }

    fn current_frame(&self) -> Result<VisualFrame, CaptureError> {
        Ok(self.frame.clone())
    }

    fn submission(&self) -> Submission {
        Submission::Multipart {
            filename: self.filename.clone(),
        }
    }

    fn filename(&self) -> Option<&str> {
        Some(&self.filename)
    }
}
