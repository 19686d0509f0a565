use crate::detect::result::DetectionReply;
use crate::error::DetectionError;
use crate::frame::VisualFrame;

/// How a frame is handed to the detection service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    /// JSON body carrying a JPEG data URI (live path).
    Inline,
    /// Multipart form, field `file`, original bytes (upload path).
    Multipart { filename: String },
}

/// Detection service seam.
///
/// The HTTP client is the production implementation; the scheduler only sees
/// this trait. Implementations do not retry: a failed call is reported once
/// and the next cycle is the retry.
pub trait DetectionService: Send + Sync {
    /// Submit one frame and return its normalized detections.
    fn detect(
        &self,
        frame: &VisualFrame,
        submission: &Submission,
    ) -> Result<DetectionReply, DetectionError>;
}
