//! Pipeline error kinds.
//!
//! Each kind is recovered by the pipeline into the session's single
//! user-visible message slot; none of them propagate past `Pipeline`.

use thiserror::Error;

/// Live device acquisition or sampling failure.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera access denied: {0}")]
    PermissionDenied(String),

    #[error("no camera available: {0}")]
    NoDevice(String),

    #[error("live capture is not active")]
    Inactive,

    #[error("camera stream error: {0}")]
    Stream(String),
}

/// Upload rejected before any request is sent.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unsupported file type '{mime}': please upload an image")]
    NotAnImage { mime: String },

    #[error("could not decode uploaded image: {0}")]
    Undecodable(String),
}

/// Failure talking to, or reported by, the detection service.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("error detecting objects: {0}")]
    Network(String),

    #[error("detection service returned status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("malformed detection response: {0}")]
    MalformedResponse(String),

    /// Message reported by the service in its `error` field, shown verbatim.
    #[error("{0}")]
    Service(String),

    #[error("could not encode frame: {0}")]
    Encode(String),
}

impl From<image::ImageError> for ValidationError {
    fn from(err: image::ImageError) -> Self {
        ValidationError::Undecodable(err.to_string())
    }
}
