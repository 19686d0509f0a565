use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DetectionError;

/// Pixel-space box, origin top-left, in the coordinate space of the submitted frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One recognized object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub label: String,
    /// Always within [0, 1] after normalization.
    pub confidence: f64,
}

impl Detection {
    /// Overlay caption, e.g. `helmet (92.0%)`.
    pub fn caption(&self) -> String {
        format!("{} ({:.1}%)", self.label, self.confidence * 100.0)
    }

    /// Listing line, e.g. `helmet - Confidence: 92.0%`.
    pub fn summary_line(&self) -> String {
        format!("{} - Confidence: {:.1}%", self.label, self.confidence * 100.0)
    }
}

/// Image metadata echoed by the upload endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Normalized service answer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionReply {
    /// Service order, unsorted and not deduplicated.
    pub detections: Vec<Detection>,
    pub image_info: Option<ImageInfo>,
}

/// `GET /api/status` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    #[serde(default)]
    detections: Option<Vec<Detection>>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    image_info: Option<ImageInfo>,
}

/// Normalize a detection response body.
///
/// - A present, non-empty `error` wins over everything else, even when
///   `detections` is also present.
/// - A missing or null `detections` field is an empty list.
/// - Confidences are clamped into [0, 1].
pub fn normalize_response(body: &[u8]) -> Result<DetectionReply, DetectionError> {
    let response: ServiceResponse = serde_json::from_slice(body)
        .map_err(|e| DetectionError::MalformedResponse(e.to_string()))?;

    if let Some(message) = response.error.as_ref().and_then(error_message) {
        return Err(DetectionError::Service(message));
    }

    let mut detections = response.detections.unwrap_or_default();
    for detection in &mut detections {
        if !detection.confidence.is_finite() {
            return Err(DetectionError::MalformedResponse(format!(
                "non-finite confidence for '{}'",
                detection.label
            )));
        }
        detection.confidence = detection.confidence.clamp(0.0, 1.0);
    }

    Ok(DetectionReply {
        detections,
        image_info: response.image_info,
    })
}

/// Pull a readable message out of an `error` body, if the body carries one.
pub(crate) fn error_message(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("detail"))
            .and_then(error_message)
            .or_else(|| Some(value.to_string())),
        other => Some(other.to_string()),
    }
}
