use std::path::Path;

use crate::error::ValidationError;
use crate::frame::VisualFrame;

/// Validate an uploaded file and decode it.
///
/// The MIME type must denote an image; anything else is rejected before the
/// bytes are even looked at.
pub fn accept_upload(bytes: Vec<u8>, mime: &str) -> Result<VisualFrame, ValidationError> {
    let normalized = mime.trim().to_ascii_lowercase();
    if !normalized.starts_with("image/") {
        return Err(ValidationError::NotAnImage {
            mime: mime.to_string(),
        });
    }
    if bytes.is_empty() {
        return Err(ValidationError::Undecodable("file is empty".to_string()));
    }
    let frame = VisualFrame::decode(bytes, &normalized)?;
    log::debug!(
        "accepted upload {} ({}x{})",
        normalized,
        frame.width(),
        frame.height()
    );
    Ok(frame)
}

/// MIME type a file picker would report for `path`, from its extension.
pub fn mime_for_path(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "txt" => "text/plain",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
    .to_string()
}
