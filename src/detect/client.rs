//! HTTP detection client.
//!
//! Talks to the external detection service over blocking HTTP:
//! - `POST /api/detect-base64`: JSON `{ "image": "data:image/jpeg;base64,..." }`
//! - `POST /api/detect-upload`: multipart form, field `file`
//! - `GET /api/status`: service health check
//!
//! Both detection endpoints share one response contract, normalized by
//! `normalize_response`. Nothing here retries.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::io::Read;
use std::time::Duration;

use crate::config::AppConfig;
use crate::detect::backend::{DetectionService, Submission};
use crate::detect::result::{error_message, normalize_response, DetectionReply, ServiceStatus};
use crate::error::DetectionError;
use crate::frame::VisualFrame;

pub const DETECT_INLINE_PATH: &str = "/api/detect-base64";
pub const DETECT_UPLOAD_PATH: &str = "/api/detect-upload";
pub const STATUS_PATH: &str = "/api/status";

/// JPEG quality for inline live-frame submission.
pub const LIVE_JPEG_QUALITY: u8 = 92;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_RESPONSE_BYTES: u64 = 8 * 1024 * 1024;

/// Blocking client for the detection service.
pub struct DetectionClient {
    base_url: String,
    agent: ureq::Agent,
}

impl DetectionClient {
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.api_base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Live path: JPEG-encode the frame and post it as a data URI.
    pub fn detect_inline(&self, frame: &VisualFrame) -> Result<DetectionReply, DetectionError> {
        let image = encode_data_uri(frame)?;
        log::debug!(
            "posting frame {} ({}x{}, {} bytes inline)",
            frame.id(),
            frame.width(),
            frame.height(),
            image.len()
        );
        let result = self
            .agent
            .post(&self.endpoint(DETECT_INLINE_PATH))
            .send_json(serde_json::json!({ "image": image }));
        read_detection_response(result)
    }

    /// Upload path: post the original file bytes as multipart field `file`.
    pub fn detect_upload(
        &self,
        frame: &VisualFrame,
        filename: &str,
    ) -> Result<DetectionReply, DetectionError> {
        let (bytes, mime) = match frame.encoded() {
            Some(encoded) => (encoded.bytes.clone(), encoded.mime.clone()),
            None => (
                frame
                    .encode_jpeg(LIVE_JPEG_QUALITY)
                    .map_err(|e| DetectionError::Encode(e.to_string()))?,
                "image/jpeg".to_string(),
            ),
        };
        let boundary = format!("----detect-overlay-{:016x}", rand::random::<u64>());
        let body = multipart_body(&boundary, "file", filename, &mime, &bytes);
        log::debug!(
            "uploading '{}' ({}x{}, {} bytes)",
            filename,
            frame.width(),
            frame.height(),
            bytes.len()
        );
        let result = self
            .agent
            .post(&self.endpoint(DETECT_UPLOAD_PATH))
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send_bytes(&body);
        read_detection_response(result)
    }

    /// Query `GET /api/status`.
    pub fn status(&self) -> Result<ServiceStatus, DetectionError> {
        let result = self.agent.get(&self.endpoint(STATUS_PATH)).call();
        let body = read_success_body(result)?;
        serde_json::from_slice(&body).map_err(|e| DetectionError::MalformedResponse(e.to_string()))
    }
}

impl DetectionService for DetectionClient {
    fn detect(
        &self,
        frame: &VisualFrame,
        submission: &Submission,
    ) -> Result<DetectionReply, DetectionError> {
        match submission {
            Submission::Inline => self.detect_inline(frame),
            Submission::Multipart { filename } => self.detect_upload(frame, filename),
        }
    }
}

/// `data:image/jpeg;base64,...` for a frame.
pub fn encode_data_uri(frame: &VisualFrame) -> Result<String, DetectionError> {
    let jpeg = frame
        .encode_jpeg(LIVE_JPEG_QUALITY)
        .map_err(|e| DetectionError::Encode(e.to_string()))?;
    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg)))
}

fn read_detection_response(
    result: Result<ureq::Response, ureq::Error>,
) -> Result<DetectionReply, DetectionError> {
    let body = read_success_body(result)?;
    normalize_response(&body)
}

fn read_success_body(
    result: Result<ureq::Response, ureq::Error>,
) -> Result<Vec<u8>, DetectionError> {
    match result {
        Ok(response) => {
            let code = response.status();
            let body = read_body(response)?;
            if !(200..300).contains(&code) {
                return Err(DetectionError::Status {
                    code,
                    message: status_message(&body),
                });
            }
            Ok(body)
        }
        Err(ureq::Error::Status(code, response)) => {
            let body = read_body(response).unwrap_or_default();
            Err(DetectionError::Status {
                code,
                message: status_message(&body),
            })
        }
        Err(ureq::Error::Transport(transport)) => {
            Err(DetectionError::Network(transport.to_string()))
        }
    }
}

fn read_body(response: ureq::Response) -> Result<Vec<u8>, DetectionError> {
    let mut body = Vec::new();
    response
        .into_reader()
        .take(MAX_RESPONSE_BYTES)
        .read_to_end(&mut body)
        .map_err(|e| DetectionError::Network(format!("read response body: {}", e)))?;
    Ok(body)
}

/// Prefer the service's own `error`/`detail` text on failures.
fn status_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        let reported = value
            .get("error")
            .or_else(|| value.get("detail"))
            .and_then(error_message);
        if let Some(message) = reported {
            return message;
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        "no response body".to_string()
    } else {
        text.chars().take(200).collect()
    }
}

fn multipart_body(boundary: &str, field: &str, filename: &str, mime: &str, bytes: &[u8]) -> Vec<u8> {
    let filename: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\r' | '\n' => '_',
            c => c,
        })
        .collect();
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
