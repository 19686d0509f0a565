mod backend;
mod client;
mod result;

pub use backend::{DetectionService, Submission};
pub use client::{
    encode_data_uri, DetectionClient, DETECT_INLINE_PATH, DETECT_UPLOAD_PATH, LIVE_JPEG_QUALITY,
    STATUS_PATH,
};
pub use result::{
    normalize_response, BoundingBox, Detection, DetectionReply, ImageInfo, ServiceStatus,
};
