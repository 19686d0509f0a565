use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use image::{ImageFormat, Rgb, RgbImage};

use detect_overlay::{
    accept_upload, DetectionClient, DetectionError, DetectionService, Submission, VisualFrame,
};

struct Captured {
    head: String,
    body: Vec<u8>,
}

impl Captured {
    fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn read_request(stream: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).expect("read request");
        assert!(n > 0, "connection closed before headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut captured = Captured {
        head,
        body: Vec::new(),
    };
    let length = captured
        .header("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = stream.read(&mut chunk).expect("read body");
        assert!(n > 0, "connection closed before body");
        buf.extend_from_slice(&chunk[..n]);
    }
    captured.body = buf[header_end..header_end + length].to_vec();
    captured
}

/// Serve exactly one canned HTTP response on a loopback port.
fn serve_once(status: &str, body: &str) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let captured = read_request(&mut stream);
        stream.write_all(response.as_bytes()).expect("write response");
        captured
    });
    (format!("http://{}", addr), handle)
}

fn live_frame() -> VisualFrame {
    VisualFrame::from_image(RgbImage::from_pixel(64, 48, Rgb([120, 80, 40])))
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    RgbImage::from_pixel(width, height, Rgb([10, 200, 30]))
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

#[test]
fn inline_detection_posts_data_uri_and_parses_reply() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"detections":[{"box":{"x":10,"y":10,"width":50,"height":50},"label":"helmet","confidence":0.92}]}"#,
    );
    let client = DetectionClient::new(&format!("{}/", base));
    let reply = client
        .detect(&live_frame(), &Submission::Inline)
        .expect("detect");
    let request = server.join().expect("server thread");

    assert_eq!(request.request_line(), "POST /api/detect-base64 HTTP/1.1");
    assert!(request
        .header("content-type")
        .unwrap_or_default()
        .starts_with("application/json"));
    let json: serde_json::Value = serde_json::from_slice(&request.body).expect("json body");
    let image = json["image"].as_str().expect("image field");
    assert!(image.starts_with("data:image/jpeg;base64,"));

    assert_eq!(reply.detections.len(), 1);
    assert_eq!(reply.detections[0].caption(), "helmet (92.0%)");
}

#[test]
fn upload_detection_sends_original_bytes_as_multipart() {
    let png = png_bytes(6, 4);
    let frame = accept_upload(png.clone(), "image/png").expect("accept png");
    let (base, server) = serve_once(
        "200 OK",
        r#"{"detections":[],"image_info":{"width":6,"height":4,"filename":"site.png"}}"#,
    );
    let client = DetectionClient::new(&base);
    let reply = client
        .detect(
            &frame,
            &Submission::Multipart {
                filename: "site.png".to_string(),
            },
        )
        .expect("detect");
    let request = server.join().expect("server thread");

    assert_eq!(request.request_line(), "POST /api/detect-upload HTTP/1.1");
    let content_type = request.header("content-type").unwrap_or_default();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    let body = &request.body;
    assert!(find(body, b"name=\"file\"; filename=\"site.png\"").is_some());
    assert!(find(body, b"Content-Type: image/png").is_some());
    assert!(find(body, &png).is_some());

    assert!(reply.detections.is_empty());
    let info = reply.image_info.expect("image info");
    assert_eq!((info.width, info.height), (6, 4));
}

#[test]
fn service_error_field_is_reported_verbatim() {
    let (base, server) = serve_once("200 OK", r#"{"error":"invalid image","detections":[]}"#);
    let client = DetectionClient::new(&base);
    let err = client
        .detect(&live_frame(), &Submission::Inline)
        .expect_err("service error");
    server.join().expect("server thread");
    assert!(matches!(err, DetectionError::Service(_)));
    assert_eq!(err.to_string(), "invalid image");
}

#[test]
fn missing_detections_field_is_an_empty_list() {
    let (base, server) = serve_once("200 OK", r#"{"status":"ok"}"#);
    let client = DetectionClient::new(&base);
    let reply = client
        .detect(&live_frame(), &Submission::Inline)
        .expect("detect");
    server.join().expect("server thread");
    assert!(reply.detections.is_empty());
}

#[test]
fn non_success_status_carries_service_detail() {
    let (base, server) = serve_once(
        "503 Service Unavailable",
        r#"{"detail":"model not loaded"}"#,
    );
    let client = DetectionClient::new(&base);
    let err = client
        .detect(&live_frame(), &Submission::Inline)
        .expect_err("status error");
    server.join().expect("server thread");
    match err {
        DetectionError::Status { code, message } => {
            assert_eq!(code, 503);
            assert_eq!(message, "model not loaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn malformed_body_is_rejected() {
    let (base, server) = serve_once("200 OK", "<html>proxy</html>");
    let client = DetectionClient::new(&base);
    let err = client
        .detect(&live_frame(), &Submission::Inline)
        .expect_err("malformed");
    server.join().expect("server thread");
    assert!(matches!(err, DetectionError::MalformedResponse(_)));
}

#[test]
fn unreachable_service_is_a_network_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let client = DetectionClient::new(&format!("http://127.0.0.1:{}", port));
    let err = client
        .detect(&live_frame(), &Submission::Inline)
        .expect_err("network error");
    assert!(matches!(err, DetectionError::Network(_)));
    assert!(err.to_string().starts_with("error detecting objects:"));
}

#[test]
fn status_reads_service_health() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"status":"ready","model":"yolov8n"}"#,
    );
    let client = DetectionClient::new(&base);
    let status = client.status().expect("status");
    let request = server.join().expect("server thread");
    assert_eq!(request.request_line(), "GET /api/status HTTP/1.1");
    assert_eq!(status.status, "ready");
    assert_eq!(status.model.as_deref(), Some("yolov8n"));
    assert!(status.message.is_none());
}
