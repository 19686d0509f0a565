use image::{Rgb, RgbImage};

use detect_overlay::render::{LABEL_HEIGHT, LABEL_PADDING};
use detect_overlay::{
    render, BoundingBox, Detection, OverlayRenderer, OverlayStyle, RasterSurface, Region, Surface,
    VisualFrame,
};

#[derive(Clone, Debug, PartialEq)]
enum Op {
    Resize(u32, u32),
    Clear,
    Frame(u64),
    Stroke(Region, Rgb<u8>, u32),
    Fill(Region, Rgb<u8>),
    Text(String, i32, i32, Rgb<u8>),
}

/// Records draw calls; text is 7px per character.
#[derive(Default)]
struct RecordingSurface {
    ops: Vec<Op>,
}

impl Surface for RecordingSurface {
    fn resize(&mut self, width: u32, height: u32) {
        self.ops.push(Op::Resize(width, height));
    }

    fn clear(&mut self) {
        self.ops.push(Op::Clear);
    }

    fn draw_frame(&mut self, frame: &VisualFrame) {
        self.ops.push(Op::Frame(frame.id()));
    }

    fn stroke_rect(&mut self, rect: Region, color: Rgb<u8>, line_width: u32) {
        self.ops.push(Op::Stroke(rect, color, line_width));
    }

    fn fill_rect(&mut self, rect: Region, color: Rgb<u8>) {
        self.ops.push(Op::Fill(rect, color));
    }

    fn measure_text(&self, text: &str) -> u32 {
        7 * text.chars().count() as u32
    }

    fn fill_text(&mut self, text: &str, x: i32, baseline_y: i32, color: Rgb<u8>) {
        self.ops.push(Op::Text(text.to_string(), x, baseline_y, color));
    }
}

fn detection(x: f64, y: f64, w: f64, h: f64, label: &str, confidence: f64) -> Detection {
    Detection {
        bbox: BoundingBox {
            x,
            y,
            width: w,
            height: h,
        },
        label: label.to_string(),
        confidence,
    }
}

fn region(x: i32, y: i32, width: u32, height: u32) -> Region {
    Region {
        x,
        y,
        width,
        height,
    }
}

#[test]
fn helmet_scenario_draws_box_label_and_caption() {
    let frame = VisualFrame::from_image(RgbImage::new(640, 480));
    let mut surface = RecordingSurface::default();
    let helmet = detection(10.0, 10.0, 50.0, 50.0, "helmet", 0.92);

    render(&mut surface, &frame, &[helmet], &OverlayStyle::LIVE);

    let green = Rgb([0, 255, 0]);
    let caption = "helmet (92.0%)";
    assert_eq!(
        surface.ops,
        vec![
            Op::Resize(640, 480),
            Op::Clear,
            Op::Frame(frame.id()),
            Op::Stroke(region(10, 10, 50, 50), green, 2),
            Op::Fill(region(10, -15, 7 * 14 + LABEL_PADDING, LABEL_HEIGHT), green),
            Op::Text(caption.to_string(), 15, 0, Rgb([0, 0, 0])),
        ]
    );
}

#[test]
fn detections_are_drawn_in_service_order_without_dedup() {
    let frame = VisualFrame::from_image(RgbImage::new(100, 100));
    let mut surface = RecordingSurface::default();
    let dets = [
        detection(40.0, 40.0, 10.0, 10.0, "b", 0.5),
        detection(40.0, 40.0, 10.0, 10.0, "b", 0.5),
        detection(0.0, 30.0, 5.0, 5.0, "a", 0.999),
    ];

    render(&mut surface, &frame, &dets, &OverlayStyle::UPLOAD);

    let captions: Vec<_> = surface
        .ops
        .iter()
        .filter_map(|op| match op {
            Op::Text(text, _, _, color) => {
                assert_eq!(*color, Rgb([255, 255, 255]));
                Some(text.as_str())
            }
            _ => None,
        })
        .collect();
    assert_eq!(captions, vec!["b (50.0%)", "b (50.0%)", "a (99.9%)"]);
    let strokes = surface
        .ops
        .iter()
        .filter(|op| matches!(op, Op::Stroke(_, c, _) if *c == Rgb([0xff, 0x6b, 0x35])))
        .count();
    assert_eq!(strokes, 3);
}

#[test]
fn empty_detections_paint_the_bare_frame() {
    let mut pixels = RgbImage::new(32, 24);
    for (x, y, p) in pixels.enumerate_pixels_mut() {
        *p = Rgb([x as u8 * 7, y as u8 * 9, 100]);
    }
    let frame = VisualFrame::from_image(pixels.clone());
    let mut surface = RasterSurface::new();

    // Same frame with a box first, so the second paint must erase it.
    render(
        &mut surface,
        &frame,
        &[detection(5.0, 8.0, 12.0, 10.0, "cup", 0.4)],
        &OverlayStyle::LIVE,
    );
    assert_ne!(surface.image(), &pixels);
    render(&mut surface, &frame, &[], &OverlayStyle::LIVE);

    assert_eq!(surface.image(), &pixels);
}

#[test]
fn raster_label_sits_above_the_box() {
    let frame = VisualFrame::from_image(RgbImage::new(200, 120));
    let mut surface = RasterSurface::new();
    let helmet = detection(20.0, 40.0, 60.0, 50.0, "helmet", 0.92);

    render(&mut surface, &frame, &[helmet], &OverlayStyle::LIVE);

    let img = surface.image();
    let green = Rgb([0, 255, 0]);
    // Box edge.
    assert_eq!(img.get_pixel(20, 60), &green);
    // Label background: x 20..170 (140 text + 10 padding), y 15..35.
    assert_eq!(img.get_pixel(165, 16), &green);
    assert_eq!(img.get_pixel(171, 16), &Rgb([0, 0, 0]));
    // Box interior untouched.
    assert_eq!(img.get_pixel(50, 65), &Rgb([0, 0, 0]));
}

#[test]
fn renderer_writes_png_of_painted_canvas() {
    let renderer = OverlayRenderer::new(RasterSurface::new(), OverlayStyle::UPLOAD);
    let frame = VisualFrame::from_image(RgbImage::from_pixel(30, 20, Rgb([4, 5, 6])));
    renderer.render(&frame, &[detection(3.0e9, -3.0e9, 1.0e9, 1.0e9, "far", 0.3)]);

    let dir = tempfile::tempdir().expect("temp dir");
    let out = dir.path().join("overlay.png");
    renderer.save_png(&out).expect("save overlay");

    let written = image::open(&out).expect("read overlay").to_rgb8();
    assert_eq!(written, renderer.image());
}
