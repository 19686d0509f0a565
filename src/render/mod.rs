//! Overlay rendering.
//!
//! `render` paints one frame and its detections onto a `Surface`:
//! 1. resize the surface to the frame's native size and clear it
//! 2. paint the frame as background
//! 3. per detection, in service order: stroked box, filled label background
//!    directly above the box, then the caption text
//!
//! Live and upload presentations share this algorithm and differ only in
//! `OverlayStyle`. Nothing is sorted or deduplicated; overlapping boxes stack.

mod raster;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::detect::Detection;
use crate::frame::VisualFrame;

pub use raster::RasterSurface;

pub const LINE_WIDTH: u32 = 2;
/// Label background top edge, measured up from the box top.
pub const LABEL_OFFSET: i32 = 25;
pub const LABEL_HEIGHT: u32 = 20;
/// Added to the measured caption width.
pub const LABEL_PADDING: u32 = 10;
pub const TEXT_INSET: i32 = 5;
/// Caption baseline, measured up from the box top.
pub const TEXT_BASELINE_OFFSET: i32 = 10;

/// Integer pixel rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// A drawable presentation surface.
pub trait Surface: Send {
    /// Set the pixel size. May discard current content.
    fn resize(&mut self, width: u32, height: u32);

    /// Erase all paint.
    fn clear(&mut self);

    /// Paint `frame` at the origin.
    fn draw_frame(&mut self, frame: &VisualFrame);

    fn stroke_rect(&mut self, rect: Region, color: Rgb<u8>, line_width: u32);

    fn fill_rect(&mut self, rect: Region, color: Rgb<u8>);

    /// Rendered width of `text` in pixels.
    fn measure_text(&self, text: &str) -> u32;

    /// Draw `text` with its alphabetic baseline at `baseline_y`.
    fn fill_text(&mut self, text: &str, x: i32, baseline_y: i32, color: Rgb<u8>);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayStyle {
    pub stroke: Rgb<u8>,
    pub label_fill: Rgb<u8>,
    pub text: Rgb<u8>,
    pub line_width: u32,
}

impl OverlayStyle {
    pub const LIVE: OverlayStyle = OverlayStyle {
        stroke: Rgb([0x00, 0xff, 0x00]),
        label_fill: Rgb([0x00, 0xff, 0x00]),
        text: Rgb([0x00, 0x00, 0x00]),
        line_width: LINE_WIDTH,
    };

    pub const UPLOAD: OverlayStyle = OverlayStyle {
        stroke: Rgb([0xff, 0x6b, 0x35]),
        label_fill: Rgb([0xff, 0x6b, 0x35]),
        text: Rgb([0xff, 0xff, 0xff]),
        line_width: LINE_WIDTH,
    };
}

/// Box coordinates are clamped into `[-COORD_LIMIT, COORD_LIMIT]` and sizes
/// into `[0, 2 * COORD_LIMIT]`, far off any real canvas but clear of `i32`
/// overflow in the label and stroke arithmetic.
pub const COORD_LIMIT: i32 = 1 << 24;

/// Pixel rectangle for a detection box; fractional coordinates are rounded.
pub fn box_region(detection: &Detection) -> Region {
    let b = &detection.bbox;
    let limit = COORD_LIMIT as f64;
    let coord = |v: f64| v.round().clamp(-limit, limit) as i32;
    let size = |v: f64| v.round().clamp(0.0, 2.0 * limit) as u32;
    Region {
        x: coord(b.x),
        y: coord(b.y),
        width: size(b.width),
        height: size(b.height),
    }
}

/// Paint `frame` plus `detections` onto `surface`, replacing everything on it.
pub fn render(
    surface: &mut dyn Surface,
    frame: &VisualFrame,
    detections: &[Detection],
    style: &OverlayStyle,
) {
    surface.resize(frame.width(), frame.height());
    surface.clear();
    surface.draw_frame(frame);

    for detection in detections {
        let region = box_region(detection);
        surface.stroke_rect(region, style.stroke, style.line_width);

        let caption = detection.caption();
        let text_width = surface.measure_text(&caption);
        let label = Region {
            x: region.x,
            y: region.y.saturating_sub(LABEL_OFFSET),
            width: text_width.saturating_add(LABEL_PADDING),
            height: LABEL_HEIGHT,
        };
        surface.fill_rect(label, style.label_fill);
        surface.fill_text(
            &caption,
            region.x.saturating_add(TEXT_INSET),
            region.y.saturating_sub(TEXT_BASELINE_OFFSET),
            style.text,
        );
    }
}

/// Receives committed `(frame, detections)` pairs from the scheduler.
pub trait Presenter: Send + Sync {
    fn present(&self, frame: &VisualFrame, detections: &[Detection]);
}

struct RendererState<S> {
    surface: S,
    frame_id: Option<u64>,
    renders: u64,
}

/// A surface plus its style, safe to share between the scheduler and readers.
pub struct OverlayRenderer<S: Surface> {
    state: Mutex<RendererState<S>>,
    style: OverlayStyle,
}

impl<S: Surface> OverlayRenderer<S> {
    pub fn new(surface: S, style: OverlayStyle) -> Self {
        Self {
            state: Mutex::new(RendererState {
                surface,
                frame_id: None,
                renders: 0,
            }),
            style,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RendererState<S>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn render(&self, frame: &VisualFrame, detections: &[Detection]) {
        let mut state = self.lock();
        render(&mut state.surface, frame, detections, &self.style);
        state.frame_id = Some(frame.id());
        state.renders += 1;
    }

    /// Id of the frame currently painted, if any.
    pub fn rendered_frame_id(&self) -> Option<u64> {
        self.lock().frame_id
    }

    pub fn render_count(&self) -> u64 {
        self.lock().renders
    }

    /// Run `f` against the surface while no render can interleave.
    ///
    /// The renderer lock is held for the whole of `f`, and commits take it
    /// while holding the session lock. `f` must not touch the session
    /// (`Pipeline::snapshot`, `SessionContext::*`) or it can deadlock against
    /// a commit.
    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.lock().surface)
    }
}

impl OverlayRenderer<RasterSurface> {
    /// Copy of the painted canvas. The lock is released before returning.
    pub fn image(&self) -> RgbImage {
        self.lock().surface.image().clone()
    }

    /// Write the painted canvas as PNG without holding the renderer lock
    /// during file I/O.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let image = self.image();
        image
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("write overlay to {}", path.display()))
    }
}

impl<S: Surface> Presenter for OverlayRenderer<S> {
    fn present(&self, frame: &VisualFrame, detections: &[Detection]) {
        self.render(frame, detections);
    }
}
