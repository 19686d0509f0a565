use embedded_graphics::mono_font::ascii::FONT_10X20;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::text::renderer::TextRenderer;
use embedded_graphics::text::{Baseline, Text};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use super::{Region, Surface, COORD_LIMIT};
use crate::frame::VisualFrame;

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// In-memory RGB canvas.
pub struct RasterSurface {
    canvas: RgbImage,
}

impl RasterSurface {
    pub fn new() -> Self {
        Self {
            canvas: RgbImage::new(0, 0),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.canvas
    }
}

impl Default for RasterSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// Intersect `region` with a `width` x `height` canvas. Computed in `i64`, so
/// any `Region` is accepted.
fn clip_to_canvas(region: Region, width: u32, height: u32) -> Option<Rect> {
    let left = (region.x as i64).max(0);
    let top = (region.y as i64).max(0);
    let right = (region.x as i64 + region.width as i64).min(width as i64);
    let bottom = (region.y as i64 + region.height as i64).min(height as i64);
    (right > left && bottom > top).then(|| {
        Rect::at(left as i32, top as i32).of_size((right - left) as u32, (bottom - top) as u32)
    })
}

/// A `Region` from `i64` geometry; `None` when it cannot be represented,
/// which only happens far off any canvas.
fn edge_region(x: i64, y: i64, width: i64, height: i64) -> Option<Region> {
    Some(Region {
        x: i32::try_from(x).ok()?,
        y: i32::try_from(y).ok()?,
        width: u32::try_from(width).ok()?,
        height: u32::try_from(height).ok()?,
    })
}

fn text_style(color: Rgb<u8>) -> MonoTextStyle<'static, Rgb888> {
    MonoTextStyle::new(&FONT_10X20, Rgb888::new(color[0], color[1], color[2]))
}

impl Surface for RasterSurface {
    fn resize(&mut self, width: u32, height: u32) {
        if self.canvas.dimensions() != (width, height) {
            self.canvas = RgbImage::new(width, height);
        }
    }

    fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = BACKGROUND;
        }
    }

    fn draw_frame(&mut self, frame: &VisualFrame) {
        image::imageops::replace(&mut self.canvas, frame.pixels(), 0, 0);
    }

    /// Stroke centered on the box edge, like a canvas `strokeRect`. Each ring
    /// is four one-pixel edges, so only the on-canvas part is ever touched.
    fn stroke_rect(&mut self, rect: Region, color: Rgb<u8>, line_width: u32) {
        let half = (line_width / 2) as i64;
        for i in 0..line_width as i64 {
            let d = i - half;
            let width = rect.width as i64 - 2 * d;
            let height = rect.height as i64 - 2 * d;
            if width <= 0 || height <= 0 {
                continue;
            }
            let (x, y) = (rect.x as i64 + d, rect.y as i64 + d);
            let edges = [
                (x, y, width, 1),
                (x, y + height - 1, width, 1),
                (x, y, 1, height),
                (x + width - 1, y, 1, height),
            ];
            for (ex, ey, ew, eh) in edges {
                if let Some(edge) = edge_region(ex, ey, ew, eh) {
                    self.fill_rect(edge, color);
                }
            }
        }
    }

    fn fill_rect(&mut self, rect: Region, color: Rgb<u8>) {
        let (width, height) = self.canvas.dimensions();
        if let Some(r) = clip_to_canvas(rect, width, height) {
            draw_filled_rect_mut(&mut self.canvas, r, color);
        }
    }

    fn measure_text(&self, text: &str) -> u32 {
        text_style(BACKGROUND)
            .measure_string(text, Point::zero(), Baseline::Alphabetic)
            .bounding_box
            .size
            .width
    }

    fn fill_text(&mut self, text: &str, x: i32, baseline_y: i32, color: Rgb<u8>) {
        let mut target = CanvasTarget {
            image: &mut self.canvas,
        };
        let _ = Text::with_baseline(
            text,
            Point::new(
                x.clamp(-COORD_LIMIT, COORD_LIMIT),
                baseline_y.clamp(-COORD_LIMIT, COORD_LIMIT),
            ),
            text_style(color),
            Baseline::Alphabetic,
        )
        .draw(&mut target);
    }
}

/// `embedded-graphics` draw target over the canvas, clipping to its bounds.
struct CanvasTarget<'a> {
    image: &'a mut RgbImage,
}

impl OriginDimensions for CanvasTarget<'_> {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for CanvasTarget<'_> {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let width = self.image.width() as i32;
        let height = self.image.height() as i32;
        for Pixel(coord, color) in pixels {
            if coord.x < 0 || coord.y < 0 || coord.x >= width || coord.y >= height {
                continue;
            }
            self.image
                .put_pixel(coord.x as u32, coord.y as u32, Rgb([color.r(), color.g(), color.b()]));
        }
        Ok(())
    }
}
