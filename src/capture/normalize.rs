use anyhow::{anyhow, Result};

/// Pixel layouts a V4L2 device may hand back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Nv12,
    Yuyv,
}

impl PixelFormat {
    fn expected_len(self, width: usize, height: usize) -> Option<usize> {
        let area = width.checked_mul(height)?;
        match self {
            PixelFormat::Rgb24 => area.checked_mul(3),
            PixelFormat::Nv12 => area.checked_add(area / 2),
            PixelFormat::Yuyv => area.checked_mul(2),
        }
    }
}

/// Convert a captured buffer to packed RGB24.
pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    let (w, h) = (width as usize, height as usize);
    let expected = format
        .expected_len(w, h)
        .ok_or_else(|| anyhow!("{:?} frame dimensions overflow", format))?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "{:?} frame too short: expected {}, got {}",
            format,
            expected,
            pixels.len()
        ));
    }
    let pixels = &pixels[..expected];
    Ok(match format {
        PixelFormat::Rgb24 => pixels.to_vec(),
        PixelFormat::Nv12 => {
            let y_plane = w * h;
            let mut rgb = Vec::with_capacity(y_plane * 3);
            for j in 0..h {
                for i in 0..w {
                    let uv = y_plane + (j / 2) * w + (i / 2) * 2;
                    push_yuv(&mut rgb, pixels[j * w + i], pixels[uv], pixels[uv + 1]);
                }
            }
            rgb
        }
        PixelFormat::Yuyv => {
            let mut rgb = Vec::with_capacity(w * h * 3);
            for quad in pixels.chunks_exact(4) {
                let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
                push_yuv(&mut rgb, y0, u, v);
                push_yuv(&mut rgb, y1, u, v);
            }
            rgb
        }
    })
}

// BT.601 full-range.
fn push_yuv(out: &mut Vec<u8>, y: u8, u: u8, v: u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    out.push(clamp_to_u8(y + 1.402 * v));
    out.push(clamp_to_u8(y - 0.344_136 * u - 0.714_136 * v));
    out.push(clamp_to_u8(y + 1.772 * u));
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
