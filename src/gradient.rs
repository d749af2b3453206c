//! Gradient complement, gated by the `gradient-complement` Cargo feature: a
//! per-pixel Sobel gradient magnitude, folded into the matcher's color or
//! descriptor distance to make the model more sensitive to edge motion.

use crate::frame::Frame;
use image::{GrayImage, Luma};

const SOBEL_X: [[i32; 3]; 3] = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];
const SOBEL_Y: [[i32; 3]; 3] = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

/// Per-pixel luma used as the gradient input for both grayscale and
/// 3-channel frames.
#[inline]
fn luma(frame: &Frame, x: u32, y: u32) -> u8 {
    match frame {
        Frame::Gray(_) => frame.channel(x, y, 0),
        Frame::Rgb(_) => {
            let [r, g, b] = frame.pixel(x, y);
            ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
        }
    }
}

/// Sobel gradient magnitude image, clamped to `u8`, border-replicated.
pub fn sobel_magnitude(frame: &Frame) -> GrayImage {
    let (w, h) = (frame.width(), frame.height());
    let mut out = GrayImage::new(w, h);
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let mut gx = 0i32;
            let mut gy = 0i32;
            for (ky, row) in SOBEL_X.iter().enumerate() {
                for (kx, weight) in row.iter().enumerate() {
                    let sx = (x + kx as i32 - 1).clamp(0, w as i32 - 1) as u32;
                    let sy = (y + ky as i32 - 1).clamp(0, h as i32 - 1) as u32;
                    let v = luma(frame, sx, sy) as i32;
                    gx += weight * v;
                    gy += SOBEL_Y[ky][kx] * v;
                }
            }
            let mag = ((gx * gx + gy * gy) as f64).sqrt();
            out.put_pixel(x as u32, y as u32, Luma([mag.min(255.0) as u8]));
        }
    }
    out
}
