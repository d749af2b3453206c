//! Post-processing: median-blur smoothing of the raw mask, plus the optional
//! hole-filling / morphology / blink-suppression pass.

use image::{GrayImage, Luma};

const KERNEL: i32 = 9;
const KERNEL_RADIUS: i32 = KERNEL / 2;

/// 9x9 median blur over a single-channel mask, clamping at the border.
pub fn median_blur_9x9(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    let mut out = GrayImage::new(w, h);
    let mut window = [0u8; (KERNEL * KERNEL) as usize];
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let mut i = 0;
            for dy in -KERNEL_RADIUS..=KERNEL_RADIUS {
                let sy = (y + dy).clamp(0, h as i32 - 1) as u32;
                for dx in -KERNEL_RADIUS..=KERNEL_RADIUS {
                    let sx = (x + dx).clamp(0, w as i32 - 1) as u32;
                    window[i] = mask.get_pixel(sx, sy).0[0];
                    i += 1;
                }
            }
            window.sort_unstable();
            out.put_pixel(x as u32, y as u32, Luma([window[window.len() / 2]]));
        }
    }
    out
}

/// 3x3 binary erosion: a pixel survives only if all 8 neighbors (+ itself)
/// are foreground.
fn erode_3x3(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    let mut out = GrayImage::new(w, h);
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let mut all_fg = true;
            'nbrs: for dy in -1..=1 {
                for dx in -1..=1 {
                    let sx = x + dx;
                    let sy = y + dy;
                    let fg = sx >= 0
                        && sy >= 0
                        && sx < w as i32
                        && sy < h as i32
                        && mask.get_pixel(sx as u32, sy as u32).0[0] != 0;
                    if !fg {
                        all_fg = false;
                        break 'nbrs;
                    }
                }
            }
            out.put_pixel(x as u32, y as u32, Luma([if all_fg { 255 } else { 0 }]));
        }
    }
    out
}

/// 3x3 binary dilation: a pixel becomes foreground if any of its 8
/// neighbors (or itself) is foreground.
fn dilate_3x3(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    let mut out = GrayImage::new(w, h);
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let mut any_fg = false;
            'nbrs: for dy in -1..=1 {
                for dx in -1..=1 {
                    let sx = x + dx;
                    let sy = y + dy;
                    if sx >= 0
                        && sy >= 0
                        && sx < w as i32
                        && sy < h as i32
                        && mask.get_pixel(sx as u32, sy as u32).0[0] != 0
                    {
                        any_fg = true;
                        break 'nbrs;
                    }
                }
            }
            out.put_pixel(x as u32, y as u32, Luma([if any_fg { 255 } else { 0 }]));
        }
    }
    out
}

/// Flood-fills background from the mask border to find the exterior
/// region, then marks any background pixel *not* reached by that flood
/// (an interior hole) as foreground.
fn fill_holes(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    let mut reached = vec![false; (w as usize) * (h as usize)];
    let idx = |x: u32, y: u32| (y as usize) * (w as usize) + (x as usize);
    let mut stack: Vec<(u32, u32)> = Vec::new();

    let is_bg = |x: u32, y: u32| mask.get_pixel(x, y).0[0] == 0;

    for x in 0..w {
        for &y in &[0, h.saturating_sub(1)] {
            if is_bg(x, y) && !reached[idx(x, y)] {
                reached[idx(x, y)] = true;
                stack.push((x, y));
            }
        }
    }
    for y in 0..h {
        for &x in &[0, w.saturating_sub(1)] {
            if is_bg(x, y) && !reached[idx(x, y)] {
                reached[idx(x, y)] = true;
                stack.push((x, y));
            }
        }
    }

    while let Some((x, y)) = stack.pop() {
        let neighbors = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbors {
            if nx < w && ny < h && is_bg(nx, ny) && !reached[idx(nx, ny)] {
                reached[idx(nx, ny)] = true;
                stack.push((nx, ny));
            }
        }
    }

    let mut out = mask.clone();
    for y in 0..h {
        for x in 0..w {
            if is_bg(x, y) && !reached[idx(x, y)] {
                out.put_pixel(x, y, Luma([255]));
            }
        }
    }
    out
}

/// Hole-filling plus open-then-close 3x3 morphology.
pub fn advanced_morphology(mask: &GrayImage) -> GrayImage {
    let filled = fill_holes(mask);
    let opened = dilate_3x3(&erode_3x3(&filled));
    erode_3x3(&dilate_3x3(&opened))
}

/// Pixels that flipped state between `current` and `last`, used to
/// suppress those pixels from influencing the model update this frame.
pub fn detect_blinking(current: &GrayImage, last: &GrayImage) -> GrayImage {
    debug_assert_eq!(current.dimensions(), last.dimensions());
    let (w, h) = current.dimensions();
    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let a = current.get_pixel(x, y).0[0];
            let b = last.get_pixel(x, y).0[0];
            out.put_pixel(x, y, Luma([if a != b { 255 } else { 0 }]));
        }
    }
    out
}
