//! The LBSP descriptor extractor.
//!
//! Computes a 16-bit binary code per pixel per channel: bit `i` is set iff
//! the neighbor at the fixed pattern offset `i` differs from a reference
//! intensity by more than a threshold.
//!
//! ## Pattern layout
//!
//! A canonical offset ordering must be fixed and documented, since
//! descriptors extracted under different orderings are not comparable. This
//! implementation uses the outer ring of the 5x5 window at Chebyshev
//! distance exactly 2 from the center (16 cells by construction), ordered
//! clockwise starting at `(-2, 0)`.
use crate::config::LbspThreshold;
use crate::distance::absdiff;
use crate::frame::Frame;

/// Half-width of the square window the descriptor is computed over.
pub const RADIUS: i32 = 2;
/// Side length of the window (2*RADIUS + 1).
pub const PATCH_SIZE: i32 = 2 * RADIUS + 1;

/// The 16 fixed `(dx, dy)` offsets, bit `i` of the descriptor corresponds to
/// `PATTERN[i]`.
pub const PATTERN: [(i8, i8); 16] = [
    (-2, 0),
    (-2, -1),
    (-2, -2),
    (-1, -2),
    (0, -2),
    (1, -2),
    (2, -2),
    (2, -1),
    (2, 0),
    (2, 1),
    (2, 2),
    (1, 2),
    (0, 2),
    (-1, 2),
    (-2, 2),
    (-2, 1),
];

/// Resolves the effective 8-bit threshold for a given reference intensity,
/// applying the single-channel modulation factor.
#[inline]
pub fn resolve_threshold(mode: LbspThreshold, reference: u8, modulation: f32) -> u8 {
    let raw = match mode {
        LbspThreshold::Absolute(t) => t as f32 * modulation,
        LbspThreshold::Relative(ratio) => ratio * modulation * reference as f32,
    };
    raw.round().clamp(0.0, 255.0) as u8
}

/// Computes the 16-bit descriptor for a single channel, sampling neighbor
/// values from `neighbor_source` around `(x, y)` and comparing each to
/// `reference`.
///
/// `(x, y)` must be at least `RADIUS` away from every border of
/// `neighbor_source`; callers are expected to only invoke this on positions
/// drawn from a pruned keypoint set.
#[inline]
pub fn descriptor_channel(
    neighbor_source: &Frame,
    channel: u8,
    x: u32,
    y: u32,
    reference: u8,
    threshold: u8,
) -> u16 {
    let mut desc: u16 = 0;
    for (i, (dx, dy)) in PATTERN.iter().enumerate() {
        let nx = (x as i32 + *dx as i32) as u32;
        let ny = (y as i32 + *dy as i32) as u32;
        let neighbor = neighbor_source.channel(nx, ny, channel);
        if absdiff(neighbor, reference) > threshold as u16 {
            desc |= 1 << i;
        }
    }
    desc
}

/// Grayscale convenience wrapper (channel 0).
#[inline]
pub fn descriptor_gray(neighbor_source: &Frame, x: u32, y: u32, reference: u8, threshold: u8) -> u16 {
    descriptor_channel(neighbor_source, 0, x, y, reference, threshold)
}

/// Per-channel descriptor for a 3-channel frame.
#[inline]
pub fn descriptor_rgb(
    neighbor_source: &Frame,
    x: u32,
    y: u32,
    reference: [u8; 3],
    threshold: [u8; 3],
) -> [u16; 3] {
    [
        descriptor_channel(neighbor_source, 0, x, y, reference[0], threshold[0]),
        descriptor_channel(neighbor_source, 1, x, y, reference[1], threshold[1]),
        descriptor_channel(neighbor_source, 2, x, y, reference[2], threshold[2]),
    ]
}

/// True when `(x, y)`'s full pattern window fits inside a `width x height`
/// image.
#[inline]
pub fn window_fits(x: u32, y: u32, width: u32, height: u32) -> bool {
    x as i32 - RADIUS >= 0
        && y as i32 - RADIUS >= 0
        && x as i32 + RADIUS < width as i32
        && y as i32 + RADIUS < height as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn pattern_has_sixteen_unique_offsets_at_chebyshev_distance_two() {
        use std::collections::HashSet;
        let set: HashSet<_> = PATTERN.iter().copied().collect();
        assert_eq!(set.len(), 16);
        for (dx, dy) in PATTERN {
            assert_eq!(dx.unsigned_abs().max(dy.unsigned_abs()), 2);
        }
    }

    #[test]
    fn uniform_image_descriptor_is_zero_regardless_of_threshold_mode() {
        let img = Frame::Gray(GrayImage::from_pixel(9, 9, image::Luma([128])));
        assert_eq!(descriptor_gray(&img, 4, 4, 128, 0), 0x0000);
        assert_eq!(descriptor_gray(&img, 4, 4, 128, 50), 0x0000);
    }

    #[test]
    fn threshold_zero_exact_ref_yields_zero_descriptor_on_any_image() {
        // A zero threshold with the reference equal to the center's exact
        // value only yields an all-zero descriptor when every neighbor
        // matches too, as in the uniform case below; a non-uniform image
        // would still flag differing neighbors since any nonzero
        // difference satisfies `> 0`.
        let mut img = GrayImage::from_pixel(9, 9, image::Luma([10]));
        img.put_pixel(2, 4, image::Luma([10])); // matches pattern offset (-2,0)
        let frame = Frame::Gray(img);
        let d = descriptor_gray(&frame, 4, 4, 10, 0);
        // every neighbor equals 10 except none were changed elsewhere, so
        // the whole descriptor is zero.
        assert_eq!(d, 0);
    }

    #[test]
    fn single_differing_neighbor_sets_exactly_one_bit() {
        let mut img = GrayImage::from_pixel(9, 9, image::Luma([10]));
        // PATTERN[0] == (-2, 0) relative to (4,4) is (2,4)
        img.put_pixel(2, 4, image::Luma([200]));
        let frame = Frame::Gray(img);
        let d = descriptor_gray(&frame, 4, 4, 10, 5);
        assert_eq!(d, 0b1);
    }

    #[test]
    fn window_fits_rejects_border_positions() {
        assert!(!window_fits(0, 0, 10, 10));
        assert!(!window_fits(1, 5, 10, 10));
        assert!(window_fits(2, 2, 10, 10));
        assert!(window_fits(7, 7, 10, 10));
        assert!(!window_fits(8, 5, 10, 10));
    }
}
