//! The background model sample bank and PBAS per-pixel adaptive state.

use crate::frame::{DescImage, Frame};
use image::GrayImage;

/// `N` parallel (color, descriptor) sample images, plus an optional
/// per-sample gradient-magnitude bank used by the gradient complement.
#[derive(Debug, Clone)]
pub struct SampleBank {
    pub color: Vec<Frame>,
    pub desc: Vec<DescImage>,
    pub grad: Option<Vec<GrayImage>>,
}

impl SampleBank {
    pub fn new(n: usize, like: &Frame, with_gradient: bool) -> Self {
        let color = (0..n).map(|_| like.blank_like()).collect();
        let desc = (0..n).map(|_| DescImage::blank_like(like)).collect();
        let grad = with_gradient
            .then(|| (0..n).map(|_| GrayImage::new(like.width(), like.height())).collect());
        Self { color, desc, grad }
    }

    pub fn n(&self) -> usize {
        self.color.len()
    }
}

/// Per-pixel adaptive controller state, PBAS variant only.
///
/// Stored as a dense `width x height` grid for simplicity of indexing, even
/// though only positions in the active keypoint set are ever read or
/// written.
#[derive(Debug, Clone)]
pub struct AdaptiveState {
    width: u32,
    r: Vec<f32>,
    t: Vec<f32>,
    d: Vec<f32>,
    v: Vec<f32>,
}

/// PBAS tuning constants.
pub const R_MAX: f32 = 255.0;
pub const V_INCR: f32 = 1.0;
pub const V_DECR: f32 = 0.1;
pub const V_FLOOR: f32 = 0.0;
pub const T_INCR: f32 = 1.0;
pub const T_DECR: f32 = 0.05;
pub const T_MIN: f32 = 2.0;
pub const T_MAX: f32 = 256.0;
pub const EPSILON: f32 = 1e-6;

impl AdaptiveState {
    pub fn new(width: u32, height: u32, default_t: f32) -> Self {
        let n = (width as usize) * (height as usize);
        Self {
            width,
            r: vec![1.0; n],
            t: vec![default_t.clamp(T_MIN, T_MAX); n],
            d: vec![0.0; n],
            v: vec![V_FLOOR; n],
        }
    }

    #[inline]
    fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    #[inline]
    pub fn r(&self, x: u32, y: u32) -> f32 {
        self.r[self.idx(x, y)]
    }

    #[inline]
    pub fn t(&self, x: u32, y: u32) -> f32 {
        self.t[self.idx(x, y)]
    }

    #[inline]
    pub fn d(&self, x: u32, y: u32) -> f32 {
        self.d[self.idx(x, y)]
    }

    #[inline]
    pub fn v(&self, x: u32, y: u32) -> f32 {
        self.v[self.idx(x, y)]
    }

    /// Applies the distance-threshold / update-rate / flicker-rate update
    /// rules at `(x, y)` given this frame's minimum observed sample
    /// distance `dmin` and whether the pixel was classified as foreground,
    /// with R2 acceleration toggled by `r2_acceleration`.
    pub fn update(&mut self, x: u32, y: u32, dmin: f32, is_foreground: bool, r2_acceleration: bool) {
        let idx = self.idx(x, y);
        let t_prev = self.t[idx];

        let d_new = (self.d[idx] * (t_prev - 1.0) + dmin) / t_prev;
        self.d[idx] = d_new;

        let v = if r2_acceleration {
            self.v[idx]
        } else {
            0.0
        };
        if self.r[idx] < 1.0 + d_new * 2.0 {
            self.r[idx] *= 1.0 + v;
        } else {
            self.r[idx] *= 1.0 - v;
        }
        self.r[idx] = self.r[idx].clamp(1.0, R_MAX);

        if r2_acceleration {
            self.v[idx] = if is_foreground {
                self.v[idx] + V_INCR
            } else {
                (self.v[idx] - V_DECR).max(V_FLOOR)
            };
        }

        self.t[idx] = if is_foreground {
            t_prev + T_INCR / (d_new + EPSILON)
        } else {
            t_prev - T_DECR * (d_new + EPSILON)
        }
        .clamp(T_MIN, T_MAX);
    }
}
