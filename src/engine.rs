//! The public segmentation engine: ties the keypoint set, sample bank,
//! adaptive controller, matcher and post-processing together into a single
//! `process()` call per frame.

use image::{GrayImage, Luma};

use crate::config::{EngineConfig, Variant};
use crate::error::{BgsError, BgsResult};
use crate::frame::Frame;
use crate::keypoints::KeypointSet;
use crate::matcher::{self, Classification};
use crate::model::{AdaptiveState, SampleBank};
use crate::postprocess;
use crate::rng::{self, Rng};
use crate::{tele_debug, tele_trace};

#[cfg(feature = "gradient-complement")]
fn compute_gradient(frame: &Frame, enabled: bool) -> Option<GrayImage> {
    enabled.then(|| crate::gradient::sobel_magnitude(frame))
}

#[cfg(not(feature = "gradient-complement"))]
fn compute_gradient(_frame: &Frame, _enabled: bool) -> Option<GrayImage> {
    None
}

/// Owns one background model instance. Not `Sync`; run independent engines
/// per-thread for parallel streams.
pub struct Engine {
    config: EngineConfig,
    keypoints: Option<KeypointSet>,
    bank: Option<SampleBank>,
    adaptive: Option<AdaptiveState>,
    rng: Rng,
    last_raw_mask: Option<GrayImage>,
    width: u32,
    height: u32,
    channels: u8,
    /// Running mean of the gradient-complement distance term observed last
    /// frame, used to normalize this frame's fold so the term's scale
    /// doesn't depend on how large raw Sobel magnitudes happen to run.
    former_mean_grad_dist: f32,
}

impl Engine {
    pub fn new(config: EngineConfig, seed: u64) -> BgsResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            keypoints: None,
            bank: None,
            adaptive: None,
            rng: Rng::seeded(seed),
            last_raw_mask: None,
            width: 0,
            height: 0,
            channels: 0,
            former_mean_grad_dist: matcher::MIN_MEAN_GRAD_DIST,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.bank.is_some()
    }

    /// Builds the initial model from `frame`. `keypoints` defaults to the
    /// dense set (every position whose descriptor window fits) when `None`.
    pub fn initialize(
        &mut self,
        frame: &Frame,
        keypoints: Option<Vec<(u32, u32)>>,
    ) -> BgsResult<()> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(BgsError::invalid_frame(format!(
                "frame has a zero dimension: {}x{}",
                frame.width(),
                frame.height()
            )));
        }
        let kps = match keypoints {
            Some(points) => KeypointSet::from_points(points, frame.width(), frame.height())?,
            None => KeypointSet::dense(frame.width(), frame.height())?,
        };
        self.build_model(frame, kps)
    }

    /// Re-initializes the model over a new keypoint set, keeping the engine's
    /// configuration and RNG state.
    pub fn set_keypoints(&mut self, frame: &Frame, points: Vec<(u32, u32)>) -> BgsResult<()> {
        let kps = KeypointSet::from_points(points, frame.width(), frame.height())?;
        self.build_model(frame, kps)
    }

    fn build_model(&mut self, frame: &Frame, kps: KeypointSet) -> BgsResult<()> {
        let with_gradient = self.config.toggles.use_gradient_complement;
        let mut bank = SampleBank::new(self.config.samples, frame, with_gradient);
        let cur_grad = compute_gradient(frame, with_gradient);

        for &(x, y) in kps.points() {
            for s in 0..bank.n() {
                let (nx, ny) = rng::random_sample(&mut self.rng, (x, y), 1, (frame.width(), frame.height()));
                let value = frame.pixel(nx, ny);
                bank.color[s].set_pixel(x, y, &value[..frame.channels() as usize]);
                let desc = matcher::intra_descriptor(frame, nx, ny, frame.channels(), self.config.lbsp_threshold);
                bank.desc[s].set(x, y, &desc[..frame.channels() as usize]);
                if let (Some(grad), Some(bg)) = (&cur_grad, &mut bank.grad) {
                    bg[s].put_pixel(x, y, Luma([grad.get_pixel(nx, ny).0[0]]));
                }
            }
        }

        let adaptive = matches!(self.config.variant, Variant::Pbas)
            .then(|| AdaptiveState::new(frame.width(), frame.height(), self.config.learning_rate as f32));

        self.width = frame.width();
        self.height = frame.height();
        self.channels = frame.channels();
        self.keypoints = Some(kps);
        self.bank = Some(bank);
        self.adaptive = adaptive;
        self.last_raw_mask = None;
        self.former_mean_grad_dist = matcher::MIN_MEAN_GRAD_DIST;
        tele_debug!(
            "initialized {:?} model: {} keypoints, {} samples/pixel",
            self.config.variant,
            self.keypoints.as_ref().unwrap().len(),
            self.config.samples
        );
        Ok(())
    }

    /// Classifies `frame` and updates the model in place, returning the
    /// post-processed foreground mask (255 = foreground, 0 = background).
    /// `learning_rate_override`, if `Some` and finite, takes precedence over
    /// the configured/adaptive rate; `Some(f64::INFINITY)` deterministically
    /// freezes the model (no sample is ever replaced).
    pub fn process(&mut self, frame: &Frame, learning_rate_override: Option<f64>) -> BgsResult<GrayImage> {
        if !self.same_shape(frame) {
            return Err(BgsError::FrameMismatch {
                expected_w: self.width,
                expected_h: self.height,
                expected_c: self.channels,
                got_w: frame.width(),
                got_h: frame.height(),
                got_c: frame.channels(),
            });
        }
        let kps = self.keypoints.as_ref().ok_or(BgsError::NotInitialized)?.clone();
        let bank = self.bank.as_mut().ok_or(BgsError::NotInitialized)?;

        let with_gradient = self.config.toggles.use_gradient_complement;
        let cur_grad = compute_gradient(frame, with_gradient);
        let bank_grad = bank.grad.as_deref();
        let former_mean_grad_dist = self.former_mean_grad_dist;

        let mut raw = GrayImage::new(self.width, self.height);
        let mut results: Vec<((u32, u32), Classification)> = Vec::with_capacity(kps.len());

        for &(x, y) in kps.points() {
            let r_scale = match self.config.variant {
                Variant::Pbas => self.adaptive.as_ref().map(|a| a.r(x, y)).unwrap_or(1.0),
                Variant::ViBe => 1.0,
            };
            let color_eff = self.config.color_threshold as f32 * r_scale;
            let desc_eff = self.config.desc_threshold as f32 * r_scale;
            let cls = matcher::classify(
                frame,
                bank,
                x,
                y,
                bank.n(),
                self.config.required_matches,
                color_eff,
                desc_eff,
                &self.config.toggles,
                self.config.lbsp_threshold,
                cur_grad.as_ref(),
                bank_grad,
                former_mean_grad_dist,
            );
            let is_fg = cls.good < self.config.required_matches;
            if is_fg {
                raw.put_pixel(x, y, Luma([255]));
            }
            results.push(((x, y), cls));
        }

        if with_gradient && !kps.points().is_empty() {
            let sum: f32 = results.iter().map(|(_, cls)| cls.grad_dist).sum();
            self.former_mean_grad_dist =
                (sum / kps.points().len() as f32).max(matcher::MIN_MEAN_GRAD_DIST);
        }

        let blink = self
            .last_raw_mask
            .as_ref()
            .map(|last| postprocess::detect_blinking(&raw, last));

        for (&(x, y), cls) in results.iter().map(|(p, c)| (p, c)) {
            let is_fg = raw.get_pixel(x, y).0[0] != 0;
            let is_blinking = blink
                .as_ref()
                .map(|b| b.get_pixel(x, y).0[0] != 0)
                .unwrap_or(false);

            if let Some(adaptive) = self.adaptive.as_mut() {
                adaptive.update(x, y, cls.dmin, is_fg, self.config.toggles.r2_acceleration);
            }

            let effective_rate = learning_rate_override.unwrap_or_else(|| match self.adaptive.as_ref() {
                Some(adaptive) => adaptive.t(x, y) as f64,
                None => self.config.learning_rate,
            });

            if is_fg || is_blinking || !effective_rate.is_finite() {
                continue;
            }
            let rate = effective_rate.max(1.0) as u32;
            if self.rng.hit_one_in(rate) {
                let slot = self.rng.slot(bank.n());
                let value = frame.pixel(x, y);
                bank.color[slot].set_pixel(x, y, &value[..self.channels as usize]);
                if self.config.toggles.model_inter_lbsp {
                    bank.desc[slot].set(x, y, &cls.fresh_desc[..self.channels as usize]);
                }
                if let (Some(grad), Some(bg)) = (&cur_grad, bank.grad.as_mut()) {
                    bg[slot].put_pixel(x, y, Luma([grad.get_pixel(x, y).0[0]]));
                }
                if self.rng.hit_one_in(rate) {
                    let (nx, ny) = rng::random_neighbor(&mut self.rng, (x, y), 1, (self.width, self.height));
                    if crate::lbsp::window_fits(nx, ny, self.width, self.height) {
                        let nslot = self.rng.slot(bank.n());
                        let diffused_value = if self.config.toggles.self_diffusion {
                            frame.pixel(nx, ny)
                        } else {
                            value
                        };
                        bank.color[nslot].set_pixel(nx, ny, &diffused_value[..self.channels as usize]);
                    }
                }
            }
        }

        let blurred = postprocess::median_blur_9x9(&raw);
        let final_mask = if self.config.toggles.advanced_morph {
            postprocess::advanced_morphology(&blurred)
        } else {
            blurred
        };

        tele_trace!("process(): {} keypoints scanned", kps.len());
        self.last_raw_mask = Some(raw);
        Ok(final_mask)
    }

    /// The background image, averaged per-pixel across all `N` color
    /// samples and rounded back to 8 bits.
    pub fn background_image(&self) -> BgsResult<Frame> {
        let bank = self.bank.as_ref().ok_or(BgsError::NotInitialized)?;
        let n = bank.n() as u32;
        let mut out = bank.color[0].blank_like();
        for y in 0..self.height {
            for x in 0..self.width {
                let mut sum = [0u32; 3];
                for sample in &bank.color {
                    let p = sample.pixel(x, y);
                    for c in 0..self.channels as usize {
                        sum[c] += p[c] as u32;
                    }
                }
                let avg: Vec<u8> = sum[..self.channels as usize]
                    .iter()
                    .map(|&s| ((s + n / 2) / n) as u8)
                    .collect();
                out.set_pixel(x, y, &avg);
            }
        }
        Ok(out)
    }

    /// The descriptor image corresponding to [`Engine::background_image`],
    /// averaged per-pixel across all `N` descriptor samples.
    pub fn background_descriptor_image(&self) -> BgsResult<crate::frame::DescImage> {
        let bank = self.bank.as_ref().ok_or(BgsError::NotInitialized)?;
        let n = bank.n() as u32;
        let mut out = crate::frame::DescImage::blank_like(&bank.color[0]);
        for y in 0..self.height {
            for x in 0..self.width {
                let mut sum = [0u32; 3];
                for sample in &bank.desc {
                    let d = sample.get(x, y);
                    for c in 0..self.channels as usize {
                        sum[c] += d[c] as u32;
                    }
                }
                let avg: Vec<u16> = sum[..self.channels as usize]
                    .iter()
                    .map(|&s| ((s + n / 2) / n) as u16)
                    .collect();
                out.set(x, y, &avg);
            }
        }
        Ok(out)
    }

    fn same_shape(&self, frame: &Frame) -> bool {
        frame.width() == self.width && frame.height() == self.height && frame.channels() == self.channels
    }
}
