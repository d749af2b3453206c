//! Configuration types for the segmentation engine

use crate::error::BgsError;

/// Which background-modeling variant the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// ViBe-LBSP: fixed global learning rate, no adaptive thresholds.
    ViBe,
    /// PBAS-LBSP: per-pixel R(x)/T(x)/D(x) adaptive controller.
    Pbas,
}

/// Absolute vs. relative LBSP similarity threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LbspThreshold {
    /// Fixed 8-bit threshold, saturated.
    Absolute(u8),
    /// Threshold computed as `round(ratio * reference)`, clamped to [0, 255].
    Relative(f32),
}

impl Default for LbspThreshold {
    fn default() -> Self {
        LbspThreshold::Absolute(0x0D)
    }
}

/// Algorithm behavior switches that would traditionally be compile-time
/// flags, collapsed into plain runtime fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Toggles {
    /// Complement the LBSP core distance with a raw color distance term.
    pub use_color_complement: bool,
    /// Apply the single-channel early-reject thresholds in 3-channel mode.
    pub use_sc_thrs_validation: bool,
    /// Diffusion copies the *neighbor's* own value (true) rather than the
    /// current pixel's value (false, default, matches the original's
    /// `BGSPBASLBSP_USE_SELF_DIFFUSION 0`).
    pub self_diffusion: bool,
    /// PBAS-only: let V(x) accelerate R(x)'s response to persistent FG.
    pub r2_acceleration: bool,
    /// PBAS-only: fold a per-sample gradient-magnitude distance into the
    /// color (or descriptor) distance. Requires the `gradient-complement`
    /// Cargo feature.
    pub use_gradient_complement: bool,
    /// When gradient complement is enabled, mix it into the color distance
    /// (true) or the descriptor distance (false).
    pub mix_gradient_with_color: bool,
    /// Recompute the LBSP descriptor per-sample against each sample's own
    /// color (true, the documented default) rather than once against the
    /// current frame (false).
    pub extract_inter_lbsp: bool,
    /// Store inter-frame descriptors in the model bank. Requires
    /// `extract_inter_lbsp` (otherwise the stored descriptor would have no
    /// corresponding extraction mode to compare against).
    pub model_inter_lbsp: bool,
    /// PBAS-only: run the border-flood-fill hole-filling + open/close pass.
    pub advanced_morph: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            use_color_complement: true,
            use_sc_thrs_validation: true,
            self_diffusion: false,
            r2_acceleration: true,
            use_gradient_complement: false,
            mix_gradient_with_color: true,
            extract_inter_lbsp: true,
            model_inter_lbsp: true,
            advanced_morph: true,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub variant: Variant,
    /// Samples per pixel ('N' in the ViBe/PBAS papers).
    pub samples: usize,
    /// Samples that must match for a pixel to be called background ('#_min').
    pub required_matches: usize,
    /// Base color distance threshold.
    pub color_threshold: u8,
    /// Base descriptor Hamming distance threshold.
    pub desc_threshold: u32,
    /// Default learning rate T (ViBe: the fixed global T; PBAS: the initial
    /// value every T(x) is seeded with).
    pub learning_rate: f64,
    /// LBSP similarity threshold / mode.
    pub lbsp_threshold: LbspThreshold,
    pub toggles: Toggles,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            variant: Variant::ViBe,
            samples: 35,
            required_matches: 2,
            color_threshold: 30,
            desc_threshold: 4,
            learning_rate: 16.0,
            lbsp_threshold: LbspThreshold::default(),
            toggles: Toggles::default(),
        }
    }
}

impl EngineConfig {
    /// Validates the configuration, rejecting combinations that cannot be
    /// given sensible semantics.
    pub fn validate(&self) -> Result<(), BgsError> {
        if self.samples == 0 {
            return Err(BgsError::config("samples (N) must be >= 1"));
        }
        if self.required_matches == 0 {
            // 0 is a valid null model: every pixel fails to reach the
            // match count and the mask comes out all-foreground... no,
            // all-background, since "0 matches required" is trivially met.
        } else if self.required_matches > self.samples {
            return Err(BgsError::config(format!(
                "required_matches ({}) must be <= samples ({})",
                self.required_matches, self.samples
            )));
        }
        if self.toggles.model_inter_lbsp && !self.toggles.extract_inter_lbsp {
            return Err(BgsError::config(
                "model_inter_lbsp requires extract_inter_lbsp (illogical model desc <-> extracted desc association)",
            ));
        }
        if self.toggles.use_gradient_complement && cfg!(not(feature = "gradient-complement")) {
            return Err(BgsError::config(
                "use_gradient_complement requires the `gradient-complement` Cargo feature",
            ));
        }
        if let LbspThreshold::Relative(ratio) = self.lbsp_threshold {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(BgsError::config(
                    "relative LBSP threshold ratio must be in [0.0, 1.0]",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn required_matches_over_samples_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.required_matches = cfg.samples + 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn required_matches_zero_is_a_valid_null_model() {
        let mut cfg = EngineConfig::default();
        cfg.required_matches = 0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn model_inter_without_extract_inter_is_illegal() {
        let mut cfg = EngineConfig::default();
        cfg.toggles.extract_inter_lbsp = false;
        cfg.toggles.model_inter_lbsp = true;
        assert!(cfg.validate().is_err());
    }
}
