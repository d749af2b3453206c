//! Random sampling utilities: reproducible, seeded RNG plus the
//! neighbor/patch position samplers used by initialization and the
//! stochastic model update.

use crate::lbsp::RADIUS;
use rand::{Rng as _, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// The engine's private, seeded RNG source.
///
/// Owned per-`Engine` instance rather than behind a process-wide global, so
/// independent engines running in parallel don't contend on shared state
/// while every draw stays reproducible from one seed.
#[derive(Clone)]
pub struct Rng(ChaCha8Rng);

impl std::fmt::Debug for Rng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rng").finish_non_exhaustive()
    }
}

impl Rng {
    pub fn seeded(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Uniform integer in `[lo, hi]` inclusive. Returns `lo` when `hi <= lo`.
    #[inline]
    pub fn range_inclusive(&mut self, lo: u32, hi: u32) -> u32 {
        if hi <= lo {
            lo
        } else {
            self.0.gen_range(lo..=hi)
        }
    }

    /// Uniform slot index in `[0, n)`.
    #[inline]
    pub fn slot(&mut self, n: usize) -> usize {
        self.0.gen_range(0..n)
    }

    /// `true` with probability `1/t` (t >= 1); used for the stochastic
    /// update decisions.
    #[inline]
    pub fn hit_one_in(&mut self, t: u32) -> bool {
        debug_assert!(t >= 1);
        self.0.gen_range(0..t) == 0
    }
}

/// Clamps a 1D sampling range around `center` so that both the returned
/// coordinate and its own `RADIUS`-wide LBSP window stay inside `[0, dim)`.
fn clamp_axis(center: u32, radius: i32, dim: u32) -> (u32, u32) {
    let lo_bound = RADIUS;
    let hi_bound = dim as i32 - 1 - RADIUS;
    if hi_bound < lo_bound {
        // Degenerate (image too small); caller should have already pruned
        // keypoints to the empty set in this case.
        return (0, 0);
    }
    let lo = (center as i32 - radius).clamp(lo_bound, hi_bound);
    let hi = (center as i32 + radius).clamp(lo_bound, hi_bound);
    (lo as u32, hi as u32)
}

/// Returns a position uniformly distributed in the `(2*radius+1)^2` square
/// around `pos`, clamped so the returned position's own 5x5 descriptor
/// window stays inside `dims`.
pub fn random_neighbor(rng: &mut Rng, pos: (u32, u32), radius: i32, dims: (u32, u32)) -> (u32, u32) {
    let (xlo, xhi) = clamp_axis(pos.0, radius, dims.0);
    let (ylo, yhi) = clamp_axis(pos.1, radius, dims.1);
    (rng.range_inclusive(xlo, xhi), rng.range_inclusive(ylo, yhi))
}

/// Identical to [`random_neighbor`], used for model initialization.
pub fn random_sample(rng: &mut Rng, pos: (u32, u32), radius: i32, dims: (u32, u32)) -> (u32, u32) {
    random_neighbor(rng, pos, radius, dims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_identical_sequence() {
        let mut a = Rng::seeded(0);
        let mut b = Rng::seeded(0);
        for _ in 0..50 {
            assert_eq!(a.slot(35), b.slot(35));
            assert_eq!(
                random_neighbor(&mut a, (10, 10), 1, (64, 64)),
                random_neighbor(&mut b, (10, 10), 1, (64, 64))
            );
        }
    }

    #[test]
    fn random_neighbor_stays_within_descriptor_bounds() {
        let mut rng = Rng::seeded(42);
        for _ in 0..500 {
            let (x, y) = random_neighbor(&mut rng, (2, 2), 2, (64, 64));
            assert!(crate::lbsp::window_fits(x, y, 64, 64));
        }
        for _ in 0..500 {
            let (x, y) = random_neighbor(&mut rng, (61, 61), 2, (64, 64));
            assert!(crate::lbsp::window_fits(x, y, 64, 64));
        }
    }

    #[test]
    fn hit_one_in_distribution_is_roughly_correct() {
        let mut rng = Rng::seeded(7);
        let mut hits = 0;
        let trials = 20_000;
        for _ in 0..trials {
            if rng.hit_one_in(16) {
                hits += 1;
            }
        }
        let rate = hits as f64 / trials as f64;
        assert!((rate - 1.0 / 16.0).abs() < 0.01, "rate={rate}");
    }
}
