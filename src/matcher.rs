//! The sample-consensus matcher: per-pixel classification against the
//! N-sample model bank, shared by both the ViBe and PBAS variants.

use crate::config::{LbspThreshold, Toggles};
use crate::distance::{absdiff, hamming16, SC_MOD};
use crate::frame::Frame;
use crate::lbsp::{descriptor_channel, resolve_threshold};
use crate::model::SampleBank;
use image::GrayImage;

/// Result of scanning up to N samples at one pixel.
pub struct Classification {
    /// Number of samples that matched.
    pub good: usize,
    /// Minimum combined (normalized) color+descriptor distance observed
    /// among the samples whose color distance did not early-reject.
    pub dmin: f32,
    /// The descriptor computed against the last sample visited in the scan
    /// (intra when `extract_inter_lbsp` is disabled), reused verbatim by
    /// the stochastic update step so it isn't recomputed twice per pixel.
    pub fresh_desc: [u16; 3],
    /// Raw (unnormalized) gradient-complement distance accumulated at the
    /// sample with the smallest combined distance, `0.0` when the gradient
    /// complement is disabled. Fed back into [`Engine`](crate::engine::Engine)'s
    /// running `former_mean_grad_dist` so the *next* frame's fold can
    /// normalize by how large that term has recently been running.
    pub grad_dist: f32,
}

/// Floor applied to `former_mean_grad_dist` before it's used as a divisor,
/// so a run of frames with zero gradient distance can't blow up the next
/// frame's normalized term.
pub const MIN_MEAN_GRAD_DIST: f32 = 1.0;

/// Computes the intra-frame LBSP descriptor at `(x, y)` (reference = the
/// frame's own pixel value there), used at initialization and whenever
/// `extract_inter_lbsp` is disabled.
pub fn intra_descriptor(
    frame: &Frame,
    x: u32,
    y: u32,
    channels: u8,
    lbsp_mode: LbspThreshold,
) -> [u16; 3] {
    if channels == 1 {
        let r = frame.channel(x, y, 0);
        let t = resolve_threshold(lbsp_mode, r, SC_MOD);
        [descriptor_channel(frame, 0, x, y, r, t), 0, 0]
    } else {
        let r = frame.pixel(x, y);
        std::array::from_fn(|c| {
            let t = resolve_threshold(lbsp_mode, r[c], 1.0);
            descriptor_channel(frame, c as u8, x, y, r[c], t)
        })
    }
}

/// Per-pixel classification entry point, dispatching on channel count.
#[allow(clippy::too_many_arguments)]
pub fn classify(
    frame: &Frame,
    bank: &SampleBank,
    x: u32,
    y: u32,
    n: usize,
    required_matches: usize,
    color_threshold_eff: f32,
    desc_threshold_eff: f32,
    toggles: &Toggles,
    lbsp_mode: LbspThreshold,
    cur_grad: Option<&GrayImage>,
    bank_grad: Option<&[GrayImage]>,
    former_mean_grad_dist: f32,
) -> Classification {
    if frame.channels() == 1 {
        classify_gray(
            frame,
            bank,
            x,
            y,
            n,
            required_matches,
            color_threshold_eff,
            desc_threshold_eff,
            toggles,
            lbsp_mode,
            cur_grad,
            bank_grad,
            former_mean_grad_dist,
        )
    } else {
        classify_rgb(
            frame,
            bank,
            x,
            y,
            n,
            required_matches,
            color_threshold_eff,
            desc_threshold_eff,
            toggles,
            lbsp_mode,
            cur_grad,
            bank_grad,
            former_mean_grad_dist,
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn classify_gray(
    frame: &Frame,
    bank: &SampleBank,
    x: u32,
    y: u32,
    n: usize,
    required_matches: usize,
    color_threshold_eff: f32,
    desc_threshold_eff: f32,
    toggles: &Toggles,
    lbsp_mode: LbspThreshold,
    cur_grad: Option<&GrayImage>,
    bank_grad: Option<&[GrayImage]>,
    former_mean_grad_dist: f32,
) -> Classification {
    let cur_color = frame.channel(x, y, 0);
    let color_cut = color_threshold_eff * SC_MOD;
    let intra_desc = (!toggles.extract_inter_lbsp)
        .then(|| intra_descriptor(frame, x, y, 1, lbsp_mode)[0]);
    let cur_grad_val = cur_grad.map(|g| g.get_pixel(x, y).0[0]);
    let grad_norm = former_mean_grad_dist.max(MIN_MEAN_GRAD_DIST);

    let mut good = 0usize;
    let mut i = 0usize;
    let mut dmin = f32::MAX;
    let mut fresh_desc = 0u16;
    let mut grad_dist = 0f32;

    while good < required_matches && i < n {
        let bg_color = bank.color[i].channel(x, y, 0);
        let mut dc = absdiff(cur_color, bg_color) as f32;
        let mut raw_grad = 0f32;
        if toggles.use_gradient_complement {
            if let (Some(cg), Some(bgrad)) = (cur_grad_val, bank_grad) {
                raw_grad = absdiff(cg, bgrad[i].get_pixel(x, y).0[0]) as f32;
            }
        }
        if toggles.use_gradient_complement && toggles.mix_gradient_with_color {
            dc += raw_grad / grad_norm;
        }
        if toggles.use_color_complement && dc > color_cut {
            i += 1;
            continue;
        }
        let d_cur = match intra_desc {
            Some(d) => d,
            None => {
                let t = resolve_threshold(lbsp_mode, bg_color, SC_MOD);
                descriptor_channel(frame, 0, x, y, bg_color, t)
            }
        };
        fresh_desc = d_cur;
        let bg_desc = bank.desc[i].channel(x, y, 0);
        let mut dd = hamming16(d_cur, bg_desc) as f32;
        if toggles.use_gradient_complement && !toggles.mix_gradient_with_color {
            dd += raw_grad / grad_norm;
        }

        let norm = (dc / color_cut.max(1.0) + dd / desc_threshold_eff.max(1.0)) / 2.0;
        if norm < dmin {
            dmin = norm;
            grad_dist = raw_grad;
        }

        if dd <= desc_threshold_eff {
            good += 1;
        }
        i += 1;
    }
    if dmin == f32::MAX {
        dmin = 1.0;
    }
    Classification {
        good,
        dmin,
        fresh_desc: [fresh_desc, 0, 0],
        grad_dist,
    }
}

#[allow(clippy::too_many_arguments)]
fn classify_rgb(
    frame: &Frame,
    bank: &SampleBank,
    x: u32,
    y: u32,
    n: usize,
    required_matches: usize,
    color_threshold_eff: f32,
    desc_threshold_eff: f32,
    toggles: &Toggles,
    lbsp_mode: LbspThreshold,
    cur_grad: Option<&GrayImage>,
    bank_grad: Option<&[GrayImage]>,
    former_mean_grad_dist: f32,
) -> Classification {
    let cur = frame.pixel(x, y);
    let sc_color_cut = color_threshold_eff * SC_MOD;
    let sc_desc_cut = desc_threshold_eff * SC_MOD;
    let sum_color_cut = color_threshold_eff * 3.0;
    let sum_desc_cut = desc_threshold_eff * 3.0;
    let intra_desc =
        (!toggles.extract_inter_lbsp).then(|| intra_descriptor(frame, x, y, 3, lbsp_mode));
    let cur_grad_val = cur_grad.map(|g| g.get_pixel(x, y).0[0]);
    let grad_norm = former_mean_grad_dist.max(MIN_MEAN_GRAD_DIST);

    let mut good = 0usize;
    let mut i = 0usize;
    let mut dmin = f32::MAX;
    let mut fresh_desc = [0u16; 3];
    let mut grad_dist = 0f32;

    while good < required_matches && i < n {
        let bg_color = bank.color[i].pixel(x, y);
        let mut reject = false;
        let mut tot_color = 0f32;
        let mut tot_desc = 0f32;
        let mut tot_raw_grad = 0f32;
        let mut sample_desc = [0u16; 3];

        for c in 0..3usize {
            let mut dc = absdiff(cur[c], bg_color[c]) as f32;
            let mut raw_grad = 0f32;
            if toggles.use_gradient_complement {
                if let (Some(cg), Some(bgrad)) = (cur_grad_val, bank_grad) {
                    raw_grad = absdiff(cg, bgrad[i].get_pixel(x, y).0[0]) as f32;
                }
            }
            if toggles.use_gradient_complement && toggles.mix_gradient_with_color {
                dc += raw_grad / grad_norm;
            }
            if toggles.use_color_complement && toggles.use_sc_thrs_validation && dc > sc_color_cut
            {
                reject = true;
            }
            let d_cur_c = match &intra_desc {
                Some(d) => d[c],
                None => {
                    let t = resolve_threshold(lbsp_mode, bg_color[c], 1.0);
                    descriptor_channel(frame, c as u8, x, y, bg_color[c], t)
                }
            };
            sample_desc[c] = d_cur_c;
            let bg_desc_c = bank.desc[i].channel(x, y, c as u8);
            let mut dd = hamming16(d_cur_c, bg_desc_c) as f32;
            if toggles.use_gradient_complement && !toggles.mix_gradient_with_color {
                dd += raw_grad / grad_norm;
            }
            if toggles.use_sc_thrs_validation && dd > sc_desc_cut {
                reject = true;
            }
            tot_color += dc;
            tot_desc += dd;
            tot_raw_grad += raw_grad;
        }

        fresh_desc = sample_desc;
        if !reject {
            let norm =
                (tot_color / sum_color_cut.max(1.0) + tot_desc / sum_desc_cut.max(1.0)) / 2.0;
            if norm < dmin {
                dmin = norm;
                grad_dist = tot_raw_grad / 3.0;
            }
        }
        let passes_sum = tot_desc <= sum_desc_cut
            && (!toggles.use_color_complement || tot_color <= sum_color_cut);
        if !reject && passes_sum {
            good += 1;
        }
        i += 1;
    }
    if dmin == f32::MAX {
        dmin = 1.0;
    }
    Classification {
        good,
        dmin,
        fresh_desc,
        grad_dist,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Toggles;
    use image::{GrayImage, Luma};

    fn gray_frame(w: u32, h: u32, v: u8) -> Frame {
        Frame::Gray(GrayImage::from_pixel(w, h, Luma([v])))
    }

    #[test]
    fn identical_frame_and_bank_matches_every_sample() {
        let frame = gray_frame(16, 16, 100);
        let bank = SampleBank::new(5, &frame, false);
        // Fill bank color with same value and matching descriptors.
        let mut bank = bank;
        for s in 0..5 {
            for y in 2..14u32 {
                for x in 2..14u32 {
                    bank.color[s].set_pixel(x, y, &[100]);
                    let d = intra_descriptor(&frame, x, y, 1, LbspThreshold::Absolute(0x0D));
                    bank.desc[s].set(x, y, &[d[0]]);
                }
            }
        }
        let toggles = Toggles::default();
        let cls = classify(
            &frame,
            &bank,
            7,
            7,
            5,
            2,
            30.0,
            4.0,
            &toggles,
            LbspThreshold::Absolute(0x0D),
            None,
            None,
            1.0,
        );
        assert_eq!(cls.good, 2);
        assert!(cls.dmin < 0.5);
    }

    #[test]
    fn wildly_different_bank_never_matches() {
        let frame = gray_frame(16, 16, 10);
        let mut bank = SampleBank::new(5, &frame, false);
        for s in 0..5 {
            for y in 2..14u32 {
                for x in 2..14u32 {
                    bank.color[s].set_pixel(x, y, &[250]);
                }
            }
        }
        let toggles = Toggles::default();
        let cls = classify(
            &frame,
            &bank,
            7,
            7,
            5,
            2,
            30.0,
            4.0,
            &toggles,
            LbspThreshold::Absolute(0x0D),
            None,
            None,
            1.0,
        );
        assert_eq!(cls.good, 0);
    }
}
