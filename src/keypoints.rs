//! The keypoint set: the ordered set of pixel positions at which the model
//! is maintained, fixed after initialization.

use crate::error::BgsError;
use crate::lbsp::window_fits;

/// Positions at which the background model is maintained, plus the frame
/// dimensions they were validated against.
#[derive(Debug, Clone)]
pub struct KeypointSet {
    points: Vec<(u32, u32)>,
    width: u32,
    height: u32,
}

impl KeypointSet {
    /// Dense keypoints: every position in `width x height` whose 5x5
    /// descriptor window fits inside the image.
    pub fn dense(width: u32, height: u32) -> Result<Self, BgsError> {
        let mut points = Vec::with_capacity((width as usize).saturating_mul(height as usize));
        for y in 0..height {
            for x in 0..width {
                if window_fits(x, y, width, height) {
                    points.push((x, y));
                }
            }
        }
        if points.is_empty() {
            return Err(BgsError::EmptyKeypoints);
        }
        Ok(Self {
            points,
            width,
            height,
        })
    }

    /// Validates and prunes a caller-supplied keypoint list, dropping any
    /// position whose descriptor window would leave the image.
    pub fn from_points(
        points: Vec<(u32, u32)>,
        width: u32,
        height: u32,
    ) -> Result<Self, BgsError> {
        let pruned: Vec<(u32, u32)> = points
            .into_iter()
            .filter(|&(x, y)| x < width && y < height && window_fits(x, y, width, height))
            .collect();
        if pruned.is_empty() {
            return Err(BgsError::EmptyKeypoints);
        }
        Ok(Self {
            points: pruned,
            width,
            height,
        })
    }

    pub fn points(&self) -> &[(u32, u32)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}
