//! Error types for the lbsp-bgs library

use thiserror::Error;

/// Main error type for segmentation operations
#[derive(Error, Debug)]
pub enum BgsError {
    #[error("invalid frame: {message}")]
    InvalidFrame { message: String },

    #[error("no keypoints remained after border pruning (image too small for a 5x5 LBSP window)")]
    EmptyKeypoints,

    #[error("engine used before initialize() was called")]
    NotInitialized,

    #[error("frame mismatch: expected {expected_w}x{expected_h} ({expected_c}ch), got {got_w}x{got_h} ({got_c}ch)")]
    FrameMismatch {
        expected_w: u32,
        expected_h: u32,
        expected_c: u8,
        got_w: u32,
        got_h: u32,
        got_c: u8,
    },

    #[error("precache buffer overflow: requested {requested} bytes exceeds platform cap of {cap} bytes")]
    PrecacheOverflow { requested: u64, cap: u64 },

    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl BgsError {
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias for convenience
pub type BgsResult<T> = Result<T, BgsError>;
