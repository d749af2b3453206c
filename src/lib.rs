//! Online foreground/background video segmentation using sample-consensus
//! background models (ViBe and PBAS) driven by LBSP descriptors.
//!
//! The [`Engine`] is the primary entry point: build an [`EngineConfig`],
//! construct an engine, [`Engine::initialize`] it against a first frame,
//! then feed subsequent frames to [`Engine::process`] to get a foreground
//! mask back. [`precache::FramePrecacher`] is an optional helper for
//! keeping a decode pipeline a few frames ahead of the consumer.

pub mod config;
pub mod distance;
pub mod engine;
pub mod error;
pub mod frame;
#[cfg(feature = "gradient-complement")]
pub mod gradient;
pub mod keypoints;
pub mod lbsp;
pub mod matcher;
pub mod model;
pub mod postprocess;
pub mod precache;
pub mod rng;

pub use config::{EngineConfig, LbspThreshold, Toggles, Variant};
pub use engine::Engine;
pub use error::{BgsError, BgsResult};
pub use frame::{DescImage, Frame};
pub use precache::FramePrecacher;

/// Logs at debug level when the `telemetry` feature is enabled; a no-op
/// otherwise, so callers don't pay for format-argument evaluation when the
/// feature is off.
#[macro_export]
macro_rules! tele_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "telemetry")]
        { log::debug!($($arg)*); }
    };
}

/// Same as [`tele_debug`] at trace level.
#[macro_export]
macro_rules! tele_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "telemetry")]
        { log::trace!($($arg)*); }
    };
}

/// Same as [`tele_debug`] at warn level.
#[macro_export]
macro_rules! tele_warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "telemetry")]
        { log::warn!($($arg)*); }
    };
}
