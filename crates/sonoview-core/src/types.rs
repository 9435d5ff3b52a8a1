//! Common types for sonoview
//!
//! Frame positions, zoom levels and the small enums shared between the
//! models and the views.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Sample frame index on a model's time axis
///
/// Signed: view start frames go negative when a view is centred near zero,
/// and drag arithmetic passes through negative values.
pub type FrameIndex = i64;

/// Samples per pixel column (always >= 1)
pub type ZoomLevel = u32;

/// Sample rate in Hz
pub type SampleRate = u32;

/// Largest zoom level any constraint will hand out
pub const MAX_ZOOM_LEVEL: ZoomLevel = 262_144;

/// Smallest cached summary block is `2^DEFAULT_MIN_CACHE_POWER` frames
pub const DEFAULT_MIN_CACHE_POWER: u32 = 8;

/// Sample rate assumed when nothing better is known
pub const DEFAULT_SAMPLE_RATE: SampleRate = 44100;

/// Process-unique model identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub u64);

impl ModelId {
    /// Allocate a fresh identifier
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ModelId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

/// Result of asking a model whether it has finished loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub ready: bool,
    /// Percentage (0-100)
    pub completion: u8,
}

impl Readiness {
    pub const READY: Readiness = Readiness {
        ready: true,
        completion: 100,
    };

    pub fn partial(completion: u8) -> Self {
        Self {
            ready: false,
            completion: completion.min(99),
        }
    }
}

/// How a view tracks the playback position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackFollowMode {
    /// Keep the play pointer at the centre, scrolling continuously
    ScrollContinuous,
    /// Flip a page when the pointer nears the edge
    #[default]
    ScrollPage,
    /// Page flipping, but dragging the overview centres the view
    ScrollPageWithCentre,
    /// Never scroll for playback
    Ignore,
}
