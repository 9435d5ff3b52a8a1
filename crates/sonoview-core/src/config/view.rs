//! View display configuration

use serde::{Deserialize, Serialize};

use crate::types::{PlaybackFollowMode, ZoomLevel, DEFAULT_MIN_CACHE_POWER};
use crate::zoom::ZoomPolicy;

/// Display settings shared by every view in a pane stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Point size for overlay text (frame counts, ruler labels)
    pub font_size: u32,

    /// Dark-on-light when true, light-on-dark otherwise
    pub light_background: bool,

    /// Draw the centre line in panes
    pub show_centre_line: bool,

    /// Draw the centre frame number (and time) in panes
    pub show_frame_count: bool,

    /// Draw selection start/end labels
    pub show_selection_extents: bool,

    /// Tie-break used when layers disagree about a zoom level
    pub zoom_policy: ZoomPolicy,

    /// Below this fraction of the view width, an invalid cache isn't rebuilt
    /// and layers paint straight onto the target
    pub cache_skip_fraction: f32,

    /// Zoom level for new views
    pub default_zoom_level: ZoomLevel,

    /// Overview outline colour for the primary view, `0xRRGGBB`
    pub overview_outline_colour: u32,

    /// Smallest cached summary block is `2^min_cache_power` frames
    pub min_cache_power: u32,

    /// How views follow the play pointer
    pub playback_follow: PlaybackFollowMode,

    /// How often the UI should call `poll_fill` on loading models
    pub fill_poll_interval_ms: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            font_size: 10,
            light_background: true,
            show_centre_line: true,
            show_frame_count: true,
            show_selection_extents: false,
            zoom_policy: ZoomPolicy::default(),
            cache_skip_fraction: 0.1,
            default_zoom_level: 1024,
            overview_outline_colour: 0x000000,
            min_cache_power: DEFAULT_MIN_CACHE_POWER,
            playback_follow: PlaybackFollowMode::default(),
            fill_poll_interval_ms: 100,
        }
    }
}

impl ViewConfig {
    /// Width in pixels below which an invalid cache is bypassed
    pub fn cache_skip_width(&self, view_width: u32) -> u32 {
        (view_width as f32 * self.cache_skip_fraction.clamp(0.0, 1.0)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_skip_width_uses_fraction() {
        let config = ViewConfig::default();
        assert_eq!(config.cache_skip_width(800), 80);
    }

    #[test]
    fn test_cache_skip_fraction_is_clamped() {
        let config = ViewConfig {
            cache_skip_fraction: 3.0,
            ..ViewConfig::default()
        };
        assert_eq!(config.cache_skip_width(500), 500);
    }
}
