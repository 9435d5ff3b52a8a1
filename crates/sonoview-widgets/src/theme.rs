//! Shared colour palette for views, panes and the overview
//!
//! Two fixed palettes (light and dark background); [`Palette::from_config`]
//! picks one from the [`ViewConfig`] and applies the configured overview
//! outline colour.

use sonoview_core::config::ViewConfig;

use crate::canvas::Color;

/// Selection fill (translucent blue)
pub const SELECTION_FILL: Color = Color::rgba(150, 150, 255, 80);

/// Selection outline
pub const SELECTION_OUTLINE: Color = Color::rgb(150, 150, 255);

/// Waveform channel colours, cycled by channel index
pub const CHANNEL_COLORS: [Color; 4] = [
    Color::rgb(0x1e, 0x3c, 0x9b), // Blue
    Color::rgb(0x1a, 0x80, 0x3c), // Green
    Color::rgb(0xa0, 0x3a, 0x22), // Brick
    Color::rgb(0x6a, 0x2a, 0x8c), // Purple
];

/// Drawn over clipped waveform peaks
pub const CLIP_COLOR: Color = Color::rgb(255, 0, 0);

/// Colours used by every drawing routine
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub light_background: bool,
    pub background: Color,
    pub foreground: Color,
    pub selection_fill: Color,
    pub selection_outline: Color,
    /// Waveform midline and scale guides
    pub guide: Color,
    pub centre_line: Color,
    pub frame_count_text: Color,
    /// Overview shading outside the primary view extent
    pub overview_shade: Color,
    /// Overview outlines of secondary view extents
    pub overview_outline: Color,
    /// Overview outline of the primary view extent
    pub overview_primary_outline: Color,
    pub ruler_tick: Color,
    pub ruler_text: Color,
    pub point_color: Color,
    pub note_color: Color,
}

impl Palette {
    pub fn light() -> Self {
        Self {
            light_background: true,
            background: Color::WHITE,
            foreground: Color::BLACK,
            selection_fill: SELECTION_FILL,
            selection_outline: SELECTION_OUTLINE,
            guide: Color::rgb(200, 200, 200),
            centre_line: Color::BLACK,
            frame_count_text: Color::rgb(50, 50, 50),
            overview_shade: Color::rgba(220, 220, 220, 100),
            overview_outline: Color::rgb(128, 128, 128),
            overview_primary_outline: Color::BLACK,
            ruler_tick: Color::rgb(80, 80, 80),
            ruler_text: Color::BLACK,
            point_color: Color::rgb(0x1a, 0x80, 0x3c),
            note_color: Color::rgb(0x6a, 0x2a, 0x8c),
        }
    }

    pub fn dark() -> Self {
        Self {
            light_background: false,
            background: Color::BLACK,
            foreground: Color::WHITE,
            selection_fill: SELECTION_FILL,
            selection_outline: SELECTION_OUTLINE,
            guide: Color::rgb(64, 64, 64),
            centre_line: Color::rgb(240, 240, 240),
            frame_count_text: Color::rgb(200, 200, 200),
            overview_shade: Color::rgba(40, 40, 40, 100),
            overview_outline: Color::rgb(128, 128, 128),
            overview_primary_outline: Color::WHITE,
            ruler_tick: Color::rgb(180, 180, 180),
            ruler_text: Color::WHITE,
            point_color: Color::rgb(0x60, 0xd0, 0x80),
            note_color: Color::rgb(0xc0, 0x80, 0xff),
        }
    }

    pub fn from_config(config: &ViewConfig) -> Self {
        let mut palette = if config.light_background {
            Self::light()
        } else {
            Self::dark()
        };
        if config.overview_outline_colour != 0 || config.light_background {
            palette.overview_primary_outline = Color::from_hex(config.overview_outline_colour);
        }
        palette
    }

    /// Base colour for waveform channel `ch`
    pub fn channel_color(&self, ch: usize) -> Color {
        let base = CHANNEL_COLORS[ch % CHANNEL_COLORS.len()];
        if self.light_background {
            base
        } else {
            base.mix(Color::WHITE, 0.45)
        }
    }

    /// Colour for waveform means and data that isn't ready yet
    pub fn mid_color(&self, base: Color) -> Color {
        if self.light_background {
            base.mix(Color::WHITE, 0.5)
        } else {
            base.mix(Color::BLACK, 0.5)
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::light()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_follows_background_setting() {
        let dark = ViewConfig {
            light_background: false,
            ..ViewConfig::default()
        };
        let palette = Palette::from_config(&dark);
        assert_eq!(palette.background, Color::BLACK);
        assert_eq!(palette.overview_primary_outline, Color::WHITE);

        let light = Palette::from_config(&ViewConfig::default());
        assert_eq!(light.background, Color::WHITE);
        assert_eq!(light.overview_primary_outline, Color::BLACK);
    }

    #[test]
    fn test_configured_outline_colour() {
        let config = ViewConfig {
            overview_outline_colour: 0xff8000,
            ..ViewConfig::default()
        };
        let palette = Palette::from_config(&config);
        assert_eq!(palette.overview_primary_outline, Color::rgb(255, 128, 0));
    }

    #[test]
    fn test_mid_color_is_lighter_on_light_background() {
        let palette = Palette::light();
        let base = palette.channel_color(0);
        let mid = palette.mid_color(base);
        assert!(mid.r > base.r && mid.g > base.g && mid.b > base.b);
    }
}
