//! Time ruler: labelled ticks at round real-time intervals
//!
//! Has no model. The tick spacing is the smallest round interval that
//! leaves at least [`MIN_TICK_SPACING`] pixels between labelled ticks at
//! the current zoom level.

use sonoview_core::real_time::RealTime;
use sonoview_core::{FrameIndex, SampleRate};

use crate::canvas::{Canvas, Rect};
use crate::context::ViewContext;
use crate::geometry::ViewGeometry;

/// Candidate label intervals in milliseconds
const INTERVALS_MS: [i64; 22] = [
    1, 2, 5, 10, 20, 50, 100, 200, 500, 1_000, 2_000, 5_000, 10_000, 15_000, 30_000, 60_000,
    120_000, 300_000, 600_000, 900_000, 1_800_000, 3_600_000,
];

/// Minimum pixels between labelled ticks
pub const MIN_TICK_SPACING: f64 = 60.0;

const MAJOR_TICK: i32 = 8;
const MINOR_TICK: i32 = 4;

pub struct TimeRulerLayer {
    sample_rate: SampleRate,
}

impl TimeRulerLayer {
    pub fn new(sample_rate: SampleRate) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Labelled tick interval in ms for a zoom level
    pub fn interval_ms(&self, zoom: u32) -> i64 {
        let ms_per_pixel = zoom.max(1) as f64 * 1000.0 / self.sample_rate as f64;
        INTERVALS_MS
            .iter()
            .copied()
            .find(|&ms| ms as f64 / ms_per_pixel >= MIN_TICK_SPACING)
            .unwrap_or(INTERVALS_MS[INTERVALS_MS.len() - 1])
    }

    fn frame_for_ms(&self, ms: i64) -> FrameIndex {
        RealTime::new(0, ms * 1_000_000).to_frame(self.sample_rate)
    }

    pub fn paint(
        &self,
        geometry: &ViewGeometry,
        context: &ViewContext,
        canvas: &mut dyn Canvas,
        rect: Rect,
    ) {
        let palette = &context.palette;
        let metrics = context.text_metrics();

        let interval = self.interval_ms(geometry.zoom);
        let minor_divisions: i64 = if interval % 5 == 0 {
            5
        } else if interval % 2 == 0 {
            2
        } else {
            1
        };
        let step = interval / minor_divisions;

        let rate = self.sample_rate as i64;
        // labels hang off to the right of their tick
        let label_room = metrics.width("00:00:00.000") + 2;
        let first_frame = geometry.frame_for_x(rect.x - label_room);
        let last_frame = geometry.frame_for_x(rect.right() + 1);

        let first_ms = (first_frame * 1000).div_euclid(rate);
        let mut k = first_ms.div_euclid(step);

        loop {
            let ms = k * step;
            let frame = self.frame_for_ms(ms);
            if frame > last_frame {
                break;
            }
            k += 1;

            let x = geometry.x_for_frame(frame);
            if ms % interval == 0 {
                canvas.draw_line(x, 0, x, MAJOR_TICK, palette.ruler_tick);
                let text = RealTime::new(0, ms * 1_000_000).to_text(false);
                canvas.draw_text(x + 2, MAJOR_TICK + 1, &text, palette.ruler_text);
            } else {
                canvas.draw_line(x, 0, x, MINOR_TICK, palette.ruler_tick);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Bitmap;

    #[test]
    fn test_interval_grows_with_zoom() {
        let ruler = TimeRulerLayer::new(1000);
        // 1 ms per pixel
        assert_eq!(ruler.interval_ms(1), 100);
        // 10 ms per pixel
        assert_eq!(ruler.interval_ms(10), 1_000);
        assert_eq!(ruler.interval_ms(1_000_000), 3_600_000);
    }

    #[test]
    fn test_ticks_and_labels() {
        let ruler = TimeRulerLayer::new(1000);
        let context = ViewContext::default();
        let bg = context.palette.background;
        let mut bmp = Bitmap::new(400, 40, bg);
        // 10 frames per pixel from frame 0: labelled tick every 100 px
        let geometry = ViewGeometry::new(400, 40, 2000, 10);
        ruler.paint(&geometry, &context, &mut bmp, Rect::from_size(400, 40));

        let tick = context.palette.ruler_tick;
        assert_eq!(bmp.pixel(100, MAJOR_TICK), Some(tick));
        assert_eq!(bmp.pixel(120, MINOR_TICK), Some(tick));
        assert_eq!(bmp.pixel(120, MAJOR_TICK), Some(bg));

        let labels: Vec<&str> = bmp.text_runs().iter().map(|r| r.text.as_str()).collect();
        assert!(labels.contains(&"0"));
        assert!(labels.contains(&"1"));
        assert!(labels.contains(&"3"));
    }
}
