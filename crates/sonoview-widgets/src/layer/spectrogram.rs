//! Spectrogram layer
//!
//! Paints a dense column model (one column of bin magnitudes per
//! `resolution` frames) as an opaque heat map. Bin 0 is at the bottom.

use std::sync::Arc;

use sonoview_core::model::DenseColumnModel;
use sonoview_core::FrameIndex;

use crate::canvas::{Canvas, Color, Rect};
use crate::context::ViewContext;
use crate::geometry::ViewGeometry;

/// Colour ramp stops, from silence to the loudest bin
const RAMP: [Color; 5] = [
    Color::rgb(0, 0, 0),
    Color::rgb(40, 0, 110),
    Color::rgb(180, 30, 90),
    Color::rgb(250, 150, 20),
    Color::rgb(255, 255, 200),
];

pub struct SpectrogramLayer {
    model: Arc<DenseColumnModel>,
    /// Square root of the normalised magnitude before colouring
    sqrt_scale: bool,
}

impl SpectrogramLayer {
    pub fn new(model: Arc<DenseColumnModel>) -> Self {
        Self {
            model,
            sqrt_scale: true,
        }
    }

    pub fn model(&self) -> &Arc<DenseColumnModel> {
        &self.model
    }

    pub fn set_sqrt_scale(&mut self, sqrt_scale: bool) {
        self.sqrt_scale = sqrt_scale;
    }

    pub fn paint(
        &self,
        geometry: &ViewGeometry,
        context: &ViewContext,
        canvas: &mut dyn Canvas,
        rect: Rect,
    ) {
        canvas.fill_rect(rect, context.palette.background);

        let bins = self.model.bin_count() as i32;
        if bins == 0 || geometry.height <= 0 {
            return;
        }
        let max = self.model.max_value();
        if max <= 0.0 {
            return;
        }

        let h = geometry.height;
        let mut x = rect.x;
        while x < rect.right() {
            let frame = geometry.frame_for_x(x);
            let Some(index) = self.column_for_frame(frame) else {
                x += 1;
                continue;
            };

            // Columns wider than a pixel are filled in one go
            let mut x_end = x + 1;
            while x_end < rect.right()
                && self.column_for_frame(geometry.frame_for_x(x_end)) == Some(index)
            {
                x_end += 1;
            }

            if let Some(column) = self.model.column(index) {
                for (b, &value) in column.iter().enumerate() {
                    let b = b as i32;
                    let y0 = h - ((b + 1) * h) / bins;
                    let y1 = h - (b * h) / bins;
                    if y1 <= rect.y || y0 >= rect.bottom() {
                        continue;
                    }
                    let colour = self.colour_for(value / max);
                    canvas.fill_rect(Rect::new(x, y0, x_end - x, (y1 - y0).max(1)), colour);
                }
            }

            x = x_end;
        }
    }

    fn column_for_frame(&self, frame: FrameIndex) -> Option<usize> {
        if frame < 0 {
            return None;
        }
        self.model.column_index_for_frame(frame)
    }

    fn colour_for(&self, level: f32) -> Color {
        let level = level.clamp(0.0, 1.0);
        let level = if self.sqrt_scale { level.sqrt() } else { level };
        let scaled = level * (RAMP.len() - 1) as f32;
        let i = (scaled.floor() as usize).min(RAMP.len() - 2);
        RAMP[i].mix(RAMP[i + 1], scaled - i as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Bitmap;

    fn model() -> Arc<DenseColumnModel> {
        let model = DenseColumnModel::new(8000, 100, 4);
        model.push_column(vec![0.0, 0.0, 0.0, 1.0]);
        model.push_column(vec![1.0, 0.0, 0.0, 0.0]);
        Arc::new(model)
    }

    #[test]
    fn test_bins_stack_from_bottom() {
        let layer = SpectrogramLayer::new(model());
        let context = ViewContext::default();
        let mut bmp = Bitmap::new(20, 40, Color::rgb(1, 2, 3));
        // zoom 10, start frame 0: column 0 covers x 0..10
        let geometry = ViewGeometry::new(20, 40, 100, 10);
        layer.paint(&geometry, &context, &mut bmp, Rect::from_size(20, 40));

        let hot = RAMP[RAMP.len() - 1];
        // column 0: top bin hot, bottom bin silent
        assert_eq!(bmp.pixel(5, 2), Some(hot));
        assert_eq!(bmp.pixel(5, 38), Some(RAMP[0]));
        // column 1: bottom bin hot
        assert_eq!(bmp.pixel(15, 38), Some(hot));
        assert_eq!(bmp.pixel(15, 2), Some(RAMP[0]));
    }

    #[test]
    fn test_fills_background_where_no_columns() {
        let layer = SpectrogramLayer::new(model());
        let context = ViewContext::default();
        let mut bmp = Bitmap::new(40, 10, Color::rgb(1, 2, 3));
        let geometry = ViewGeometry::new(40, 10, 200, 10);
        layer.paint(&geometry, &context, &mut bmp, Rect::from_size(40, 10));
        assert_eq!(bmp.pixel(35, 5), Some(context.palette.background));
    }

    #[test]
    fn test_colour_ramp_ends() {
        let layer = SpectrogramLayer::new(model());
        assert_eq!(layer.colour_for(0.0), RAMP[0]);
        assert_eq!(layer.colour_for(1.0), RAMP[RAMP.len() - 1]);
        assert_eq!(layer.colour_for(7.0), RAMP[RAMP.len() - 1]);
    }
}
