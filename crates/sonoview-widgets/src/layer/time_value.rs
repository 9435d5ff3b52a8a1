//! Time-value layer: sparse points plotted against a value axis

use std::sync::Arc;

use sonoview_core::model::SparseTimeValueModel;

use super::{frame_span, y_for_value};
use crate::canvas::{Canvas, Rect};
use crate::context::ViewContext;
use crate::geometry::ViewGeometry;

/// Half-size of a point marker in pixels
const POINT_RADIUS: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlotStyle {
    /// A small square per point
    #[default]
    Points,
    /// A square plus a line down to the baseline
    Stems,
}

pub struct TimeValueLayer {
    model: Arc<SparseTimeValueModel>,
    style: PlotStyle,
    display_extents: Option<(f32, f32)>,
    show_labels: bool,
}

impl TimeValueLayer {
    pub fn new(model: Arc<SparseTimeValueModel>) -> Self {
        Self {
            model,
            style: PlotStyle::default(),
            display_extents: None,
            show_labels: true,
        }
    }

    pub fn model(&self) -> &Arc<SparseTimeValueModel> {
        &self.model
    }

    pub fn plot_style(&self) -> PlotStyle {
        self.style
    }

    pub fn set_plot_style(&mut self, style: PlotStyle) {
        self.style = style;
    }

    pub fn set_show_labels(&mut self, show_labels: bool) {
        self.show_labels = show_labels;
    }

    /// Value range mapped onto the view height
    ///
    /// Falls back to the model's own extents until narrowed by
    /// [`set_display_extents`](Self::set_display_extents).
    pub fn display_extents(&self) -> Option<(f32, f32)> {
        self.display_extents.or_else(|| self.model.value_extents())
    }

    pub fn set_display_extents(&mut self, min: f32, max: f32) {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.display_extents = Some((min, max));
    }

    pub fn paint(
        &self,
        geometry: &ViewGeometry,
        context: &ViewContext,
        canvas: &mut dyn Canvas,
        rect: Rect,
    ) {
        let Some((min, max)) = self.display_extents() else {
            return;
        };
        let h = geometry.height;
        let colour = context.palette.point_color;

        let (start, end) = frame_span(geometry, rect.x, rect.right() - 1, POINT_RADIUS + 1);
        let points = self.model.points_within(start, end);

        let baseline = y_for_value(min.max(0.0).min(max), min, max, h);

        for point in &points {
            let x = geometry.x_for_frame(point.frame);
            let y = y_for_value(point.value, min, max, h);

            if self.style == PlotStyle::Stems {
                canvas.draw_line(x, baseline, x, y, colour);
            }

            canvas.fill_rect(
                Rect::new(
                    x - POINT_RADIUS,
                    y - POINT_RADIUS,
                    POINT_RADIUS * 2 + 1,
                    POINT_RADIUS * 2 + 1,
                ),
                colour,
            );

            if self.show_labels && !point.label.is_empty() {
                canvas.draw_text(x + POINT_RADIUS + 3, y - POINT_RADIUS, &point.label, colour);
            }
        }
    }
}
