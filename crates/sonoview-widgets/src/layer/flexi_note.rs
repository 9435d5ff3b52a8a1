//! Note layer: one bar per note, pitch on the vertical axis

use std::sync::Arc;

use sonoview_core::model::NoteModel;

use super::{frame_span, y_for_value};
use crate::canvas::{Canvas, Rect};
use crate::context::ViewContext;
use crate::geometry::ViewGeometry;

/// Bar height in pixels
const NOTE_HEIGHT: i32 = 4;

pub struct FlexiNoteLayer {
    model: Arc<NoteModel>,
    display_extents: Option<(f32, f32)>,
}

impl FlexiNoteLayer {
    pub fn new(model: Arc<NoteModel>) -> Self {
        Self {
            model,
            display_extents: None,
        }
    }

    pub fn model(&self) -> &Arc<NoteModel> {
        &self.model
    }

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
        let colour = context.palette.note_color;
        let outline = context.palette.foreground;

        let (start, end) = frame_span(geometry, rect.x, rect.right() - 1, 1);

        for note in self.model.notes_within(start, end) {
            let x0 = geometry.x_for_frame(note.frame);
            let x1 = geometry.x_for_frame(note.end_frame()).max(x0 + 1);
            let y = y_for_value(note.value, min, max, h) - NOTE_HEIGHT / 2;
            let bar = Rect::new(x0, y, x1 - x0, NOTE_HEIGHT);

            canvas.fill_rect(bar, colour.with_alpha((64.0 + note.level.clamp(0.0, 1.0) * 191.0) as u8));
            canvas.draw_rect_outline(bar, outline);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Bitmap;
    use sonoview_core::model::Note;

    #[test]
    fn test_note_bar_spans_duration() {
        let model = NoteModel::new(8000);
        model.add_note(Note::new(100, 300, 60.0));
        model.add_note(Note::new(600, 100, 72.0));
        let layer = FlexiNoteLayer::new(Arc::new(model));
        assert_eq!(layer.display_extents(), Some((60.0, 72.0)));

        let context = ViewContext::default();
        let bg = context.palette.background;
        let mut bmp = Bitmap::new(100, 50, bg);
        let geometry = ViewGeometry::new(100, 50, 500, 10);
        layer.paint(&geometry, &context, &mut bmp, Rect::from_size(100, 50));

        // first note: x 10..40 at the bottom of the range
        assert_ne!(bmp.pixel(25, 48), Some(bg));
        assert_eq!(bmp.pixel(45, 48), Some(bg));
        // second note at the top
        assert_ne!(bmp.pixel(65, 0), Some(bg));
    }

    #[test]
    fn test_notes_overlapping_rect_are_found() {
        // a long note that starts well before the painted rect
        let model = NoteModel::new(8000);
        model.add_note(Note::new(0, 900, 1.0));
        let layer = FlexiNoteLayer::new(Arc::new(model));

        let context = ViewContext::default();
        let bg = context.palette.background;
        let mut bmp = Bitmap::new(100, 50, bg);
        let geometry = ViewGeometry::new(100, 50, 500, 10);
        layer.paint(&geometry, &context, &mut bmp, Rect::new(60, 0, 10, 50));
        assert_ne!(bmp.pixel(65, 25 - NOTE_HEIGHT / 2), Some(bg));
    }
}
