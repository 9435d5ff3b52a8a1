//! Overview strip
//!
//! A view zoomed out to show every model at once, with an outline for
//! each visible extent of the other views. Dragging or double-clicking
//! moves those views through a locked centre change; the overview itself
//! never scrolls.

use std::collections::HashSet;
use std::sync::Arc;

use sonoview_core::zoom::RoundingDirection;
use sonoview_core::{FrameIndex, ModelId, PlaybackFollowMode, ZoomLevel};

use crate::canvas::{Canvas, Rect};
use crate::context::ViewContext;
use crate::layer::{Layer, LayerId};
use crate::view::{PaintReport, View};
use crate::view_manager::{ViewId, ViewManager};

/// Visible span of another view on the reference timeline
///
/// Negative frames are kept as they are; only frames at or after zero
/// pass through alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewExtent {
    pub view: ViewId,
    pub start: FrameIndex,
    pub end: FrameIndex,
    pub centre: FrameIndex,
}

impl ViewExtent {
    pub fn of(view: &View) -> Self {
        let to_reference = |frame: FrameIndex| {
            if frame >= 0 {
                view.align_to_reference(frame)
            } else {
                frame
            }
        };
        Self {
            view: view.id(),
            start: to_reference(view.frame_for_x(0)),
            end: to_reference(view.frame_for_x(view.width())),
            centre: view.align_to_reference(view.centre_frame()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    x: i32,
    centre: FrameIndex,
    last_emitted: FrameIndex,
}

pub struct Overview {
    view: View,
    extents: Vec<ViewExtent>,
    drag: Option<Drag>,
}

impl Overview {
    pub fn new(context: Arc<ViewContext>, width: i32, height: i32) -> Self {
        let mut view = View::new(context, width, height);
        view.set_follow_global_pan(false);
        view.set_follow_global_zoom(false);
        Self {
            view,
            extents: Vec::new(),
            drag: None,
        }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn id(&self) -> ViewId {
        self.view.id()
    }

    pub fn set_manager(&mut self, manager: ViewManager) {
        self.view.set_manager(manager);
        self.fit_to_models();
    }

    pub fn add_layer(&mut self, layer: Layer) -> LayerId {
        let id = self.view.add_layer(layer);
        self.fit_to_models();
        id
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let layer = self.view.remove_layer(id);
        self.fit_to_models();
        layer
    }

    pub fn set_size(&mut self, width: i32, height: i32) {
        self.view.set_size(width, height);
        self.fit_to_models();
    }

    pub fn model_changed(&mut self) {
        self.view.model_replaced();
        self.fit_to_models();
    }

    /// Part of a model filled in; the models extent may have grown
    pub fn model_changed_within(&mut self, model: ModelId, start: FrameIndex, end: FrameIndex) {
        self.view.model_changed_within(model, start, end);
        self.fit_to_models();
    }

    pub fn shows_model(&self, model: ModelId) -> bool {
        self.view.model_ids().contains(&model)
    }

    /// Zoom so the models span the width, centred on their midpoint
    /// unless they fit with room to spare
    pub fn fit_to_models(&mut self) {
        let start = self.view.models_start_frame();
        let end = self.view.models_end_frame();
        let width = self.view.width().max(1) as FrameIndex;

        let zoom = ((end - start) / width).max(1) as ZoomLevel;
        let zoom = self.view.negotiate_zoom(zoom, RoundingDirection::RoundUp);
        if zoom != self.view.zoom_level() {
            log::debug!("overview zoom {} for frames {}..{}", zoom, start, end);
            self.view.set_zoom_level(zoom);
        }

        let mut centre = start + zoom as FrameIndex * (width / 2);
        if centre > (start + end) / 2 {
            centre = (start + end) / 2;
        }
        self.view.set_centre_frame(centre, false);
    }

    // ---------------------------------------------------------------------
    // Tracked views
    // ---------------------------------------------------------------------

    /// Start or keep tracking a view's extent
    pub fn register_view(&mut self, view: &View) {
        self.view_extent_changed(view);
    }

    pub fn unregister_view(&mut self, id: ViewId) {
        self.extents.retain(|e| e.view != id);
        self.view.request_repaint();
    }

    pub fn view_extent_changed(&mut self, view: &View) {
        let extent = ViewExtent::of(view);
        match self.extents.iter_mut().find(|e| e.view == extent.view) {
            Some(existing) if *existing == extent => return,
            Some(existing) => *existing = extent,
            None => self.extents.push(extent),
        }
        self.view.request_repaint();
    }

    pub fn extents(&self) -> &[ViewExtent] {
        &self.extents
    }

    fn to_overview_frame(&self, frame: FrameIndex) -> FrameIndex {
        if frame >= 0 {
            self.view.align_from_reference(frame)
        } else {
            frame
        }
    }

    /// One rectangle per distinct horizontal extent; the last is primary
    pub fn outline_rects(&self) -> Vec<Rect> {
        let h = self.view.height();
        let mut seen = HashSet::new();
        let mut rects = Vec::new();
        let mut y = 0;

        for extent in &self.extents {
            let x0 = self.view.x_for_frame(self.to_overview_frame(extent.start));
            let mut x1 = self.view.x_for_frame(self.to_overview_frame(extent.end));
            if x1 <= x0 {
                x1 = x0 + 1;
            }
            if seen.insert((x0, x1)) {
                y += h / 10 + 1;
                rects.push(Rect::new(x0, y, x1 - x0, h - 2 * y));
            }
        }
        rects
    }

    // ---------------------------------------------------------------------
    // Painting
    // ---------------------------------------------------------------------

    pub fn paint(&mut self, target: &mut dyn Canvas, rect: Rect) -> PaintReport {
        let report = self.view.paint(target, rect);

        let saved_clip = target.clip();
        target.set_clip(Some(report.painted.intersect(&saved_clip)));
        self.draw_outlines(target);
        target.set_clip(Some(saved_clip));

        report
    }

    fn draw_outlines(&self, canvas: &mut dyn Canvas) {
        let rects = self.outline_rects();
        let Some(primary) = rects.last().copied() else {
            return;
        };
        let palette = &self.view.context().palette;
        let (w, h) = (self.view.width(), self.view.height());

        // shade everything outside the primary extent
        let shade = palette.overview_shade;
        canvas.fill_rect(Rect::new(0, 0, primary.x, h), shade);
        canvas.fill_rect(Rect::new(primary.right(), 0, w - primary.right(), h), shade);
        canvas.fill_rect(Rect::new(primary.x, 0, primary.width, primary.y), shade);
        canvas.fill_rect(
            Rect::new(primary.x, primary.bottom(), primary.width, h - primary.bottom()),
            shade,
        );

        for (i, r) in rects.iter().enumerate() {
            let colour = if i + 1 == rects.len() {
                palette.overview_primary_outline
            } else {
                palette.overview_outline
            };
            canvas.draw_rect_outline(*r, colour);
        }
    }

    // ---------------------------------------------------------------------
    // Mouse
    // ---------------------------------------------------------------------

    pub fn mouse_press(&mut self, x: i32) {
        // drag from the centre of the first tracked view, if any
        let centre = match self.extents.first() {
            Some(extent) => self.to_overview_frame(extent.centre),
            None => self.view.frame_for_x(x).max(0),
        };

        self.drag = Some(Drag {
            x,
            centre,
            last_emitted: centre,
        });
    }

    pub fn mouse_move(&mut self, x: i32) {
        let Some(mut drag) = self.drag else {
            return;
        };

        let zoom = self.view.zoom_level() as FrameIndex;
        let frame_off = (x - drag.x) as FrameIndex * zoom;

        let mut new_centre = drag.centre;
        if frame_off > 0 || new_centre >= -frame_off {
            new_centre += frame_off;
        } else {
            new_centre = 0;
        }

        let models_end = self.view.models_end_frame();
        if new_centre >= models_end {
            new_centre = models_end;
            if new_centre > 0 {
                new_centre -= 1;
            }
        }

        if (new_centre - drag.last_emitted).abs() > zoom {
            let mode = match self.view.playback_follow() {
                PlaybackFollowMode::ScrollContinuous | PlaybackFollowMode::ScrollPageWithCentre => {
                    PlaybackFollowMode::ScrollContinuous
                }
                _ => PlaybackFollowMode::Ignore,
            };
            self.emit_centre(new_centre, mode);
            drag.last_emitted = new_centre;
        }
        self.drag = Some(drag);
    }

    pub fn mouse_release(&mut self, x: i32) {
        if self.drag.is_some() {
            self.mouse_move(x);
        }
        self.drag = None;
    }

    /// Jump the locked views to the clicked frame
    pub fn mouse_double_click(&mut self, x: i32) {
        self.drag = None;
        let frame = self.view.frame_for_x(x);
        let frame = if frame > 0 { frame } else { 0 };
        self.emit_centre(frame, PlaybackFollowMode::ScrollContinuous);
    }

    fn emit_centre(&self, frame: FrameIndex, mode: PlaybackFollowMode) {
        if let Some(manager) = self.view.manager() {
            let reference = if frame > 0 {
                self.view.align_to_reference(frame)
            } else {
                0
            };
            manager.view_centre_frame_changed(self.view.id(), reference, true, mode);
        }
    }

    /// Forward a playback position to the inner view
    pub fn playback_frame_changed(&mut self, frame: FrameIndex) {
        self.view.playback_frame_changed(frame);
    }

    pub fn selection_changed(&mut self) {
        self.view.selection_changed();
    }

    pub fn needs_repaint(&self) -> bool {
        self.view.needs_repaint()
    }
}
