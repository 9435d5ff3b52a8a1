//! Pane: an interactive view
//!
//! Adds navigation on top of [`View`]: drag to scroll, wheel zoom and
//! scroll, the horizontal zoom thumbwheel, shift-drag zoom to a region,
//! mouse selection with edge scrolling, and the centre line overlay.

use std::sync::Arc;

use sonoview_core::model::WaveFileModel;
use sonoview_core::real_time::RealTime;
use sonoview_core::selection::Selection;
use sonoview_core::zoom::RoundingDirection;
use sonoview_core::{FrameIndex, PlaybackFollowMode, ZoomLevel, MAX_ZOOM_LEVEL};

use crate::canvas::{Canvas, Rect};
use crate::context::ViewContext;
use crate::layer::{Layer, LayerId};
use crate::view::{PaintReport, View};

/// Wheel angle units per notch
const WHEEL_NOTCH: i32 = 120;

/// Accumulated wheel angles at least this large are discarded
const WHEEL_DISCARD: i32 = 600;

/// Pixels before a drag commits to a direction
const DRAG_SMALL_THRESHOLD: i32 = 10;

/// Pixels off-axis before a committed drag becomes free
const DRAG_BIG_THRESHOLD: i32 = 80;

const THUMBWHEEL_CONSTRAINED_NOTCHES: u32 = 50;
const THUMBWHEEL_FREE_NOTCHES: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    #[default]
    Navigate,
    Select,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Unresolved,
    Horizontal,
    Vertical,
    Free,
}

impl DragMode {
    /// Resolve the drag direction from the offset to the click point
    pub fn update(self, xdiff: i32, ydiff: i32, can_move_vertical: bool) -> DragMode {
        let (ax, ay) = (xdiff.abs(), ydiff.abs());
        let mut mode = self;
        if mode == DragMode::Unresolved {
            if ay > DRAG_SMALL_THRESHOLD && ay > ax * 2 {
                mode = DragMode::Vertical;
            } else if ax > DRAG_SMALL_THRESHOLD && ax > ay * 2 {
                mode = DragMode::Horizontal;
            } else if ax > DRAG_SMALL_THRESHOLD && ay > DRAG_SMALL_THRESHOLD {
                mode = DragMode::Free;
            }
        }
        if mode == DragMode::Vertical && ax > DRAG_BIG_THRESHOLD {
            mode = DragMode::Free;
        }
        if mode == DragMode::Horizontal && can_move_vertical && ay > DRAG_BIG_THRESHOLD {
            mode = DragMode::Free;
        }
        mode
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Interaction {
    Navigate(DragMode),
    ZoomRect,
    /// Selection anchored at a frame on the reference timeline
    Select { anchor: FrameIndex, adding: bool },
}

#[derive(Debug, Clone, Copy)]
struct Click {
    x: i32,
    y: i32,
    drag_centre: FrameIndex,
    interaction: Interaction,
}

pub struct Pane {
    view: View,
    tool: ToolMode,
    click: Option<Click>,
    pending_wheel_vertical: i32,
    pending_wheel_horizontal: i32,
}

impl Pane {
    pub fn new(context: Arc<ViewContext>, width: i32, height: i32) -> Self {
        Self {
            view: View::new(context, width, height),
            tool: ToolMode::default(),
            click: None,
            pending_wheel_vertical: 0,
            pending_wheel_horizontal: 0,
        }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut View {
        &mut self.view
    }

    /// Add the layer a named transform produces, leaving it out when the
    /// transform isn't available
    pub fn add_transform_layer(&mut self, name: &str, model: &Arc<WaveFileModel>) -> Option<LayerId> {
        match Layer::from_transform(name, model) {
            Ok(layer) => Some(self.view.add_layer(layer)),
            Err(e) => {
                log::warn!("pane {:?}: omitting layer: {}", self.view.id(), e);
                None
            }
        }
    }

    pub fn tool_mode(&self) -> ToolMode {
        self.tool
    }

    pub fn set_tool_mode(&mut self, tool: ToolMode) {
        self.tool = tool;
    }

    /// Current drag direction, while navigating
    pub fn drag_mode(&self) -> Option<DragMode> {
        match self.click?.interaction {
            Interaction::Navigate(mode) => Some(mode),
            _ => None,
        }
    }

    pub fn paint(&mut self, target: &mut dyn Canvas, rect: Rect) -> PaintReport {
        let report = self.view.paint(target, rect);

        let saved_clip = target.clip();
        target.set_clip(Some(report.painted.intersect(&saved_clip)));
        self.draw_centre_line(target);
        target.set_clip(Some(saved_clip));

        report
    }

    fn draw_centre_line(&self, canvas: &mut dyn Canvas) {
        let context = self.view.context();
        if !context.config.show_centre_line || self.view.layer_count() == 0 {
            return;
        }
        let palette = &context.palette;
        let colour = palette.centre_line;
        let (w, h) = (self.view.width(), self.view.height());
        let x = w / 2;

        canvas.draw_line(x, 0, x, h - 1, colour);
        canvas.draw_line(x - 1, 1, x + 1, 1, colour);
        canvas.draw_line(x - 2, 0, x + 2, 0, colour);
        canvas.draw_line(x - 1, h - 2, x + 1, h - 2, colour);
        canvas.draw_line(x - 2, h - 1, x + 2, h - 1, colour);

        if context.config.show_frame_count {
            let metrics = context.text_metrics();
            let centre = self.view.centre_frame();
            let y = h - metrics.height - 6;

            let time = RealTime::from_frame(centre, self.view.sample_rate()).to_text(true);
            let tw = metrics.width(&time);
            canvas.draw_text(x - 4 - tw, y, &time, palette.frame_count_text);
            canvas.draw_text(x + 4, y, &centre.to_string(), palette.frame_count_text);
        }
    }

    // ---------------------------------------------------------------------
    // Mouse
    // ---------------------------------------------------------------------

    pub fn mouse_press(&mut self, x: i32, y: i32, modifiers: Modifiers) {
        let interaction = match self.tool {
            ToolMode::Navigate if modifiers.shift => Interaction::ZoomRect,
            ToolMode::Navigate => Interaction::Navigate(DragMode::Unresolved),
            ToolMode::Select => {
                let anchor = self.view.align_to_reference(self.view.frame_for_x(x).max(0));
                let adding = modifiers.ctrl;
                if let Some(manager) = self.view.manager() {
                    manager.set_in_progress_selection(Selection::new(anchor, anchor), !adding);
                }
                Interaction::Select { anchor, adding }
            }
        };
        self.click = Some(Click {
            x,
            y,
            drag_centre: self.view.centre_frame(),
            interaction,
        });
    }

    pub fn mouse_move(&mut self, x: i32, y: i32, modifiers: Modifiers) {
        let Some(mut click) = self.click else {
            return;
        };

        match click.interaction {
            Interaction::Navigate(mode) => {
                let mode = mode.update(x - click.x, y - click.y, false);
                click.interaction = Interaction::Navigate(mode);
                self.click = Some(click);
                if mode != DragMode::Vertical && mode != DragMode::Unresolved {
                    self.drag_horizontally(&click, x, modifiers);
                }
            }
            Interaction::ZoomRect => {}
            Interaction::Select { anchor, adding } => {
                let frame = self.view.align_to_reference(self.view.frame_for_x(x).max(0));
                if let Some(manager) = self.view.manager() {
                    manager.set_in_progress_selection(Selection::new(anchor, frame), !adding);
                }
                self.edge_scroll(x);
            }
        }
    }

    pub fn mouse_release(&mut self, x: i32, y: i32, modifiers: Modifiers) {
        let Some(click) = self.click.take() else {
            return;
        };

        match click.interaction {
            Interaction::Navigate(mode) => {
                if mode != DragMode::Vertical && mode != DragMode::Unresolved {
                    self.drag_horizontally(&click, x, modifiers);
                }
            }
            Interaction::ZoomRect => {
                let (x0, x1) = (click.x.min(x), click.x.max(x));
                let (y0, y1) = (click.y.min(y), click.y.max(y));
                if x1 - x0 > 1 {
                    self.zoom_to_region(x0, y0, x1, y1);
                }
            }
            Interaction::Select { anchor, adding } => {
                let frame = self.view.align_to_reference(self.view.frame_for_x(x).max(0));
                if let Some(manager) = self.view.manager() {
                    let selection = Selection::new(anchor, frame);
                    manager.clear_in_progress_selection();
                    if !selection.is_empty() {
                        if adding {
                            manager.add_selection(selection);
                        } else {
                            manager.set_selection(selection);
                        }
                    }
                }
            }
        }
    }

    fn drag_horizontally(&mut self, click: &Click, x: i32, modifiers: Modifiers) {
        let view = &mut self.view;
        let frame_off = view.frame_for_x(x) - view.frame_for_x(click.x);
        let drag_centre = click.drag_centre;

        let mut new_centre = if frame_off < 0 {
            drag_centre - frame_off
        } else if drag_centre >= frame_off {
            drag_centre - frame_off
        } else {
            0
        };

        let models_end = view.models_end_frame();
        if new_centre >= models_end {
            new_centre = models_end;
            if new_centre > 0 {
                new_centre -= 1;
            }
        }

        if view.x_for_frame(view.centre_frame()) != view.x_for_frame(new_centre) {
            if view.manager().is_some_and(|m| m.is_playing()) {
                view.set_play_pointer_detached(true);
            }
            view.set_centre_frame(new_centre, !modifiers.alt);
        }
    }

    /// Scroll while a selection drag nears either edge
    pub fn edge_scroll(&mut self, mouse_x: i32) {
        let view = &mut self.view;
        if view.playback_follow() == PlaybackFollowMode::ScrollContinuous
            && view.manager().is_some_and(|m| m.is_playing())
        {
            return;
        }

        let mouse_frame = view.frame_for_x(mouse_x);
        let start = view.start_frame();
        let offset = mouse_frame - start;
        let available = (view.end_frame() - start) as f64;

        let mut delta: FrameIndex = 0;
        if offset as f64 >= available * 0.95 {
            delta = (offset as f64 - available * 0.95) as FrameIndex + 1;
        } else if offset as f64 <= available * 0.10 {
            delta = -((available * 0.10 - offset as f64) as FrameIndex + 1);
        }

        if delta != 0 {
            let centre = view.centre_frame();
            view.set_centre_frame(centre + delta, true);
        }
    }

    /// Zoom so that pixels `x0..x1` fill the pane, and narrow the first
    /// layer with a value range to rows `y0..y1`
    pub fn zoom_to_region(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) {
        let view = &mut self.view;
        let w = x1 - x0;
        let width = view.width().max(1);
        let height = view.height().max(1);

        let mut new_start = view.frame_for_x(x0);
        let visible = view.end_frame() - view.start_frame();
        if new_start <= -visible {
            new_start = -visible + 1;
        }
        let models_end = view.models_end_frame();
        if new_start >= models_end {
            new_start = models_end - 1;
        }

        let ratio = w as f64 / width as f64;
        let new_zoom = ((view.zoom_level() as f64 * ratio).round() as ZoomLevel).max(1);
        let new_zoom = view.negotiate_zoom(new_zoom, RoundingDirection::RoundNearest);
        log::debug!("zoom to region x {}..{}: zoom {}", x0, x1, new_zoom);
        view.set_zoom_level(new_zoom);
        view.set_start_frame(new_start);

        let target = view
            .layers()
            .iter()
            .find_map(|l| l.value_extents().map(|extents| (l.id(), extents)));
        if let Some((id, (min, max))) = target {
            let rmin = min + ((max - min) * (height - y1) as f32) / height as f32;
            let rmax = min + ((max - min) * (height - y0) as f32) / height as f32;
            if let Some(layer) = view.layer_mut(id) {
                layer.set_display_extents(rmin, rmax);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Wheel
    // ---------------------------------------------------------------------

    /// Wheel motion in angle units (120 per notch)
    pub fn wheel(&mut self, angle_x: i32, angle_y: i32, modifiers: Modifiers) {
        if angle_y != 0 {
            self.pending_wheel_vertical += angle_y;
            if self.pending_wheel_vertical.abs() >= WHEEL_DISCARD {
                self.pending_wheel_vertical = 0;
                return;
            }
            while self.pending_wheel_vertical.abs() >= WHEEL_NOTCH {
                let sign = self.pending_wheel_vertical.signum();
                self.wheel_vertical(sign, modifiers);
                self.pending_wheel_vertical -= sign * WHEEL_NOTCH;
            }
        }
        if angle_x != 0 {
            self.pending_wheel_horizontal += angle_x;
            if self.pending_wheel_horizontal.abs() >= WHEEL_DISCARD {
                self.pending_wheel_horizontal = 0;
                return;
            }
            while self.pending_wheel_horizontal.abs() >= WHEEL_NOTCH {
                let sign = self.pending_wheel_horizontal.signum();
                self.wheel_horizontal(sign);
                self.pending_wheel_horizontal -= sign * WHEEL_NOTCH;
            }
        }
    }

    fn wheel_vertical(&mut self, sign: i32, modifiers: Modifiers) {
        if modifiers.shift || modifiers.ctrl {
            self.wheel_horizontal(sign);
            return;
        }
        let view = &mut self.view;
        let zoom = view.zoom_level();
        let new_zoom = if sign > 0 {
            if zoom <= 2 {
                1
            } else {
                view.negotiate_zoom(zoom - 1, RoundingDirection::RoundDown)
            }
        } else {
            view.negotiate_zoom(zoom.saturating_add(1), RoundingDirection::RoundUp)
        };
        if new_zoom != zoom {
            view.set_zoom_level(new_zoom);
        }
    }

    fn wheel_horizontal(&mut self, sign: i32) {
        let pixels = (self.view.width() / 4) * sign;
        self.wheel_horizontal_fine(pixels);
    }

    /// Scroll by `pixels`; positive moves towards the start
    pub fn wheel_horizontal_fine(&mut self, pixels: i32) {
        let view = &mut self.view;
        let models_end = view.models_end_frame();
        if view.start_frame() < 0 && view.end_frame() >= models_end {
            return;
        }
        let delta = pixels as FrameIndex * view.zoom_level() as FrameIndex;
        let centre = view.centre_frame();
        let new_centre = if centre < delta {
            0
        } else if centre - delta >= models_end {
            models_end
        } else {
            centre - delta
        };
        view.set_centre_frame(new_centre, true);
    }

    // ---------------------------------------------------------------------
    // Thumbwheel
    // ---------------------------------------------------------------------

    /// Some layer can only be shown at its constraint's steps
    fn has_zoom_constraint(&self) -> bool {
        self.view
            .layers()
            .iter()
            .any(|l| l.zoom_constraint().is_some() && !l.supports_other_zoom_levels())
    }

    fn free_step(level: ZoomLevel) -> ZoomLevel {
        let mut step = level / 10;
        let mut power = 0;
        while step > 0 {
            step /= 2;
            power += 1;
        }
        1 << power
    }

    /// Walk the thumbwheel's zoom steps, calling `visit(notch, level)` for
    /// each until it returns false; returns the notch count and final level
    fn walk_thumbwheel(&self, mut visit: impl FnMut(u32, ZoomLevel) -> bool) -> (u32, ZoomLevel) {
        let mut count = 0;
        let mut level: ZoomLevel = 1;
        if self.has_zoom_constraint() {
            loop {
                if !visit(count, level) {
                    break;
                }
                let next = self.view.negotiate_zoom(level + 1, RoundingDirection::RoundUp);
                if next == level {
                    break;
                }
                level = next;
                count += 1;
                if count == THUMBWHEEL_CONSTRAINED_NOTCHES {
                    break;
                }
            }
        } else {
            loop {
                if !visit(count, level) {
                    break;
                }
                level += Self::free_step(level);
                count += 1;
                if count == THUMBWHEEL_FREE_NOTCHES || level > MAX_ZOOM_LEVEL {
                    break;
                }
            }
        }
        (count, level)
    }

    /// `(maximum, value)` of the horizontal zoom thumbwheel; larger values
    /// are closer zooms
    pub fn thumbwheel_state(&self) -> (u32, u32) {
        let zoom = self.view.zoom_level();
        let constrained = self.has_zoom_constraint();
        let mut current = 0;
        let (count, _) = self.walk_thumbwheel(|notch, level| {
            let here = if constrained { zoom == level } else { zoom >= level };
            if here {
                current = notch;
            }
            true
        });
        (count, count - current)
    }

    pub fn set_thumbwheel_value(&mut self, value: u32) {
        let (maximum, _) = self.thumbwheel_state();
        let target = maximum.saturating_sub(value);
        let (_, level) = self.walk_thumbwheel(|notch, _| notch != target);
        self.view.set_zoom_level(level);
    }
}
