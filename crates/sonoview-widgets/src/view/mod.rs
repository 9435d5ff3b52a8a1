//! View: a stack of layers over a shared frame axis, with a scroll cache
//!
//! ## Painting
//!
//! Layers are split into two groups on every paint:
//!
//! - **scrollable back layers**: the non-dormant scrollable layers below
//!   the first non-scrollable one. These are drawn into the view's cache
//!   bitmap, which is shifted on horizontal moves so that only the exposed
//!   strip has to be redrawn.
//! - **front layers**: everything from the first non-scrollable layer up.
//!   These are drawn straight onto the target on every paint.
//!
//! An opaque layer hides what is below it, so it clears whatever was
//! collected before it. Selections go into the cache as well, as long as no
//! front layer is opaque. The play pointer is always drawn on the target.
//!
//! ```text
//! paint(rect)
//!   ├─ cache invalid ──▶ rect narrow?  ──yes──▶ draw everything directly
//!   │                         └─no──▶ redraw whole cache
//!   ├─ centre moved, |dx| < width ──▶ shift cache, redraw exposed strip
//!   ├─ centre moved, |dx| >= width ─▶ redraw whole cache
//!   └─ unchanged (or sub-pixel) ────▶ blit
//! ```
//!
//! ## Frame mapping
//!
//! The start frame is `centre - (width / 2) * zoom`, floored to a multiple
//! of the zoom level, so every pixel column covers a zoom-aligned frame
//! span and a cache shifted by `dx` columns lines up exactly with a fresh
//! paint at the new centre.

mod cache;

use std::sync::Arc;

use sonoview_core::model::Model;
use sonoview_core::real_time::RealTime;
use sonoview_core::zoom::{negotiate_block_size, RoundingDirection};
use sonoview_core::{
    FrameIndex, ModelId, PlaybackFollowMode, SampleRate, ZoomLevel, DEFAULT_SAMPLE_RATE,
};

use crate::canvas::{Canvas, Rect};
use crate::context::ViewContext;
use crate::geometry::ViewGeometry;
use crate::layer::{Layer, LayerId, LayerProgress};
use crate::view_manager::{ViewId, ViewManager};

use cache::{exposed_strip, ViewCache};
pub use cache::{CacheState, PaintReport};

pub struct View {
    id: ViewId,
    context: Arc<ViewContext>,
    manager: Option<ViewManager>,
    /// Bottom to top
    layers: Vec<Layer>,
    width: i32,
    height: i32,
    centre_frame: FrameIndex,
    zoom: ZoomLevel,
    follow_pan: bool,
    follow_zoom: bool,
    follow_play: PlaybackFollowMode,
    play_pointer_frame: FrameIndex,
    /// User scrolled away from the play pointer while playing
    play_pointer_detached: bool,
    cache: Option<ViewCache>,
    cache_valid: bool,
    last_scrollables: Vec<LayerId>,
    last_front: Vec<LayerId>,
    selection_cached: bool,
    needs_repaint: bool,
    last_error: Option<String>,
}

impl View {
    pub fn new(context: Arc<ViewContext>, width: i32, height: i32) -> Self {
        let zoom = context.config.default_zoom_level.max(1);
        let follow_play = context.config.playback_follow;
        Self {
            id: ViewId::next(),
            context,
            manager: None,
            layers: Vec::new(),
            width: width.max(0),
            height: height.max(0),
            centre_frame: 0,
            zoom,
            follow_pan: true,
            follow_zoom: true,
            follow_play,
            play_pointer_frame: 0,
            play_pointer_detached: false,
            cache: None,
            cache_valid: false,
            last_scrollables: Vec::new(),
            last_front: Vec::new(),
            selection_cached: false,
            needs_repaint: true,
            last_error: None,
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn context(&self) -> &Arc<ViewContext> {
        &self.context
    }

    pub fn manager(&self) -> Option<&ViewManager> {
        self.manager.as_ref()
    }

    /// Attach to a manager, picking up its global centre and zoom where
    /// this view follows them
    pub fn set_manager(&mut self, manager: ViewManager) {
        if self.follow_pan {
            self.centre_frame = self.align_from_reference_with(&manager, manager.global_centre_frame());
        }
        if self.follow_zoom {
            self.zoom = manager.global_zoom_level().max(1);
        }
        self.manager = Some(manager);
        self.invalidate_cache();
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn set_size(&mut self, width: i32, height: i32) {
        if (width, height) != (self.width, self.height) {
            self.width = width.max(0);
            self.height = height.max(0);
            self.invalidate_cache();
        }
    }

    pub fn geometry(&self) -> ViewGeometry {
        ViewGeometry::new(self.width, self.height, self.centre_frame, self.zoom)
    }

    pub fn centre_frame(&self) -> FrameIndex {
        self.centre_frame
    }

    pub fn zoom_level(&self) -> ZoomLevel {
        self.zoom
    }

    pub fn start_frame(&self) -> FrameIndex {
        self.geometry().start_frame()
    }

    pub fn end_frame(&self) -> FrameIndex {
        self.geometry().end_frame()
    }

    pub fn frame_for_x(&self, x: i32) -> FrameIndex {
        self.geometry().frame_for_x(x)
    }

    pub fn x_for_frame(&self, frame: FrameIndex) -> i32 {
        self.geometry().x_for_frame(frame)
    }

    /// First frame on screen, never negative
    pub fn first_visible_frame(&self) -> FrameIndex {
        self.start_frame().max(0)
    }

    pub fn last_visible_frame(&self) -> FrameIndex {
        self.end_frame()
    }

    pub fn follow_global_pan(&self) -> bool {
        self.follow_pan
    }

    pub fn set_follow_global_pan(&mut self, follow: bool) {
        self.follow_pan = follow;
    }

    pub fn follow_global_zoom(&self) -> bool {
        self.follow_zoom
    }

    pub fn set_follow_global_zoom(&mut self, follow: bool) {
        self.follow_zoom = follow;
    }

    pub fn playback_follow(&self) -> PlaybackFollowMode {
        self.follow_play
    }

    pub fn set_playback_follow(&mut self, mode: PlaybackFollowMode) {
        self.follow_play = mode;
    }

    pub fn play_pointer_frame(&self) -> FrameIndex {
        self.play_pointer_frame
    }

    pub fn set_play_pointer_detached(&mut self, detached: bool) {
        self.play_pointer_detached = detached;
    }

    /// Something visible changed since the last paint
    pub fn needs_repaint(&self) -> bool {
        self.needs_repaint
    }

    pub fn request_repaint(&mut self) {
        self.needs_repaint = true;
    }

    // ---------------------------------------------------------------------
    // Layers
    // ---------------------------------------------------------------------

    pub fn add_layer(&mut self, layer: Layer) -> LayerId {
        let id = layer.id();
        log::debug!("view {:?}: adding {:?}", self.id, layer);
        self.layers.push(layer);
        self.invalidate_cache();
        id
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let index = self.layers.iter().position(|l| l.id() == id)?;
        self.invalidate_cache();
        Some(self.layers.remove(index))
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id() == id)
    }

    /// Mutable access to a layer; the cache is dropped since any property
    /// may change
    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        let layer = self.layers.iter_mut().find(|l| l.id() == id)?;
        self.cache_valid = false;
        self.needs_repaint = true;
        Some(layer)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Indices of the scrollable layers drawn into the cache
    fn scrollable_back_layers(&self) -> Vec<usize> {
        let mut scrollables = Vec::new();
        let mut met_unscrollable = false;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.is_dormant() {
                continue;
            }
            if layer.is_opaque() {
                scrollables.clear();
                if met_unscrollable {
                    break;
                }
            }
            if !met_unscrollable && layer.is_scrollable() {
                scrollables.push(i);
            } else {
                met_unscrollable = true;
            }
        }
        scrollables
    }

    /// Indices of the layers drawn on top of the cache every paint
    fn non_scrollable_front_layers(&self) -> Vec<usize> {
        let mut front = Vec::new();
        let mut met_unscrollable = false;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.is_dormant() {
                continue;
            }
            if layer.is_opaque() {
                front.clear();
            }
            if !met_unscrollable && layer.is_scrollable() {
                continue;
            }
            front.push(i);
            met_unscrollable = true;
        }
        front
    }

    // ---------------------------------------------------------------------
    // Models and alignment
    // ---------------------------------------------------------------------

    /// Earliest start frame of any loaded model
    pub fn models_start_frame(&self) -> FrameIndex {
        self.layers
            .iter()
            .filter_map(|l| l.usable_model())
            .map(|m| m.start_frame())
            .min()
            .unwrap_or(0)
    }

    /// Latest end frame of any loaded model
    pub fn models_end_frame(&self) -> FrameIndex {
        self.layers
            .iter()
            .filter_map(|l| l.usable_model())
            .map(|m| m.end_frame())
            .max()
            .unwrap_or_else(|| self.models_start_frame())
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.layers
            .iter()
            .filter_map(|l| l.usable_model())
            .map(|m| m.sample_rate())
            .next()
            .unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn model_ids(&self) -> Vec<ModelId> {
        self.layers.iter().filter_map(|l| l.model_id()).collect()
    }

    /// Model whose alignment maps this view onto the reference timeline
    ///
    /// Only in align mode with a reference model set. Prefers an aligned
    /// model on an opaque or waveform layer, then any aligned model, then
    /// any model at all.
    pub fn aligning_model(&self) -> Option<&dyn Model> {
        let manager = self.manager.as_ref()?;
        Self::aligning_model_in(&self.layers, manager)
    }

    fn aligning_model_in<'a>(layers: &'a [Layer], manager: &ViewManager) -> Option<&'a dyn Model> {
        if !manager.align_mode() || manager.reference_model().is_none() {
            return None;
        }
        let mut any = None;
        let mut aligned = None;
        let mut good = None;
        for layer in layers {
            if layer.is_time_ruler() {
                continue;
            }
            let Some(model) = layer.model() else {
                continue;
            };
            any = Some(model);
            if model.alignment().is_some() {
                aligned = Some(model);
                if layer.is_opaque() || layer.is_waveform() {
                    good = Some(model);
                }
            }
        }
        good.or(aligned).or(any)
    }

    pub fn align_to_reference(&self, frame: FrameIndex) -> FrameIndex {
        match self.aligning_model() {
            Some(model) => model.align_to_reference(frame),
            None => frame,
        }
    }

    pub fn align_from_reference(&self, frame: FrameIndex) -> FrameIndex {
        match self.aligning_model() {
            Some(model) => model.align_from_reference(frame),
            None => frame,
        }
    }

    fn align_from_reference_with(&self, manager: &ViewManager, frame: FrameIndex) -> FrameIndex {
        match Self::aligning_model_in(&self.layers, manager) {
            Some(model) => model.align_from_reference(frame),
            None => frame,
        }
    }

    // ---------------------------------------------------------------------
    // Navigation
    // ---------------------------------------------------------------------

    /// Move the centre; returns whether the visible pixel changed
    ///
    /// With `emit`, the move is reported to the manager on the reference
    /// timeline.
    pub fn set_centre_frame(&mut self, frame: FrameIndex, emit: bool) -> bool {
        if self.centre_frame == frame {
            return false;
        }
        let z = self.zoom.max(1) as FrameIndex;
        let former_pixel = self.centre_frame.div_euclid(z);
        self.centre_frame = frame;
        let changed = frame.div_euclid(z) != former_pixel;
        if changed {
            self.needs_repaint = true;
        }
        if emit {
            if let Some(manager) = &self.manager {
                let reference_frame = self.align_to_reference(frame);
                manager.view_centre_frame_changed(
                    self.id,
                    reference_frame,
                    self.follow_pan,
                    self.follow_play,
                );
            }
        }
        changed
    }

    /// Put `frame` at the left edge
    pub fn set_start_frame(&mut self, frame: FrameIndex) {
        let offset = self.zoom as FrameIndex * (self.width / 2) as FrameIndex;
        self.set_centre_frame(frame + offset, true);
    }

    pub fn set_zoom_level(&mut self, zoom: ZoomLevel) {
        let zoom = zoom.max(1);
        if self.zoom == zoom {
            return;
        }
        self.zoom = zoom;
        self.needs_repaint = true;
        if let Some(manager) = &self.manager {
            manager.view_zoom_level_changed(self.id, zoom, self.follow_zoom);
        }
    }

    /// Snap `requested` onto a zoom level every layer can show
    pub fn negotiate_zoom(&self, requested: ZoomLevel, dir: RoundingDirection) -> ZoomLevel {
        negotiate_block_size(
            self.layers.iter().map(|l| l.zoom_constraint()),
            requested.max(1),
            dir,
            self.context.config.zoom_policy,
        )
    }

    /// One constraint step in or out
    pub fn zoom(&mut self, zoom_in: bool) {
        let new_zoom = if zoom_in {
            self.negotiate_zoom(self.zoom.saturating_sub(1).max(1), RoundingDirection::RoundDown)
        } else {
            self.negotiate_zoom(self.zoom.saturating_add(1), RoundingDirection::RoundUp)
        };
        if new_zoom != self.zoom {
            self.set_zoom_level(new_zoom);
        }
    }

    /// Scroll by a twentieth of the view (half with `lots`), clamped to
    /// the models' extent
    pub fn scroll(&mut self, right: bool, lots: bool) {
        let span = self.end_frame() - self.start_frame();
        let mut delta = if lots { span / 2 } else { span / 20 };
        if right {
            delta = -delta;
        }

        let models_end = self.models_end_frame();
        let target = if self.centre_frame < delta {
            0
        } else if self.centre_frame - delta >= models_end {
            models_end
        } else {
            self.centre_frame - delta
        };
        self.set_centre_frame(target, true);
    }

    // ---------------------------------------------------------------------
    // Playback
    // ---------------------------------------------------------------------

    /// Playback moved to `frame` on the reference timeline
    pub fn playback_frame_changed(&mut self, frame: FrameIndex) {
        let frame = self.align_from_reference(frame);
        self.move_play_pointer(frame);
    }

    /// Move the play pointer, scrolling according to the follow mode
    pub fn move_play_pointer(&mut self, frame: FrameIndex) {
        if self.play_pointer_frame == frame {
            return;
        }
        let geometry = self.geometry();
        let visible_change = geometry.x_for_frame(self.play_pointer_frame) != geometry.x_for_frame(frame);
        self.play_pointer_frame = frame;

        match self.follow_play {
            PlaybackFollowMode::ScrollContinuous => {
                self.set_centre_frame(frame, false);
            }
            PlaybackFollowMode::ScrollPage | PlaybackFollowMode::ScrollPageWithCentre => {
                let start = geometry.start_frame();
                let mut w = geometry.end_frame() - start;
                w -= w / 5;
                let w = w.max(1);
                let mut sf = (frame / w) * w - w / 8;

                if let Some(manager) = &self.manager {
                    if manager.is_playing() && manager.play_selection_mode() {
                        if let Some(first) = manager.selections().first() {
                            sf = sf.max(first.start_frame() - w / 10);
                        }
                    }
                }

                let xnew = geometry.x_for_frame(frame);
                let width = self.width;
                let should_scroll = xnew > (7 * width) / 8
                    || (xnew < width / 8 && !self.play_pointer_detached);

                if should_scroll {
                    let offset = geometry.frame_for_x(width / 2) - start;
                    log::debug!(
                        "view {:?}: paging to follow play pointer at {}",
                        self.id,
                        frame
                    );
                    self.set_centre_frame(sf + offset, true);
                }
            }
            PlaybackFollowMode::Ignore => {}
        }

        if visible_change {
            self.needs_repaint = true;
        }
    }

    // ---------------------------------------------------------------------
    // Notifications
    // ---------------------------------------------------------------------

    /// Drop the cache; the next paint redraws everything
    pub fn invalidate_cache(&mut self) {
        self.cache_valid = false;
        self.needs_repaint = true;
    }

    fn scrollable_layer_uses(&self, model: ModelId) -> bool {
        self.scrollable_back_layers()
            .into_iter()
            .any(|i| self.layers[i].model_id() == Some(model))
    }

    fn shows_model(&self, model: ModelId) -> bool {
        self.layers.iter().any(|l| l.model_id() == Some(model))
    }

    pub fn model_changed(&mut self, model: ModelId) {
        if self.scrollable_layer_uses(model) {
            self.cache_valid = false;
        }
        if self.shows_model(model) {
            self.needs_repaint = true;
        }
    }

    /// Model data in `[start, end)` changed; ignored when off screen
    pub fn model_changed_within(&mut self, model: ModelId, start: FrameIndex, end: FrameIndex) {
        let my_start = self.start_frame();
        let my_end = self.end_frame();
        if my_start > 0 && end < my_start {
            return;
        }
        if start > my_end {
            return;
        }
        self.model_changed(model);
    }

    pub fn model_replaced(&mut self) {
        self.invalidate_cache();
    }

    pub fn layer_parameters_changed(&mut self, _layer: LayerId) {
        self.invalidate_cache();
    }

    pub fn selection_changed(&mut self) {
        if self.selection_cached {
            self.cache_valid = false;
        }
        self.needs_repaint = true;
    }

    /// Locked centre moved elsewhere (reference timeline)
    pub fn global_centre_frame_changed(&mut self, reference_frame: FrameIndex) {
        if self.follow_pan {
            let frame = self.align_from_reference(reference_frame);
            self.set_centre_frame(frame, false);
        }
    }

    pub fn view_centre_frame_changed(&mut self, source: ViewId, reference_frame: FrameIndex, locked: bool) {
        if source != self.id && locked {
            self.global_centre_frame_changed(reference_frame);
        }
    }

    pub fn view_zoom_level_changed(&mut self, source: ViewId, zoom: ZoomLevel, locked: bool) {
        if self.follow_zoom && source != self.id && locked {
            self.set_zoom_level(zoom);
        }
    }

    /// Completion of every layer's model, recording new errors
    pub fn layer_progress(&mut self) -> Vec<LayerProgress> {
        let progress: Vec<LayerProgress> = self.layers.iter().map(|l| l.progress()).collect();
        for p in &progress {
            if let Some(error) = &p.error {
                if self.last_error.as_ref() != Some(error) {
                    log::warn!("view {:?}: layer {:?} failed: {}", self.id, p.layer, error);
                    self.last_error = Some(error.clone());
                }
            }
        }
        progress
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ---------------------------------------------------------------------
    // Painting
    // ---------------------------------------------------------------------

    /// Paint `rect` of the view onto `target`
    pub fn paint(&mut self, target: &mut dyn Canvas, rect: Rect) -> PaintReport {
        let bounds = Rect::from_size(self.width, self.height);
        let rect = rect.intersect(&bounds);
        let geometry = self.geometry();
        let background = self.context.palette.background;
        let (w, h) = (self.width, self.height);

        let scrollables = self.scrollable_back_layers();
        let front = self.non_scrollable_front_layers();

        let scrollable_ids: Vec<LayerId> = scrollables.iter().map(|&i| self.layers[i].id()).collect();
        let front_ids: Vec<LayerId> = front.iter().map(|&i| self.layers[i].id()).collect();
        if scrollable_ids != self.last_scrollables || front_ids != self.last_front {
            log::debug!(
                "view {:?}: layer partition changed ({} scrollable, {} front)",
                self.id,
                scrollable_ids.len(),
                front_ids.len()
            );
            self.last_scrollables = scrollable_ids;
            self.last_front = front_ids;
            self.cache_valid = false;
        }

        let selection_cacheable = front.iter().all(|&i| !self.layers[i].is_opaque());
        let have_selections = self
            .manager
            .as_ref()
            .is_some_and(|m| m.has_selections() || m.in_progress_selection().is_some());
        if have_selections && selection_cacheable != self.selection_cached {
            self.cache_valid = false;
        }

        let mut cache = self.cache.take();
        let mut report = PaintReport::new(if cache.is_some() {
            CacheState::Valid
        } else {
            CacheState::NoCache
        });
        let mut cache_rect = Rect::default();

        if scrollables.is_empty() {
            if cache.take().is_some() {
                report.state = CacheState::Stale;
            }
            report.direct = true;
        } else if !(self.cache_valid && cache.as_ref().is_some_and(|c| c.matches(w, h, self.zoom))) {
            if cache.is_some() {
                report.state = CacheState::Stale;
            }
            let skip_width = self.context.config.cache_skip_width(w as u32) as i32;
            if rect.width < skip_width {
                log::debug!(
                    "view {:?}: {}px repaint with invalid cache, painting directly",
                    self.id,
                    rect.width
                );
                cache = None;
                report.direct = true;
            } else {
                if !cache.as_ref().is_some_and(|c| c.bitmap.size() == (w, h)) {
                    cache = Some(ViewCache::new(w, h, background));
                    report.reallocated = true;
                }
                cache_rect = bounds;
            }
        } else if let Some(c) = cache.as_mut() {
            if c.centre_frame != self.centre_frame {
                let dx = geometry.x_for_frame(c.centre_frame) - geometry.x_for_frame(self.centre_frame);
                report.dx = dx;
                if dx == 0 {
                    // sub-pixel move, nothing to redraw
                } else if dx.abs() < w {
                    report.state = CacheState::Scrolling;
                    c.bitmap.scroll_horizontal(dx);
                    cache_rect = exposed_strip(dx, w, h);
                } else {
                    report.state = CacheState::Stale;
                    cache_rect = bounds;
                }
            }
        }

        let paint_rect = match cache.as_mut() {
            Some(c) => {
                if !cache_rect.is_empty() {
                    c.bitmap.set_clip(Some(cache_rect));
                    c.bitmap.fill_rect(cache_rect, background);
                    for &i in &scrollables {
                        self.layers[i].paint(&geometry, &self.context, &mut c.bitmap, cache_rect);
                    }
                    if selection_cacheable {
                        self.draw_selections(&geometry, &mut c.bitmap);
                    }
                    self.selection_cached = selection_cacheable;
                    c.bitmap.set_clip(None);
                    report.cache_rect = Some(cache_rect);
                }
                c.retag(self.centre_frame, self.zoom);
                self.cache_valid = true;

                let blit = cache_rect.union(&rect);
                target.draw_image_region(&c.bitmap, blit, blit.x, blit.y);
                blit
            }
            None => {
                self.cache_valid = false;
                self.selection_cached = false;
                rect
            }
        };

        let saved_clip = target.clip();
        target.set_clip(Some(paint_rect.intersect(&saved_clip)));

        if report.direct {
            target.fill_rect(paint_rect, background);
            for &i in &scrollables {
                self.layers[i].paint(&geometry, &self.context, target, paint_rect);
            }
        }
        for &i in &front {
            self.layers[i].paint(&geometry, &self.context, target, paint_rect);
        }
        if !self.selection_cached {
            self.draw_selections(&geometry, target);
        }
        self.draw_play_pointer(&geometry, target);

        target.set_clip(Some(saved_clip));

        self.cache = cache;
        self.needs_repaint = false;
        report.painted = paint_rect;

        log::trace!("view {:?}: {:?}", self.id, report);
        report
    }

    fn draw_selections(&self, geometry: &ViewGeometry, canvas: &mut dyn Canvas) {
        let Some(manager) = &self.manager else {
            return;
        };
        let mut selections = manager.selections();
        if let Some((selection, exclusive)) = manager.in_progress_selection() {
            if exclusive {
                selections.clear();
            }
            selections.push(selection);
        }
        if selections.is_empty() {
            return;
        }

        let palette = &self.context.palette;
        let (w, h) = (geometry.width, geometry.height);
        let metrics = self.context.text_metrics();
        let rate = self.sample_rate();

        for selection in selections {
            let p0 = geometry.x_for_frame(self.align_from_reference(selection.start_frame()));
            let p1 = geometry.x_for_frame(self.align_from_reference(selection.end_frame()));
            if p1 < 0 || p0 > w {
                continue;
            }

            canvas.fill_rect(Rect::new(p0, 0, p1 - p0, h), palette.selection_fill);
            canvas.draw_line(p0, 0, p0, h - 1, palette.selection_outline);
            canvas.draw_line(p1, 0, p1, h - 1, palette.selection_outline);

            if self.context.config.show_selection_extents {
                let start = RealTime::from_frame(selection.start_frame(), rate).to_text(true);
                let end = RealTime::from_frame(selection.end_frame(), rate).to_text(true);
                canvas.draw_text(p0 + 2, 2, &start, palette.foreground);
                canvas.draw_text(
                    p1 - 2 - metrics.width(&end),
                    h - metrics.height - 2,
                    &end,
                    palette.foreground,
                );
            }
        }
    }

    fn draw_play_pointer(&self, geometry: &ViewGeometry, canvas: &mut dyn Canvas) {
        if self.follow_play == PlaybackFollowMode::ScrollContinuous {
            return;
        }
        let frame = self.play_pointer_frame;
        if frame <= geometry.start_frame() || frame >= geometry.end_frame() {
            return;
        }
        let playing = self.manager.as_ref().is_some_and(|m| m.is_playing());
        if !playing
            && frame == self.centre_frame
            && self.context.config.show_centre_line
            && self.follow_play != PlaybackFollowMode::Ignore
        {
            return;
        }

        let palette = &self.context.palette;
        let x = geometry.x_for_frame(frame);
        let h = geometry.height;
        canvas.draw_line(x - 1, 0, x - 1, h - 1, palette.foreground);
        canvas.draw_line(x + 1, 0, x + 1, h - 1, palette.foreground);
        canvas.draw_line(x, 0, x, h - 1, palette.background);
    }
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("id", &self.id)
            .field("size", &(self.width, self.height))
            .field("centre_frame", &self.centre_frame)
            .field("zoom", &self.zoom)
            .field("layers", &self.layers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Bitmap, Color};
    use crate::layer::LayerKind;
    use sonoview_core::model::{
        AlignmentModel, DenseColumnModel, SparseTimeValueModel, TimeValuePoint, WaveFileModel,
    };
    use sonoview_core::selection::Selection;
    use std::time::Duration;

    const W: i32 = 800;
    const H: i32 = 60;

    fn wave_model() -> Arc<WaveFileModel> {
        let samples: Vec<f32> = (0..600_000)
            .map(|i| ((i as f32) * 0.0021).sin() * (0.2 + (i % 3001) as f32 / 4000.0))
            .collect();
        let model = WaveFileModel::from_samples(44100, samples).unwrap();
        assert!(model.wait_for_fill(Duration::from_secs(20)));
        Arc::new(model)
    }

    fn context() -> Arc<ViewContext> {
        ViewContext::shared(Default::default())
    }

    fn wave_view(model: &Arc<WaveFileModel>, manager: &ViewManager, centre: FrameIndex) -> View {
        let mut view = View::new(context(), W, H);
        view.set_follow_global_pan(false);
        view.set_follow_global_zoom(false);
        view.set_manager(manager.clone());
        view.add_layer(Layer::waveform(Arc::clone(model)));
        view.set_zoom_level(100);
        view.set_centre_frame(centre, false);
        view
    }

    fn target() -> Bitmap {
        Bitmap::new(W, H, Color::TRANSPARENT)
    }

    #[test]
    fn test_scroll_shifts_cache_and_matches_full_repaint() {
        let model = wave_model();
        let manager = ViewManager::new();
        manager.set_selection(Selection::new(101_000, 130_000));

        let mut view = wave_view(&model, &manager, 100_000);
        let mut screen = target();
        let first = view.paint(&mut screen, Rect::from_size(W, H));
        assert_eq!(first.state, CacheState::NoCache);
        assert!(first.reallocated);
        assert!(view.selection_cached);

        view.set_centre_frame(100_500, false);
        let report = view.paint(&mut screen, Rect::from_size(W, H));
        assert_eq!(report.state, CacheState::Scrolling);
        assert_eq!(report.dx, -5);
        assert_eq!(report.cache_rect, Some(Rect::new(795, 0, 5, H)));
        assert!(!report.reallocated);
        assert_eq!(view.cache.as_ref().map(|c| c.centre_frame), Some(100_500));

        let mut fresh = wave_view(&model, &manager, 100_500);
        let mut expected = target();
        fresh.paint(&mut expected, Rect::from_size(W, H));
        assert_eq!(screen.pixels(), expected.pixels());
    }

    #[test]
    fn test_scroll_right_exposes_left_strip() {
        let model = wave_model();
        let manager = ViewManager::new();
        let mut view = wave_view(&model, &manager, 100_000);
        let mut screen = target();
        view.paint(&mut screen, Rect::from_size(W, H));

        view.set_centre_frame(99_300, false);
        let report = view.paint(&mut screen, Rect::from_size(W, H));
        assert_eq!(report.dx, 7);
        assert_eq!(report.cache_rect, Some(Rect::new(0, 0, 7, H)));

        let mut fresh = wave_view(&model, &manager, 99_300);
        let mut expected = target();
        fresh.paint(&mut expected, Rect::from_size(W, H));
        assert_eq!(screen.pixels(), expected.pixels());
    }

    #[test]
    fn test_sub_pixel_move_only_retags() {
        let model = wave_model();
        let mut view = wave_view(&model, &ViewManager::new(), 100_000);
        let mut screen = target();
        view.paint(&mut screen, Rect::from_size(W, H));

        assert!(!view.set_centre_frame(100_050, false));
        let report = view.paint(&mut screen, Rect::from_size(W, H));
        assert_eq!(report.state, CacheState::Valid);
        assert_eq!(report.dx, 0);
        assert_eq!(report.cache_rect, None);
        assert_eq!(view.cache.as_ref().map(|c| c.centre_frame), Some(100_050));
    }

    #[test]
    fn test_jump_of_view_width_rebuilds() {
        let model = wave_model();
        let mut view = wave_view(&model, &ViewManager::new(), 100_000);
        let mut screen = target();
        view.paint(&mut screen, Rect::from_size(W, H));

        view.set_centre_frame(500_000, false);
        let report = view.paint(&mut screen, Rect::from_size(W, H));
        assert_eq!(report.state, CacheState::Stale);
        assert_eq!(report.cache_rect, Some(Rect::from_size(W, H)));
        assert!(!report.reallocated);
    }

    #[test]
    fn test_zoom_and_resize_invalidate() {
        let model = wave_model();
        let mut view = wave_view(&model, &ViewManager::new(), 100_000);
        let mut screen = target();
        view.paint(&mut screen, Rect::from_size(W, H));

        view.set_zoom_level(200);
        let report = view.paint(&mut screen, Rect::from_size(W, H));
        assert_eq!(report.state, CacheState::Stale);
        assert!(!report.reallocated);

        view.set_size(W, H + 10);
        let mut taller = Bitmap::new(W, H + 10, Color::TRANSPARENT);
        let report = view.paint(&mut taller, Rect::from_size(W, H + 10));
        assert_eq!(report.state, CacheState::Stale);
        assert!(report.reallocated);
    }

    #[test]
    fn test_small_repaint_with_invalid_cache_paints_directly() {
        let model = wave_model();
        let mut view = wave_view(&model, &ViewManager::new(), 100_000);
        let mut screen = target();
        view.paint(&mut screen, Rect::from_size(W, H));

        let layer = view.layers()[0].id();
        view.layer_parameters_changed(layer);
        let report = view.paint(&mut screen, Rect::new(10, 0, 50, H));
        assert!(report.direct);
        assert!(view.cache.is_none());

        let report = view.paint(&mut screen, Rect::from_size(W, H));
        assert_eq!(report.state, CacheState::NoCache);
        assert!(report.reallocated);
    }

    #[test]
    fn test_valid_cache_blits() {
        let model = wave_model();
        let mut view = wave_view(&model, &ViewManager::new(), 100_000);
        let mut screen = target();
        view.paint(&mut screen, Rect::from_size(W, H));
        let before = screen.clone();

        let report = view.paint(&mut screen, Rect::new(100, 0, 20, H));
        assert_eq!(report.state, CacheState::Valid);
        assert_eq!(report.cache_rect, None);
        assert_eq!(screen.pixels(), before.pixels());
    }

    #[test]
    fn test_adding_layer_changes_partition() {
        let model = wave_model();
        let mut view = wave_view(&model, &ViewManager::new(), 100_000);
        let mut screen = target();
        view.paint(&mut screen, Rect::from_size(W, H));

        view.add_layer(Layer::time_ruler(44100));
        let report = view.paint(&mut screen, Rect::from_size(W, H));
        assert_eq!(report.state, CacheState::Stale);
    }

    #[test]
    fn test_layer_partition() {
        let mut view = View::new(context(), 100, 10);
        let values = Arc::new(SparseTimeValueModel::new(8000, 1));
        let ruler = view.add_layer(Layer::time_ruler(8000));
        let mut wave = Layer::waveform(Arc::new(WaveFileModel::from_samples(8000, vec![0.0; 100]).unwrap()));
        if let LayerKind::Waveform(w) = wave.kind_mut() {
            w.set_auto_normalize(true);
        }
        view.add_layer(wave);
        view.add_layer(Layer::time_value(values));

        // the time-value layer sits above the non-scrollable waveform
        assert_eq!(view.scrollable_back_layers(), vec![0]);
        assert_eq!(view.non_scrollable_front_layers(), vec![1, 2]);

        // an opaque layer hides everything below it
        view.add_layer(Layer::spectrogram(Arc::new(DenseColumnModel::new(8000, 64, 8))));
        assert!(view.scrollable_back_layers().is_empty());
        assert_eq!(view.non_scrollable_front_layers(), vec![3]);

        // dormant layers are skipped
        view.layer_mut(ruler).unwrap().set_dormant(true);
        view.remove_layer(view.layers()[3].id());
        assert!(view.scrollable_back_layers().is_empty());
        assert_eq!(view.non_scrollable_front_layers(), vec![1, 2]);
    }

    #[test]
    fn test_selection_under_opaque_layer_drawn_on_target() {
        let manager = ViewManager::new();
        manager.set_selection(Selection::new(0, 400));
        let mut view = View::new(context(), 100, 10);
        view.set_follow_global_pan(false);
        view.set_follow_global_zoom(false);
        view.set_manager(manager);
        view.add_layer(Layer::spectrogram(Arc::new(DenseColumnModel::new(8000, 64, 8))));
        view.set_zoom_level(10);
        view.set_centre_frame(500, false);

        let mut screen = Bitmap::new(100, 10, Color::TRANSPARENT);
        let report = view.paint(&mut screen, Rect::from_size(100, 10));
        assert!(report.direct);
        assert!(!view.selection_cached);

        let palette = &view.context().palette;
        let selected = palette.selection_fill.blend_over(palette.background);
        assert_eq!(screen.pixel(20, 5), Some(selected));
        assert_eq!(screen.pixel(60, 5), Some(palette.background));
    }

    #[test]
    fn test_selection_change_invalidates_cached_selection() {
        let model = wave_model();
        let manager = ViewManager::new();
        manager.set_selection(Selection::new(101_000, 130_000));
        let mut view = wave_view(&model, &manager, 100_000);
        let mut screen = target();
        view.paint(&mut screen, Rect::from_size(W, H));

        view.selection_changed();
        let report = view.paint(&mut screen, Rect::from_size(W, H));
        assert_eq!(report.state, CacheState::Stale);
    }

    #[test]
    fn test_model_change_outside_view_is_ignored() {
        let model = wave_model();
        let mut view = wave_view(&model, &ViewManager::new(), 100_000);
        let mut screen = target();
        view.paint(&mut screen, Rect::from_size(W, H));

        view.model_changed_within(model.id(), 0, 10_000);
        let report = view.paint(&mut screen, Rect::from_size(W, H));
        assert_eq!(report.state, CacheState::Valid);

        view.model_changed_within(model.id(), 90_000, 95_000);
        let report = view.paint(&mut screen, Rect::from_size(W, H));
        assert_eq!(report.state, CacheState::Stale);
    }

    #[test]
    fn test_set_centre_frame_reports_pixel_change_and_emits() {
        let manager = ViewManager::new();
        let mut view = View::new(context(), 100, 10);
        view.set_manager(manager.clone());
        view.set_zoom_level(100);
        manager.drain().count();

        assert!(!view.set_centre_frame(50, true));
        assert!(view.set_centre_frame(150, true));
        assert!(!view.set_centre_frame(150, true));

        let frames: Vec<FrameIndex> = manager
            .drain()
            .filter_map(|e| match e {
                crate::view_manager::ViewEvent::CentreFrameChanged { frame, .. } => Some(frame),
                _ => None,
            })
            .collect();
        assert_eq!(frames, vec![50, 150]);
        assert_eq!(manager.global_centre_frame(), 150);
    }

    #[test]
    fn test_zoom_steps_follow_constraint() {
        let model = wave_model();
        let mut view = wave_view(&model, &ViewManager::new(), 100_000);
        view.set_zoom_level(1024);
        view.zoom(true);
        assert_eq!(view.zoom_level(), 724);
        view.zoom(false);
        assert_eq!(view.zoom_level(), 1024);
        view.zoom(false);
        assert_eq!(view.zoom_level(), 1448);
    }

    #[test]
    fn test_scroll_clamps_to_models() {
        let model = wave_model();
        let mut view = wave_view(&model, &ViewManager::new(), 1_000);
        view.scroll(false, true);
        assert_eq!(view.centre_frame(), 0);

        view.set_centre_frame(590_000, false);
        view.scroll(true, true);
        assert_eq!(view.centre_frame(), 600_000);

        view.set_centre_frame(100_000, false);
        view.scroll(true, false);
        // a twentieth of 79999 frames
        assert_eq!(view.centre_frame(), 103_999);
    }

    #[test]
    fn test_page_follow_scrolls_near_right_edge() {
        let model = wave_model();
        let mut view = wave_view(&model, &ViewManager::new(), 100_000);
        view.set_playback_follow(PlaybackFollowMode::ScrollPage);

        view.move_play_pointer(110_000);
        assert_eq!(view.centre_frame(), 100_000);

        view.move_play_pointer(135_000);
        assert_eq!(view.centre_frame(), 160_000);
    }

    #[test]
    fn test_continuous_follow_centres_pointer() {
        let model = wave_model();
        let mut view = wave_view(&model, &ViewManager::new(), 100_000);
        view.set_playback_follow(PlaybackFollowMode::ScrollContinuous);
        view.move_play_pointer(123_456);
        assert_eq!(view.centre_frame(), 123_456);
    }

    #[test]
    fn test_play_pointer_drawn_on_target() {
        let mut view = View::new(context(), 100, 10);
        view.add_layer(Layer::time_value(Arc::new(SparseTimeValueModel::new(8000, 1))));
        view.set_playback_follow(PlaybackFollowMode::Ignore);
        view.set_zoom_level(10);
        view.set_centre_frame(500, false);
        view.move_play_pointer(700);

        let mut screen = Bitmap::new(100, 10, Color::TRANSPARENT);
        view.paint(&mut screen, Rect::from_size(100, 10));
        let palette = &view.context().palette;
        assert_eq!(screen.pixel(69, 5), Some(palette.foreground));
        assert_eq!(screen.pixel(70, 5), Some(palette.background));
        assert_eq!(screen.pixel(71, 5), Some(palette.foreground));
        // never baked into the cache
        let cached = view.cache.as_ref().unwrap().bitmap.pixel(69, 5);
        assert_eq!(cached, Some(palette.background));
    }

    #[test]
    fn test_alignment_maps_to_reference_timeline() {
        let manager = ViewManager::new();
        let reference = Arc::new(SparseTimeValueModel::new(8000, 1));
        let alignment = Arc::new(AlignmentModel::with_path(reference.id(), vec![(0, 1000)]));
        let aligned = Arc::new(SparseTimeValueModel::new(8000, 1).with_alignment(alignment));
        aligned.add_point(TimeValuePoint::new(0, 1.0));

        let mut view = View::new(context(), 100, 10);
        view.set_manager(manager.clone());
        view.add_layer(Layer::time_value(aligned));
        assert_eq!(view.align_to_reference(5000), 5000);

        manager.set_align_mode(true);
        manager.set_reference_model(Some(reference.id()));
        assert_eq!(view.align_to_reference(5000), 6000);
        assert_eq!(view.align_from_reference(6000), 5000);
    }

    #[test]
    fn test_global_centre_follows_alignment() {
        let manager = ViewManager::new();
        let mut view = View::new(context(), 100, 10);
        view.set_manager(manager);
        view.global_centre_frame_changed(4321);
        assert_eq!(view.centre_frame(), 4321);

        view.set_follow_global_pan(false);
        view.global_centre_frame_changed(1);
        assert_eq!(view.centre_frame(), 4321);
    }

    #[test]
    fn test_models_extent() {
        let model = wave_model();
        let view = wave_view(&model, &ViewManager::new(), 0);
        assert_eq!(view.models_start_frame(), 0);
        assert_eq!(view.models_end_frame(), 600_000);
        assert_eq!(view.sample_rate(), 44100);

        let empty = View::new(context(), 100, 10);
        assert_eq!(empty.models_end_frame(), 0);
    }

    #[test]
    fn test_layer_progress() {
        let values = Arc::new(SparseTimeValueModel::new(8000, 1));
        values.set_completion(30);
        let mut view = View::new(context(), 100, 10);
        view.add_layer(Layer::time_value(values));
        view.add_layer(Layer::time_ruler(8000));
        let progress = view.layer_progress();
        assert_eq!(progress.len(), 2);
        assert_eq!(progress[0].completion, 30);
        assert_eq!(progress[1].completion, 100);
        assert_eq!(view.last_error(), None);
    }
}
