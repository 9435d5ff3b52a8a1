//! Pane stack
//!
//! Owns the [`ViewManager`], the panes and the overview, and routes the
//! manager's queued events back to them. Call [`PaneStack::process_events`]
//! once per UI tick after handling input; it also polls the background fill
//! of every audio model on show, so partly loaded files keep repainting.

use std::sync::Arc;

use sonoview_core::model::{Model, ModelEvent, WaveFileModel};
use sonoview_core::FrameIndex;

use crate::canvas::{Canvas, Rect};
use crate::context::ViewContext;
use crate::overview::Overview;
use crate::pane::Pane;
use crate::view::PaintReport;
use crate::view_manager::{ViewEvent, ViewId, ViewManager};

/// Default overview height in pixels
pub const OVERVIEW_HEIGHT: i32 = 40;

pub struct PaneStack {
    context: Arc<ViewContext>,
    manager: ViewManager,
    panes: Vec<Pane>,
    overview: Overview,
}

impl PaneStack {
    /// Empty stack whose overview spans `width` pixels
    pub fn new(context: Arc<ViewContext>, width: i32) -> Self {
        let manager = ViewManager::new();
        let mut overview = Overview::new(context.clone(), width, OVERVIEW_HEIGHT);
        overview.set_manager(manager.clone());
        // the overview's own zoom change isn't news to anyone
        manager.drain().count();
        Self {
            context,
            manager,
            panes: Vec::new(),
            overview,
        }
    }

    pub fn manager(&self) -> &ViewManager {
        &self.manager
    }

    pub fn context(&self) -> &Arc<ViewContext> {
        &self.context
    }

    /// Add a pane following the global centre and zoom
    pub fn add_pane(&mut self, width: i32, height: i32) -> ViewId {
        let mut pane = Pane::new(self.context.clone(), width, height);
        pane.view_mut().set_manager(self.manager.clone());
        let id = pane.view().id();
        self.overview.register_view(pane.view());
        log::debug!("pane {:?} added ({} panes)", id, self.panes.len() + 1);
        self.panes.push(pane);
        id
    }

    pub fn remove_pane(&mut self, id: ViewId) -> Option<Pane> {
        let index = self.panes.iter().position(|p| p.view().id() == id)?;
        self.overview.unregister_view(id);
        Some(self.panes.remove(index))
    }

    pub fn panes(&self) -> &[Pane] {
        &self.panes
    }

    pub fn pane(&self, id: ViewId) -> Option<&Pane> {
        self.panes.iter().find(|p| p.view().id() == id)
    }

    pub fn pane_mut(&mut self, id: ViewId) -> Option<&mut Pane> {
        self.panes.iter_mut().find(|p| p.view().id() == id)
    }

    pub fn pane_count(&self) -> usize {
        self.panes.len()
    }

    pub fn overview(&self) -> &Overview {
        &self.overview
    }

    pub fn overview_mut(&mut self) -> &mut Overview {
        &mut self.overview
    }

    /// Report a playback position from the audio side
    pub fn set_playback_position(&self, frame: FrameIndex) {
        self.manager.set_playback_position(frame);
    }

    /// Poll model fills, then dispatch every queued event, including those
    /// raised while dispatching; returns how many events were handled
    pub fn process_events(&mut self) -> usize {
        let mut handled = self.poll_models();
        while let Some(event) = self.manager.try_recv() {
            self.dispatch(&event);
            handled += 1;
        }
        if handled > 0 {
            self.refresh_overview();
        }
        handled
    }

    /// Turn fill progress of every shown audio model into change
    /// notifications; returns how many model events arrived
    pub fn poll_models(&mut self) -> usize {
        let mut models: Vec<Arc<WaveFileModel>> = Vec::new();
        let layers = self
            .panes
            .iter()
            .flat_map(|p| p.view().layers())
            .chain(self.overview.view().layers());
        for model in layers.filter_map(|l| l.wave_model()) {
            if !models.iter().any(|m| m.id() == model.id()) {
                models.push(Arc::clone(model));
            }
        }

        let mut handled = 0;
        for model in models {
            let id = model.id();
            for event in model.poll_fill() {
                handled += 1;
                match event {
                    ModelEvent::ChangedWithin(start, end) => {
                        for pane in &mut self.panes {
                            pane.view_mut().model_changed_within(id, start, end);
                        }
                        if self.overview.shows_model(id) {
                            self.overview.model_changed_within(id, start, end);
                        }
                    }
                    ModelEvent::Changed => {
                        for pane in &mut self.panes {
                            pane.view_mut().model_changed(id);
                        }
                        if self.overview.shows_model(id) {
                            self.overview.model_changed();
                        }
                    }
                    ModelEvent::Ready => log::debug!("{} ready", id),
                }
            }
        }
        handled
    }

    fn dispatch(&mut self, event: &ViewEvent) {
        match *event {
            ViewEvent::CentreFrameChanged {
                source,
                frame,
                locked,
                ..
            } => {
                for pane in &mut self.panes {
                    pane.view_mut().view_centre_frame_changed(source, frame, locked);
                }
            }
            ViewEvent::ZoomLevelChanged {
                source,
                zoom,
                locked,
            } => {
                for pane in &mut self.panes {
                    pane.view_mut().view_zoom_level_changed(source, zoom, locked);
                }
            }
            ViewEvent::SelectionChanged => {
                for pane in &mut self.panes {
                    pane.view_mut().selection_changed();
                }
                self.overview.selection_changed();
            }
            ViewEvent::PlaybackFrameChanged(frame) => {
                for pane in &mut self.panes {
                    pane.view_mut().playback_frame_changed(frame);
                }
                self.overview.playback_frame_changed(frame);
            }
        }
    }

    /// Re-read every pane's visible extent into the overview
    pub fn refresh_overview(&mut self) {
        for pane in &self.panes {
            self.overview.view_extent_changed(pane.view());
        }
    }

    /// Paint every pane that asked for it, each onto its own canvas
    pub fn paint_panes<'a, I>(&mut self, targets: I) -> Vec<PaintReport>
    where
        I: IntoIterator<Item = &'a mut dyn Canvas>,
    {
        self.panes
            .iter_mut()
            .zip(targets)
            .filter(|(pane, _)| pane.view().needs_repaint())
            .map(|(pane, target)| {
                let rect = Rect::from_size(pane.view().width(), pane.view().height());
                pane.paint(target, rect)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Bitmap, Color};
    use crate::layer::Layer;
    use crate::view::CacheState;
    use sonoview_core::model::StreamingSource;
    use sonoview_core::selection::Selection;
    use std::time::Duration;

    fn wave(frames: usize) -> Arc<WaveFileModel> {
        let model = WaveFileModel::from_samples(8000, vec![0.1; frames]).unwrap();
        assert!(model.wait_for_fill(Duration::from_secs(10)));
        Arc::new(model)
    }

    fn stack() -> (PaneStack, ViewId, ViewId) {
        let model = wave(100_000);
        let mut stack = PaneStack::new(ViewContext::shared(Default::default()), 100);
        stack.overview_mut().add_layer(Layer::waveform(model.clone()));
        let a = stack.add_pane(100, 50);
        let b = stack.add_pane(100, 50);
        for id in [a, b] {
            let view = stack.pane_mut(id).unwrap().view_mut();
            view.add_layer(Layer::waveform(model.clone()));
        }
        stack.process_events();
        (stack, a, b)
    }

    #[test]
    fn test_locked_centre_reaches_other_panes() {
        let (mut stack, a, b) = stack();
        stack.pane_mut(a).unwrap().view_mut().set_centre_frame(30_000, true);
        assert!(stack.process_events() >= 1);
        assert_eq!(stack.pane(b).unwrap().view().centre_frame(), 30_000);
        assert_eq!(stack.manager().global_centre_frame(), 30_000);
    }

    #[test]
    fn test_unfollowing_pane_stays_put() {
        let (mut stack, a, b) = stack();
        stack
            .pane_mut(b)
            .unwrap()
            .view_mut()
            .set_follow_global_pan(false);
        let before = stack.pane(b).unwrap().view().centre_frame();
        stack.pane_mut(a).unwrap().view_mut().set_centre_frame(30_000, true);
        stack.process_events();
        assert_eq!(stack.pane(b).unwrap().view().centre_frame(), before);
    }

    #[test]
    fn test_zoom_follows_and_settles() {
        let (mut stack, a, b) = stack();
        stack.pane_mut(a).unwrap().view_mut().set_zoom_level(724);
        // the follower's own change echoes once and stops
        assert_eq!(stack.process_events(), 2);
        assert_eq!(stack.pane(b).unwrap().view().zoom_level(), 724);
        assert_eq!(stack.manager().global_zoom_level(), 724);
        assert_eq!(stack.manager().try_recv(), None);
    }

    #[test]
    fn test_overview_drag_moves_panes() {
        let (mut stack, a, b) = stack();
        stack.pane_mut(a).unwrap().view_mut().set_centre_frame(5000, true);
        stack.process_events();

        let overview = stack.overview_mut();
        overview.mouse_press(10);
        overview.mouse_release(20);
        stack.process_events();

        let zoom = stack.overview().view().zoom_level() as FrameIndex;
        for id in [a, b] {
            assert_eq!(stack.pane(id).unwrap().view().centre_frame(), 5000 + 10 * zoom);
        }
        let extent = stack.overview().extents()[0];
        assert_eq!(extent.centre, 5000 + 10 * zoom);
    }

    #[test]
    fn test_playback_pages_panes() {
        let (mut stack, a, b) = stack();
        for id in [a, b] {
            stack.pane_mut(id).unwrap().view_mut().set_zoom_level(100);
        }
        stack.pane_mut(a).unwrap().view_mut().set_centre_frame(5000, true);
        stack.process_events();

        // 95% across a 10000-frame page
        stack.set_playback_position(9500);
        stack.process_events();
        for id in [a, b] {
            let view = stack.pane(id).unwrap().view();
            assert_eq!(view.play_pointer_frame(), 9500);
            assert!(view.start_frame() <= 9500 && view.end_frame() > 9500);
            assert!(view.centre_frame() > 5000);
        }
    }

    #[test]
    fn test_selection_change_requests_repaint() {
        let (mut stack, a, _) = stack();
        let mut screens = vec![
            Bitmap::new(100, 50, Color::TRANSPARENT),
            Bitmap::new(100, 50, Color::TRANSPARENT),
        ];
        let reports = stack.paint_panes(screens.iter_mut().map(|s| s as &mut dyn Canvas));
        assert_eq!(reports.len(), 2);
        assert!(!stack.pane(a).unwrap().view().needs_repaint());

        stack.manager().set_selection(Selection::new(1000, 2000));
        stack.process_events();
        assert!(stack.pane(a).unwrap().view().needs_repaint());
    }

    #[test]
    fn test_remove_pane_drops_outline() {
        let (mut stack, a, b) = stack();
        stack.pane_mut(a).unwrap().view_mut().set_centre_frame(60_000, true);
        stack.pane_mut(b).unwrap().view_mut().set_follow_global_pan(false);
        stack.process_events();
        assert_eq!(stack.overview().outline_rects().len(), 2);

        assert!(stack.remove_pane(a).is_some());
        assert_eq!(stack.pane_count(), 1);
        assert_eq!(stack.overview().outline_rects().len(), 1);
    }

    #[test]
    fn test_streaming_fill_reaches_panes() {
        let source = Arc::new(StreamingSource::new(1, 8000));
        source.append(&vec![0.25; 20_000]);
        let model = Arc::new(WaveFileModel::new(source.clone()).unwrap());
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while model.fill_extent() == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        let mut stack = PaneStack::new(ViewContext::shared(Default::default()), 100);
        let id = stack.add_pane(100, 50);
        let view = stack.pane_mut(id).unwrap().view_mut();
        view.add_layer(Layer::waveform(model.clone()));
        view.set_zoom_level(100);
        view.set_centre_frame(10_000, false);
        stack.process_events();

        let mut screen = Bitmap::new(100, 50, Color::TRANSPARENT);
        stack.pane_mut(id).unwrap().paint(&mut screen, Rect::from_size(100, 50));
        assert!(!stack.pane(id).unwrap().view().needs_repaint());

        source.finish();
        assert!(model.wait_for_fill(Duration::from_secs(10)));
        assert!(stack.process_events() >= 2);
        assert!(stack.pane(id).unwrap().view().needs_repaint());

        let report = stack.pane_mut(id).unwrap().paint(&mut screen, Rect::from_size(100, 50));
        assert_eq!(report.state, CacheState::Stale);
        assert_eq!(report.cache_rect, Some(Rect::from_size(100, 50)));

        // fill already reported
        assert_eq!(stack.poll_models(), 0);
    }
}
