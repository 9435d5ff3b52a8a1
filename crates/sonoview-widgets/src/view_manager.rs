//! Shared navigation state for every view in a pane stack
//!
//! The [`ViewManager`] holds what views agree on: the locked centre frame
//! and zoom level, the playback position, selections and alignment mode.
//! Views never talk to each other directly. They report changes here, and
//! the manager queues a [`ViewEvent`] on a crossbeam channel that the pane
//! stack drains on the UI thread.
//!
//! The manager is a cheap-to-clone handle; clones share state and queue.
//!
//! Whoever owns the manager must drain the queue ([`ViewManager::drain`] or
//! [`ViewManager::try_recv`]); [`crate::stack::PaneStack`] does so in
//! `process_events`. The queue holds [`EVENT_QUEUE_CAPACITY`] events and
//! drops the oldest when full, so an undrained manager stays bounded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError, TrySendError};

use sonoview_core::selection::{MultiSelection, Selection};
use sonoview_core::{FrameIndex, ModelId, PlaybackFollowMode, ZoomLevel};

/// Process-unique view identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

impl ViewId {
    pub fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ViewId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Seeks closer than this to the playing position are ignored
pub const SEEK_THRESHOLD_FRAMES: FrameIndex = 20_000;

/// Events kept before the oldest is dropped
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Notifications queued for the UI thread
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// A view moved. `frame` is on the reference timeline; `locked` views
    /// also moved the global centre.
    CentreFrameChanged {
        source: ViewId,
        frame: FrameIndex,
        locked: bool,
        mode: PlaybackFollowMode,
    },
    ZoomLevelChanged {
        source: ViewId,
        zoom: ZoomLevel,
        locked: bool,
    },
    /// Selections or the in-progress selection changed
    SelectionChanged,
    PlaybackFrameChanged(FrameIndex),
}

#[derive(Debug, Default)]
struct ManagerState {
    global_centre_frame: FrameIndex,
    global_zoom: ZoomLevel,
    playback_frame: FrameIndex,
    playing: bool,
    play_selection_mode: bool,
    selections: MultiSelection,
    /// Selection being dragged out, and whether it replaces the others
    in_progress: Option<(Selection, bool)>,
    align_mode: bool,
    reference_model: Option<ModelId>,
}

#[derive(Clone)]
pub struct ViewManager {
    state: Arc<Mutex<ManagerState>>,
    event_tx: Sender<ViewEvent>,
    event_rx: Receiver<ViewEvent>,
}

impl ViewManager {
    pub fn new() -> Self {
        let (event_tx, event_rx) = channel::bounded(EVENT_QUEUE_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(ManagerState {
                global_zoom: 1024,
                ..ManagerState::default()
            })),
            event_tx,
            event_rx,
        }
    }

    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, mut event: ViewEvent) {
        log::trace!("view event {:?}", event);
        loop {
            match self.event_tx.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    if let Ok(dropped) = self.event_rx.try_recv() {
                        log::debug!("view event queue full, dropping {:?}", dropped);
                    }
                    event = rejected;
                }
                Err(TrySendError::Disconnected(_)) => {
                    log::error!("view event queue disconnected");
                    return;
                }
            }
        }
    }

    /// Next queued event, if any (non-blocking)
    pub fn try_recv(&self) -> Option<ViewEvent> {
        match self.event_rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::error!("view event queue disconnected");
                None
            }
        }
    }

    /// Drain all pending events
    pub fn drain(&self) -> impl Iterator<Item = ViewEvent> + '_ {
        std::iter::from_fn(|| self.try_recv())
    }

    pub fn global_centre_frame(&self) -> FrameIndex {
        self.state().global_centre_frame
    }

    pub fn global_zoom_level(&self) -> ZoomLevel {
        self.state().global_zoom
    }

    /// A view's centre moved to `frame` (reference timeline)
    pub fn view_centre_frame_changed(
        &self,
        source: ViewId,
        frame: FrameIndex,
        locked: bool,
        mode: PlaybackFollowMode,
    ) {
        if locked {
            self.state().global_centre_frame = frame;
        }
        self.emit(ViewEvent::CentreFrameChanged {
            source,
            frame,
            locked,
            mode,
        });
        if matches!(
            mode,
            PlaybackFollowMode::ScrollPageWithCentre | PlaybackFollowMode::ScrollContinuous
        ) {
            self.seek(frame);
        }
    }

    pub fn view_zoom_level_changed(&self, source: ViewId, zoom: ZoomLevel, locked: bool) {
        if locked {
            self.state().global_zoom = zoom;
        }
        self.emit(ViewEvent::ZoomLevelChanged {
            source,
            zoom,
            locked,
        });
    }

    pub fn playback_frame(&self) -> FrameIndex {
        self.state().playback_frame
    }

    /// Move playback to `frame`
    ///
    /// While playing, seeks within [`SEEK_THRESHOLD_FRAMES`] of the current
    /// position are dropped so that following views don't fight playback.
    pub fn seek(&self, frame: FrameIndex) {
        let changed = {
            let mut state = self.state();
            let moved = if state.playing {
                (frame - state.playback_frame).abs() > SEEK_THRESHOLD_FRAMES
            } else {
                state.playback_frame != frame
            };
            if moved {
                state.playback_frame = frame;
            }
            moved
        };
        if changed {
            self.emit(ViewEvent::PlaybackFrameChanged(frame));
        }
    }

    /// Position reported by the playback source
    pub fn set_playback_position(&self, frame: FrameIndex) {
        let changed = {
            let mut state = self.state();
            let changed = state.playback_frame != frame;
            state.playback_frame = frame;
            changed
        };
        if changed {
            self.emit(ViewEvent::PlaybackFrameChanged(frame));
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state().playing
    }

    pub fn set_playing(&self, playing: bool) {
        self.state().playing = playing;
    }

    pub fn play_selection_mode(&self) -> bool {
        self.state().play_selection_mode
    }

    pub fn set_play_selection_mode(&self, enabled: bool) {
        self.state().play_selection_mode = enabled;
    }

    pub fn selections(&self) -> Vec<Selection> {
        self.state().selections.selections().to_vec()
    }

    pub fn has_selections(&self) -> bool {
        !self.state().selections.is_empty()
    }

    /// Replace all selections with one
    pub fn set_selection(&self, selection: Selection) {
        self.state().selections.set_selection(selection);
        self.emit(ViewEvent::SelectionChanged);
    }

    pub fn add_selection(&self, selection: Selection) {
        self.state().selections.add_selection(selection);
        self.emit(ViewEvent::SelectionChanged);
    }

    pub fn remove_selection(&self, selection: &Selection) {
        let removed = self.state().selections.remove_selection(selection);
        if removed {
            self.emit(ViewEvent::SelectionChanged);
        }
    }

    pub fn clear_selections(&self) {
        let had_any = {
            let mut state = self.state();
            let had_any = !state.selections.is_empty();
            state.selections.clear();
            had_any
        };
        if had_any {
            self.emit(ViewEvent::SelectionChanged);
        }
    }

    /// Selection currently being dragged out; `exclusive` hides the others
    pub fn in_progress_selection(&self) -> Option<(Selection, bool)> {
        self.state().in_progress
    }

    pub fn set_in_progress_selection(&self, selection: Selection, exclusive: bool) {
        self.state().in_progress = Some((selection, exclusive));
        self.emit(ViewEvent::SelectionChanged);
    }

    pub fn clear_in_progress_selection(&self) {
        if self.state().in_progress.take().is_some() {
            self.emit(ViewEvent::SelectionChanged);
        }
    }

    /// Frame playback starts from, constrained to the selections in
    /// play-selection mode
    pub fn constrain_frame_to_selection(&self, frame: FrameIndex) -> FrameIndex {
        let state = self.state();
        if state.play_selection_mode {
            state.selections.constrain_frame(frame)
        } else {
            frame
        }
    }

    pub fn align_mode(&self) -> bool {
        self.state().align_mode
    }

    pub fn set_align_mode(&self, align: bool) {
        self.state().align_mode = align;
    }

    /// Model whose timeline aligned views share
    pub fn reference_model(&self) -> Option<ModelId> {
        self.state().reference_model
    }

    pub fn set_reference_model(&self, model: Option<ModelId>) {
        self.state().reference_model = model;
    }
}

impl Default for ViewManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ViewManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewManager")
            .field("state", &*self.state())
            .field("pending_events", &self.event_rx.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_centre_change_sets_global_centre() {
        let manager = ViewManager::new();
        let view = ViewId::next();
        manager.view_centre_frame_changed(view, 5000, true, PlaybackFollowMode::ScrollPage);
        assert_eq!(manager.global_centre_frame(), 5000);

        let events: Vec<_> = manager.drain().collect();
        assert_eq!(
            events,
            vec![ViewEvent::CentreFrameChanged {
                source: view,
                frame: 5000,
                locked: true,
                mode: PlaybackFollowMode::ScrollPage,
            }]
        );
    }

    #[test]
    fn test_undrained_queue_keeps_newest_events() {
        let manager = ViewManager::new();
        let view = ViewId::next();
        let total = EVENT_QUEUE_CAPACITY as FrameIndex + 10;
        for frame in 0..total {
            manager.view_centre_frame_changed(view, frame, true, PlaybackFollowMode::Ignore);
        }

        let events: Vec<_> = manager.drain().collect();
        assert_eq!(events.len(), EVENT_QUEUE_CAPACITY);
        assert!(matches!(events[0], ViewEvent::CentreFrameChanged { frame: 10, .. }));
        assert!(matches!(
            events.last(),
            Some(ViewEvent::CentreFrameChanged { frame, .. }) if *frame == total - 1
        ));
        assert_eq!(manager.global_centre_frame(), total - 1);
    }

    #[test]
    fn test_unlocked_centre_change_leaves_global_centre() {
        let manager = ViewManager::new();
        manager.view_centre_frame_changed(ViewId::next(), 5000, false, PlaybackFollowMode::Ignore);
        assert_eq!(manager.global_centre_frame(), 0);
        assert_eq!(manager.drain().count(), 1);
    }

    #[test]
    fn test_continuous_follow_seeks_playback() {
        let manager = ViewManager::new();
        manager.view_centre_frame_changed(
            ViewId::next(),
            7000,
            true,
            PlaybackFollowMode::ScrollContinuous,
        );
        assert_eq!(manager.playback_frame(), 7000);
        let events: Vec<_> = manager.drain().collect();
        assert_eq!(events.last(), Some(&ViewEvent::PlaybackFrameChanged(7000)));
    }

    #[test]
    fn test_seek_while_playing_ignores_small_moves() {
        let manager = ViewManager::new();
        manager.set_playing(true);
        manager.seek(10_000);
        assert_eq!(manager.playback_frame(), 0);
        manager.seek(30_000);
        assert_eq!(manager.playback_frame(), 30_000);

        manager.set_playing(false);
        manager.seek(30_001);
        assert_eq!(manager.playback_frame(), 30_001);
    }

    #[test]
    fn test_zoom_change_only_locks_when_asked() {
        let manager = ViewManager::new();
        let view = ViewId::next();
        manager.view_zoom_level_changed(view, 512, false);
        assert_eq!(manager.global_zoom_level(), 1024);
        manager.view_zoom_level_changed(view, 512, true);
        assert_eq!(manager.global_zoom_level(), 512);
        assert_eq!(manager.drain().count(), 2);
    }

    #[test]
    fn test_selection_events() {
        let manager = ViewManager::new();
        manager.add_selection(Selection::new(0, 100));
        manager.add_selection(Selection::new(50, 200));
        assert_eq!(manager.selections(), vec![Selection::new(0, 200)]);
        assert!(manager.has_selections());

        manager.set_in_progress_selection(Selection::new(300, 400), true);
        assert_eq!(
            manager.in_progress_selection(),
            Some((Selection::new(300, 400), true))
        );
        manager.clear_in_progress_selection();
        manager.clear_in_progress_selection();
        manager.clear_selections();
        manager.clear_selections();

        let events: Vec<_> = manager.drain().collect();
        assert_eq!(events.len(), 5);
        assert!(events.iter().all(|e| *e == ViewEvent::SelectionChanged));
    }

    #[test]
    fn test_clones_share_queue() {
        let manager = ViewManager::new();
        let other = manager.clone();
        other.set_align_mode(true);
        other.seek(42);
        assert!(manager.align_mode());
        assert_eq!(manager.try_recv(), Some(ViewEvent::PlaybackFrameChanged(42)));
        assert_eq!(manager.try_recv(), None);
    }
}
