//! Scroll cache of a view
//!
//! The cache holds the background, the scrollable layers and (when nothing
//! opaque sits in front) the selections, tagged with the centre frame and
//! zoom level they were drawn at. On a horizontal move of less than the
//! view width the bitmap is shifted and only the exposed strip is redrawn.

use sonoview_core::{FrameIndex, ZoomLevel};

use crate::canvas::{Bitmap, Color, Rect};

/// Cache state found at the start of a paint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No bitmap existed
    NoCache,
    /// Bitmap matched the view and was blitted as is (or only retagged)
    Valid,
    /// Bitmap was shifted and the exposed strip redrawn
    Scrolling,
    /// Bitmap existed but couldn't be reused
    Stale,
}

/// What a paint did, for callers and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintReport {
    pub state: CacheState,
    /// Horizontal shift applied to the cache
    pub dx: i32,
    /// Part of the cache that was redrawn
    pub cache_rect: Option<Rect>,
    /// A new bitmap had to be allocated
    pub reallocated: bool,
    /// Layers drew straight onto the target without a cache
    pub direct: bool,
    /// Region of the target that was overwritten; overlays belong here
    pub painted: Rect,
}

impl PaintReport {
    pub(crate) fn new(state: CacheState) -> Self {
        Self {
            state,
            dx: 0,
            cache_rect: None,
            reallocated: false,
            direct: false,
            painted: Rect::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ViewCache {
    pub bitmap: Bitmap,
    pub centre_frame: FrameIndex,
    pub zoom: ZoomLevel,
}

impl ViewCache {
    pub fn new(width: i32, height: i32, background: Color) -> Self {
        Self {
            bitmap: Bitmap::new(width, height, background),
            centre_frame: 0,
            zoom: 0,
        }
    }

    pub fn matches(&self, width: i32, height: i32, zoom: ZoomLevel) -> bool {
        self.zoom == zoom && self.bitmap.size() == (width, height)
    }

    pub fn retag(&mut self, centre_frame: FrameIndex, zoom: ZoomLevel) {
        self.centre_frame = centre_frame;
        self.zoom = zoom;
    }
}

/// Strip exposed by shifting a `width` x `height` image by `dx`
///
/// Content moving left (`dx < 0`) exposes the right edge.
pub(crate) fn exposed_strip(dx: i32, width: i32, height: i32) -> Rect {
    if dx < 0 {
        Rect::new(width + dx, 0, -dx, height)
    } else {
        Rect::new(0, 0, dx, height)
    }
}
