//! Frame/pixel mapping of a view
//!
//! A [`ViewGeometry`] is a copy of the handful of view fields layers need to
//! place things on screen. Passing it by value keeps layer painting free of
//! borrows on the view (whose cache bitmap is often the paint target).

use sonoview_core::{FrameIndex, ZoomLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewGeometry {
    pub width: i32,
    pub height: i32,
    pub centre_frame: FrameIndex,
    pub zoom: ZoomLevel,
}

impl ViewGeometry {
    pub fn new(width: i32, height: i32, centre_frame: FrameIndex, zoom: ZoomLevel) -> Self {
        Self {
            width,
            height,
            centre_frame,
            zoom: zoom.max(1),
        }
    }

    fn z(&self) -> FrameIndex {
        self.zoom.max(1) as FrameIndex
    }

    /// Frame at pixel 0, floored to a multiple of the zoom level
    pub fn start_frame(&self) -> FrameIndex {
        let z = self.z();
        let frame = self.centre_frame - (self.width / 2) as FrameIndex * z;
        frame.div_euclid(z) * z
    }

    /// Last frame shown in the rightmost column
    pub fn end_frame(&self) -> FrameIndex {
        self.frame_for_x(self.width) - 1
    }

    pub fn frame_for_x(&self, x: i32) -> FrameIndex {
        self.start_frame() + x as FrameIndex * self.z()
    }

    pub fn x_for_frame(&self, frame: FrameIndex) -> i32 {
        let x = (frame - self.start_frame()).div_euclid(self.z());
        x.clamp(i32::MIN as FrameIndex, i32::MAX as FrameIndex) as i32
    }
}
