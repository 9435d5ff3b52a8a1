//! Alignment of a model onto a reference timeline

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::types::{FrameIndex, ModelId};

/// Monotone path of `(frame, reference_frame)` pairs
///
/// Frames between path points are interpolated linearly. Outside the path
/// the offset of the nearest end point applies. An empty path is the
/// identity mapping.
#[derive(Debug)]
pub struct AlignmentModel {
    reference: ModelId,
    path: RwLock<Vec<(FrameIndex, FrameIndex)>>,
    completion: AtomicU8,
}

impl AlignmentModel {
    /// Alignment against `reference`, not yet computed
    pub fn new(reference: ModelId) -> Self {
        Self {
            reference,
            path: RwLock::new(Vec::new()),
            completion: AtomicU8::new(0),
        }
    }

    /// Alignment with a complete path
    pub fn with_path(reference: ModelId, path: Vec<(FrameIndex, FrameIndex)>) -> Self {
        let model = Self::new(reference);
        model.set_path(path);
        model.set_completion(100);
        model
    }

    pub fn reference(&self) -> ModelId {
        self.reference
    }

    /// Replace the path; points are sorted by frame
    pub fn set_path(&self, mut path: Vec<(FrameIndex, FrameIndex)>) {
        path.sort_unstable();
        *self.path.write().unwrap_or_else(PoisonError::into_inner) = path;
    }

    pub fn set_completion(&self, percent: u8) {
        self.completion.store(percent.min(100), Ordering::Release);
    }

    pub fn completion(&self) -> u8 {
        self.completion.load(Ordering::Acquire)
    }

    pub fn to_reference(&self, frame: FrameIndex) -> FrameIndex {
        let path = self.path.read().unwrap_or_else(PoisonError::into_inner);
        map_through(&path, frame, |p| p.0, |p| p.1)
    }

    pub fn from_reference(&self, reference_frame: FrameIndex) -> FrameIndex {
        let path = self.path.read().unwrap_or_else(PoisonError::into_inner);
        map_through(&path, reference_frame, |p| p.1, |p| p.0)
    }
}

fn map_through(
    path: &[(FrameIndex, FrameIndex)],
    frame: FrameIndex,
    from: impl Fn(&(FrameIndex, FrameIndex)) -> FrameIndex,
    to: impl Fn(&(FrameIndex, FrameIndex)) -> FrameIndex,
) -> FrameIndex {
    let (Some(first), Some(last)) = (path.first(), path.last()) else {
        return frame;
    };
    if frame <= from(first) {
        return frame + to(first) - from(first);
    }
    if frame >= from(last) {
        return frame + to(last) - from(last);
    }

    let after = path.partition_point(|p| from(p) <= frame);
    let (a, b) = (&path[after - 1], &path[after]);
    let span = from(b) - from(a);
    if span == 0 {
        return to(a);
    }
    let t = (frame - from(a)) as f64 / span as f64;
    to(a) + ((to(b) - to(a)) as f64 * t).round() as FrameIndex
}
