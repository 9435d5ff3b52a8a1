//! Sparse time/value points

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::{AlignmentModel, Model};
use crate::types::{FrameIndex, ModelId, Readiness, SampleRate};

/// One labelled value at a frame
#[derive(Debug, Clone, PartialEq)]
pub struct TimeValuePoint {
    pub frame: FrameIndex,
    pub value: f32,
    pub label: String,
}

impl TimeValuePoint {
    pub fn new(frame: FrameIndex, value: f32) -> Self {
        Self {
            frame,
            value,
            label: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Points sorted by frame, e.g. a pitch track or onset strengths
pub struct SparseTimeValueModel {
    id: ModelId,
    sample_rate: SampleRate,
    resolution: FrameIndex,
    points: RwLock<Vec<TimeValuePoint>>,
    completion: AtomicU8,
    alignment: Option<Arc<AlignmentModel>>,
}

impl SparseTimeValueModel {
    /// Empty, complete model; `resolution` is the frame step of the source data
    pub fn new(sample_rate: SampleRate, resolution: FrameIndex) -> Self {
        Self {
            id: ModelId::next(),
            sample_rate,
            resolution: resolution.max(1),
            points: RwLock::new(Vec::new()),
            completion: AtomicU8::new(100),
            alignment: None,
        }
    }

    pub fn with_alignment(mut self, alignment: Arc<AlignmentModel>) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn resolution(&self) -> FrameIndex {
        self.resolution
    }

    /// Insert keeping frame order; equal frames keep insertion order
    pub fn add_point(&self, point: TimeValuePoint) {
        let mut points = self.points.write().unwrap_or_else(PoisonError::into_inner);
        let at = points.partition_point(|p| p.frame <= point.frame);
        points.insert(at, point);
    }

    pub fn len(&self) -> usize {
        self.points.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Points with `start <= frame < end`
    pub fn points_within(&self, start: FrameIndex, end: FrameIndex) -> Vec<TimeValuePoint> {
        let points = self.points.read().unwrap_or_else(PoisonError::into_inner);
        let from = points.partition_point(|p| p.frame < start);
        let to = points.partition_point(|p| p.frame < end);
        points[from..to.max(from)].to_vec()
    }

    /// Smallest and largest value
    pub fn value_extents(&self) -> Option<(f32, f32)> {
        let points = self.points.read().unwrap_or_else(PoisonError::into_inner);
        points.iter().fold(None, |acc, p| match acc {
            None => Some((p.value, p.value)),
            Some((lo, hi)) => Some((lo.min(p.value), hi.max(p.value))),
        })
    }

    /// Report progress of whatever is producing the points
    pub fn set_completion(&self, percent: u8) {
        self.completion.store(percent.min(100), Ordering::Release);
    }
}

impl Model for SparseTimeValueModel {
    fn id(&self) -> ModelId {
        self.id
    }

    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    fn start_frame(&self) -> FrameIndex {
        let points = self.points.read().unwrap_or_else(PoisonError::into_inner);
        points.first().map_or(0, |p| p.frame)
    }

    fn end_frame(&self) -> FrameIndex {
        let points = self.points.read().unwrap_or_else(PoisonError::into_inner);
        points.last().map_or(0, |p| p.frame + self.resolution)
    }

    fn is_ok(&self) -> bool {
        true
    }

    fn readiness(&self) -> Readiness {
        match self.completion.load(Ordering::Acquire) {
            100 => Readiness::READY,
            c => Readiness::partial(c),
        }
    }

    fn alignment(&self) -> Option<&AlignmentModel> {
        self.alignment.as_deref()
    }
}
