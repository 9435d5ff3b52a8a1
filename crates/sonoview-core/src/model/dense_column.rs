//! Precomputed columns of bins (spectrogram-style grids)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::{AlignmentModel, Model};
use crate::types::{FrameIndex, ModelId, Readiness, SampleRate};
use crate::zoom::{PowerOfTwoZoomConstraint, ZoomConstraint};

/// Grid of `bin_count`-high columns, one every `resolution` frames
///
/// Columns are appended by whatever computes them; this model only stores
/// and serves them.
pub struct DenseColumnModel {
    id: ModelId,
    sample_rate: SampleRate,
    resolution: FrameIndex,
    bin_count: usize,
    columns: RwLock<Vec<Vec<f32>>>,
    /// Column count when complete; 0 when unknown
    expected_columns: AtomicUsize,
    constraint: PowerOfTwoZoomConstraint,
    alignment: Option<Arc<AlignmentModel>>,
}

impl DenseColumnModel {
    pub fn new(sample_rate: SampleRate, resolution: FrameIndex, bin_count: usize) -> Self {
        Self {
            id: ModelId::next(),
            sample_rate,
            resolution: resolution.max(1),
            bin_count,
            columns: RwLock::new(Vec::new()),
            expected_columns: AtomicUsize::new(0),
            constraint: PowerOfTwoZoomConstraint,
            alignment: None,
        }
    }

    pub fn with_alignment(mut self, alignment: Arc<AlignmentModel>) -> Self {
        self.alignment = Some(alignment);
        self
    }

    /// Declare how many columns a complete grid has
    pub fn set_expected_columns(&self, count: usize) {
        self.expected_columns.store(count, Ordering::Release);
    }

    pub fn resolution(&self) -> FrameIndex {
        self.resolution
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Append a column, padding or truncating it to `bin_count`
    pub fn push_column(&self, mut column: Vec<f32>) {
        column.resize(self.bin_count, 0.0);
        self.columns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(column);
    }

    pub fn column(&self, index: usize) -> Option<Vec<f32>> {
        self.columns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    /// Column covering `frame`, if computed
    pub fn column_index_for_frame(&self, frame: FrameIndex) -> Option<usize> {
        if frame < 0 {
            return None;
        }
        let index = (frame / self.resolution) as usize;
        (index < self.column_count()).then_some(index)
    }

    /// Largest bin value in the grid
    pub fn max_value(&self) -> f32 {
        self.columns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .flatten()
            .fold(0.0f32, |m, &v| m.max(v))
    }
}

impl Model for DenseColumnModel {
    fn id(&self) -> ModelId {
        self.id
    }

    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    fn start_frame(&self) -> FrameIndex {
        0
    }

    fn end_frame(&self) -> FrameIndex {
        self.column_count() as FrameIndex * self.resolution
    }

    fn is_ok(&self) -> bool {
        self.bin_count > 0
    }

    fn readiness(&self) -> Readiness {
        let expected = self.expected_columns.load(Ordering::Acquire);
        let have = self.column_count();
        if expected == 0 || have >= expected {
            Readiness::READY
        } else {
            Readiness::partial((have * 100 / expected) as u8)
        }
    }

    fn alignment(&self) -> Option<&AlignmentModel> {
        self.alignment.as_deref()
    }

    fn zoom_constraint(&self) -> Option<&dyn ZoomConstraint> {
        Some(&self.constraint)
    }
}
