//! Data models shown by layers
//!
//! Every model exposes a frame extent and a readiness report. Models that can
//! be drawn as a waveform additionally implement [`RangeSummarisable`], which
//! hands out min/max/absmean summaries at block sizes chosen through their
//! [`ZoomConstraint`].
//!
//! ## Threading
//!
//! Models are shared as `Arc<...>` between the UI thread and their own
//! background workers. All methods take `&self`; mutation goes through
//! interior locks held for short critical sections.

mod alignment;
mod dense_column;
mod error;
mod note;
mod range;
mod source;
mod sparse;
mod wave_file;

pub use alignment::AlignmentModel;
pub use dense_column::DenseColumnModel;
pub use error::{ModelError, ModelResult};
pub use note::{Note, NoteModel};
pub use range::{RangeSummary, SummaryBlock};
pub use source::{MemorySource, SampleSource, StreamingSource};
pub use sparse::{SparseTimeValueModel, TimeValuePoint};
pub use wave_file::WaveFileModel;

use crate::types::{FrameIndex, ModelId, Readiness, SampleRate, ZoomLevel};
use crate::zoom::ZoomConstraint;

/// Notification produced when a model is polled on the UI thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelEvent {
    /// Data in `[start, end)` changed
    ChangedWithin(FrameIndex, FrameIndex),
    /// Anything may have changed
    Changed,
    /// Loading finished
    Ready,
}

/// Common contract of every model
pub trait Model: Send + Sync {
    fn id(&self) -> ModelId;

    fn sample_rate(&self) -> SampleRate;

    /// First frame with data
    fn start_frame(&self) -> FrameIndex;

    /// One past the last frame with data
    fn end_frame(&self) -> FrameIndex;

    /// False when the model failed to load and can never show data
    fn is_ok(&self) -> bool;

    fn readiness(&self) -> Readiness;

    fn is_ready(&self) -> bool {
        self.readiness().ready
    }

    /// Message from a failed background computation
    fn last_error(&self) -> Option<String> {
        None
    }

    /// Mapping onto the reference model's timeline, when aligned
    fn alignment(&self) -> Option<&AlignmentModel> {
        None
    }

    fn align_to_reference(&self, frame: FrameIndex) -> FrameIndex {
        self.alignment().map_or(frame, |a| a.to_reference(frame))
    }

    fn align_from_reference(&self, frame: FrameIndex) -> FrameIndex {
        self.alignment().map_or(frame, |a| a.from_reference(frame))
    }

    /// Percentage of the alignment path computed so far
    fn alignment_completion(&self) -> u8 {
        self.alignment().map_or(100, |a| a.completion())
    }

    /// Zoom constraint imposed by this model's storage, if any
    fn zoom_constraint(&self) -> Option<&dyn ZoomConstraint> {
        None
    }
}

/// Models that can summarise sample ranges at several block sizes
pub trait RangeSummarisable: Model {
    fn channel_count(&self) -> usize;

    /// `desired` rounded down to a cached block size, or unchanged when
    /// served by direct reads
    fn summary_block_size(&self, desired: ZoomLevel) -> ZoomLevel;

    /// Summaries of `count` frames from `start`, one per block
    ///
    /// The returned block size is the one actually used; asking again with
    /// it yields the same data. Frames the model hasn't got yet are absent.
    fn summaries(
        &self,
        channel: usize,
        start: FrameIndex,
        count: FrameIndex,
        block_size: ZoomLevel,
    ) -> SummaryBlock;

    /// Whole span collapsed into one summary
    fn summary(&self, channel: usize, start: FrameIndex, count: FrameIndex) -> RangeSummary;

    /// Raw samples of one channel
    fn data(&self, channel: usize, start: FrameIndex, count: FrameIndex) -> Vec<f32>;
}
