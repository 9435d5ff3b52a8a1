//! Sample sources feeding waveform models

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::types::{FrameIndex, SampleRate};

/// Interleaved audio that can be read at random positions
///
/// A source may still be growing (recording, streaming decode). While
/// [`is_updating`](SampleSource::is_updating) is true, `frame_count` may
/// increase between calls.
pub trait SampleSource: Send + Sync {
    fn channel_count(&self) -> usize;

    fn sample_rate(&self) -> SampleRate;

    fn frame_count(&self) -> FrameIndex;

    fn is_updating(&self) -> bool {
        false
    }

    /// Up to `count` interleaved frames from `start`; shorter at the end
    fn interleaved_frames(&self, start: FrameIndex, count: FrameIndex) -> Vec<f32>;
}

fn slice_frames(samples: &[f32], channels: usize, start: FrameIndex, count: FrameIndex) -> Vec<f32> {
    if channels == 0 || start < 0 || count <= 0 {
        return Vec::new();
    }
    let from = (start as usize).saturating_mul(channels).min(samples.len());
    let to = from
        .saturating_add((count as usize).saturating_mul(channels))
        .min(samples.len());
    samples[from..to].to_vec()
}

/// Fully decoded audio held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    channels: usize,
    sample_rate: SampleRate,
    samples: Vec<f32>,
}

impl MemorySource {
    /// `samples` are interleaved; a trailing partial frame is dropped
    pub fn new(channels: usize, sample_rate: SampleRate, mut samples: Vec<f32>) -> Self {
        if channels > 0 {
            samples.truncate(samples.len() / channels * channels);
        }
        Self {
            channels,
            sample_rate,
            samples,
        }
    }

    /// Mono source from a closure of the frame index
    pub fn from_fn(
        sample_rate: SampleRate,
        frames: usize,
        f: impl Fn(usize) -> f32,
    ) -> Self {
        Self::new(1, sample_rate, (0..frames).map(f).collect())
    }
}

impl SampleSource for MemorySource {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    fn frame_count(&self) -> FrameIndex {
        if self.channels == 0 {
            0
        } else {
            (self.samples.len() / self.channels) as FrameIndex
        }
    }

    fn interleaved_frames(&self, start: FrameIndex, count: FrameIndex) -> Vec<f32> {
        slice_frames(&self.samples, self.channels, start, count)
    }
}

/// Source that grows while audio arrives
///
/// The writer appends interleaved frames and calls [`finish`](Self::finish)
/// once nothing more will come.
#[derive(Debug)]
pub struct StreamingSource {
    channels: usize,
    sample_rate: SampleRate,
    samples: RwLock<Vec<f32>>,
    updating: AtomicBool,
}

impl StreamingSource {
    pub fn new(channels: usize, sample_rate: SampleRate) -> Self {
        Self {
            channels,
            sample_rate,
            samples: RwLock::new(Vec::new()),
            updating: AtomicBool::new(true),
        }
    }

    /// Append whole interleaved frames; a trailing partial frame is dropped
    pub fn append(&self, interleaved: &[f32]) {
        if self.channels == 0 {
            return;
        }
        let whole = interleaved.len() / self.channels * self.channels;
        self.samples
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(&interleaved[..whole]);
    }

    /// Mark the source complete
    pub fn finish(&self) {
        self.updating.store(false, Ordering::Release);
    }
}

impl SampleSource for StreamingSource {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    fn frame_count(&self) -> FrameIndex {
        if self.channels == 0 {
            return 0;
        }
        let len = self.samples.read().unwrap_or_else(PoisonError::into_inner).len();
        (len / self.channels) as FrameIndex
    }

    fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Acquire)
    }

    fn interleaved_frames(&self, start: FrameIndex, count: FrameIndex) -> Vec<f32> {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        slice_frames(&samples, self.channels, start, count)
    }
}
