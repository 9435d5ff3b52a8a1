//! Waveform model with background-filled summary caches
//!
//! ## Design
//!
//! Drawing a long file at a coarse zoom can't afford to touch every sample.
//! `WaveFileModel` keeps two summary caches, one per block at
//! `2^min_cache_power` frames and one per block at the sqrt-two size
//! (256 and 362 frames by default). A dedicated thread fills them:
//!
//! 1. Read 16384 interleaved frames from the source
//! 2. Accumulate each channel's min/max/absmean (channels in parallel)
//! 3. Append completed blocks under the cache mutex
//! 4. Publish the new high-water mark through an atomic `fill_extent`
//!
//! While the source is still growing, the thread only consumes whole read
//! blocks and re-polls. Partial trailing blocks are flushed once the source
//! is complete. The UI thread calls [`WaveFileModel::poll_fill`] on a timer
//! to turn fill progress into [`ModelEvent`]s.
//!
//! Block sizes below the smallest cached block are served from the source
//! directly, through a mutex-guarded buffer that remembers the last region.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::range::Accumulator;
use super::{
    AlignmentModel, MemorySource, Model, ModelError, ModelEvent, ModelResult, RangeSummarisable,
    RangeSummary, SampleSource, SummaryBlock,
};
use crate::audio_file;
use crate::types::{FrameIndex, ModelId, Readiness, SampleRate, ZoomLevel, DEFAULT_MIN_CACHE_POWER};
use crate::zoom::{CacheKind, PowerOfSqrtTwoZoomConstraint, RoundingDirection, ZoomConstraint};

/// Frames read from the source per fill step
const READ_BLOCK_FRAMES: FrameIndex = 16384;

/// Wait between polls of a source that is still growing
const UPDATE_POLL: Duration = Duration::from_millis(100);

const POW2_CACHE: usize = 0;
const SQRT2_CACHE: usize = 1;

/// State shared between the model and its fill thread
#[derive(Default)]
struct FillState {
    /// `[pow2, sqrt2]`, one entry per channel per block, channel-interleaved
    caches: Mutex<[Vec<RangeSummary>; 2]>,
    /// Source frames summarised so far
    fill_extent: AtomicI64,
    finished: AtomicBool,
    exiting: AtomicBool,
    error: Mutex<Option<String>>,
}

impl FillState {
    fn exiting(&self) -> bool {
        self.exiting.load(Ordering::Acquire)
    }
}

/// Last region read for block sizes below the cache
#[derive(Default)]
struct DirectRead {
    start: FrameIndex,
    count: FrameIndex,
    samples: Vec<f32>,
}

/// Audio waveform model backed by a [`SampleSource`]
pub struct WaveFileModel {
    id: ModelId,
    source: Arc<dyn SampleSource>,
    start_frame: FrameIndex,
    constraint: PowerOfSqrtTwoZoomConstraint,
    fill: Arc<FillState>,
    fill_thread: Mutex<Option<JoinHandle<()>>>,
    direct: Mutex<DirectRead>,
    last_fill_extent: AtomicI64,
    ready_reported: AtomicBool,
    alignment: Option<Arc<AlignmentModel>>,
}

impl WaveFileModel {
    /// Wrap a source and start filling the summary caches
    pub fn new(source: Arc<dyn SampleSource>) -> ModelResult<Self> {
        Self::with_options(source, 0, DEFAULT_MIN_CACHE_POWER)
    }

    /// Decode a WAV file into memory and wrap it
    pub fn open(path: &Path) -> ModelResult<Self> {
        let source = audio_file::load_wav(path).map_err(|e| ModelError::LoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::new(Arc::new(source))
    }

    /// Mono model over in-memory samples
    pub fn from_samples(sample_rate: SampleRate, samples: Vec<f32>) -> ModelResult<Self> {
        Self::new(Arc::new(MemorySource::new(1, sample_rate, samples)))
    }

    /// Wrap a source placed at `start_frame` on the timeline, caching from
    /// `2^min_cache_power` frames up
    pub fn with_options(
        source: Arc<dyn SampleSource>,
        start_frame: FrameIndex,
        min_cache_power: u32,
    ) -> ModelResult<Self> {
        if source.channel_count() == 0 && !source.is_updating() {
            return Err(ModelError::NoChannels);
        }

        let constraint = PowerOfSqrtTwoZoomConstraint::new(min_cache_power);
        let block_sizes = [
            constraint.pow2_cache_block() as usize,
            constraint.sqrt2_cache_block() as usize,
        ];
        let id = ModelId::next();
        let fill = Arc::new(FillState::default());

        let thread_source = Arc::clone(&source);
        let thread_fill = Arc::clone(&fill);
        let handle = thread::Builder::new()
            .name(format!("wave-fill-{}", id.0))
            .spawn(move || run_fill_thread(thread_source, thread_fill, block_sizes))?;

        log::info!(
            "{}: fill thread started ({} channels, {} frames, cache blocks {:?})",
            id,
            source.channel_count(),
            source.frame_count(),
            block_sizes
        );

        Ok(Self {
            id,
            source,
            start_frame,
            constraint,
            fill,
            fill_thread: Mutex::new(Some(handle)),
            direct: Mutex::new(DirectRead::default()),
            last_fill_extent: AtomicI64::new(0),
            ready_reported: AtomicBool::new(false),
            alignment: None,
        })
    }

    /// Attach an alignment onto the reference model's timeline
    pub fn with_alignment(mut self, alignment: Arc<AlignmentModel>) -> Self {
        self.alignment = Some(alignment);
        self
    }

    /// Frames summarised so far, on the model's timeline
    pub fn fill_extent(&self) -> FrameIndex {
        self.start_frame + self.fill.fill_extent.load(Ordering::Acquire)
    }

    /// Turn fill progress into notifications; call periodically on the UI thread
    ///
    /// Emits `ChangedWithin(last, extent)` while the extent grows. When the
    /// fill completes: `ChangedWithin` for the remaining tail, then `Changed`
    /// and `Ready`. A failed fill emits `Changed` without `Ready`.
    pub fn poll_fill(&self) -> Vec<ModelEvent> {
        let mut events = Vec::new();
        if self.ready_reported.load(Ordering::Acquire) {
            return events;
        }

        let last = self.last_fill_extent.load(Ordering::Acquire);
        let extent = self.fill.fill_extent.load(Ordering::Acquire);

        if !self.fill.finished.load(Ordering::Acquire) {
            if extent > last {
                events.push(ModelEvent::ChangedWithin(
                    self.start_frame + last,
                    self.start_frame + extent,
                ));
                self.last_fill_extent.store(extent, Ordering::Release);
            }
            return events;
        }

        self.ready_reported.store(true, Ordering::Release);
        self.join_fill_thread();

        let end = self.end_frame();
        if end > self.start_frame + last {
            events.push(ModelEvent::ChangedWithin(self.start_frame + last, end));
        }
        self.last_fill_extent.store(extent, Ordering::Release);
        events.push(ModelEvent::Changed);

        match self.last_error() {
            None => {
                log::info!("{}: summary caches filled ({} frames)", self.id, extent);
                events.push(ModelEvent::Ready);
            }
            Some(err) => log::warn!("{}: fill ended with error: {}", self.id, err),
        }
        events
    }

    /// Block until the fill thread finishes or `timeout` passes
    ///
    /// Returns whether the fill finished.
    pub fn wait_for_fill(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.fill.finished.load(Ordering::Acquire) {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    fn join_fill_thread(&self) {
        let handle = self
            .fill_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("{}: fill thread panicked outside the fill loop", self.id);
            }
        }
    }

    /// Map a span on the model's timeline onto source frames
    fn to_source_span(&self, start: FrameIndex, count: FrameIndex) -> Option<(FrameIndex, FrameIndex)> {
        if count <= 0 {
            return None;
        }
        if start >= self.start_frame {
            Some((start - self.start_frame, count))
        } else if count <= self.start_frame - start {
            None
        } else {
            Some((0, count - (self.start_frame - start)))
        }
    }

    fn source_summaries(
        &self,
        channel: usize,
        start: FrameIndex,
        count: FrameIndex,
        block_size: ZoomLevel,
    ) -> SummaryBlock {
        let choice = self
            .constraint
            .nearest_block_size_detailed(block_size, RoundingDirection::RoundDown);
        match choice.cache {
            CacheKind::Direct => self.direct_summaries(channel, start, count, block_size),
            cache => self.cached_summaries(channel, start, count, choice.block_size, cache),
        }
    }

    fn cached_summaries(
        &self,
        channel: usize,
        start: FrameIndex,
        count: FrameIndex,
        block_size: ZoomLevel,
        cache: CacheKind,
    ) -> SummaryBlock {
        let (kind, cache_block) = match cache {
            CacheKind::PowerOfTwo { .. } => (POW2_CACHE, self.constraint.pow2_cache_block()),
            _ => (SQRT2_CACHE, self.constraint.sqrt2_cache_block()),
        };
        let cache_block = cache_block as FrameIndex;
        let div = (block_size as usize / cache_block as usize).max(1);
        let channels = self.channel_count();

        let start_index = start / cache_block;
        let end_index = (start + count) / cache_block;

        let caches = self.fill.caches.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = &caches[kind];

        let mut ranges = Vec::with_capacity((count / block_size as FrameIndex) as usize + 1);
        let mut acc = Accumulator::default();
        for block in start_index..=end_index {
            let index = block as usize * channels + channel;
            let Some(entry) = entries.get(index) else {
                break;
            };
            acc.add_summary(entry);
            if acc.count() == div {
                ranges.extend(acc.finish());
            }
        }
        ranges.extend(acc.finish());

        SummaryBlock { ranges, block_size }
    }

    fn direct_summaries(
        &self,
        channel: usize,
        start: FrameIndex,
        count: FrameIndex,
        block_size: ZoomLevel,
    ) -> SummaryBlock {
        let channels = self.channel_count();
        let mut direct = self.direct.lock().unwrap_or_else(PoisonError::into_inner);
        if direct.start != start || direct.count != count || direct.samples.is_empty() {
            direct.samples = self.source.interleaved_frames(start, count);
            direct.start = start;
            direct.count = count;
        }

        let samples: Vec<f32> = direct
            .samples
            .iter()
            .skip(channel)
            .step_by(channels)
            .copied()
            .collect();
        let ranges = samples
            .chunks(block_size as usize)
            .filter_map(|chunk| RangeSummary::of_samples(chunk.iter().copied()))
            .collect();

        SummaryBlock { ranges, block_size }
    }

    /// Collapse a span of source frames into one summary and its frame weight
    fn source_summary(
        &self,
        channel: usize,
        start: FrameIndex,
        count: FrameIndex,
    ) -> Option<(RangeSummary, f64)> {
        if count <= 0 {
            return None;
        }

        let mut block_size: FrameIndex = 1;
        while block_size <= count {
            block_size *= 2;
        }
        if block_size > 1 {
            block_size /= 2;
        }

        let mut block_start = (start / block_size) * block_size;
        let block_end = ((start + count) / block_size) * block_size;
        if block_start < start {
            block_start += block_size;
        }

        let mut total: Option<(RangeSummary, f64)> = None;
        let mut fold = |range: RangeSummary, weight: f64| {
            total = Some(match total {
                None => (range, weight),
                Some((acc, acc_weight)) => (acc.merged(range, acc_weight, weight), acc_weight + weight),
            });
        };

        if block_end > block_start {
            let expected = ((block_end - block_start) / block_size) as usize;
            let block = self.source_summaries(
                channel,
                block_start,
                block_end - block_start,
                block_size as ZoomLevel,
            );
            let weight = block.block_size as f64;
            for range in block.ranges.into_iter().take(expected) {
                fold(range, weight);
            }
        }

        if block_start > start {
            if let Some((range, weight)) = self.source_summary(channel, start, block_start - start) {
                fold(range, weight);
            }
        }

        if block_end < start + count {
            if let Some((range, weight)) =
                self.source_summary(channel, block_end, start + count - block_end)
            {
                fold(range, weight);
            }
        }

        total
    }
}

impl Drop for WaveFileModel {
    fn drop(&mut self) {
        self.fill.exiting.store(true, Ordering::Release);
        self.join_fill_thread();
    }
}

impl Model for WaveFileModel {
    fn id(&self) -> ModelId {
        self.id
    }

    fn sample_rate(&self) -> SampleRate {
        self.source.sample_rate()
    }

    fn start_frame(&self) -> FrameIndex {
        self.start_frame
    }

    fn end_frame(&self) -> FrameIndex {
        self.start_frame + self.source.frame_count()
    }

    fn is_ok(&self) -> bool {
        self.source.channel_count() > 0 || self.source.is_updating()
    }

    fn readiness(&self) -> Readiness {
        let finished = self.fill.finished.load(Ordering::Acquire);
        if finished && self.last_error().is_none() {
            return Readiness::READY;
        }
        let total = self.source.frame_count();
        if total <= 0 {
            return Readiness::partial(0);
        }
        let extent = self.fill.fill_extent.load(Ordering::Acquire);
        Readiness::partial((extent * 100 / total).clamp(0, 100) as u8)
    }

    fn last_error(&self) -> Option<String> {
        self.fill
            .error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn alignment(&self) -> Option<&AlignmentModel> {
        self.alignment.as_deref()
    }

    fn zoom_constraint(&self) -> Option<&dyn ZoomConstraint> {
        Some(&self.constraint)
    }
}

impl RangeSummarisable for WaveFileModel {
    fn channel_count(&self) -> usize {
        self.source.channel_count()
    }

    fn summary_block_size(&self, desired: ZoomLevel) -> ZoomLevel {
        let choice = self
            .constraint
            .nearest_block_size_detailed(desired, RoundingDirection::RoundDown);
        match choice.cache {
            CacheKind::Direct => desired.max(1),
            _ => choice.block_size,
        }
    }

    fn summaries(
        &self,
        channel: usize,
        start: FrameIndex,
        count: FrameIndex,
        block_size: ZoomLevel,
    ) -> SummaryBlock {
        let block_size = block_size.max(1);
        if !self.is_ok() || channel >= self.channel_count() {
            return SummaryBlock::empty(block_size);
        }
        match self.to_source_span(start, count) {
            Some((start, count)) => self.source_summaries(channel, start, count, block_size),
            None => SummaryBlock::empty(block_size),
        }
    }

    fn summary(&self, channel: usize, start: FrameIndex, count: FrameIndex) -> RangeSummary {
        if !self.is_ok() || channel >= self.channel_count() {
            return RangeSummary::default();
        }
        self.to_source_span(start, count)
            .and_then(|(start, count)| self.source_summary(channel, start, count))
            .map(|(range, _)| range)
            .unwrap_or_default()
    }

    fn data(&self, channel: usize, start: FrameIndex, count: FrameIndex) -> Vec<f32> {
        let channels = self.channel_count();
        if channel >= channels {
            return Vec::new();
        }
        match self.to_source_span(start, count) {
            Some((start, count)) => self
                .source
                .interleaved_frames(start, count)
                .into_iter()
                .skip(channel)
                .step_by(channels)
                .collect(),
            None => Vec::new(),
        }
    }
}

// =============================================================================
// Fill thread
// =============================================================================

/// Per-channel accumulation for both caches
struct ChannelAccumulator {
    block_sizes: [usize; 2],
    acc: [Accumulator; 2],
}

impl ChannelAccumulator {
    fn new(block_sizes: [usize; 2]) -> Self {
        Self {
            block_sizes,
            acc: [Accumulator::default(); 2],
        }
    }

    /// Feed samples; returns the blocks they completed per cache
    fn feed(&mut self, samples: impl Iterator<Item = f32>) -> [Vec<RangeSummary>; 2] {
        let mut completed = [Vec::new(), Vec::new()];
        for sample in samples {
            for kind in [POW2_CACHE, SQRT2_CACHE] {
                self.acc[kind].add_sample(sample);
                if self.acc[kind].count() == self.block_sizes[kind] {
                    completed[kind].extend(self.acc[kind].finish());
                }
            }
        }
        completed
    }

    fn flush(&mut self) -> [Vec<RangeSummary>; 2] {
        [
            self.acc[POW2_CACHE].finish().into_iter().collect(),
            self.acc[SQRT2_CACHE].finish().into_iter().collect(),
        ]
    }
}

fn run_fill_thread(source: Arc<dyn SampleSource>, fill: Arc<FillState>, block_sizes: [usize; 2]) {
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        fill_caches(source.as_ref(), &fill, block_sizes)
    }));

    if let Err(payload) = result {
        let message = panic_message(payload.as_ref());
        log::error!("Summary fill failed: {}", message);
        *fill.error.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(format!("Summary fill failed: {}", message));
    } else {
        log::debug!("Summary fill finished in {:?}", started.elapsed());
    }

    fill.finished.store(true, Ordering::Release);
}

fn fill_caches(source: &dyn SampleSource, fill: &FillState, block_sizes: [usize; 2]) {
    let mut updating = source.is_updating();
    let mut channels = source.channel_count();
    while channels == 0 && updating && !fill.exiting() {
        thread::sleep(UPDATE_POLL);
        channels = source.channel_count();
        updating = source.is_updating();
    }
    if channels == 0 {
        return;
    }

    let mut accumulators: Vec<ChannelAccumulator> =
        (0..channels).map(|_| ChannelAccumulator::new(block_sizes)).collect();
    let mut frame: FrameIndex = 0;
    let mut frame_count = source.frame_count();
    let mut first = true;

    while first || updating {
        updating = source.is_updating();
        frame_count = source.frame_count();

        while frame < frame_count {
            if updating && frame + READ_BLOCK_FRAMES > frame_count {
                break;
            }

            let block = source.interleaved_frames(frame, READ_BLOCK_FRAMES);
            let frames_read = block.len() / channels;
            if frames_read == 0 {
                break;
            }

            let completed: Vec<[Vec<RangeSummary>; 2]> = accumulators
                .par_iter_mut()
                .enumerate()
                .map(|(ch, acc)| {
                    acc.feed(block.iter().skip(ch).step_by(channels).take(frames_read).copied())
                })
                .collect();
            append_blocks(fill, &completed);

            frame += frames_read as FrameIndex;
            fill.fill_extent.store(frame, Ordering::Release);
            log::trace!("Summary fill extent {}", frame);

            if fill.exiting() {
                break;
            }
        }

        first = false;
        if fill.exiting() {
            break;
        }
        if updating {
            thread::sleep(UPDATE_POLL);
        }
    }

    if !fill.exiting() {
        let tails: Vec<[Vec<RangeSummary>; 2]> =
            accumulators.iter_mut().map(ChannelAccumulator::flush).collect();
        append_blocks(fill, &tails);
    }

    fill.fill_extent.store(frame_count, Ordering::Release);
}

/// Append per-channel completed blocks, interleaving channels per block
fn append_blocks(fill: &FillState, per_channel: &[[Vec<RangeSummary>; 2]]) {
    let mut caches = fill.caches.lock().unwrap_or_else(PoisonError::into_inner);
    for kind in [POW2_CACHE, SQRT2_CACHE] {
        let blocks = per_channel.first().map_or(0, |c| c[kind].len());
        for block in 0..blocks {
            for channel in per_channel {
                caches[kind].push(channel[kind][block]);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
