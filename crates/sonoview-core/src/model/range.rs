//! Min/max/absmean summaries

use crate::types::ZoomLevel;

/// Summary of a block of samples
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RangeSummary {
    pub min: f32,
    pub max: f32,
    /// Mean of absolute sample values
    pub absmean: f32,
}

impl RangeSummary {
    pub fn new(min: f32, max: f32, absmean: f32) -> Self {
        Self { min, max, absmean }
    }

    /// Summarise a run of samples, `None` when empty
    pub fn of_samples<I>(samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = f32>,
    {
        let mut acc = Accumulator::default();
        for s in samples {
            acc.add_sample(s);
        }
        acc.finish()
    }

    /// Combine two summaries covering `self_weight` and `other_weight` frames
    pub fn merged(self, other: RangeSummary, self_weight: f64, other_weight: f64) -> Self {
        let total = self_weight + other_weight;
        let absmean = if total > 0.0 {
            ((self.absmean as f64 * self_weight + other.absmean as f64 * other_weight) / total)
                as f32
        } else {
            self.absmean
        };
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            absmean,
        }
    }
}

/// Summaries at one block size, as served by a model
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SummaryBlock {
    pub ranges: Vec<RangeSummary>,
    /// Block size actually used
    pub block_size: ZoomLevel,
}

impl SummaryBlock {
    pub fn empty(block_size: ZoomLevel) -> Self {
        Self {
            ranges: Vec::new(),
            block_size,
        }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Running min/max/absmean over samples or over finer summaries
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Accumulator {
    min: f32,
    max: f32,
    abs_total: f32,
    count: usize,
}

impl Accumulator {
    pub(crate) fn add_sample(&mut self, sample: f32) {
        if self.count == 0 || sample < self.min {
            self.min = sample;
        }
        if self.count == 0 || sample > self.max {
            self.max = sample;
        }
        self.abs_total += sample.abs();
        self.count += 1;
    }

    pub(crate) fn add_summary(&mut self, range: &RangeSummary) {
        if self.count == 0 || range.min < self.min {
            self.min = range.min;
        }
        if self.count == 0 || range.max > self.max {
            self.max = range.max;
        }
        self.abs_total += range.absmean;
        self.count += 1;
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    /// Take the summary so far and reset
    pub(crate) fn finish(&mut self) -> Option<RangeSummary> {
        if self.count == 0 {
            return None;
        }
        let out = RangeSummary::new(self.min, self.max, self.abs_total / self.count as f32);
        *self = Self::default();
        Some(out)
    }
}
