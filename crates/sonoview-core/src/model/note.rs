//! Notes with pitch and duration

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::{AlignmentModel, Model};
use crate::types::{FrameIndex, ModelId, Readiness, SampleRate};

/// A note: onset, duration, pitch value and level
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub frame: FrameIndex,
    pub duration: FrameIndex,
    /// Pitch, in the model's value units (Hz or MIDI pitch)
    pub value: f32,
    /// Velocity/level, 0.0 - 1.0
    pub level: f32,
    pub label: String,
}

impl Note {
    pub fn new(frame: FrameIndex, duration: FrameIndex, value: f32) -> Self {
        Self {
            frame,
            duration: duration.max(1),
            value,
            level: 1.0,
            label: String::new(),
        }
    }

    pub fn end_frame(&self) -> FrameIndex {
        self.frame + self.duration
    }
}

/// Notes sorted by onset, shown by flexi-note layers
pub struct NoteModel {
    id: ModelId,
    sample_rate: SampleRate,
    notes: RwLock<Vec<Note>>,
    completion: AtomicU8,
    alignment: Option<Arc<AlignmentModel>>,
}

impl NoteModel {
    pub fn new(sample_rate: SampleRate) -> Self {
        Self {
            id: ModelId::next(),
            sample_rate,
            notes: RwLock::new(Vec::new()),
            completion: AtomicU8::new(100),
            alignment: None,
        }
    }

    pub fn with_alignment(mut self, alignment: Arc<AlignmentModel>) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn add_note(&self, note: Note) {
        let mut notes = self.notes.write().unwrap_or_else(PoisonError::into_inner);
        let at = notes.partition_point(|n| n.frame <= note.frame);
        notes.insert(at, note);
    }

    pub fn len(&self) -> usize {
        self.notes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notes sounding anywhere in `[start, end)`
    pub fn notes_within(&self, start: FrameIndex, end: FrameIndex) -> Vec<Note> {
        let notes = self.notes.read().unwrap_or_else(PoisonError::into_inner);
        notes
            .iter()
            .take_while(|n| n.frame < end)
            .filter(|n| n.end_frame() > start)
            .cloned()
            .collect()
    }

    /// Lowest and highest pitch value
    pub fn value_extents(&self) -> Option<(f32, f32)> {
        let notes = self.notes.read().unwrap_or_else(PoisonError::into_inner);
        notes.iter().fold(None, |acc, n| match acc {
            None => Some((n.value, n.value)),
            Some((lo, hi)) => Some((lo.min(n.value), hi.max(n.value))),
        })
    }

    pub fn set_completion(&self, percent: u8) {
        self.completion.store(percent.min(100), Ordering::Release);
    }
}

impl Model for NoteModel {
    fn id(&self) -> ModelId {
        self.id
    }

    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    fn start_frame(&self) -> FrameIndex {
        let notes = self.notes.read().unwrap_or_else(PoisonError::into_inner);
        notes.first().map_or(0, |n| n.frame)
    }

    fn end_frame(&self) -> FrameIndex {
        let notes = self.notes.read().unwrap_or_else(PoisonError::into_inner);
        notes.iter().map(Note::end_frame).max().unwrap_or(0)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notes_within_includes_overlapping() {
        let m = NoteModel::new(44100);
        m.add_note(Note::new(1000, 5000, 60.0));
        m.add_note(Note::new(0, 500, 62.0));
        m.add_note(Note::new(9000, 100, 55.0));

        let sounding: Vec<_> = m.notes_within(4000, 8000).iter().map(|n| n.frame).collect();
        assert_eq!(sounding, vec![1000]);
        assert_eq!(m.start_frame(), 0);
        assert_eq!(m.end_frame(), 9100);
        assert_eq!(m.value_extents(), Some((55.0, 62.0)));
    }

    #[test]
    fn test_zero_duration_is_widened() {
        assert_eq!(Note::new(10, 0, 60.0).end_frame(), 11);
    }
}
