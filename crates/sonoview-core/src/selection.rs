//! Selections over the frame axis

use crate::types::FrameIndex;

/// Half-open frame span `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Selection {
    start: FrameIndex,
    end: FrameIndex,
}

impl Selection {
    /// Build a selection, swapping the bounds if given backwards
    pub fn new(start: FrameIndex, end: FrameIndex) -> Self {
        if start > end {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn start_frame(&self) -> FrameIndex {
        self.start
    }

    pub fn end_frame(&self) -> FrameIndex {
        self.end
    }

    pub fn duration(&self) -> FrameIndex {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, frame: FrameIndex) -> bool {
        self.start <= frame && frame < self.end
    }

    fn touches(&self, other: &Selection) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Sorted, non-overlapping set of selections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiSelection {
    selections: Vec<Selection>,
}

impl MultiSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Replace everything with a single selection
    pub fn set_selection(&mut self, selection: Selection) {
        self.selections.clear();
        self.add_selection(selection);
    }

    /// Insert a selection, merging any it overlaps or touches
    pub fn add_selection(&mut self, selection: Selection) {
        if selection.is_empty() {
            return;
        }
        let mut merged = selection;
        self.selections.retain(|existing| {
            if existing.touches(&merged) {
                merged = Selection::new(
                    existing.start.min(merged.start),
                    existing.end.max(merged.end),
                );
                false
            } else {
                true
            }
        });
        let at = self.selections.partition_point(|s| s.start < merged.start);
        self.selections.insert(at, merged);
    }

    /// Remove an exact selection; returns whether it was present
    pub fn remove_selection(&mut self, selection: &Selection) -> bool {
        let before = self.selections.len();
        self.selections.retain(|s| s != selection);
        self.selections.len() != before
    }

    pub fn clear(&mut self) {
        self.selections.clear();
    }

    /// Selection containing `frame`, or the next one after it when
    /// `default_to_following` is set
    pub fn containing_selection(
        &self,
        frame: FrameIndex,
        default_to_following: bool,
    ) -> Option<Selection> {
        for s in &self.selections {
            if s.contains(frame) {
                return Some(*s);
            }
            if s.start > frame {
                return default_to_following.then_some(*s);
            }
        }
        None
    }

    /// Move `frame` into the selected regions for playback
    ///
    /// Frames inside a selection are kept, frames in a gap jump to the next
    /// selection, and frames past the last selection wrap to the first.
    pub fn constrain_frame(&self, frame: FrameIndex) -> FrameIndex {
        let Some(first) = self.selections.first() else {
            return frame;
        };
        for s in &self.selections {
            if frame < s.end {
                return frame.max(s.start);
            }
        }
        first.start
    }

    /// Overall extent covered by all selections
    pub fn extent(&self) -> Option<Selection> {
        match (self.selections.first(), self.selections.last()) {
            (Some(first), Some(last)) => Some(Selection::new(first.start, last.end)),
            _ => None,
        }
    }
}
