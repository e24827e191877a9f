//! Start/end mark storage.

use crate::measure::clock::{frame_index_of, FrameRate};
use serde::{Deserialize, Serialize};

/// A user-designated instant on the timeline, in seconds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(tag = "state", content = "seconds", rename_all = "snake_case")]
pub enum Mark {
    #[default]
    Unset,
    Set(f64),
}

impl Mark {
    pub fn seconds(self) -> Option<f64> {
        match self {
            Mark::Unset => None,
            Mark::Set(seconds) => Some(seconds),
        }
    }

    pub fn is_set(self) -> bool {
        matches!(self, Mark::Set(_))
    }

    /// Frame index of the mark at the given rate, for display.
    pub fn frame_index(self, fps: FrameRate) -> Option<i64> {
        self.seconds().map(|s| frame_index_of(s, fps))
    }
}

/// Copy of both slots as seen at one moment.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct MarkPair {
    pub start: Mark,
    pub end: Mark,
}

/// Holds at most one start and one end mark.
///
/// Marking overwrites the slot unconditionally. Both slots are only ever
/// cleared together.
#[derive(Debug, Default)]
pub struct MarkStore {
    marks: MarkPair,
}

impl MarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_start(&mut self, position: f64) {
        self.marks.start = Mark::Set(position.max(0.0));
    }

    pub fn mark_end(&mut self, position: f64) {
        self.marks.end = Mark::Set(position.max(0.0));
    }

    pub fn reset(&mut self) {
        self.marks = MarkPair::default();
    }

    pub fn snapshot(&self) -> MarkPair {
        self.marks
    }
}
