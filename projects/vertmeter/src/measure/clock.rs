//! Frame clock: conversions between playback seconds and frame indices.
//!
//! Positions are always carried in seconds. Frame indices are derived from
//! them at a given [`FrameRate`] and are only used for display and stepping.

use crate::measure::error::MeasureError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_FPS: f64 = 30.0;

/// A positive, finite number of frames per second.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, PartialOrd)]
#[serde(try_from = "f64", into = "f64")]
pub struct FrameRate(f64);

impl FrameRate {
    pub fn new(fps: f64) -> Result<Self, MeasureError> {
        if fps.is_finite() && fps > 0.0 {
            Ok(Self(fps))
        } else {
            Err(MeasureError::InvalidFrameRate(fps))
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }

    /// Duration of a single frame in seconds.
    pub fn frame_duration(self) -> f64 {
        1.0 / self.0
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self(DEFAULT_FPS)
    }
}

impl TryFrom<f64> for FrameRate {
    type Error = MeasureError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FrameRate> for f64 {
    fn from(fps: FrameRate) -> Self {
        fps.0
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fps", self.0)
    }
}

pub fn frame_index_of(seconds: f64, fps: FrameRate) -> i64 {
    (seconds * fps.get()).round() as i64
}

/// Index of the frame on screen at `seconds`: the one whose presentation
/// interval `[i / fps, (i + 1) / fps)` contains the instant.
pub fn presented_frame_of(seconds: f64, fps: FrameRate) -> i64 {
    // Nudge so that i / fps maps back to i despite rounding.
    (seconds * fps.get() + 1e-6).floor() as i64
}

pub fn time_of(frame_index: i64, fps: FrameRate) -> f64 {
    frame_index as f64 / fps.get()
}

/// Moves `current` by `delta_frames` and clamps the result to `[0, duration]`.
///
/// An unknown duration clamps to `[0, 0]`, so stepping before the media has
/// loaded pins the position at zero.
pub fn advance(current: f64, delta_frames: i64, fps: FrameRate, duration: Option<f64>) -> f64 {
    let upper = duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);
    (current + delta_frames as f64 / fps.get()).clamp(0.0, upper)
}
