//! Frozen record of the last successful calculation.

use crate::measure::calculator::Calculation;
use crate::measure::clock::{presented_frame_of, FrameRate};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything export needs, captured once at calculation time.
///
/// `peak_instant` is stored in seconds together with the rate in force when
/// it was computed, so later fps changes never move the exported frame.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MeasurementSnapshot {
    pub start: f64,
    pub end: f64,
    pub peak_instant: f64,
    pub frame_rate_at_capture: FrameRate,
    pub jump_height_cm: f64,
    pub flight_time_seconds: f64,
    pub captured_at: DateTime<Utc>,
}

impl MeasurementSnapshot {
    pub fn capture(calc: &Calculation) -> Self {
        Self {
            start: calc.start,
            end: calc.end,
            peak_instant: calc.peak_instant,
            frame_rate_at_capture: calc.fps,
            jump_height_cm: calc.result.jump_height_cm,
            flight_time_seconds: calc.result.flight_time_seconds,
            captured_at: Utc::now(),
        }
    }

    /// Frame a surface at the capture rate shows when seeked to the peak.
    pub fn peak_frame(&self) -> i64 {
        presented_frame_of(self.peak_instant, self.frame_rate_at_capture)
    }

    /// Caption drawn on the exported image.
    pub fn height_label(&self) -> String {
        format!("{:.1} cm", self.jump_height_cm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::calculator::calculate;
    use crate::measure::marks::{Mark, MarkPair};

    #[test]
    fn test_capture_freezes_peak() {
        let fps = FrameRate::new(60.0).unwrap();
        let marks = MarkPair {
            start: Mark::Set(2.0),
            end: Mark::Set(2.5),
        };
        let calc = calculate(marks, fps, 0.0).unwrap();
        let snapshot = MeasurementSnapshot::capture(&calc);

        assert_eq!(snapshot.peak_instant, 2.25);
        assert_eq!(snapshot.peak_frame(), 135);
        assert_eq!(snapshot.frame_rate_at_capture, fps);
        assert_eq!(snapshot.flight_time_seconds, 0.5);
        assert_eq!(snapshot.height_label(), "30.7 cm");
    }

    #[test]
    fn test_serializes_frame_rate_as_number() {
        let calc = calculate(
            MarkPair {
                start: Mark::Set(0.0),
                end: Mark::Set(0.4),
            },
            FrameRate::default(),
            0.0,
        )
        .unwrap();
        let json = serde_json::to_value(MeasurementSnapshot::capture(&calc)).unwrap();
        assert_eq!(json["frame_rate_at_capture"], 30.0);
        assert_eq!(json["peak_instant"], 0.2);
    }
}
