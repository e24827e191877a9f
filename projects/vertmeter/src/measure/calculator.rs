//! Ballistic jump calculation from flight time.
//!
//! Takeoff and landing are assumed to happen at the same height, so the
//! flight splits evenly into ascent and descent of `t/2` each. Height is
//! then `g (t/2)^2 / 2 = g t^2 / 8` and takeoff speed is `g t / 2`.

use crate::measure::clock::FrameRate;
use crate::measure::error::MeasureError;
use crate::measure::marks::MarkPair;
use serde::Serialize;
use std::fmt;

/// Standard gravity in m/s².
pub const G: f64 = 9.81;

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct JumpResult {
    pub flight_time_seconds: f64,
    pub takeoff_velocity_ms: f64,
    pub jump_height_cm: f64,
    pub estimated_max_reach_cm: f64,
}

impl fmt::Display for JumpResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Time of flight: {:.2} s", self.flight_time_seconds)?;
        writeln!(f, "Takeoff velocity: {:.2} m/s", self.takeoff_velocity_ms)?;
        writeln!(f, "Jump height: {:.1} cm", self.jump_height_cm)?;
        write!(
            f,
            "Estimated max reach: {:.1} cm",
            self.estimated_max_reach_cm
        )
    }
}

/// A successful calculation: the numbers plus the instant of peak height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calculation {
    pub start: f64,
    pub end: f64,
    pub fps: FrameRate,
    pub peak_instant: f64,
    pub result: JumpResult,
}

/// Parses a user-entered standing reach in centimetres.
///
/// Anything that is not a finite, non-negative number counts as zero.
pub fn parse_standing_reach(input: &str) -> f64 {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

pub fn calculate(
    marks: MarkPair,
    fps: FrameRate,
    standing_reach_cm: f64,
) -> Result<Calculation, MeasureError> {
    let (start, end) = match (marks.start.seconds(), marks.end.seconds()) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(MeasureError::MarksIncomplete),
    };

    let flight_time = end - start;
    if flight_time.is_nan() || flight_time <= 0.0 {
        return Err(MeasureError::NonPositiveFlightTime);
    }

    let jump_height_m = G * flight_time.powi(2) / 8.0;
    let takeoff_velocity = G * flight_time / 2.0;
    let jump_height_cm = jump_height_m * 100.0;
    let reach = if standing_reach_cm.is_finite() && standing_reach_cm > 0.0 {
        standing_reach_cm
    } else {
        0.0
    };

    Ok(Calculation {
        start,
        end,
        fps,
        peak_instant: (start + end) / 2.0,
        result: JumpResult {
            flight_time_seconds: flight_time,
            takeoff_velocity_ms: takeoff_velocity,
            jump_height_cm,
            estimated_max_reach_cm: jump_height_cm + reach,
        },
    })
}
