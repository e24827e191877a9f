//! Error kinds surfaced by the measurement core.
//!
//! None of these are fatal. The session turns each one into status text and
//! stays interactive.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum MeasureError {
    /// Calculate was triggered before both marks were placed.
    #[error("Mark start and end first.")]
    MarksIncomplete,

    /// The end mark does not come strictly after the start mark.
    #[error("End must be after start.")]
    NonPositiveFlightTime,

    /// A frame rate of zero, below zero, or not finite.
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),

    /// No share target is available; export falls back to a download.
    #[error("Sharing is unavailable")]
    ExportUnavailable,

    /// Export was requested before any successful calculation.
    #[error("Calculate jump first.")]
    NoMeasurement,
}
