// Measurement core: frame clock, marks, jump physics, snapshot, projection

pub mod calculator;
pub mod clock;
pub mod error;
pub mod marks;
pub mod projector;
pub mod snapshot;

pub use calculator::{calculate, parse_standing_reach, Calculation, JumpResult};
pub use clock::FrameRate;
pub use error::MeasureError;
pub use marks::{Mark, MarkPair, MarkStore};
pub use projector::{Indicators, Projection};
pub use snapshot::MeasurementSnapshot;
