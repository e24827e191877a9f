//! Maps timeline positions onto a normalized track fraction.

use crate::measure::marks::Mark;
use serde::Serialize;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(tag = "state", content = "fraction", rename_all = "snake_case")]
pub enum Projection {
    /// Indicator should be hidden.
    #[default]
    Unavailable,
    At(f64),
}

impl Projection {
    pub fn fraction(self) -> Option<f64> {
        match self {
            Projection::Unavailable => None,
            Projection::At(f) => Some(f),
        }
    }

    /// CSS-style left offset, e.g. `"37.5%"`.
    pub fn percent_label(self) -> Option<String> {
        self.fraction().map(|f| format!("{:.1}%", f * 100.0))
    }
}

fn usable_duration(duration: Option<f64>) -> Option<f64> {
    duration.filter(|d| d.is_finite() && *d > 0.0)
}

pub fn projected_fraction(position: f64, duration: Option<f64>) -> Projection {
    match usable_duration(duration) {
        Some(d) if position.is_finite() => Projection::At((position / d).clamp(0.0, 1.0)),
        _ => Projection::Unavailable,
    }
}

pub fn project_mark(mark: Mark, duration: Option<f64>) -> Projection {
    match mark {
        Mark::Unset => Projection::Unavailable,
        Mark::Set(seconds) => projected_fraction(seconds, duration),
    }
}

/// Track positions of the playhead and both marks.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Indicators {
    pub current: Projection,
    pub start: Projection,
    pub end: Projection,
}

impl Indicators {
    pub fn project(position: f64, start: Mark, end: Mark, duration: Option<f64>) -> Self {
        if usable_duration(duration).is_none() {
            return Self::default();
        }
        Self {
            current: projected_fraction(position, duration),
            start: project_mark(start, duration),
            end: project_mark(end, duration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_without_duration() {
        assert_eq!(projected_fraction(1.0, Some(0.0)), Projection::Unavailable);
        assert_eq!(projected_fraction(1.0, None), Projection::Unavailable);
        assert_eq!(
            projected_fraction(1.0, Some(f64::INFINITY)),
            Projection::Unavailable
        );
        assert_eq!(projected_fraction(1.0, Some(-3.0)), Projection::Unavailable);
    }

    #[test]
    fn test_fraction_is_bounded_and_monotonic() {
        let duration = Some(8.0);
        let mut last = -1.0;
        for i in -4..=40 {
            let f = projected_fraction(i as f64 * 0.25, duration)
                .fraction()
                .unwrap();
            assert!((0.0..=1.0).contains(&f));
            assert!(f >= last);
            last = f;
        }
        assert_eq!(projected_fraction(2.0, duration), Projection::At(0.25));
    }

    #[test]
    fn test_unset_mark_is_hidden() {
        assert_eq!(project_mark(Mark::Unset, Some(10.0)), Projection::Unavailable);
        assert_eq!(project_mark(Mark::Set(5.0), Some(10.0)), Projection::At(0.5));
    }

    #[test]
    fn test_indicators_hidden_until_loaded() {
        let hidden = Indicators::project(1.0, Mark::Set(1.0), Mark::Set(2.0), None);
        assert_eq!(hidden, Indicators::default());

        let shown = Indicators::project(1.0, Mark::Set(1.0), Mark::Unset, Some(4.0));
        assert_eq!(shown.current.percent_label().as_deref(), Some("25.0%"));
        assert_eq!(shown.start, Projection::At(0.25));
        assert_eq!(shown.end, Projection::Unavailable);
    }
}
