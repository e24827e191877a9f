//! Frame-rate estimation from presentation timestamps.
//!
//! The estimator samples a bounded number of timestamps, takes the median
//! spacing between consecutive frames and snaps the result to the nearest
//! offered rate when it is close enough.

use crate::config::Settings;
use crate::measure::FrameRate;
use futures::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimateUnavailable {
    #[error("Only {0} usable frame intervals sampled")]
    TooFewSamples(usize),
    #[error("Frame-rate estimation cancelled")]
    Cancelled,
    #[error("Estimated rate {0} is not usable")]
    Invalid(f64),
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared flag that stops an estimation in flight.
///
/// Cancelling also wakes an estimation that is parked waiting for the next
/// timestamp, so a surface that stopped presenting frames cannot hold it.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<CancelState>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.0.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

pub struct FpsEstimator {
    sample_count: usize,
    choices: Vec<FrameRate>,
    snap_tolerance: f64,
    progress: Option<ProgressBar>,
}

impl FpsEstimator {
    pub fn new(sample_count: usize, choices: Vec<FrameRate>, snap_tolerance: f64) -> Self {
        Self {
            sample_count,
            choices,
            snap_tolerance,
            progress: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.estimator_sample_count,
            settings.frame_rate_choices(),
            settings.estimator_snap_tolerance,
        )
    }

    /// Attach a terminal progress bar that advances per sampled timestamp.
    pub fn with_progress(mut self) -> Self {
        let pb = ProgressBar::new(self.sample_count as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} samples")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        self.progress = Some(pb);
        self
    }

    pub async fn estimate<S>(
        &self,
        timestamps: S,
        cancel: &CancelFlag,
    ) -> Result<FrameRate, EstimateUnavailable>
    where
        S: Stream<Item = f64> + Unpin,
    {
        let mut samples = timestamps.take(self.sample_count);
        let mut last: Option<f64> = None;
        let mut deltas = Vec::with_capacity(self.sample_count);

        loop {
            let ts = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.finish("cancelled");
                    return Err(EstimateUnavailable::Cancelled);
                }
                next = samples.next() => match next {
                    Some(ts) => ts,
                    None => break,
                },
            };
            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
            if !ts.is_finite() {
                continue;
            }
            match last {
                Some(prev) if ts > prev => {
                    deltas.push(ts - prev);
                    last = Some(ts);
                }
                Some(_) => debug!("Skipping non-increasing timestamp {}", ts),
                None => last = Some(ts),
            }
        }
        self.finish("done");

        if cancel.is_cancelled() {
            return Err(EstimateUnavailable::Cancelled);
        }
        if deltas.len() < 2 {
            return Err(EstimateUnavailable::TooFewSamples(deltas.len()));
        }

        deltas.sort_by(|a, b| a.total_cmp(b));
        let mid = deltas.len() / 2;
        let median = if deltas.len() % 2 == 0 {
            (deltas[mid - 1] + deltas[mid]) / 2.0
        } else {
            deltas[mid]
        };

        let raw = 1.0 / median;
        let fps = FrameRate::new(raw).map_err(|_| EstimateUnavailable::Invalid(raw))?;
        let snapped = self.snap(fps);
        info!(
            "Estimated {:.3} fps from {} intervals, using {}",
            raw,
            deltas.len(),
            snapped
        );
        Ok(snapped)
    }

    fn snap(&self, fps: FrameRate) -> FrameRate {
        self.choices
            .iter()
            .map(|c| (*c, (fps.get() - c.get()).abs() / c.get()))
            .filter(|(_, rel)| *rel <= self.snap_tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(c, _)| c)
            .unwrap_or(fps)
    }

    fn finish(&self, message: &'static str) {
        if let Some(pb) = &self.progress {
            pb.finish_with_message(message);
        }
    }
}
