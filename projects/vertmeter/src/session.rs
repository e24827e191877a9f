//! Measurement session: the single owner of marks, rate, result and
//! snapshot for one loaded clip.
//!
//! Every UI event maps to one method taking `&mut self`, so each event runs
//! to completion before the next one starts.

use crate::config::Settings;
use crate::export::{deliver, encode_png, Delivery, DownloadTarget, Renderer, ShareTarget};
use crate::measure::clock::{advance, frame_index_of};
use crate::measure::{
    calculate, parse_standing_reach, FrameRate, Indicators, JumpResult, MarkPair, MarkStore,
    MeasureError, MeasurementSnapshot,
};
use crate::video::fps_estimator::{CancelFlag, EstimateUnavailable, FpsEstimator};
use crate::video::PlaybackSurface;
use anyhow::Result;
use futures::stream::BoxStream;
use std::fmt;
use tracing::{debug, info, warn};

/// Outcome of the most recent user action, shown as status text.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Status {
    #[default]
    Idle,
    StartMarked { frame: i64 },
    EndMarked { frame: i64 },
    Calculated,
    FrameRateChanged(FrameRate),
    FrameRateEstimated(FrameRate),
    FrameRateFallback(FrameRate),
    Exported(Delivery),
    ExportFailed(String),
    Failed(MeasureError),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle | Status::Calculated => Ok(()),
            Status::StartMarked { frame } => write!(f, "Start marked at frame {}", frame),
            Status::EndMarked { frame } => write!(f, "End marked at frame {}", frame),
            Status::FrameRateChanged(fps) => write!(f, "Frame rate set to {}", fps),
            Status::FrameRateEstimated(fps) => write!(f, "Detected {}", fps),
            Status::FrameRateFallback(fps) => {
                write!(f, "Could not detect frame rate, using {}", fps)
            }
            Status::Exported(delivery) => write!(f, "{}", delivery),
            Status::ExportFailed(reason) => write!(f, "Export failed: {}", reason),
            Status::Failed(err) => write!(f, "{}", err),
        }
    }
}

/// A frame-rate estimation detached from the session borrow.
///
/// Run it with [`FpsEstimator::estimate`] and hand the outcome back through
/// [`MeasurementSession::apply_fps_estimate`]. Loading a new clip cancels it
/// and makes its outcome stale.
pub struct EstimationJob {
    pub generation: u64,
    pub cancel: CancelFlag,
    pub timestamps: BoxStream<'static, f64>,
}

pub struct MeasurementSession<S: PlaybackSurface> {
    surface: S,
    settings: Settings,
    default_fps: FrameRate,
    fps: FrameRate,
    reach_cm: f64,
    marks: MarkStore,
    result: Option<JumpResult>,
    snapshot: Option<MeasurementSnapshot>,
    indicators: Indicators,
    status: Status,
    generation: u64,
    estimation: Option<CancelFlag>,
}

impl<S: PlaybackSurface> MeasurementSession<S> {
    pub fn new(surface: S, settings: Settings) -> Result<Self> {
        let default_fps = settings.default_frame_rate()?;
        let mut session = Self {
            surface,
            settings,
            default_fps,
            fps: default_fps,
            reach_cm: 0.0,
            marks: MarkStore::new(),
            result: None,
            snapshot: None,
            indicators: Indicators::default(),
            status: Status::Idle,
            generation: 0,
            estimation: None,
        };
        session.surface.pause();
        session.refresh_indicators();
        Ok(session)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fps(&self) -> FrameRate {
        self.fps
    }

    pub fn reach_cm(&self) -> f64 {
        self.reach_cm
    }

    pub fn marks(&self) -> MarkPair {
        self.marks.snapshot()
    }

    pub fn result(&self) -> Option<&JumpResult> {
        self.result.as_ref()
    }

    pub fn snapshot(&self) -> Option<&MeasurementSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn indicators(&self) -> Indicators {
        self.indicators
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn current_frame_index(&self) -> i64 {
        frame_index_of(self.surface.position(), self.fps)
    }

    /// Result block text, empty when there is no current result.
    pub fn result_text(&self) -> String {
        self.result.map(|r| r.to_string()).unwrap_or_default()
    }

    /// Replaces the clip. Prior marks, results and snapshot lose their
    /// meaning and are dropped; a running estimation is cancelled.
    pub fn on_file_loaded(&mut self, surface: S) {
        if let Some(cancel) = self.estimation.take() {
            cancel.cancel();
        }
        self.generation += 1;
        self.surface = surface;
        self.surface.pause();
        self.marks.reset();
        self.result = None;
        self.snapshot = None;
        self.status = Status::Idle;
        self.refresh_indicators();
        info!(
            "Clip loaded (generation {}), duration {:?}",
            self.generation,
            self.surface.duration()
        );
    }

    /// Playback position changed outside the session (e.g. scrubbing).
    pub fn on_position_update(&mut self) {
        self.refresh_indicators();
    }

    pub fn seek(&mut self, seconds: f64) {
        self.surface.seek(seconds);
        self.refresh_indicators();
    }

    /// Pauses and moves by whole frames at the current rate.
    pub fn step(&mut self, delta_frames: i64) -> f64 {
        self.surface.pause();
        let target = advance(
            self.surface.position(),
            delta_frames,
            self.fps,
            self.surface.duration(),
        );
        self.surface.seek(target);
        self.refresh_indicators();
        debug!("Stepped {} frames to {:.4}s", delta_frames, target);
        target
    }

    pub fn on_mark_start(&mut self) {
        let position = self.surface.position();
        self.marks.mark_start(position);
        let frame = frame_index_of(position, self.fps);
        info!("Start marked at {:.4}s (frame {})", position, frame);
        self.status = Status::StartMarked { frame };
        self.result = None;
        self.refresh_indicators();
    }

    pub fn on_mark_end(&mut self) {
        let position = self.surface.position();
        self.marks.mark_end(position);
        let frame = frame_index_of(position, self.fps);
        info!("End marked at {:.4}s (frame {})", position, frame);
        self.status = Status::EndMarked { frame };
        self.result = None;
        self.refresh_indicators();
    }

    pub fn on_fps_change(&mut self, fps: f64) -> Result<FrameRate, MeasureError> {
        match FrameRate::new(fps) {
            Ok(fps) => {
                self.fps = fps;
                self.status = Status::FrameRateChanged(fps);
                self.refresh_indicators();
                Ok(fps)
            }
            Err(err) => {
                warn!("Rejected frame rate {}", fps);
                self.status = Status::Failed(err);
                Err(err)
            }
        }
    }

    pub fn on_reach_change(&mut self, input: &str) -> f64 {
        self.reach_cm = parse_standing_reach(input);
        self.reach_cm
    }

    /// Computes the jump from the current marks.
    ///
    /// On failure nothing but the status changes. On success the snapshot is
    /// replaced and both marks are cleared.
    pub fn on_calculate(&mut self) -> Result<JumpResult, MeasureError> {
        let calc = match calculate(self.marks.snapshot(), self.fps, self.reach_cm) {
            Ok(calc) => calc,
            Err(err) => {
                warn!("Calculation refused: {}", err);
                self.status = Status::Failed(err);
                return Err(err);
            }
        };

        let snapshot = MeasurementSnapshot::capture(&calc);
        info!(
            "Jump {:.1} cm over {:.3}s, peak at {:.4}s (frame {})",
            calc.result.jump_height_cm,
            calc.result.flight_time_seconds,
            snapshot.peak_instant,
            snapshot.peak_frame()
        );
        self.snapshot = Some(snapshot);
        self.result = Some(calc.result);
        self.status = Status::Calculated;
        self.marks.reset();
        self.refresh_indicators();
        Ok(calc.result)
    }

    pub fn begin_fps_estimation(&mut self) -> EstimationJob {
        if let Some(previous) = self.estimation.take() {
            previous.cancel();
        }
        let cancel = CancelFlag::new();
        self.estimation = Some(cancel.clone());
        EstimationJob {
            generation: self.generation,
            cancel,
            timestamps: self.surface.frame_timestamps(),
        }
    }

    /// Applies an estimation outcome, falling back to the default rate when
    /// it is unavailable. Outcomes from a previous clip are ignored.
    pub fn apply_fps_estimate(
        &mut self,
        generation: u64,
        outcome: Result<FrameRate, EstimateUnavailable>,
    ) -> FrameRate {
        if generation != self.generation {
            debug!(
                "Ignoring estimate from generation {} (now {})",
                generation, self.generation
            );
            return self.fps;
        }
        self.estimation = None;

        match outcome {
            Ok(fps) => {
                self.fps = fps;
                self.status = Status::FrameRateEstimated(fps);
            }
            Err(EstimateUnavailable::Cancelled) => {
                debug!("Estimation cancelled, keeping {}", self.fps);
                return self.fps;
            }
            Err(err) => {
                warn!("{}, falling back to {}", err, self.default_fps);
                self.fps = self.default_fps;
                self.status = Status::FrameRateFallback(self.default_fps);
            }
        }
        self.refresh_indicators();
        self.fps
    }

    pub async fn estimate_fps(&mut self, estimator: &FpsEstimator) -> FrameRate {
        let job = self.begin_fps_estimation();
        let outcome = estimator.estimate(job.timestamps, &job.cancel).await;
        self.apply_fps_estimate(job.generation, outcome)
    }

    /// Renders the peak frame of the last measurement and delivers it.
    ///
    /// Reads only the snapshot, so marks reset by the calculation or set
    /// since then have no effect on the image.
    pub async fn export(
        &mut self,
        renderer: &dyn Renderer,
        share: Option<&dyn ShareTarget>,
        download: &DownloadTarget,
    ) -> Result<Delivery> {
        let snapshot = match &self.snapshot {
            Some(snapshot) => snapshot.clone(),
            None => {
                self.status = Status::Failed(MeasureError::NoMeasurement);
                return Err(MeasureError::NoMeasurement.into());
            }
        };

        match self.render_and_deliver(&snapshot, renderer, share, download).await {
            Ok(delivery) => {
                self.status = Status::Exported(delivery.clone());
                self.refresh_indicators();
                Ok(delivery)
            }
            Err(e) => {
                warn!("Export failed: {:#}", e);
                self.status = Status::ExportFailed(format!("{:#}", e));
                self.refresh_indicators();
                Err(e)
            }
        }
    }

    async fn render_and_deliver(
        &mut self,
        snapshot: &MeasurementSnapshot,
        renderer: &dyn Renderer,
        share: Option<&dyn ShareTarget>,
        download: &DownloadTarget,
    ) -> Result<Delivery> {
        self.surface.pause();
        self.surface.seek(snapshot.peak_instant);
        self.surface.seeked().await?;
        tokio::time::sleep(self.settings.settle_delay()).await;

        let frame = self.surface.current_frame()?;
        let image = renderer.render(snapshot, &frame)?;
        let png = encode_png(&image)?;
        deliver(&png, &self.settings.export_file_name, share, download)
    }

    fn refresh_indicators(&mut self) {
        let marks = self.marks.snapshot();
        self.indicators = Indicators::project(
            self.surface.position(),
            marks.start,
            marks.end,
            self.surface.duration(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::OverlayRenderer;
    use crate::measure::clock::time_of;
    use crate::measure::{Mark, Projection};
    use futures::stream::{self, StreamExt};
    use image::{Rgba, RgbaImage};

    struct FakeSurface {
        position: f64,
        duration: Option<f64>,
        paused: bool,
        pending_seek: bool,
        seeks: Vec<f64>,
        frame_times: Vec<f64>,
        frame_unavailable: bool,
    }

    impl FakeSurface {
        fn loaded(duration: f64) -> Self {
            Self {
                position: 0.0,
                duration: Some(duration),
                paused: false,
                pending_seek: false,
                seeks: vec![],
                frame_times: (0..30).map(|i| i as f64 / 60.0).collect(),
                frame_unavailable: false,
            }
        }

        fn unloaded() -> Self {
            Self {
                duration: None,
                frame_times: vec![],
                ..Self::loaded(0.0)
            }
        }
    }

    impl PlaybackSurface for FakeSurface {
        fn position(&self) -> f64 {
            self.position
        }

        fn duration(&self) -> Option<f64> {
            self.duration
        }

        fn is_paused(&self) -> bool {
            self.paused
        }

        fn pause(&mut self) {
            self.paused = true;
        }

        fn seek(&mut self, seconds: f64) {
            self.position = seconds.clamp(0.0, self.duration.unwrap_or(0.0));
            self.pending_seek = true;
            self.seeks.push(seconds);
        }

        async fn seeked(&mut self) -> Result<()> {
            self.pending_seek = false;
            Ok(())
        }

        fn current_frame(&mut self) -> Result<RgbaImage> {
            if self.pending_seek {
                anyhow::bail!("frame requested before seek settled");
            }
            if self.frame_unavailable {
                anyhow::bail!("decoder returned no frame");
            }
            Ok(RgbaImage::from_pixel(320, 240, Rgba([90, 90, 90, 255])))
        }

        fn frame_timestamps(&self) -> BoxStream<'static, f64> {
            stream::iter(self.frame_times.clone()).boxed()
        }
    }

    fn session() -> MeasurementSession<FakeSurface> {
        let settings = Settings {
            settle_delay_ms: 0,
            ..Settings::default()
        };
        MeasurementSession::new(FakeSurface::loaded(10.0), settings).unwrap()
    }

    fn mark_between(s: &mut MeasurementSession<FakeSurface>, start: f64, end: f64) {
        s.seek(start);
        s.on_mark_start();
        s.seek(end);
        s.on_mark_end();
    }

    #[test]
    fn test_reference_scenario() {
        let mut s = session();
        let fps = s.on_fps_change(30.0).unwrap();
        s.on_reach_change("60");

        s.seek(time_of(30, fps));
        s.on_mark_start();
        assert_eq!(s.status().to_string(), "Start marked at frame 30");
        s.seek(time_of(60, fps));
        s.on_mark_end();
        assert_eq!(s.status().to_string(), "End marked at frame 60");

        let r = s.on_calculate().unwrap();
        assert!((r.flight_time_seconds - 1.0).abs() < 1e-9);
        assert!((r.takeoff_velocity_ms - 4.905).abs() < 1e-9);
        assert!((r.jump_height_cm - 122.625).abs() < 1e-9);
        assert!((r.estimated_max_reach_cm - 182.625).abs() < 1e-9);
        assert_eq!(s.status().to_string(), "");
        assert!(s.result_text().starts_with("Time of flight: 1.00 s\n"));
    }

    #[test]
    fn test_calculate_without_marks_mutates_nothing() {
        let mut s = session();
        assert_eq!(s.on_calculate(), Err(MeasureError::MarksIncomplete));
        assert_eq!(s.status().to_string(), "Mark start and end first.");
        assert!(s.snapshot().is_none());
        assert_eq!(s.marks(), MarkPair::default());
    }

    #[test]
    fn test_non_positive_flight_keeps_marks() {
        let mut s = session();
        mark_between(&mut s, 2.0, 2.0);
        assert_eq!(s.on_calculate(), Err(MeasureError::NonPositiveFlightTime));
        assert_eq!(s.marks().start, Mark::Set(2.0));
        assert_eq!(s.marks().end, Mark::Set(2.0));

        mark_between(&mut s, 3.0, 1.0);
        assert_eq!(s.on_calculate(), Err(MeasureError::NonPositiveFlightTime));
        assert_eq!(s.status().to_string(), "End must be after start.");
        assert!(s.snapshot().is_none());
        assert!(s.indicators().start.fraction().is_some());
    }

    #[test]
    fn test_success_resets_marks_and_replaces_snapshot() {
        let mut s = session();
        mark_between(&mut s, 1.0, 1.5);
        s.on_calculate().unwrap();
        assert_eq!(s.marks(), MarkPair::default());
        assert_eq!(s.indicators().start, Projection::Unavailable);
        assert_eq!(s.indicators().end, Projection::Unavailable);
        let first = s.snapshot().cloned().unwrap();

        // A failed follow-up keeps the snapshot
        assert!(s.on_calculate().is_err());
        assert_eq!(s.snapshot(), Some(&first));

        mark_between(&mut s, 4.0, 4.4);
        s.on_calculate().unwrap();
        let second = s.snapshot().unwrap();
        assert!((second.peak_instant - 4.2).abs() < 1e-12);
        assert_ne!(second.peak_instant, first.peak_instant);
    }

    #[test]
    fn test_peak_survives_fps_change() {
        let mut s = session();
        mark_between(&mut s, 1.0, 2.0);
        s.on_calculate().unwrap();
        s.on_fps_change(240.0).unwrap();

        let snapshot = s.snapshot().unwrap();
        assert_eq!(snapshot.peak_instant, 1.5);
        assert_eq!(snapshot.frame_rate_at_capture.get(), 30.0);
        assert_eq!(snapshot.peak_frame(), 45);
    }

    #[test]
    fn test_fps_change_does_not_move_marks() {
        let mut s = session();
        s.seek(2.0);
        s.on_mark_start();
        let before = s.indicators().start;
        s.on_fps_change(60.0).unwrap();
        assert_eq!(s.marks().start, Mark::Set(2.0));
        assert_eq!(s.indicators().start, before);
        assert_eq!(s.marks().start.frame_index(s.fps()), Some(120));
    }

    #[test]
    fn test_remarking_start_overwrites() {
        let mut s = session();
        s.seek(1.0);
        s.on_mark_start();
        s.seek(2.5);
        s.on_mark_start();
        assert_eq!(s.marks().start, Mark::Set(2.5));
        assert_eq!(s.indicators().start, Projection::At(0.25));
    }

    #[test]
    fn test_invalid_fps_is_refused() {
        let mut s = session();
        assert_eq!(s.on_fps_change(0.0), Err(MeasureError::InvalidFrameRate(0.0)));
        assert!(s.on_fps_change(-24.0).is_err());
        assert_eq!(s.fps().get(), 30.0);
    }

    #[test]
    fn test_step_pauses_and_clamps() {
        let mut s = session();
        s.surface_mut().paused = false;
        s.step(10);
        assert!(s.surface().is_paused());
        assert!((s.surface().position() - 10.0 / 30.0).abs() < 1e-12);
        assert_eq!(s.current_frame_index(), 10);

        s.step(-1);
        assert_eq!(s.current_frame_index(), 9);
        assert_eq!(s.step(-100), 0.0);
        assert_eq!(s.step(100_000), 10.0);
    }

    #[test]
    fn test_step_before_load_stays_at_zero() {
        let mut s = MeasurementSession::new(FakeSurface::unloaded(), Settings::default()).unwrap();
        assert_eq!(s.step(10), 0.0);
        assert_eq!(s.indicators(), Indicators::default());
    }

    #[test]
    fn test_file_load_clears_state() {
        let mut s = session();
        mark_between(&mut s, 1.0, 1.5);
        s.on_calculate().unwrap();
        mark_between(&mut s, 2.0, 3.0);

        s.on_file_loaded(FakeSurface::loaded(5.0));
        assert_eq!(s.marks(), MarkPair::default());
        assert!(s.snapshot().is_none());
        assert!(s.result().is_none());
        assert_eq!(s.result_text(), "");
        assert_eq!(s.indicators().current, Projection::At(0.0));
    }

    #[tokio::test]
    async fn test_estimation_applies_detected_rate() {
        let mut s = session();
        let estimator = FpsEstimator::from_settings(s.settings());
        let fps = s.estimate_fps(&estimator).await;
        assert_eq!(fps.get(), 60.0);
        assert_eq!(s.status().to_string(), "Detected 60 fps");
    }

    #[tokio::test]
    async fn test_estimation_failure_falls_back_to_default() {
        let mut s = MeasurementSession::new(FakeSurface::unloaded(), Settings::default()).unwrap();
        s.on_fps_change(120.0).unwrap();
        let estimator = FpsEstimator::from_settings(s.settings());
        let fps = s.estimate_fps(&estimator).await;
        assert_eq!(fps.get(), 30.0);
        assert_eq!(
            s.status().to_string(),
            "Could not detect frame rate, using 30 fps"
        );
    }

    #[tokio::test]
    async fn test_load_cancels_running_estimation() {
        let mut s = session();
        let job = s.begin_fps_estimation();
        s.on_file_loaded(FakeSurface::loaded(3.0));
        assert!(job.cancel.is_cancelled());

        let estimator = FpsEstimator::from_settings(s.settings());
        let outcome = estimator.estimate(job.timestamps, &job.cancel).await;
        assert_eq!(outcome, Err(EstimateUnavailable::Cancelled));

        let stale = s.apply_fps_estimate(job.generation, Ok(FrameRate::new(240.0).unwrap()));
        assert_eq!(stale.get(), 30.0);
        assert_eq!(s.fps().get(), 30.0);
    }

    #[tokio::test]
    async fn test_export_renders_peak_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session();
        mark_between(&mut s, 1.0, 2.0);
        s.on_calculate().unwrap();

        // Marks set after the calculation must not affect the export
        mark_between(&mut s, 5.0, 6.0);

        let renderer = OverlayRenderer::new("Vertical Jump Height", "example.org", None);
        let download = DownloadTarget::new(dir.path());
        let delivery = s.export(&renderer, None, &download).await.unwrap();

        let path = dir.path().join("vertmeter.png");
        assert_eq!(delivery, Delivery::Downloaded(path.clone()));
        assert_eq!(s.surface().seeks.last(), Some(&1.5));
        assert!(s.surface().is_paused());
        let saved = image::open(&path).unwrap();
        assert_eq!((saved.width(), saved.height()), (320, 240));
        assert!(s
            .status()
            .to_string()
            .starts_with("Sharing is unavailable, image saved to "));
    }

    #[tokio::test]
    async fn test_export_failure_sets_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session();
        mark_between(&mut s, 1.0, 2.0);
        s.on_calculate().unwrap();
        s.surface_mut().frame_unavailable = true;

        let renderer = OverlayRenderer::new("t", "l", None);
        let result = s
            .export(&renderer, None, &DownloadTarget::new(dir.path()))
            .await;

        assert!(result.is_err());
        assert_eq!(
            s.status().to_string(),
            "Export failed: decoder returned no frame"
        );
        assert!(!dir.path().join("vertmeter.png").exists());
        assert!(s.snapshot().is_some());
    }

    #[tokio::test]
    async fn test_export_requires_measurement() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session();
        let renderer = OverlayRenderer::new("t", "l", None);
        let err = s
            .export(&renderer, None, &DownloadTarget::new(dir.path()))
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<MeasureError>(),
            Some(&MeasureError::NoMeasurement)
        );
        assert_eq!(s.status().to_string(), "Calculate jump first.");
    }
}
