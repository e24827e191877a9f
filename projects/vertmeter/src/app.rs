use crate::cli::{Args, Command};
use crate::config::Settings;
use crate::export::{DownloadTarget, OverlayRenderer};
use crate::measure::clock::time_of;
use crate::measure::{calculate, parse_standing_reach, FrameRate, MarkStore, MeasurementSnapshot};
use crate::script::{render_view, run_script, ScriptContext};
use crate::session::MeasurementSession;
use crate::video::fps_estimator::{CancelFlag, FpsEstimator};
use crate::video::frame_sequence::FrameSequence;
use crate::video::PlaybackSurface;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufReader};
use tracing::info;

pub async fn run(args: Args) -> Result<()> {
    let settings = Settings::load(args.config.as_deref())?;
    let fps = match args.fps {
        Some(fps) => FrameRate::new(fps)?,
        None => settings.default_frame_rate()?,
    };
    let reach = args.reach.as_deref().unwrap_or_default();

    match args.command {
        Command::Calculate {
            start,
            end,
            frames,
            json,
        } => run_calculate(fps, reach, start, end, frames, json),
        Command::EstimateFps {
            frames_dir,
            source_fps,
        } => {
            let surface = FrameSequence::open(&frames_dir, FrameRate::new(source_fps)?)?;
            info!(
                "Sampling {} frames nominally at {}",
                surface.frame_count(),
                surface.source_fps()
            );
            let estimator = FpsEstimator::from_settings(&settings).with_progress();
            match estimator
                .estimate(surface.frame_timestamps(), &CancelFlag::new())
                .await
            {
                Ok(fps) => println!("{}", fps),
                Err(e) => println!(
                    "{}; using {}",
                    e,
                    settings.default_frame_rate()?
                ),
            }
            Ok(())
        }
        Command::Session {
            frames_dir,
            source_fps,
            script,
            output_root,
        } => {
            let source_fps = FrameRate::new(source_fps)?;
            let surface = FrameSequence::open(&frames_dir, source_fps)?;
            let estimator = FpsEstimator::from_settings(&settings);
            let renderer = OverlayRenderer::from_settings(&settings)?;
            let download = DownloadTarget::new(output_root);

            let mut session = MeasurementSession::new(surface, settings)?;
            session.on_fps_change(fps.get())?;
            session.on_reach_change(reach);

            let ctx = ScriptContext {
                source_fps,
                estimator: &estimator,
                renderer: &renderer,
                download: &download,
            };
            let stdout = io::stdout();
            let mut out = stdout.lock();
            render_view(&session, &mut out)?;
            match script {
                Some(path) => {
                    let file = File::open(&path)
                        .with_context(|| format!("Failed to open script {}", path.display()))?;
                    run_script(&mut session, BufReader::new(file), &mut out, &ctx).await
                }
                None => run_script(&mut session, io::stdin().lock(), &mut out, &ctx).await,
            }
        }
    }
}

fn run_calculate(
    fps: FrameRate,
    reach: &str,
    start: f64,
    end: f64,
    frames: bool,
    json: bool,
) -> Result<()> {
    let (start, end) = if frames {
        (
            time_of(start.round() as i64, fps),
            time_of(end.round() as i64, fps),
        )
    } else {
        (start, end)
    };

    let mut marks = MarkStore::new();
    marks.mark_start(start);
    marks.mark_end(end);
    let calc = calculate(marks.snapshot(), fps, parse_standing_reach(reach))?;
    info!("Calculated jump at {}", fps);

    if json {
        let snapshot = MeasurementSnapshot::capture(&calc);
        let body = serde_json::json!({
            "result": calc.result,
            "snapshot": snapshot,
            "peak_frame": snapshot.peak_frame(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("{}", calc.result);
    }
    Ok(())
}
