//! Line-oriented driver standing in for the button UI.
//!
//! Each line is one user action; after it runs, the status, result block and
//! indicator positions are written out the way a UI would display them.

use crate::export::{DownloadTarget, Renderer};
use crate::measure::{FrameRate, Projection};
use crate::session::MeasurementSession;
use crate::video::fps_estimator::FpsEstimator;
use crate::video::frame_sequence::FrameSequence;
use crate::video::PlaybackSurface;
use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Seek(f64),
    Step(i64),
    MarkStart,
    MarkEnd,
    Fps(f64),
    Reach(String),
    Calculate,
    EstimateFps,
    Load(PathBuf),
    Export,
    Status,
}

fn parse_count(arg: Option<&str>) -> Result<i64> {
    match arg {
        None => Ok(1),
        Some(raw) => raw
            .parse::<i64>()
            .with_context(|| format!("Invalid frame count: {}", raw)),
    }
}

fn required<'a>(arg: Option<&'a str>, name: &str) -> Result<&'a str> {
    arg.ok_or_else(|| anyhow!("{} expects an argument", name))
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let name = parts.next().ok_or_else(|| anyhow!("Empty command"))?;
        let arg = parts.next();

        let command = match name {
            "seek" => {
                let raw = required(arg, name)?;
                Command::Seek(
                    raw.parse()
                        .with_context(|| format!("Invalid position: {}", raw))?,
                )
            }
            "forward" => Command::Step(parse_count(arg)?),
            "back" => Command::Step(-parse_count(arg)?),
            "mark-start" => Command::MarkStart,
            "mark-end" => Command::MarkEnd,
            "fps" => {
                let raw = required(arg, name)?;
                Command::Fps(
                    raw.parse()
                        .with_context(|| format!("Invalid frame rate: {}", raw))?,
                )
            }
            // Free text on purpose: the session treats junk as zero reach
            "reach" => Command::Reach(arg.unwrap_or_default().to_string()),
            "calculate" => Command::Calculate,
            "estimate-fps" => Command::EstimateFps,
            "load" => Command::Load(PathBuf::from(required(arg, name)?)),
            "export" => Command::Export,
            "status" => Command::Status,
            other => return Err(anyhow!("Unknown command: {}", other)),
        };
        Ok(command)
    }
}

/// Collaborators the driver needs besides the session itself.
pub struct ScriptContext<'a> {
    pub source_fps: FrameRate,
    pub estimator: &'a FpsEstimator,
    pub renderer: &'a dyn Renderer,
    pub download: &'a DownloadTarget,
}

pub async fn execute(
    session: &mut MeasurementSession<FrameSequence>,
    command: Command,
    ctx: &ScriptContext<'_>,
) -> Result<()> {
    match command {
        Command::Seek(seconds) => session.seek(seconds),
        Command::Step(delta) => {
            session.step(delta);
        }
        Command::MarkStart => session.on_mark_start(),
        Command::MarkEnd => session.on_mark_end(),
        Command::Fps(fps) => {
            // Refusal is already reflected in the status line
            let _ = session.on_fps_change(fps);
        }
        Command::Reach(input) => {
            session.on_reach_change(&input);
        }
        Command::Calculate => {
            let _ = session.on_calculate();
        }
        Command::EstimateFps => {
            session.estimate_fps(ctx.estimator).await;
        }
        Command::Load(dir) => {
            let surface = FrameSequence::open(&dir, ctx.source_fps)?;
            session.on_file_loaded(surface);
        }
        Command::Export => {
            let _ = session.export(ctx.renderer, None, ctx.download).await;
        }
        Command::Status => {}
    }
    Ok(())
}

fn indicator(label: &str, projection: Projection) -> String {
    match projection.percent_label() {
        Some(pct) => format!("{}={}", label, pct),
        None => format!("{}=hidden", label),
    }
}

pub fn render_view<W: Write>(
    session: &MeasurementSession<FrameSequence>,
    out: &mut W,
) -> Result<()> {
    let indicators = session.indicators();
    writeln!(
        out,
        "[{:.3}s frame {} @ {}] {} {} {}",
        session.surface().position(),
        session.current_frame_index(),
        session.fps(),
        indicator("current", indicators.current),
        indicator("start", indicators.start),
        indicator("end", indicators.end),
    )?;
    let status = session.status().to_string();
    if !status.is_empty() {
        writeln!(out, "{}", status)?;
    }
    let result = session.result_text();
    if !result.is_empty() {
        writeln!(out, "{}", result)?;
    }
    Ok(())
}

/// Runs every line of `input` against the session.
///
/// Blank lines and `#` comments are skipped. A line that fails to parse or
/// run is reported and the script carries on.
pub async fn run_script<R: BufRead, W: Write>(
    session: &mut MeasurementSession<FrameSequence>,
    input: R,
    out: &mut W,
    ctx: &ScriptContext<'_>,
) -> Result<()> {
    for (number, line) in input.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        writeln!(out, "> {}", line)?;

        let outcome = match line.parse::<Command>() {
            Ok(command) => execute(session, command, ctx).await,
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            warn!("Line {}: {:#}", number + 1, e);
            writeln!(out, "error: {:#}", e)?;
            continue;
        }
        render_view(session, out)?;
    }
    Ok(())
}
