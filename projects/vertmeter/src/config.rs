use crate::measure::{FrameRate, MeasureError};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables loaded from an optional JSON settings file.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Settings {
    /// Rate used until the user picks one or the estimator succeeds
    pub default_fps: f64,
    /// Discrete rates offered to the user; estimates snap to these
    pub fps_choices: Vec<f64>,
    /// Pause after a seek completes before grabbing the frame
    pub settle_delay_ms: u64,
    /// Upper bound on timestamps consumed by the fps estimator
    pub estimator_sample_count: usize,
    /// Relative distance within which an estimate snaps to a choice
    pub estimator_snap_tolerance: f64,
    pub export_file_name: String,
    pub overlay_title: String,
    pub overlay_link: String,
    pub font_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_fps: 30.0,
            fps_choices: vec![24.0, 25.0, 30.0, 50.0, 60.0, 120.0, 240.0],
            settle_delay_ms: 50,
            estimator_sample_count: 60,
            estimator_snap_tolerance: 0.03,
            export_file_name: "vertmeter.png".to_string(),
            overlay_title: "Vertical Jump Height".to_string(),
            overlay_link: "https://yannis-e.github.io/VertMeter/".to_string(),
            font_path: None,
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read settings {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Invalid settings file {}", path.display()))?
            }
            None => Self::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.default_frame_rate()?;
        for choice in &self.fps_choices {
            FrameRate::new(*choice).context("fps_choices contains an invalid rate")?;
        }
        if self.estimator_sample_count < 2 {
            anyhow::bail!("estimator_sample_count must be at least 2");
        }
        if !(0.0..1.0).contains(&self.estimator_snap_tolerance) {
            anyhow::bail!("estimator_snap_tolerance must be within [0, 1)");
        }
        Ok(())
    }

    pub fn default_frame_rate(&self) -> Result<FrameRate, MeasureError> {
        FrameRate::new(self.default_fps)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn frame_rate_choices(&self) -> Vec<FrameRate> {
        self.fps_choices
            .iter()
            .filter_map(|v| FrameRate::new(*v).ok())
            .collect()
    }
}
