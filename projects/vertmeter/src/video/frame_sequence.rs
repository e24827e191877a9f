use crate::measure::clock::presented_frame_of;
use crate::measure::FrameRate;
use crate::video::PlaybackSurface;
use anyhow::{anyhow, Context, Result};
use futures::stream::{BoxStream, StreamExt};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub fn list_frames(frames_root: &Path) -> Vec<PathBuf> {
    let mut frames: Vec<PathBuf> = WalkDir::new(frames_root)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| FRAME_EXTENSIONS.contains(&s.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    frames.sort();
    frames
}

/// A clip stored as a directory of extracted frame images.
///
/// Frame `i` is presented at `i / source_fps`. Playback never advances on
/// its own, so the sequence only moves through `seek`.
pub struct FrameSequence {
    root: PathBuf,
    frames: Vec<PathBuf>,
    source_fps: FrameRate,
    position: f64,
    paused: bool,
    pending_seek: bool,
}

impl FrameSequence {
    pub fn open(frames_root: &Path, source_fps: FrameRate) -> Result<Self> {
        if !frames_root.is_dir() {
            return Err(anyhow!(
                "Frame directory not found: {}",
                frames_root.display()
            ));
        }
        let frames = list_frames(frames_root);
        info!(
            "Loaded {} frames from {} at {}",
            frames.len(),
            frames_root.display(),
            source_fps
        );

        Ok(Self {
            root: frames_root.to_path_buf(),
            frames,
            source_fps,
            position: 0.0,
            paused: true,
            pending_seek: false,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn source_fps(&self) -> FrameRate {
        self.source_fps
    }

    fn frame_at(&self, seconds: f64) -> usize {
        let index = presented_frame_of(seconds, self.source_fps).max(0) as usize;
        index.min(self.frames.len().saturating_sub(1))
    }
}

impl PlaybackSurface for FrameSequence {
    fn position(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> Option<f64> {
        if self.frames.is_empty() {
            None
        } else {
            Some(self.frames.len() as f64 / self.source_fps.get())
        }
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn seek(&mut self, seconds: f64) {
        let upper = self.duration().unwrap_or(0.0);
        self.position = if seconds.is_finite() {
            seconds.clamp(0.0, upper)
        } else {
            0.0
        };
        self.pending_seek = true;
        debug!("Seek to {:.4}s", self.position);
    }

    async fn seeked(&mut self) -> Result<()> {
        if self.pending_seek {
            self.pending_seek = false;
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    fn current_frame(&mut self) -> Result<RgbaImage> {
        if self.frames.is_empty() {
            return Err(anyhow!("No frames in {}", self.root.display()));
        }
        let path = &self.frames[self.frame_at(self.position)];
        let frame = image::open(path)
            .with_context(|| format!("Failed to decode frame {}", path.display()))?;
        Ok(frame.to_rgba8())
    }

    fn frame_timestamps(&self) -> BoxStream<'static, f64> {
        let count = self.frames.len();
        let fps = self.source_fps.get();
        async_stream::stream! {
            for i in 0..count {
                yield i as f64 / fps;
            }
        }
        .boxed()
    }
}
