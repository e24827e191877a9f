use crate::measure::MeasureError;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Host share capability (e.g. a system share sheet).
pub trait ShareTarget {
    fn can_share(&self, file_name: &str) -> bool;
    fn share(&self, png: &[u8], file_name: &str) -> Result<()>;
}

/// Fallback that saves the image into a local directory.
#[derive(Debug, Clone)]
pub struct DownloadTarget {
    output_root: PathBuf,
}

impl DownloadTarget {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    pub fn save(&self, png: &[u8], file_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_root).with_context(|| {
            format!(
                "Failed to create output directory {}",
                self.output_root.display()
            )
        })?;
        let path = self.output_root.join(file_name);
        fs::write(&path, png).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// How an exported image reached the user.
///
/// `Downloaded` only happens when sharing was unavailable, and its status
/// text says so.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "via", content = "path", rename_all = "snake_case")]
pub enum Delivery {
    Shared,
    Downloaded(PathBuf),
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Shared => write!(f, "Image shared"),
            Delivery::Downloaded(path) => write!(
                f,
                "{}, image saved to {}",
                MeasureError::ExportUnavailable,
                path.display()
            ),
        }
    }
}

pub fn deliver(
    png: &[u8],
    file_name: &str,
    share: Option<&dyn ShareTarget>,
    download: &DownloadTarget,
) -> Result<Delivery> {
    match share {
        Some(target) if target.can_share(file_name) => {
            target.share(png, file_name)?;
            info!("Shared {} ({} bytes)", file_name, png.len());
            Ok(Delivery::Shared)
        }
        _ => {
            warn!("{}", MeasureError::ExportUnavailable);
            let path = download.save(png, file_name)?;
            info!("Saved {}", path.display());
            Ok(Delivery::Downloaded(path))
        }
    }
}
