pub mod fps_estimator;
pub mod frame_sequence;

use anyhow::Result;
use futures::stream::BoxStream;
use image::RgbaImage;

/// Playable media the session measures against.
///
/// This is the seam to the host's decoder and display. Positions are in
/// seconds; `duration` is `None` until the media has loaded.
#[allow(async_fn_in_trait)]
pub trait PlaybackSurface {
    fn position(&self) -> f64;
    fn duration(&self) -> Option<f64>;
    fn is_paused(&self) -> bool;
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64);
    /// Resolves once the frame for the last seek is presented.
    async fn seeked(&mut self) -> Result<()>;
    fn current_frame(&mut self) -> Result<RgbaImage>;
    /// Presentation timestamps in seconds, used for rate estimation.
    fn frame_timestamps(&self) -> BoxStream<'static, f64>;
}
