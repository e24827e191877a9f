// Share-image export: overlay rendering and delivery

pub mod delivery;
pub mod overlay;

pub use delivery::{deliver, Delivery, DownloadTarget, ShareTarget};
pub use overlay::{encode_png, OverlayRenderer, Renderer};
