use crate::config::Settings;
use crate::measure::MeasurementSnapshot;
use anyhow::{anyhow, Context, Result};
use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use image::{ImageFormat, Rgba, RgbaImage};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::warn;

const ACCENT: [u8; 3] = [0x00, 0xd8, 0xff];
const LINK_GREY: [u8; 3] = [0xbf, 0xbf, 0xbf];
const WHITE: [u8; 3] = [0xff, 0xff, 0xff];
const PADDING: f32 = 30.0;

/// Turns a captured frame plus a snapshot into the image that gets shared.
pub trait Renderer {
    fn render(&self, snapshot: &MeasurementSnapshot, frame: &RgbaImage) -> Result<RgbaImage>;
}

/// Dimmed frame with a bottom band showing the jump height.
pub struct OverlayRenderer {
    title: String,
    link: String,
    font: Option<Font>,
}

impl OverlayRenderer {
    pub fn new(title: impl Into<String>, link: impl Into<String>, font: Option<Font>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            font,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let font = match &settings.font_path {
            Some(path) => Some(load_font(path)?),
            None => {
                warn!("No font configured, exported images will carry no text");
                None
            }
        };
        Ok(Self::new(
            settings.overlay_title.clone(),
            settings.overlay_link.clone(),
            font,
        ))
    }
}

pub fn load_font(path: &Path) -> Result<Font> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read font {}", path.display()))?;
    Font::from_bytes(bytes, FontSettings::default())
        .map_err(|e| anyhow!("Failed to parse font {}: {}", path.display(), e))
}

impl Renderer for OverlayRenderer {
    fn render(&self, snapshot: &MeasurementSnapshot, frame: &RgbaImage) -> Result<RgbaImage> {
        let mut canvas = frame.clone();
        let (width, height) = canvas.dimensions();
        if width == 0 || height == 0 {
            return Err(anyhow!("Cannot render onto an empty frame"));
        }
        let w = width as f32;
        let h = height as f32;

        // 1. Dim the whole frame
        fill_rect(&mut canvas, 0, 0, width, height, [0, 0, 0], 0.3);

        // 2. Bottom band
        let band_height = (120.0_f32).max(h * 0.15).min(h) as u32;
        let band_top = height - band_height;
        fill_rect(&mut canvas, 0, band_top, width, band_height, [0, 0, 0], 0.85);

        // 3. Accent line
        fill_rect(&mut canvas, 0, band_top, width, 4, ACCENT, 1.0);

        // 4. Text
        if let Some(font) = &self.font {
            let top = band_top as f32 + 18.0;
            let title_size = (18.0_f32).max((w * 0.045).round());
            draw_text(&mut canvas, font, &self.title, title_size, PADDING, top, ACCENT);

            let measure_size = (28.0_f32).max((w * 0.08).round());
            let measure_y = top + title_size + 12.0;
            draw_text(
                &mut canvas,
                font,
                &snapshot.height_label(),
                measure_size,
                PADDING,
                measure_y,
                WHITE,
            );

            let link_size = (12.0_f32).max((w * 0.028).round());
            let link_width = text_width(font, &self.link, link_size);
            let link_height = font
                .horizontal_line_metrics(link_size)
                .map(|m| m.ascent - m.descent)
                .unwrap_or(link_size);
            draw_text(
                &mut canvas,
                font,
                &self.link,
                link_size,
                w - PADDING - link_width,
                h - 8.0 - link_height,
                LINK_GREY,
            );
        }

        Ok(canvas)
    }
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(buf)
}

fn fill_rect(
    canvas: &mut RgbaImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    color: [u8; 3],
    opacity: f32,
) {
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    let x_end = x.saturating_add(width).min(canvas.width());
    let y_end = y.saturating_add(height).min(canvas.height());
    for py in y..y_end {
        for px in x..x_end {
            blend_pixel(canvas.get_pixel_mut(px, py), color, alpha);
        }
    }
}

fn blend_pixel(dst: &mut Rgba<u8>, color: [u8; 3], alpha: u8) {
    let alpha = u16::from(alpha);
    if alpha == 0 {
        return;
    }
    let inv_alpha = 255 - alpha;
    for channel in 0..3 {
        let d = u16::from(dst[channel]);
        let s = u16::from(color[channel]);
        dst[channel] = ((s * alpha + d * inv_alpha + 127) / 255) as u8;
    }
}

fn text_width(font: &Font, text: &str, size: f32) -> f32 {
    text.chars()
        .map(|c| font.metrics(c, size).advance_width)
        .sum()
}

fn draw_text(
    canvas: &mut RgbaImage,
    font: &Font,
    text: &str,
    size: f32,
    x: f32,
    y: f32,
    color: [u8; 3],
) {
    if text.is_empty() {
        return;
    }
    let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings {
        x,
        y,
        ..LayoutSettings::default()
    });
    layout.append(&[font], &TextStyle::new(text, size, 0));

    let (width, height) = canvas.dimensions();
    for glyph in layout.glyphs() {
        if glyph.width == 0 || glyph.height == 0 {
            continue;
        }
        let (_, bitmap) = font.rasterize_config(glyph.key);
        let gx = glyph.x.round() as i64;
        let gy = glyph.y.round() as i64;
        for row in 0..glyph.height {
            let py = gy + row as i64;
            if py < 0 || py >= i64::from(height) {
                continue;
            }
            for col in 0..glyph.width {
                let px = gx + col as i64;
                if px < 0 || px >= i64::from(width) {
                    continue;
                }
                let coverage = bitmap[row * glyph.width + col];
                blend_pixel(canvas.get_pixel_mut(px as u32, py as u32), color, coverage);
            }
        }
    }
}
