//! Branded placeholder images for assets whose generation failed

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat as RasterFormat, Rgba, RgbaImage};
use tracing::warn;

use super::payload::{ImageDataUri, ImageFormat};

/// Brand color used when the strategy has no usable hex color
pub const DEFAULT_BRAND_COLOR: [u8; 3] = [0x63, 0x66, 0xf1];

const BACKGROUND: [u8; 3] = [0xf8, 0xf9, 0xfa];

/// 1x1 PNG returned if rendering itself fails
const FALLBACK_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Parse `#rrggbb` or `#rgb`
pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.trim().strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some([channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?]),
        3 => {
            let expand = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
            Some([expand(0)?, expand(1)?, expand(2)?])
        }
        _ => None,
    }
}

/// Render a light canvas with a brand-colored frame and center mark
pub fn render_placeholder(width: u32, height: u32, brand_color: [u8; 3]) -> ImageDataUri {
    match render_png(width.max(1), height.max(1), brand_color) {
        Ok(bytes) => ImageDataUri::encode(ImageFormat::Png, &bytes),
        Err(e) => {
            warn!(error = %e, "Placeholder rendering failed, using 1x1 fallback");
            fallback_placeholder()
        }
    }
}

/// Minimal 1x1 PNG
pub fn fallback_placeholder() -> ImageDataUri {
    let bytes = STANDARD.decode(FALLBACK_PNG_BASE64).unwrap_or_default();
    ImageDataUri::encode(ImageFormat::Png, &bytes)
}

fn render_png(width: u32, height: u32, brand: [u8; 3]) -> image::ImageResult<Vec<u8>> {
    let background = Rgba([BACKGROUND[0], BACKGROUND[1], BACKGROUND[2], 255]);
    let accent = Rgba([brand[0], brand[1], brand[2], 255]);

    let border = (width.min(height) / 32).max(1);
    let mark_w = width / 4;
    let mark_h = height / 4;
    let mark_x = (width - mark_w) / 2;
    let mark_y = (height - mark_h) / 2;

    let canvas = RgbaImage::from_fn(width, height, |x, y| {
        let on_frame = x < border || y < border || x >= width - border || y >= height - border;
        let on_mark = (mark_x..mark_x + mark_w).contains(&x) && (mark_y..mark_y + mark_h).contains(&y);
        if on_frame || on_mark { accent } else { background }
    });

    let mut buffer = Cursor::new(Vec::new());
    canvas.write_to(&mut buffer, RasterFormat::Png)?;
    Ok(buffer.into_inner())
}
