//! Image payload handling
//!
//! - Canonical data URI decoding for provider responses
//! - Branded placeholder rendering

pub mod payload;
pub mod placeholder;

pub use payload::{ImageDataUri, ImageFormat, ImagePayload, PayloadData, decode};
pub use placeholder::{DEFAULT_BRAND_COLOR, parse_hex_color, render_placeholder};
