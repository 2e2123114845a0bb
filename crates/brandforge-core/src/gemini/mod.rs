//! Gemini integration
//!
//! Concrete [`TextModel`](crate::provider::TextModel) and
//! [`ImageModel`](crate::provider::ImageModel) over the Gemini REST API.

mod client;
pub mod types;

pub use client::{GeminiClient, GeminiClientBuilder, extract_image, extract_text};
