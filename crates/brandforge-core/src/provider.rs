//! Model provider seams
//!
//! Generators only see these traits; [`crate::gemini::GeminiClient`] is the
//! production implementation and tests substitute scripted fakes.

use async_trait::async_trait;

use crate::error::Result;
use crate::image::ImagePayload;

/// Text generation
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Generate a completion for a single prompt
    async fn generate_text(&self, prompt: &str) -> Result<String>;

    /// Model identifier for logs and health output
    fn model_name(&self) -> &str;
}

/// Image generation
#[async_trait]
pub trait ImageModel: Send + Sync {
    /// Generate one image for a prompt, in whatever shape the provider returns
    async fn generate_image(&self, prompt: &str) -> Result<ImagePayload>;

    fn model_name(&self) -> &str;
}
