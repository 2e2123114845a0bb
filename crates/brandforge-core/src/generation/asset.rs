//! Single-asset generation with bounded retry and placeholder fallback

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::prompts::{self, MAX_PROMPT_REFERENCES};
use crate::config::GenerationConfig;
use crate::domain::{
    AssetMetadata, AssetType, ConsistencySignature, GeneratedAsset, Project, Strategy,
};
use crate::error::{Error, Result};
use crate::image::{self, ImageDataUri, render_placeholder};
use crate::provider::ImageModel;

const PROMPT_EXCERPT_CHARS: usize = 500;

/// Attempt bound and deterministic backoff between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 2000,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay_ms: config.retry_delay_ms,
        }
    }

    /// Delay after failed attempt `attempt` (1-based): `retry_delay_ms * 2^(attempt-1)`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.retry_delay_ms.saturating_mul(factor))
    }
}

/// What to generate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub asset_type: AssetType,
    pub variant: String,
    pub context: Option<String>,
}

impl AssetRequest {
    pub fn new(asset_type: AssetType) -> Self {
        Self {
            asset_type,
            variant: "primary".to_string(),
            context: None,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Generates one asset; failures end in a placeholder, never an error
#[derive(Clone)]
pub struct AssetGenerator {
    model: Arc<dyn ImageModel>,
    policy: RetryPolicy,
}

impl AssetGenerator {
    pub fn new(model: Arc<dyn ImageModel>, policy: RetryPolicy) -> Self {
        Self { model, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn generate(
        &self,
        project: &Project,
        strategy: &Strategy,
        request: &AssetRequest,
        prior: &[ConsistencySignature],
    ) -> GeneratedAsset {
        let references = tail(prior, MAX_PROMPT_REFERENCES);
        let prompt = prompts::asset_prompt(
            strategy,
            request.asset_type,
            &request.variant,
            request.context.as_deref(),
            references,
        );
        let reference_ids: Vec<String> = references.iter().map(|s| s.asset_id.clone()).collect();

        let mut last_error = None;
        for attempt in 1..=self.policy.max_attempts {
            match self.attempt(&prompt).await {
                Ok((image, bytes)) => {
                    info!(
                        project_id = %project.id,
                        asset_type = request.asset_type.as_str(),
                        attempt,
                        mime = image.mime_type(),
                        "Asset generated"
                    );
                    let mut asset = GeneratedAsset::new(
                        &project.id,
                        request.asset_type,
                        image,
                        self.metadata(request, &prompt, attempt, reference_ids, None),
                    );
                    asset.metadata.signature = Some(ConsistencySignature::derive(
                        &asset.id,
                        asset.asset_type,
                        &strategy.consistency_seed,
                        &asset.image,
                        &bytes,
                    ));
                    return asset;
                }
                Err(e) => {
                    warn!(
                        project_id = %project.id,
                        asset_type = request.asset_type.as_str(),
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "Asset generation attempt failed"
                    );
                    last_error = Some(e.to_string());
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.delay_after(attempt)).await;
                    }
                }
            }
        }

        warn!(
            project_id = %project.id,
            asset_type = request.asset_type.as_str(),
            "Attempts exhausted, returning placeholder"
        );
        let metadata = self.metadata(
            request,
            &prompt,
            self.policy.max_attempts,
            reference_ids,
            last_error,
        );
        placeholder_asset(project, strategy, request.asset_type, metadata)
    }

    async fn attempt(&self, prompt: &str) -> Result<(ImageDataUri, Vec<u8>)> {
        let payload = self.model.generate_image(prompt).await?;
        let image = image::decode(&payload)?;
        let bytes = image.to_bytes()?;
        if bytes.is_empty() {
            return Err(Error::Decode("decoded image is empty".to_string()));
        }
        Ok((image, bytes))
    }

    fn metadata(
        &self,
        request: &AssetRequest,
        prompt: &str,
        attempts: u32,
        reference_asset_ids: Vec<String>,
        last_error: Option<String>,
    ) -> AssetMetadata {
        AssetMetadata {
            attempts,
            placeholder: last_error.is_some(),
            signature: None,
            reference_asset_ids,
            variant: request.variant.clone(),
            context: request.context.clone(),
            prompt_excerpt: prompt.trim().chars().take(PROMPT_EXCERPT_CHARS).collect(),
            last_error,
            quality_score: 0.0,
        }
    }
}

/// Branded placeholder for a type whose generation failed
pub fn placeholder_asset(
    project: &Project,
    strategy: &Strategy,
    asset_type: AssetType,
    mut metadata: AssetMetadata,
) -> GeneratedAsset {
    let spec = asset_type.spec();
    metadata.placeholder = true;
    metadata.signature = None;
    if metadata.last_error.is_none() {
        metadata.last_error = Some("generation did not complete".to_string());
    }
    let image = render_placeholder(spec.width, spec.height, strategy.brand_color());
    GeneratedAsset::new(&project.id, asset_type, image, metadata)
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}
