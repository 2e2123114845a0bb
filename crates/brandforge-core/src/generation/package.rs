//! Complete package generation
//!
//! Every requested type gets a slot before generation starts, so the result
//! always holds exactly one asset per requested type, in request order.

use serde::Serialize;
use tracing::info;

use super::asset::{AssetGenerator, AssetRequest, placeholder_asset};
use super::consistency::ConsistencyTracker;
use crate::domain::{AssetMetadata, AssetType, GeneratedAsset, Project, Strategy};
use crate::error::{Error, Result};

/// One asset per requested type
#[derive(Debug, Clone, Serialize)]
pub struct PackageResult {
    pub project_id: String,
    pub assets: Vec<GeneratedAsset>,
}

impl PackageResult {
    pub fn get(&self, asset_type: AssetType) -> Option<&GeneratedAsset> {
        self.assets.iter().find(|a| a.asset_type == asset_type)
    }

    pub fn asset_types(&self) -> Vec<AssetType> {
        self.assets.iter().map(|a| a.asset_type).collect()
    }

    pub fn placeholder_count(&self) -> usize {
        self.assets.iter().filter(|a| a.is_placeholder()).count()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Collapse duplicates keeping the first occurrence; empty input is rejected
pub fn normalize_types(requested: &[AssetType]) -> Result<Vec<AssetType>> {
    let mut types = Vec::with_capacity(requested.len());
    for t in requested {
        if !types.contains(t) {
            types.push(*t);
        }
    }
    if types.is_empty() {
        return Err(Error::Validation(
            "a package needs at least one asset type".to_string(),
        ));
    }
    Ok(types)
}

/// Sequences asset generation for a package
pub struct PackageOrchestrator<'a> {
    generator: &'a AssetGenerator,
}

impl<'a> PackageOrchestrator<'a> {
    pub fn new(generator: &'a AssetGenerator) -> Self {
        Self { generator }
    }

    /// Generate each type in order, feeding accumulated signatures forward
    pub async fn generate(
        &self,
        project: &Project,
        strategy: &Strategy,
        requested: &[AssetType],
        tracker: &mut ConsistencyTracker,
    ) -> Result<PackageResult> {
        let types = normalize_types(requested)?;
        let mut slots: Vec<(AssetType, Option<GeneratedAsset>)> =
            types.iter().map(|t| (*t, None)).collect();

        info!(
            project_id = %project.id,
            types = ?types.iter().map(AssetType::as_str).collect::<Vec<_>>(),
            prior_signatures = tracker.len(),
            "Generating asset package"
        );

        for (asset_type, slot) in slots.iter_mut() {
            let request = AssetRequest::new(*asset_type);
            let asset = self
                .generator
                .generate(project, strategy, &request, tracker.signatures())
                .await;
            tracker.append(&asset);
            *slot = Some(asset);
        }

        let assets: Vec<GeneratedAsset> = slots
            .into_iter()
            .map(|(asset_type, slot)| {
                slot.unwrap_or_else(|| {
                    placeholder_asset(project, strategy, asset_type, unfilled_metadata())
                })
            })
            .collect();

        let result = PackageResult {
            project_id: project.id.clone(),
            assets,
        };
        info!(
            project_id = %project.id,
            assets = result.len(),
            placeholders = result.placeholder_count(),
            "Asset package complete"
        );
        Ok(result)
    }
}

fn unfilled_metadata() -> AssetMetadata {
    AssetMetadata {
        attempts: 0,
        placeholder: true,
        signature: None,
        reference_asset_ids: Vec::new(),
        variant: "primary".to_string(),
        context: None,
        prompt_excerpt: String::new(),
        last_error: Some("slot was not filled".to_string()),
        quality_score: 0.0,
    }
}
