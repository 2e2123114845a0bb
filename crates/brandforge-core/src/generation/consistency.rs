//! Per-project consistency signatures

use crate::domain::{ConsistencySignature, GeneratedAsset};

/// Ordered, append-only signatures of a project's successful assets
#[derive(Debug, Clone, Default)]
pub struct ConsistencyTracker {
    project_id: String,
    signatures: Vec<ConsistencySignature>,
}

impl ConsistencyTracker {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            signatures: Vec::new(),
        }
    }

    /// Seed from stored assets, oldest first
    pub fn from_assets(project_id: impl Into<String>, assets: &[GeneratedAsset]) -> Self {
        let mut tracker = Self::new(project_id);
        let mut ordered: Vec<&GeneratedAsset> = assets.iter().collect();
        ordered.sort_by_key(|a| a.created_at);
        for asset in ordered {
            tracker.append(asset);
        }
        tracker
    }

    /// Record an asset's signature; placeholders and foreign assets are ignored
    pub fn append(&mut self, asset: &GeneratedAsset) -> bool {
        if asset.project_id != self.project_id {
            return false;
        }
        match asset.signature() {
            Some(signature) => {
                self.signatures.push(signature.clone());
                true
            }
            None => false,
        }
    }

    pub fn signatures(&self) -> &[ConsistencySignature] {
        &self.signatures
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}
