//! Domain layer
//!
//! Projects, strategies and generated assets.

pub mod asset;
pub mod project;
pub mod strategy;

pub use asset::{
    AssetMetadata, AssetSpec, AssetType, ConsistencySignature, GeneratedAsset, PLACEHOLDER_QUALITY,
    StyleFocus, quality_score,
};
pub use project::{BusinessInput, LifecycleEvent, Project, ProjectStatus};
pub use strategy::{LayerAnalysis, Strategy, StrategyLayer};
