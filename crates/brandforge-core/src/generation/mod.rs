//! Generation pipeline
//!
//! - Strategy: five analysis layers against a text model
//! - Asset: one image with retry, decode and placeholder fallback
//! - Consistency: signatures of earlier assets fed into later prompts
//! - Package: an ordered set of asset types, one result per type

pub mod asset;
pub mod consistency;
pub mod package;
pub mod prompts;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

pub use asset::{AssetGenerator, AssetRequest, RetryPolicy, placeholder_asset};
pub use consistency::ConsistencyTracker;
pub use package::{PackageOrchestrator, PackageResult, normalize_types};
pub use strategy::StrategyGenerator;
