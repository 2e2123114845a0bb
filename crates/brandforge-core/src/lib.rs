//! BrandForge Core Library
//!
//! This crate provides the core functionality for BrandForge, including:
//! - Brand projects and their lifecycle state machine
//! - Layered brand strategy generation and refinement
//! - Image asset generation with retry, placeholder fallback and consistency references
//! - Package orchestration over an ordered set of asset types
//! - Storage (SQLite via sqlx) and brand kit export
//! - Gemini integration behind the `TextModel` / `ImageModel` seams

pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod gemini;
pub mod generation;
pub mod health;
pub mod image;
pub mod locks;
pub mod provider;
pub mod service;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::{
        AssetType, BusinessInput, GeneratedAsset, Project, ProjectStatus, Strategy,
    };
    pub use crate::error::{Error, Result};
    pub use crate::generation::{AssetRequest, PackageResult};
    pub use crate::image::{ImageDataUri, ImagePayload};
    pub use crate::provider::{ImageModel, TextModel};
    pub use crate::service::BrandService;
    pub use crate::storage::{Database, ProjectStore, SqliteProjectStore};
}
