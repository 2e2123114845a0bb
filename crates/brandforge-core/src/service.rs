//! Brand service
//!
//! The single entry point for project operations. It owns the store, the
//! generators and the per-project locks, and it is the only place that moves a
//! project through its lifecycle.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{Config, GenerationConfig};
use crate::domain::{
    AssetType, BusinessInput, GeneratedAsset, LifecycleEvent, Project, ProjectStatus, Strategy,
};
use crate::error::{Error, Result};
use crate::export::{self, ExportSummary};
use crate::gemini::GeminiClient;
use crate::generation::{
    AssetGenerator, AssetRequest, ConsistencyTracker, PackageOrchestrator, PackageResult,
    RetryPolicy, StrategyGenerator, normalize_types,
};
use crate::locks::ProjectLocks;
use crate::provider::{ImageModel, TextModel};
use crate::storage::{Database, ProjectStore, SqliteProjectStore};

/// Builder for [`BrandService`]
#[derive(Default)]
pub struct BrandServiceBuilder {
    store: Option<Arc<dyn ProjectStore>>,
    text_model: Option<Arc<dyn TextModel>>,
    image_model: Option<Arc<dyn ImageModel>>,
    generation: GenerationConfig,
}

impl BrandServiceBuilder {
    pub fn store(mut self, store: Arc<dyn ProjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn text_model(mut self, model: Arc<dyn TextModel>) -> Self {
        self.text_model = Some(model);
        self
    }

    pub fn image_model(mut self, model: Arc<dyn ImageModel>) -> Self {
        self.image_model = Some(model);
        self
    }

    /// Retry policy, lock timeout and default package types
    pub fn generation(mut self, config: GenerationConfig) -> Self {
        self.generation = config;
        self
    }

    pub fn build(self) -> Result<BrandService> {
        let store = self
            .store
            .ok_or_else(|| Error::Config("a project store is required".to_string()))?;
        let package_types = self
            .generation
            .asset_types()
            .map_err(|e| Error::Config(e.to_string()))?;
        let package_types = normalize_types(&package_types)
            .map_err(|_| Error::Config("generation.package_types cannot be empty".to_string()))?;
        let policy = RetryPolicy::from_config(&self.generation);

        Ok(BrandService {
            store,
            strategies: self.text_model.map(StrategyGenerator::new),
            assets: self.image_model.map(|m| AssetGenerator::new(m, policy)),
            locks: ProjectLocks::new(),
            package_types,
            lock_timeout: Duration::from_secs(self.generation.lock_timeout_secs),
        })
    }
}

/// Project lifecycle and generation facade
pub struct BrandService {
    store: Arc<dyn ProjectStore>,
    strategies: Option<StrategyGenerator>,
    assets: Option<AssetGenerator>,
    locks: ProjectLocks,
    package_types: Vec<AssetType>,
    lock_timeout: Duration,
}

impl BrandService {
    pub fn builder() -> BrandServiceBuilder {
        BrandServiceBuilder::default()
    }

    /// Open the configured database and, when a key is available, the Gemini client
    ///
    /// Without an API key the service still serves stored data; generation
    /// calls fail with `ApiKeyMissing`.
    pub async fn open(config: &Config) -> Result<Self> {
        let path = config
            .database_path()
            .map_err(|e| Error::Config(e.to_string()))?;
        let store = SqliteProjectStore::new(Database::open(path).await?);

        let mut builder = Self::builder()
            .store(Arc::new(store))
            .generation(config.generation.clone());

        match GeminiClient::from_config(&config.gemini) {
            Ok(client) => {
                let client = Arc::new(client);
                debug!(
                    text_model = client.text_model(),
                    image_model = client.image_model(),
                    "Gemini client ready"
                );
                builder = builder.text_model(client.clone()).image_model(client);
            }
            Err(Error::ApiKeyMissing) => {
                debug!("No Gemini API key, generation disabled");
            }
            Err(e) => return Err(e),
        }

        builder.build()
    }

    pub fn store(&self) -> &Arc<dyn ProjectStore> {
        &self.store
    }

    pub fn locks(&self) -> &ProjectLocks {
        &self.locks
    }

    /// Types generated by a package request that names none
    pub fn package_types(&self) -> &[AssetType] {
        &self.package_types
    }

    pub fn can_generate(&self) -> bool {
        self.strategies.is_some() && self.assets.is_some()
    }

    fn strategy_generator(&self) -> Result<&StrategyGenerator> {
        self.strategies.as_ref().ok_or(Error::ApiKeyMissing)
    }

    fn asset_generator(&self) -> Result<&AssetGenerator> {
        self.assets.as_ref().ok_or(Error::ApiKeyMissing)
    }

    /// Validate and store a new project
    pub async fn create_project(&self, input: BusinessInput) -> Result<Project> {
        input.validate()?;
        let project = Project::new(input);
        self.store.create(&project).await?;
        info!(
            project_id = %project.id,
            business_name = %project.business_name(),
            "Project created"
        );
        Ok(project)
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Project> {
        self.store.get(project_id).await
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.store.list().await
    }

    /// The project's current strategy; `StrategyMissing` if none was generated
    pub async fn get_strategy(&self, project_id: &str) -> Result<Strategy> {
        self.store.get(project_id).await?;
        self.store
            .get_strategy(project_id)
            .await?
            .ok_or_else(|| Error::StrategyMissing(project_id.to_string()))
    }

    pub async fn strategy_history(&self, project_id: &str) -> Result<Vec<Strategy>> {
        self.store.get(project_id).await?;
        self.store.strategy_history(project_id).await
    }

    /// Run the layered analysis and store the result as the project's strategy
    ///
    /// Regenerating replaces the stored strategy with the next version number.
    pub async fn generate_strategy(&self, project_id: &str) -> Result<Strategy> {
        let project = self.store.get(project_id).await?;
        project.input.validate()?;
        let generator = self.strategy_generator()?;

        let _lock = self.locks.acquire(project_id, self.lock_timeout).await?;
        // Another generation may have moved the project while we waited
        let project = self.store.get(project_id).await?;
        let next = project.status.apply(LifecycleEvent::StrategyGenerated)?;
        let previous = self.store.get_strategy(project_id).await?;

        let mut strategy = generator.generate(&project).await?;
        if let Some(previous) = previous {
            strategy.version = previous.version + 1;
        }

        self.store.save_strategy(project_id, &strategy).await?;
        self.set_status(&project, next).await?;
        Ok(strategy)
    }

    /// Apply a free-form change to the stored strategy
    pub async fn refine_strategy(&self, project_id: &str, request: &str) -> Result<Strategy> {
        self.get_strategy(project_id).await?;
        let generator = self.strategy_generator()?;

        let _lock = self.locks.acquire(project_id, self.lock_timeout).await?;
        let strategy = self.get_strategy(project_id).await?;
        let refined = generator.refine(&strategy, request).await?;
        self.store.save_strategy(project_id, &refined).await?;
        Ok(refined)
    }

    /// Generate one asset; generation failures end in a stored placeholder
    pub async fn generate_asset(
        &self,
        project_id: &str,
        request: AssetRequest,
    ) -> Result<GeneratedAsset> {
        self.get_strategy(project_id).await?;
        let generator = self.asset_generator()?;

        let _lock = self.locks.acquire(project_id, self.lock_timeout).await?;
        let project = self.store.get(project_id).await?;
        let strategy = self.get_strategy(project_id).await?;
        let next = project.status.apply(LifecycleEvent::AssetGenerationStarted)?;
        self.set_status(&project, next).await?;

        let stored = self.store.list_assets(project_id).await?;
        let tracker = ConsistencyTracker::from_assets(project_id, &stored);

        let asset = generator
            .generate(&project, &strategy, &request, tracker.signatures())
            .await;
        self.store.save_asset(project_id, &asset).await?;
        Ok(asset)
    }

    /// Generate every requested type (the configured defaults when `None`)
    ///
    /// The result holds exactly one asset per distinct requested type.
    pub async fn generate_package(
        &self,
        project_id: &str,
        types: Option<&[AssetType]>,
    ) -> Result<PackageResult> {
        let requested = normalize_types(types.unwrap_or(self.package_types.as_slice()))?;
        self.get_strategy(project_id).await?;
        let generator = self.asset_generator()?;

        let _lock = self.locks.acquire(project_id, self.lock_timeout).await?;
        let project = self.store.get(project_id).await?;
        let strategy = self.get_strategy(project_id).await?;
        let started = project.status.apply(LifecycleEvent::PackageGenerationStarted)?;
        self.set_status(&project, started).await?;

        let stored = self.store.list_assets(project_id).await?;
        let mut tracker = ConsistencyTracker::from_assets(project_id, &stored);

        let result = PackageOrchestrator::new(generator)
            .generate(&project, &strategy, &requested, &mut tracker)
            .await?;
        for asset in &result.assets {
            self.store.save_asset(project_id, asset).await?;
        }

        let completed = started.apply(LifecycleEvent::PackageCompleted)?;
        self.store.update_status(project_id, completed).await?;
        info!(
            project_id,
            from = started.as_str(),
            to = completed.as_str(),
            "Project status changed"
        );
        Ok(result)
    }

    pub async fn list_assets(&self, project_id: &str) -> Result<Vec<GeneratedAsset>> {
        self.store.get(project_id).await?;
        self.store.list_assets(project_id).await
    }

    /// Write the project's brand kit into `dir`
    pub async fn export(&self, project_id: &str, dir: &Path) -> Result<ExportSummary> {
        let project = self.store.get(project_id).await?;
        let strategy = self.get_strategy(project_id).await?;
        let assets = self.store.list_assets(project_id).await?;
        export::write_brand_kit(dir, &project, &strategy, &assets)
    }

    async fn set_status(&self, project: &Project, next: ProjectStatus) -> Result<()> {
        if project.status == next {
            return Ok(());
        }
        self.store.update_status(&project.id, next).await?;
        info!(
            project_id = %project.id,
            from = project.status.as_str(),
            to = next.as_str(),
            "Project status changed"
        );
        Ok(())
    }
}
