//! Project store
//!
//! Projects, their strategy and their generated assets, keyed by project id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::domain::{AssetType, GeneratedAsset, Project, ProjectStatus, Strategy};
use crate::error::{Error, Result};
use crate::image::ImageDataUri;
use crate::storage::Database;

/// Persistence for projects and everything generated for them
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Insert a new project, returning its id
    async fn create(&self, project: &Project) -> Result<String>;

    /// Fetch a project; unknown ids are `ProjectNotFound`
    async fn get(&self, project_id: &str) -> Result<Project>;

    /// All projects, newest first
    async fn list(&self) -> Result<Vec<Project>>;

    async fn update_status(&self, project_id: &str, status: ProjectStatus) -> Result<()>;

    /// Store the project's strategy, replacing any earlier one
    async fn save_strategy(&self, project_id: &str, strategy: &Strategy) -> Result<()>;

    async fn get_strategy(&self, project_id: &str) -> Result<Option<Strategy>>;

    /// Every stored strategy version, oldest first
    async fn strategy_history(&self, project_id: &str) -> Result<Vec<Strategy>>;

    async fn save_asset(&self, project_id: &str, asset: &GeneratedAsset) -> Result<()>;

    /// A project's assets in creation order
    async fn list_assets(&self, project_id: &str) -> Result<Vec<GeneratedAsset>>;
}

/// SQLite-backed [`ProjectStore`]
#[derive(Debug, Clone)]
pub struct SqliteProjectStore {
    db: Database,
}

impl SqliteProjectStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn ensure_project(&self, project_id: &str) -> Result<()> {
        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_optional(self.db.pool())
            .await?;
        match exists {
            Some(_) => Ok(()),
            None => Err(Error::ProjectNotFound(project_id.to_string())),
        }
    }

    fn row_to_project(row: &SqliteRow) -> Result<Project> {
        let input_json: String = row.try_get("input_json")?;
        let status: String = row.try_get("status")?;
        Ok(Project {
            id: row.try_get("id")?,
            input: serde_json::from_str(&input_json)?,
            status: ProjectStatus::parse(&status)
                .ok_or_else(|| corrupt(format!("unknown project status '{}'", status)))?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }

    fn row_to_asset(row: &SqliteRow) -> Result<GeneratedAsset> {
        let asset_type: String = row.try_get("asset_type")?;
        let image_data: String = row.try_get("image_data")?;
        let metadata_json: String = row.try_get("metadata_json")?;
        Ok(GeneratedAsset {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            asset_type: AssetType::parse(&asset_type)
                .ok_or_else(|| corrupt(format!("unknown asset type '{}'", asset_type)))?,
            image: ImageDataUri::parse(&image_data)?,
            metadata: serde_json::from_str(&metadata_json)?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

fn corrupt(message: String) -> Error {
    Error::Database(sqlx::Error::Decode(message.into()))
}

#[async_trait]
impl ProjectStore for SqliteProjectStore {
    async fn create(&self, project: &Project) -> Result<String> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, business_name, input_json, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&project.id)
        .bind(&project.input.business_name)
        .bind(serde_json::to_string(&project.input)?)
        .bind(project.status.as_str())
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(self.db.pool())
        .await?;

        tracing::debug!(project_id = %project.id, "Project stored");
        Ok(project.id.clone())
    }

    async fn get(&self, project_id: &str) -> Result<Project> {
        let row = sqlx::query(
            r#"
            SELECT id, input_json, status, created_at, updated_at
            FROM projects WHERE id = ?
            "#,
        )
        .bind(project_id)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Self::row_to_project(&row),
            None => Err(Error::ProjectNotFound(project_id.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query(
            r#"
            SELECT id, input_json, status, created_at, updated_at
            FROM projects ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(Self::row_to_project).collect()
    }

    async fn update_status(&self, project_id: &str, status: ProjectStatus) -> Result<()> {
        let result = sqlx::query("UPDATE projects SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(project_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::ProjectNotFound(project_id.to_string()));
        }
        tracing::debug!(project_id, status = status.as_str(), "Project status updated");
        Ok(())
    }

    async fn save_strategy(&self, project_id: &str, strategy: &Strategy) -> Result<()> {
        if strategy.project_id != project_id {
            return Err(Error::Validation(format!(
                "strategy belongs to project '{}', not '{}'",
                strategy.project_id, project_id
            )));
        }
        self.ensure_project(project_id).await?;

        let json = serde_json::to_string(strategy)?;
        let mut tx = self.db.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO strategies (
                project_id, strategy_id, version, overall_confidence, consistency_seed,
                strategy_json, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_id) DO UPDATE SET
                strategy_id = excluded.strategy_id,
                version = excluded.version,
                overall_confidence = excluded.overall_confidence,
                consistency_seed = excluded.consistency_seed,
                strategy_json = excluded.strategy_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(project_id)
        .bind(&strategy.id)
        .bind(strategy.version)
        .bind(strategy.overall_confidence)
        .bind(&strategy.consistency_seed)
        .bind(&json)
        .bind(strategy.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO strategy_versions (project_id, version, strategy_json, recorded_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(project_id, version) DO UPDATE SET
                strategy_json = excluded.strategy_json,
                recorded_at = excluded.recorded_at
            "#,
        )
        .bind(project_id)
        .bind(strategy.version)
        .bind(&json)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(project_id, version = strategy.version, "Strategy stored");
        Ok(())
    }

    async fn get_strategy(&self, project_id: &str) -> Result<Option<Strategy>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT strategy_json FROM strategies WHERE project_id = ?")
                .bind(project_id)
                .fetch_optional(self.db.pool())
                .await?;

        row.map(|(json,)| serde_json::from_str(&json).map_err(Error::from))
            .transpose()
    }

    async fn strategy_history(&self, project_id: &str) -> Result<Vec<Strategy>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT strategy_json FROM strategy_versions WHERE project_id = ? ORDER BY version ASC",
        )
        .bind(project_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|(json,)| serde_json::from_str(&json).map_err(Error::from))
            .collect()
    }

    async fn save_asset(&self, project_id: &str, asset: &GeneratedAsset) -> Result<()> {
        if asset.project_id != project_id {
            return Err(Error::Validation(format!(
                "asset belongs to project '{}', not '{}'",
                asset.project_id, project_id
            )));
        }
        self.ensure_project(project_id).await?;

        sqlx::query(
            r#"
            INSERT INTO assets (
                id, project_id, asset_type, image_data, metadata_json, placeholder, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&asset.id)
        .bind(project_id)
        .bind(asset.asset_type.as_str())
        .bind(asset.image.as_str())
        .bind(serde_json::to_string(&asset.metadata)?)
        .bind(asset.is_placeholder())
        .bind(asset.created_at)
        .execute(self.db.pool())
        .await?;

        tracing::debug!(
            project_id,
            asset_id = %asset.id,
            asset_type = asset.asset_type.as_str(),
            "Asset stored"
        );
        Ok(())
    }

    async fn list_assets(&self, project_id: &str) -> Result<Vec<GeneratedAsset>> {
        let rows = sqlx::query(
            r#"
            SELECT id, project_id, asset_type, image_data, metadata_json, created_at
            FROM assets WHERE project_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(Self::row_to_asset).collect()
    }
}
