//! Brand projects and their lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

fn default_style() -> String {
    "modern".to_string()
}

fn default_colors() -> String {
    "flexible".to_string()
}

/// What a business tells us about itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessInput {
    pub business_name: String,
    pub business_description: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default)]
    pub business_values: Vec<String>,
    #[serde(default = "default_style")]
    pub preferred_style: String,
    #[serde(default = "default_colors")]
    pub preferred_colors: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_requirements: Option<String>,
}

impl BusinessInput {
    /// Create input with the two required fields and defaults elsewhere
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            business_name: name.into(),
            business_description: description.into(),
            industry: String::new(),
            target_audience: String::new(),
            business_values: Vec::new(),
            preferred_style: default_style(),
            preferred_colors: default_colors(),
            business_stage: None,
            special_requirements: None,
        }
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = industry.into();
        self
    }

    pub fn with_target_audience(mut self, audience: impl Into<String>) -> Self {
        self.target_audience = audience.into();
        self
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.business_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.preferred_style = style.into();
        self
    }

    pub fn with_colors(mut self, colors: impl Into<String>) -> Self {
        self.preferred_colors = colors.into();
        self
    }

    /// Reject inputs missing the fields every prompt depends on
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.business_name.trim().is_empty() {
            missing.push("business_name");
        }
        if self.business_description.trim().is_empty() {
            missing.push("business_description");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Values joined for prompt text
    pub fn values_line(&self) -> String {
        if self.business_values.is_empty() {
            "not specified".to_string()
        } else {
            self.business_values.join(", ")
        }
    }
}

/// Project lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    New,
    StrategyReady,
    AssetsInProgress,
    PackageReady,
}

/// Things that happen to a project which may move its state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    StrategyGenerated,
    AssetGenerationStarted,
    PackageGenerationStarted,
    PackageCompleted,
}

impl ProjectStatus {
    /// Convert to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::New => "new",
            ProjectStatus::StrategyReady => "strategy_ready",
            ProjectStatus::AssetsInProgress => "assets_in_progress",
            ProjectStatus::PackageReady => "package_ready",
        }
    }

    /// Parse from database string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(ProjectStatus::New),
            "strategy_ready" => Some(ProjectStatus::StrategyReady),
            "assets_in_progress" => Some(ProjectStatus::AssetsInProgress),
            "package_ready" => Some(ProjectStatus::PackageReady),
            _ => None,
        }
    }

    /// Whether a direct state change is allowed
    pub fn can_transition_to(&self, next: ProjectStatus) -> bool {
        use ProjectStatus::*;
        matches!(
            (*self, next),
            (_, StrategyReady)
                | (StrategyReady, AssetsInProgress)
                | (AssetsInProgress, PackageReady)
                | (PackageReady, AssetsInProgress)
        )
    }

    /// Validate a direct state change
    pub fn transition_to(&self, next: ProjectStatus) -> Result<ProjectStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(self.invalid(next))
        }
    }

    /// Resulting state after an event; unchanged states are not transitions
    pub fn apply(&self, event: LifecycleEvent) -> Result<ProjectStatus> {
        use ProjectStatus::*;
        match (event, *self) {
            (LifecycleEvent::StrategyGenerated, _) => Ok(StrategyReady),

            (LifecycleEvent::AssetGenerationStarted, StrategyReady) => Ok(AssetsInProgress),
            (LifecycleEvent::AssetGenerationStarted, state @ (AssetsInProgress | PackageReady)) => {
                Ok(state)
            }

            (LifecycleEvent::PackageGenerationStarted, StrategyReady | PackageReady) => {
                Ok(AssetsInProgress)
            }
            (LifecycleEvent::PackageGenerationStarted, AssetsInProgress) => Ok(AssetsInProgress),

            (LifecycleEvent::PackageCompleted, AssetsInProgress) => Ok(PackageReady),

            (LifecycleEvent::AssetGenerationStarted | LifecycleEvent::PackageGenerationStarted, New) => {
                Err(self.invalid(AssetsInProgress))
            }
            (LifecycleEvent::PackageCompleted, state) => Err(state.invalid(PackageReady)),
        }
    }

    fn invalid(&self, next: ProjectStatus) -> Error {
        Error::InvalidTransition {
            from: self.as_str().to_string(),
            to: next.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A brand project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique project identifier (UUID v4)
    pub id: String,
    /// Business details the brand is built from
    pub input: BusinessInput,
    /// Lifecycle state
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a new project in the `new` state
    pub fn new(input: BusinessInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            input,
            status: ProjectStatus::New,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn business_name(&self) -> &str {
        &self.input.business_name
    }
}
