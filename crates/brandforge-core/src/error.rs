//! Error types for BrandForge

use thiserror::Error;

/// Result type alias using BrandForge's Error
pub type Result<T> = std::result::Result<T, Error>;

/// BrandForge error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Input errors (E001-E099)
    #[error("Invalid input: {0}")]
    Validation(String),

    // Entity errors (E100-E199)
    #[error("Project '{0}' not found. Run `brandforge projects list` to see all projects.")]
    ProjectNotFound(String),

    #[error("Brand strategy not generated yet for project '{0}'. Run `brandforge strategy {0}` first.")]
    StrategyMissing(String),

    #[error("Invalid project state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    // Upstream model errors (E200-E299)
    #[error("Upstream model error: {0}")]
    Upstream(String),

    #[error("Rate limited by model provider. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    #[error("Could not decode image payload: {0}")]
    Decode(String),

    #[error("Gemini API key missing. Set GEMINI_API_KEY or GOOGLE_API_KEY.")]
    ApiKeyMissing,

    #[error("Network error: {0}. Check your internet connection.")]
    Network(#[from] reqwest::Error),

    // Lock errors (E300-E399)
    #[error("Lock timeout: project '{0}' is busy with another generation. Try again later.")]
    LockTimeout(String),

    // Storage errors (E400-E499)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    Config(String),

    // Export errors (E700-E799)
    #[error("Export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E001",
            Self::ProjectNotFound(_) => "E100",
            Self::StrategyMissing(_) => "E101",
            Self::InvalidTransition { .. } => "E102",
            Self::Upstream(_) => "E200",
            Self::RateLimited(_) => "E201",
            Self::Decode(_) => "E202",
            Self::ApiKeyMissing => "E203",
            Self::Network(_) => "E204",
            Self::LockTimeout(_) => "E300",
            Self::Database(_) => "E400",
            Self::Serialization(_) => "E401",
            Self::Config(_) => "E600",
            Self::Export(_) => "E700",
            Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::ProjectNotFound(_) => Some("brandforge projects list".to_string()),
            Self::StrategyMissing(id) => Some(format!("brandforge strategy {}", id)),
            Self::ApiKeyMissing => Some("export GEMINI_API_KEY=<key>".to_string()),
            Self::Network(_) => Some("Check internet connection".to_string()),
            Self::Upstream(_) | Self::RateLimited(_) => {
                Some("Retry the request in a moment".to_string())
            }
            _ => None,
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Upstream(_)
                | Self::RateLimited(_)
                | Self::Network(_)
                | Self::Decode(_)
                | Self::LockTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(Error::Validation("x".into()).code(), "E001");
        assert_eq!(Error::ProjectNotFound("p".into()).code(), "E100");
        assert_eq!(Error::Upstream("boom".into()).code(), "E200");
        assert_eq!(Error::Decode("bad".into()).code(), "E202");
        assert_eq!(Error::LockTimeout("p".into()).code(), "E300");
    }

    #[test]
    fn test_strategy_missing_suggestion() {
        let error = Error::StrategyMissing("abc".to_string());
        assert_eq!(error.suggestion(), Some("brandforge strategy abc".to_string()));
        assert!(error.to_string().contains("abc"));
    }

    #[test]
    fn test_invalid_transition_message() {
        let error = Error::InvalidTransition {
            from: "new".to_string(),
            to: "package_ready".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid project state transition: new -> package_ready"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Upstream("timeout".into()).is_retryable());
        assert!(Error::RateLimited(5).is_retryable());
        assert!(!Error::Validation("missing name".into()).is_retryable());
        assert!(!Error::ProjectNotFound("p".into()).is_retryable());
    }
}
