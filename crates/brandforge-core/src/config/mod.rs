//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::domain::asset::AssetType;

/// Environment variables consulted for the Gemini key, in priority order
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// BrandForge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub lock_timeout_secs: u64,
    pub package_types: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file; defaults to `brandforge.db` next to the config file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            text_model: "gemini-2.0-flash".to_string(),
            image_model: "gemini-2.5-flash-image-preview".to_string(),
            temperature: 0.7,
            timeout_secs: 180,
            max_retries: 3,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 2000,
            lock_timeout_secs: 300,
            package_types: AssetType::package_defaults()
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
        }
    }
}

impl GeminiConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolve_api_key_with(|name| env::var(name).ok())
    }

    /// Resolve the key through an arbitrary lookup, first non-blank match wins
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> anyhow::Result<Option<String>>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.enforce_env_only()?;

        Ok(API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|value| !value.trim().is_empty()))
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| opt.map(|key| redact(&key)))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "Gemini API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

impl GenerationConfig {
    /// Parsed package types, duplicates kept for the orchestrator to collapse
    pub fn asset_types(&self) -> anyhow::Result<Vec<AssetType>> {
        self.package_types
            .iter()
            .map(|name| AssetType::parse(name).ok_or_else(|| anyhow!("Unknown asset type: {}", name)))
            .collect()
    }
}

fn redact(key: &str) -> String {
    if key.len() <= 4 {
        "***".to_string()
    } else {
        format!("***{}", &key[key.len() - 4..])
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("BRANDFORGE_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("brandforge")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Database file, either configured or inside the config directory
    pub fn database_path(&self) -> anyhow::Result<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("brandforge.db")),
        }
    }

    /// Load configuration from file, or defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.gemini.enforce_env_only()?;

        if self.generation.max_attempts == 0 {
            return Err(anyhow!("generation.max_attempts must be at least 1"));
        }
        if self.generation.package_types.is_empty() {
            return Err(anyhow!("generation.package_types must name at least one asset type"));
        }
        self.generation.asset_types()?;
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "gemini.base_url" => Ok(self.gemini.base_url.clone()),
            "gemini.text_model" => Ok(self.gemini.text_model.clone()),
            "gemini.image_model" => Ok(self.gemini.image_model.clone()),
            "gemini.temperature" => Ok(self.gemini.temperature.to_string()),
            "gemini.timeout_secs" => Ok(self.gemini.timeout_secs.to_string()),
            "gemini.max_retries" => Ok(self.gemini.max_retries.to_string()),

            "generation.max_attempts" => Ok(self.generation.max_attempts.to_string()),
            "generation.retry_delay_ms" => Ok(self.generation.retry_delay_ms.to_string()),
            "generation.lock_timeout_secs" => Ok(self.generation.lock_timeout_secs.to_string()),
            "generation.package_types" => Ok(self.generation.package_types.join(", ")),

            "storage.database_path" => Ok(self.database_path()?.display().to_string()),

            "gemini.api_key" | "api_key" => match self.gemini.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok("(not set - use GEMINI_API_KEY or GOOGLE_API_KEY env var)".to_string()),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `brandforge config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "gemini.base_url" => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(anyhow!("Base URL must start with http:// or https://"));
                }
                self.gemini.base_url = value.trim_end_matches('/').to_string();
            }
            "gemini.text_model" => {
                self.gemini.text_model = non_empty(key, value)?;
            }
            "gemini.image_model" => {
                self.gemini.image_model = non_empty(key, value)?;
            }
            "gemini.temperature" => {
                let temp: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid temperature value: {}", value))?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.gemini.temperature = temp;
            }
            "gemini.timeout_secs" => {
                self.gemini.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }
            "gemini.max_retries" => {
                self.gemini.max_retries = value
                    .parse()
                    .with_context(|| format!("Invalid max_retries value: {}", value))?;
            }

            "generation.max_attempts" => {
                let attempts: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid max_attempts value: {}", value))?;
                if attempts == 0 {
                    return Err(anyhow!("max_attempts must be at least 1"));
                }
                self.generation.max_attempts = attempts;
            }
            "generation.retry_delay_ms" => {
                self.generation.retry_delay_ms = value
                    .parse()
                    .with_context(|| format!("Invalid retry_delay_ms value: {}", value))?;
            }
            "generation.lock_timeout_secs" => {
                self.generation.lock_timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid lock_timeout_secs value: {}", value))?;
            }
            "generation.package_types" => {
                let types: Vec<String> = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if let Some(unknown) = types.iter().find(|t| AssetType::parse(t).is_none()) {
                    return Err(anyhow!(
                        "Unknown asset type: {}. Valid options: {}",
                        unknown,
                        AssetType::ALL
                            .iter()
                            .map(|t| t.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ));
                }
                if types.is_empty() {
                    return Err(anyhow!("package_types must name at least one asset type"));
                }
                self.generation.package_types = types;
            }

            "storage.database_path" => {
                self.storage.database_path = Some(PathBuf::from(non_empty(key, value)?));
            }

            "gemini.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the GEMINI_API_KEY or GOOGLE_API_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `brandforge config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "gemini.base_url",
            "gemini.text_model",
            "gemini.image_model",
            "gemini.temperature",
            "gemini.timeout_secs",
            "gemini.max_retries",
            "gemini.api_key",
            "generation.max_attempts",
            "generation.retry_delay_ms",
            "generation.lock_timeout_secs",
            "generation.package_types",
            "storage.database_path",
        ];

        keys.into_iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn non_empty(key: &str, value: &str) -> anyhow::Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("{} cannot be empty", key));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.gemini.text_model, "gemini-2.0-flash");
        assert_eq!(config.gemini.image_model, "gemini-2.5-flash-image-preview");
        assert_eq!(config.gemini.timeout_secs, 180);
        assert_eq!(config.generation.max_attempts, 3);
        assert_eq!(config.generation.retry_delay_ms, 2000);
        assert_eq!(config.generation.lock_timeout_secs, 300);
        assert_eq!(config.generation.package_types.len(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stored_api_key_rejected() {
        let mut config = Config::default();
        config.gemini.api_key = Some("secret".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_set_api_key_rejected() {
        let mut config = Config::default();
        assert!(config.set("gemini.api_key", "secret").is_err());
        assert!(config.set("api_key", "secret").is_err());
    }

    #[test]
    fn test_api_key_priority_and_blank_skip() {
        let config = GeminiConfig::default();

        let both = config
            .resolve_api_key_with(|name| match name {
                "GEMINI_API_KEY" => Some("gemini-key".to_string()),
                "GOOGLE_API_KEY" => Some("google-key".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(both.as_deref(), Some("gemini-key"));

        let fallback = config
            .resolve_api_key_with(|name| match name {
                "GEMINI_API_KEY" => Some("  ".to_string()),
                "GOOGLE_API_KEY" => Some("google-key".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(fallback.as_deref(), Some("google-key"));

        assert!(config.resolve_api_key_with(|_| None).unwrap().is_none());
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("abc"), "***");
        assert_eq!(redact("AIzaSyExample1234"), "***1234");
    }

    #[test]
    fn test_set_and_get_roundtrip() {
        let mut config = Config::default();
        config.set("generation.max_attempts", "5").unwrap();
        config.set("gemini.temperature", "0.2").unwrap();
        config.set("generation.package_types", "logo, banner").unwrap();

        assert_eq!(config.get("generation.max_attempts").unwrap(), "5");
        assert_eq!(config.get("gemini.temperature").unwrap(), "0.2");
        assert_eq!(config.get("generation.package_types").unwrap(), "logo, banner");
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.set("generation.max_attempts", "0").is_err());
        assert!(config.set("gemini.temperature", "3.5").is_err());
        assert!(config.set("generation.package_types", "logo, hologram").is_err());
        assert!(config.set("gemini.base_url", "ftp://example").is_err());
        assert!(config.set("no.such.key", "1").is_err());
    }

    #[test]
    fn test_toml_roundtrip_omits_api_key() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(!text.contains("api_key"));

        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.generation.package_types, config.generation.package_types);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("[generation]\nmax_attempts = 4\n").unwrap();
        assert_eq!(parsed.generation.max_attempts, 4);
        assert_eq!(parsed.generation.retry_delay_ms, 2000);
        assert_eq!(parsed.gemini.text_model, "gemini-2.0-flash");
    }
}
