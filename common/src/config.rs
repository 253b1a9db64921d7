use crate::error::{Result, SqlaskError};
use crate::llm::model::{ModelConfig, DEFAULT_API_BASE, DEFAULT_MODEL};
use std::env;
use std::path::PathBuf;

const DEFAULT_DATABASE: &str = "sqlask.db";
const DEFAULT_SCHEMA_CACHE: &str = ".cache/schema.json";

pub(crate) fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

pub(crate) fn env_flag(key: &str) -> bool {
    env_value(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Resolved runtime settings. Each value comes from the explicit option,
/// then the environment, then the built-in default.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: PathBuf,
    pub schema_cache: PathBuf,
    pub model: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub translate: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub database: Option<PathBuf>,
    pub schema_cache: Option<PathBuf>,
    pub model: Option<String>,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub no_translate: bool,
}

impl Settings {
    pub fn resolve(overrides: SettingsOverrides) -> Self {
        let database = overrides
            .database
            .or_else(|| env_value("SQLASK_DATABASE").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));

        let schema_cache = overrides
            .schema_cache
            .or_else(|| env_value("SQLASK_SCHEMA_CACHE").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCHEMA_CACHE));

        let model = overrides
            .model
            .or_else(|| env_value("SQLASK_MODEL"))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let api_base = overrides
            .api_base
            .or_else(|| env_value("SQLASK_API_BASE"))
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let api_key = overrides
            .api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env_value("GOOGLE_API_KEY"));

        let translate = !(overrides.no_translate || env_flag("SQLASK_NO_TRANSLATE"));

        Self {
            database,
            schema_cache,
            model,
            api_base,
            api_key,
            translate,
        }
    }

    /// Model settings for generation; requires an api key.
    pub fn model_config(&self) -> Result<ModelConfig> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            SqlaskError::Config("GOOGLE_API_KEY is not set (use --api-key)".to_string())
        })?;
        let mut config = ModelConfig::new(api_key);
        config.model = self.model.clone();
        config.api_base = self.api_base.clone();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_values_win() {
        let settings = Settings::resolve(SettingsOverrides {
            database: Some(PathBuf::from("school.db")),
            schema_cache: Some(PathBuf::from("/tmp/s.json")),
            model: Some("gemini-test".to_string()),
            api_base: Some("http://localhost:1".to_string()),
            api_key: Some("k".to_string()),
            no_translate: true,
        });

        assert_eq!(settings.database, PathBuf::from("school.db"));
        assert_eq!(settings.model, "gemini-test");
        assert!(!settings.translate);

        let config = settings.model_config().unwrap();
        assert_eq!(config.model, "gemini-test");
        assert_eq!(config.api_base, "http://localhost:1");
        assert_eq!(config.api_key, "k");
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let settings = Settings::resolve(SettingsOverrides {
            api_key: Some("  ".to_string()),
            ..Default::default()
        });
        // falls through to the environment, which may or may not hold a key
        assert_eq!(settings.api_key, env_value("GOOGLE_API_KEY"));
    }
}
