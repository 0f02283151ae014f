use std::path::PathBuf;

use thiserror::Error;

use crate::storage::DEFAULT_RESULTS_KEEP;
use crate::utils::{env_flag, env_opt, env_or, env_parse};

pub const DEFAULT_AUDIO_MESSAGE: &str =
    "Variations in Engine Acoustics Detected. Need immediate maintenance!";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub api_url: String,
    pub api_key: String,
    pub model_id: String,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub body_limit_bytes: usize,
    pub upload_dir: PathBuf,
    pub results_dir: PathBuf,
    pub results_keep: usize,
    pub public_base_url: String,
    pub detection: DetectionConfig,
    pub llm: LlmConfig,
    pub database_url: Option<String>,
    pub maintenance_lookup: bool,
    pub class_list_path: Option<PathBuf>,
    pub audio_message: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let body_limit_mb = env_parse::<usize>("BODY_LIMIT_MB", 10)?;
        let body_limit_bytes = body_limit_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| ConfigError::Invalid {
                key: "BODY_LIMIT_MB",
                value: body_limit_mb.to_string(),
            })?;
        let port = env_parse::<u16>("PORT", 8000)?;
        let results_keep = env_parse::<usize>("RESULTS_KEEP", DEFAULT_RESULTS_KEEP)?;
        if results_keep == 0 {
            return Err(ConfigError::Invalid {
                key: "RESULTS_KEEP",
                value: results_keep.to_string(),
            });
        }

        Ok(Config {
            port,
            body_limit_bytes,
            upload_dir: env_or("UPLOAD_DIR", "uploads").into(),
            results_dir: env_or("RESULTS_DIR", "results").into(),
            results_keep,
            public_base_url: env_or("PUBLIC_BASE_URL", "")
                .trim_end_matches('/')
                .to_string(),
            detection: DetectionConfig {
                api_url: env_or("ROBOFLOW_API_URL", "https://detect.roboflow.com"),
                api_key: env_or("ROBOFLOW_API_KEY", ""),
                model_id: env_or("ROBOFLOW_MODEL_ID", "innovation-hangar-v2/1"),
            },
            llm: LlmConfig {
                api_url: env_or("MISTRAL_API_URL", "https://api.mistral.ai"),
                api_key: env_or("MISTRAL_API_KEY", ""),
                model: env_or("MISTRAL_MODEL", "mistral-tiny"),
            },
            database_url: env_opt("DATABASE_URL"),
            maintenance_lookup: env_flag("MAINTENANCE_LOOKUP", true)?,
            class_list_path: env_opt("CLASS_LIST_PATH").map(PathBuf::from),
            audio_message: env_or("AUDIO_DIAGNOSTIC_MESSAGE", DEFAULT_AUDIO_MESSAGE),
        })
    }

    /// Logs the settings that will make upstream calls fail or features
    /// silently switch off.
    pub fn warn_on_gaps(&self) {
        if self.detection.api_key.is_empty() {
            tracing::warn!("ROBOFLOW_API_KEY is not set, detection requests will fail");
        }
        if self.llm.api_key.is_empty() {
            tracing::warn!("MISTRAL_API_KEY is not set, chat requests will fail");
        }
        if self.maintenance_lookup && self.database_url.is_none() {
            tracing::warn!(
                "MAINTENANCE_LOOKUP is enabled but DATABASE_URL is not set, enrichment disabled"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables are process wide, so everything touching them
    // lives in this single test.
    #[test]
    fn reads_defaults_and_rejects_bad_numbers() {
        std::env::remove_var("PORT");
        std::env::remove_var("BODY_LIMIT_MB");
        std::env::remove_var("RESULTS_KEEP");
        std::env::set_var("PUBLIC_BASE_URL", "https://example.test/");

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.body_limit_bytes, 10 * 1024 * 1024);
        assert_eq!(config.results_keep, DEFAULT_RESULTS_KEEP);
        assert_eq!(config.public_base_url, "https://example.test");
        assert_eq!(config.detection.model_id, "innovation-hangar-v2/1");
        assert_eq!(config.llm.model, "mistral-tiny");

        std::env::set_var("PORT", "not-a-port");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("PORT"));

        std::env::remove_var("PORT");

        // Parses as usize but overflows once converted to bytes.
        std::env::set_var("BODY_LIMIT_MB", usize::MAX.to_string());
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("BODY_LIMIT_MB"));
        std::env::set_var("BODY_LIMIT_MB", "25");
        assert_eq!(Config::from_env().unwrap().body_limit_bytes, 25 * 1024 * 1024);
        std::env::remove_var("BODY_LIMIT_MB");

        std::env::set_var("RESULTS_KEEP", "0");
        assert!(Config::from_env().unwrap_err().to_string().contains("RESULTS_KEEP"));
        std::env::set_var("RESULTS_KEEP", "7");
        assert_eq!(Config::from_env().unwrap().results_keep, 7);

        std::env::remove_var("RESULTS_KEEP");
        std::env::remove_var("PUBLIC_BASE_URL");
    }
}
