use std::path::Path;

use crate::config::schema::{Config, ImageStyle, CONFIG_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    log::debug!("Loading config from {}", path.display());
    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();

    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub(crate) fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.retry.max_attempts < 1 {
        return Err(ConfigError::Validation {
            message: "retry.max_attempts must be at least 1".to_string(),
        });
    }

    let scenes = config.workflow.default_max_scenes;
    if !(crate::story::MIN_SCENES..=crate::story::MAX_SCENES).contains(&scenes) {
        return Err(ConfigError::Validation {
            message: format!(
                "workflow.default_max_scenes must be between {} and {} (got {})",
                crate::story::MIN_SCENES,
                crate::story::MAX_SCENES,
                scenes
            ),
        });
    }

    if config.scenes.duration_secs < 1 {
        return Err(ConfigError::Validation {
            message: "scenes.duration_secs must be at least 1".to_string(),
        });
    }

    if config.stages.total() == 0 {
        return Err(ConfigError::Validation {
            message: "At least one stage weight must be positive".to_string(),
        });
    }

    Ok(())
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Validation {
                message: format!("{} must be a non-negative integer (got '{}')", name, raw),
            }),
        Err(_) => Ok(None),
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Applies `STORYREEL_*` environment overrides and re-validates.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(max_attempts) = env_number::<u32>("STORYREEL_MAX_RETRIES")? {
            self.retry.max_attempts = max_attempts;
        }
        if let Some(delay) = env_number::<u64>("STORYREEL_RETRY_DELAY_MS")? {
            self.retry.base_delay_ms = delay;
        }
        if let Some(voice_id) = env_string("STORYREEL_VOICE_ID") {
            self.voice.voice_id = voice_id;
        }
        if let Some(style) = env_string("STORYREEL_IMAGE_STYLE") {
            self.image.style = ImageStyle::parse_lenient(&style);
        }
        if let Some(path) = env_string("STORYREEL_DATABASE_PATH") {
            self.database.path = Some(path);
        }

        validate_config(self)
    }
}
