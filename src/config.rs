use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{AppError, AppResult};

const APP_DIR_NAME: &str = "App Icon Uploader";
const MAX_FILE_SIZE_MB: u64 = 1024;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct UploaderConfig {
    pub base_url: String,
    pub tenant_id: String,
    pub upload_timeout_secs: u64,
    pub max_file_size_mb: u64,
    pub accepted_extensions: Vec<String>,
    pub locale: String,
    pub log_level: String,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/jober/v1/api".to_string(),
            tenant_id: "default".to_string(),
            upload_timeout_secs: 60,
            max_file_size_mb: 10,
            accepted_extensions: ["jpg", "png", "gif", "jpeg"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            locale: "en".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl UploaderConfig {
    /// Generic "upload failed" message for the configured locale
    pub fn upload_failed_message(&self) -> &'static str {
        match self.locale.as_str() {
            "zh" | "zh-CN" => "上传图片失败",
            _ => "Failed to upload the image",
        }
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

/// Initialize logging. `RUST_LOG` still overrides the configured level.
pub fn init_logging(config: &UploaderConfig) {
    let result = env_logger::Builder::new()
        .filter_level(config.log_level_filter())
        .parse_default_env()
        .try_init();

    if result.is_err() {
        log::debug!("Logger already initialized");
    }
}

fn get_config_path() -> AppResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| AppError::Config("Could not find config directory".to_string()))?
        .join(APP_DIR_NAME);

    fs::create_dir_all(&config_dir)?;
    Ok(config_dir.join("config.json"))
}

pub fn load_config() -> AppResult<UploaderConfig> {
    load_config_from(&get_config_path()?)
}

pub fn load_config_from(config_path: &Path) -> AppResult<UploaderConfig> {
    if config_path.exists() {
        let config_str = fs::read_to_string(config_path)?;
        let config: UploaderConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
            log::warn!("Failed to parse config file: {}. Using defaults.", e);
            UploaderConfig::default()
        });

        validate_config(&config)?;

        Ok(config)
    } else {
        let default_config = UploaderConfig::default();
        save_config_to(&default_config, config_path)?;
        Ok(default_config)
    }
}

pub fn save_config(config: &UploaderConfig) -> AppResult<()> {
    save_config_to(config, &get_config_path()?)
}

pub fn save_config_to(config: &UploaderConfig, config_path: &Path) -> AppResult<()> {
    validate_config(config)?;

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Create backup of existing config
    if config_path.exists() {
        let backup_path = config_path.with_extension("json.bak");
        if let Err(e) = fs::copy(config_path, &backup_path) {
            log::warn!("Failed to create config backup: {}", e);
        }
    }

    let config_str = serde_json::to_string_pretty(config)?;
    fs::write(config_path, config_str)?;

    log::info!("Configuration saved to {}", config_path.display());
    Ok(())
}

pub fn validate_config(config: &UploaderConfig) -> AppResult<()> {
    let base_url = config.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(AppError::validation(
            "base_url",
            "Must be an absolute http(s) URL",
        ));
    }

    let tenant_id = config.tenant_id.trim();
    if tenant_id.is_empty() || tenant_id.contains('/') {
        return Err(AppError::validation(
            "tenant_id",
            "Must be non-empty and contain no '/'",
        ));
    }

    if config.upload_timeout_secs == 0 || config.upload_timeout_secs > 600 {
        return Err(AppError::validation(
            "upload_timeout_secs",
            "Must be between 1 and 600",
        ));
    }

    if config.max_file_size_mb == 0 || config.max_file_size_mb > MAX_FILE_SIZE_MB {
        return Err(AppError::validation(
            "max_file_size_mb",
            "Must be between 1 and 1024",
        ));
    }

    if config.accepted_extensions.is_empty() {
        return Err(AppError::validation(
            "accepted_extensions",
            "At least one extension is required",
        ));
    }

    let valid_locales = ["en", "zh", "zh-CN"];
    if !valid_locales.contains(&config.locale.as_str()) {
        return Err(AppError::validation("locale", "Must be 'en', 'zh' or 'zh-CN'"));
    }

    let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
    if !valid_log_levels.contains(&config.log_level.as_str()) {
        return Err(AppError::validation("log_level", "Must be a valid log level"));
    }

    Ok(())
}

pub fn reset_config() -> AppResult<()> {
    reset_config_at(&get_config_path()?)
}

/// Overwrite the config with defaults, keeping the old file as `.reset_backup`
pub fn reset_config_at(config_path: &Path) -> AppResult<()> {
    if config_path.exists() {
        let backup_path = config_path.with_extension("json.reset_backup");
        fs::copy(config_path, &backup_path)?;
        log::info!("Existing config backed up to {}", backup_path.display());
    }

    save_config_to(&UploaderConfig::default(), config_path)?;

    log::info!("Configuration reset to defaults");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("app_icon_uploader_config_{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&UploaderConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_config_rejects_bad_values() {
        let mut config = UploaderConfig::default();
        config.base_url = "ftp://host".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = UploaderConfig::default();
        config.upload_timeout_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = UploaderConfig::default();
        config.max_file_size_mb = u64::MAX / 1024;
        assert!(validate_config(&config).is_err());

        let mut config = UploaderConfig::default();
        config.accepted_extensions.clear();
        assert!(validate_config(&config).is_err());

        let mut config = UploaderConfig::default();
        config.locale = "fr".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = UploaderConfig::default();
        config.tenant_id = "a/b".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_upload_failed_message_is_localized() {
        let mut config = UploaderConfig::default();
        assert_eq!(config.upload_failed_message(), "Failed to upload the image");
        config.locale = "zh".to_string();
        assert_eq!(config.upload_failed_message(), "上传图片失败");
    }

    #[test]
    fn test_load_creates_default_then_round_trips() {
        let path = temp_config_path("config.json");

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, UploaderConfig::default());
        assert!(path.exists());

        let mut changed = loaded.clone();
        changed.tenant_id = "tenant-42".to_string();
        changed.locale = "zh".to_string();
        save_config_to(&changed, &path).unwrap();
        assert!(path.with_extension("json.bak").exists());

        assert_eq!(load_config_from(&path).unwrap(), changed);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing_fields() {
        let path = temp_config_path("partial.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"tenant_id": "t-1", "max_file_size_mb": 2}"#).unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.tenant_id, "t-1");
        assert_eq!(config.max_file_size_mb, 2);
        assert_eq!(config.upload_timeout_secs, 60);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_reset_restores_defaults_and_keeps_backup() {
        let path = temp_config_path("config.json");
        let changed = UploaderConfig {
            tenant_id: "tenant-7".to_string(),
            ..UploaderConfig::default()
        };
        save_config_to(&changed, &path).unwrap();

        reset_config_at(&path).unwrap();

        assert_eq!(load_config_from(&path).unwrap(), UploaderConfig::default());
        let backup = fs::read_to_string(path.with_extension("json.reset_backup")).unwrap();
        assert!(backup.contains("tenant-7"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_init_logging_twice_does_not_panic() {
        let config = UploaderConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
