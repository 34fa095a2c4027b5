//! Start-up configuration, read from `VIDEOSAVER_*` environment variables.

use url::Url;

use crate::api::ApiConfig;
use crate::domain::{AppError, QualityPolicy};

const API_BASE: &str = "VIDEOSAVER_API_BASE";
const DOWNLOAD_BASE: &str = "VIDEOSAVER_DOWNLOAD_BASE";
const USER_ID: &str = "VIDEOSAVER_USER_ID";
const UI_ID: &str = "VIDEOSAVER_UI_ID";
const CLOUD_UPLOAD: &str = "VIDEOSAVER_CLOUD_UPLOAD";
const GATED_QUALITIES: &str = "VIDEOSAVER_GATED_QUALITIES";
const MONOTONIC_PROGRESS: &str = "VIDEOSAVER_MONOTONIC_PROGRESS";

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub quality_policy: QualityPolicy,
    pub monotonic_progress: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Unset or blank keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = AppConfig::default();

        if let Some(base) = get(API_BASE) {
            config.api.api_base = parse_base(API_BASE, &base)?;
            config.api.download_base = config.api.api_base.clone();
        }
        if let Some(base) = get(DOWNLOAD_BASE) {
            config.api.download_base = parse_base(DOWNLOAD_BASE, &base)?;
        }
        if let Some(user_id) = get(USER_ID) {
            config.api.user_id = user_id;
        }
        if let Some(ui_id) = get(UI_ID) {
            config.api.ui_id = ui_id;
        }
        if let Some(flag) = get(CLOUD_UPLOAD) {
            config.api.cloud_upload = parse_flag(CLOUD_UPLOAD, &flag)?;
        }
        // Set-but-empty means "nothing gated", so read this one without the blank filter.
        if let Some(list) = lookup(GATED_QUALITIES) {
            config.quality_policy = QualityPolicy::parse(&list)?;
        }
        if let Some(flag) = get(MONOTONIC_PROGRESS) {
            config.monotonic_progress = parse_flag(MONOTONIC_PROGRESS, &flag)?;
        }

        Ok(config)
    }
}

fn parse_base(key: &str, value: &str) -> Result<String, AppError> {
    let url = Url::parse(value).map_err(|e| AppError::Config(format!("{}: {}", key, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Config(format!(
            "{}: expected an http(s) URL, got '{}'",
            key, value
        )));
    }
    Ok(value.trim_end_matches('/').to_string())
}

fn parse_flag(key: &str, value: &str) -> Result<bool, AppError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Config(format!(
            "{}: expected a boolean, got '{}'",
            key, value
        ))),
    }
}
