use serde::{Deserialize, Serialize};

use crate::domain::{DownloadRequest, VideoInfo};

/// Body of `POST /video`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDownloadPayload {
    pub url: String,
    pub quality: String,
    pub audio_only: bool,
    pub ui_id: String,
    pub user_id: String,
    pub cloud_upload: bool,
}

impl From<&DownloadRequest> for CreateDownloadPayload {
    fn from(request: &DownloadRequest) -> Self {
        Self {
            url: request.url.clone(),
            quality: request.quality.label().to_string(),
            audio_only: request.audio_only,
            ui_id: request.ui_id.clone(),
            user_id: request.user_id.clone(),
            cloud_upload: request.cloud_upload,
        }
    }
}

/// Response from `POST /video`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadResponse {
    pub request_id: String,
    #[serde(default)]
    pub video_info: Option<VideoInfo>,
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Origin serving `/video` and `/stream/{id}`
    pub api_base: String,
    /// Origin relative download paths are resolved against
    pub download_base: String,
    pub user_id: String,
    pub ui_id: String,
    pub cloud_upload: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://videosaver.online".to_string(),
            download_base: "https://videosaver.online".to_string(),
            user_id: "anonymous".to_string(),
            ui_id: format!("desktop-{}", crate::utils::get_timestamp()),
            cloud_upload: false,
        }
    }
}
