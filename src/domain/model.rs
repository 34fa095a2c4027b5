use std::fmt;

use serde::{Deserialize, Serialize};

use super::Quality;

/// One user submission. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub quality: Quality,
    pub audio_only: bool,
    pub ui_id: String,
    pub user_id: String,
    pub cloud_upload: bool,
}

/// A view/like/comment count as the backend reports it: sometimes a number,
/// sometimes an already formatted string like `"1.2M"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DisplayCount {
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl fmt::Display for DisplayCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayCount::Integer(n) => write!(f, "{}", n),
            DisplayCount::Decimal(n) => write!(f, "{}", n),
            DisplayCount::Text(s) => f.write_str(s),
        }
    }
}

/// Video metadata as delivered by the backend, either in the initiation
/// response or mid-stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub views: Option<DisplayCount>,
    #[serde(default)]
    pub likes: Option<DisplayCount>,
    #[serde(default)]
    pub comments: Option<DisplayCount>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

const MISSING_COUNT: &str = "—";

/// Display-ready preview of the target video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoPreview {
    pub title: String,
    pub thumbnail: String,
    pub description: String,
    pub views: DisplayCount,
    pub likes: DisplayCount,
    pub comments: DisplayCount,
    pub uploader: String,
    pub requested_url: String,
}

impl VideoPreview {
    /// Build a preview from backend metadata. `requested_url` comes from the
    /// metadata when present, otherwise from `fallback_url`.
    pub fn from_info(info: Option<&VideoInfo>, fallback_url: Option<&str>) -> Self {
        let info = info.cloned().unwrap_or_default();
        Self {
            title: info.title.unwrap_or_default(),
            thumbnail: info.thumbnail.unwrap_or_default(),
            description: info.description.unwrap_or_default(),
            views: info.views.unwrap_or(DisplayCount::Integer(0)),
            likes: info
                .likes
                .unwrap_or_else(|| DisplayCount::Text(MISSING_COUNT.to_string())),
            comments: info
                .comments
                .unwrap_or_else(|| DisplayCount::Text(MISSING_COUNT.to_string())),
            uploader: info.uploader.unwrap_or_default(),
            requested_url: info
                .url
                .or_else(|| fallback_url.map(str::to_string))
                .unwrap_or_default(),
        }
    }

    /// Replace this preview wholesale with `info`, carrying `requested_url`
    /// forward when the update does not supply one.
    pub fn amended(previous: Option<&VideoPreview>, info: &VideoInfo) -> Self {
        Self::from_info(
            Some(info),
            previous.map(|preview| preview.requested_url.as_str()),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Initializing,
    Streaming,
    Completed,
    Errored,
}

impl StreamPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamPhase::Completed | StreamPhase::Errored)
    }
}

/// Observable progress of one server-side download job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    pub percent: u8,
    pub status: String,
    pub phase: StreamPhase,
    pub error_message: Option<String>,
    pub final_download_url: Option<String>,
    pub preview: Option<VideoPreview>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            percent: 0,
            status: "Initializing...".to_string(),
            phase: StreamPhase::Initializing,
            error_message: None,
            final_download_url: None,
            preview: None,
        }
    }
}

impl ProgressState {
    pub fn completed(&self) -> bool {
        self.phase == StreamPhase::Completed
    }

    pub fn errored(&self) -> bool {
        self.phase == StreamPhase::Errored
    }
}

/// Where a finished file will be fetched from and the name offered when saving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePlan {
    pub download_url: String,
    pub suggested_filename: String,
}
