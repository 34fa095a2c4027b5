use serde_json::Value;

use crate::domain::{AppError, VideoInfo};

/// What a single pushed message means for the progress state.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// New metadata for the video being processed.
    PreviewUpdate(VideoInfo),
    /// Progress percentage, already rounded and clamped to `0..=100`.
    Progress { percent: u8, message: Option<String> },
    /// The job reports completion. The final message carries the file path;
    /// earlier notifications may not.
    Completed { download_path: Option<String> },
    /// Valid JSON that none of the rules above recognise.
    Unrecognised,
}

impl StreamEvent {
    /// Classify a raw payload. The first matching rule wins:
    /// `video_info`, then a numeric `percent`, then `status == "completed"`.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| AppError::MalformedEvent(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| AppError::MalformedEvent("payload is not a JSON object".to_string()))?;

        if let Some(info) = object.get("video_info").filter(|v| !v.is_null()) {
            let info: VideoInfo = serde_json::from_value(info.clone())
                .map_err(|e| AppError::MalformedEvent(format!("video_info: {}", e)))?;
            return Ok(StreamEvent::PreviewUpdate(info));
        }

        if let Some(percent) = object.get("percent").and_then(Value::as_f64) {
            return Ok(StreamEvent::Progress {
                percent: percent.round().clamp(0.0, 100.0) as u8,
                message: object
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }

        if object.get("status").and_then(Value::as_str) == Some("completed") {
            let download_path = object
                .get("result")
                .and_then(|result| result.get("download_url"))
                .and_then(Value::as_str)
                .filter(|path| !path.is_empty())
                .map(str::to_string);
            return Ok(StreamEvent::Completed { download_path });
        }

        Ok(StreamEvent::Unrecognised)
    }
}
