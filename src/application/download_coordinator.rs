use std::path::PathBuf;

use futures::{stream::BoxStream, StreamExt};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::{
    api::ApiClient,
    domain::{AppError, DownloadRequest, Quality, QualityPolicy, SavePlan, VideoPreview},
    utils::suggested_filename,
};

/// A job accepted by the backend.
#[derive(Debug, Clone)]
pub struct InitiatedDownload {
    pub request_id: String,
    pub preview: VideoPreview,
}

#[derive(Debug, Clone)]
pub enum SaveEvent {
    Progress(f32),
    Completed(PathBuf),
    Failed(AppError),
}

#[derive(Clone)]
pub struct DownloadCoordinator {
    api_client: ApiClient,
    policy: QualityPolicy,
}

impl DownloadCoordinator {
    pub fn new(api_client: ApiClient, policy: QualityPolicy) -> Self {
        Self { api_client, policy }
    }

    pub fn policy(&self) -> &QualityPolicy {
        &self.policy
    }

    /// Validate a submission and turn it into a request. Gated tiers are
    /// refused here so no request is ever sent for them.
    pub fn prepare_request(
        &self,
        url: &str,
        quality: Quality,
        audio_only: bool,
    ) -> Result<DownloadRequest, AppError> {
        let url = url.trim();
        let parsed = Url::parse(url).map_err(|_| AppError::InvalidInput)?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(AppError::InvalidInput);
        }
        let quality = self.policy.check(quality)?;

        let config = self.api_client.config();
        Ok(DownloadRequest {
            url: url.to_string(),
            quality,
            audio_only,
            ui_id: config.ui_id.clone(),
            user_id: config.user_id.clone(),
            cloud_upload: config.cloud_upload,
        })
    }

    /// Start the server-side job. Single attempt, no retries.
    pub async fn initiate(&self, request: DownloadRequest) -> Result<InitiatedDownload, AppError> {
        let response = self
            .api_client
            .create_download(&request)
            .await
            .map_err(|e| AppError::Api(e.to_string()))?;

        tracing::info!("Backend accepted download as request {}", response.request_id);
        let preview = VideoPreview::from_info(response.video_info.as_ref(), Some(&request.url));

        Ok(InitiatedDownload {
            request_id: response.request_id,
            preview,
        })
    }

    /// What to fetch and what to call it. `download_url` is the reconciler's
    /// `final_download_url()`, which is `ResourceUnavailable` until the job completes.
    pub fn plan_save(
        &self,
        download_url: Result<&str, AppError>,
        preview: Option<&VideoPreview>,
    ) -> Result<SavePlan, AppError> {
        let download_url = download_url?.to_string();
        let title = preview
            .map(|preview| preview.title.as_str())
            .unwrap_or_default();

        Ok(SavePlan {
            download_url,
            suggested_filename: suggested_filename(title),
        })
    }

    pub async fn choose_save_path(&self, suggested_filename: String) -> Option<PathBuf> {
        rfd::AsyncFileDialog::new()
            .set_file_name(&suggested_filename)
            .save_file()
            .await
            .map(|handle| handle.path().to_path_buf())
    }

    /// Fetch the finished file into `path`, reporting progress as a fraction.
    pub fn download_stream(&self, url: String, path: PathBuf) -> BoxStream<'static, SaveEvent> {
        futures::stream::unfold(
            SaveRuntimeState::Start {
                client: self.api_client.clone(),
                url,
                path,
            },
            |state| async move {
                match state {
                    SaveRuntimeState::Start { client, url, path } => {
                        let (total_size, stream) = match client.download_file_stream(&url).await {
                            Ok(response) => response,
                            Err(e) => {
                                return Some((
                                    SaveEvent::Failed(AppError::Api(e.to_string())),
                                    SaveRuntimeState::Finished,
                                ));
                            }
                        };

                        // Only touch the disk once the server has answered.
                        match tokio::fs::File::create(&path).await {
                            Ok(file) => Some((
                                SaveEvent::Progress(0.0),
                                SaveRuntimeState::Downloading {
                                    file,
                                    stream: stream.boxed(),
                                    downloaded: 0,
                                    total: total_size,
                                    path,
                                },
                            )),
                            Err(e) => Some((
                                SaveEvent::Failed(AppError::Io(format!(
                                    "Failed to create file: {}",
                                    e
                                ))),
                                SaveRuntimeState::Finished,
                            )),
                        }
                    }
                    SaveRuntimeState::Downloading {
                        mut file,
                        mut stream,
                        mut downloaded,
                        total,
                        path,
                    } => match stream.next().await {
                        Some(Ok(chunk)) => {
                            if let Err(e) = file.write_all(&chunk).await {
                                return Some((
                                    SaveEvent::Failed(AppError::Io(format!(
                                        "Write error: {}",
                                        e
                                    ))),
                                    SaveRuntimeState::Finished,
                                ));
                            }

                            downloaded += chunk.len() as u64;

                            let progress = match total {
                                Some(total_size) if total_size > 0 => {
                                    (downloaded as f32 / total_size as f32).min(1.0)
                                }
                                _ => 0.0,
                            };

                            Some((
                                SaveEvent::Progress(progress),
                                SaveRuntimeState::Downloading {
                                    file,
                                    stream,
                                    downloaded,
                                    total,
                                    path,
                                },
                            ))
                        }
                        Some(Err(e)) => Some((
                            SaveEvent::Failed(AppError::Api(e.to_string())),
                            SaveRuntimeState::Finished,
                        )),
                        None => {
                            if let Err(e) = file.sync_all().await {
                                return Some((
                                    SaveEvent::Failed(AppError::Io(format!(
                                        "Failed to sync file: {}",
                                        e
                                    ))),
                                    SaveRuntimeState::Finished,
                                ));
                            }

                            tracing::info!("Saved {} bytes to {}", downloaded, path.display());
                            Some((SaveEvent::Completed(path), SaveRuntimeState::Finished))
                        }
                    },
                    SaveRuntimeState::Finished => None,
                }
            },
        )
        .boxed()
    }
}

enum SaveRuntimeState {
    Start {
        client: ApiClient,
        url: String,
        path: PathBuf,
    },
    Downloading {
        file: tokio::fs::File,
        stream: BoxStream<'static, crate::api::Result<bytes::Bytes>>,
        downloaded: u64,
        total: Option<u64>,
        path: PathBuf,
    },
    Finished,
}
