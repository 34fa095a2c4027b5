use std::collections::VecDeque;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use thiserror::Error;

use super::models::{ApiConfig, CreateDownloadPayload, DownloadResponse};
use super::sse::{SseDecoder, StreamSignal};
use crate::domain::DownloadRequest;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Ask the backend to start a download job.
    /// Returns the job's request id and whatever metadata it already knows.
    pub async fn create_download(&self, request: &DownloadRequest) -> Result<DownloadResponse> {
        let payload = CreateDownloadPayload::from(request);

        let response = self
            .http
            .post(self.endpoint("/video"))
            .json(&payload)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::ApiError(format!("Download request failed: {}", e)))?;

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))
    }

    /// Open the server-push channel of a job.
    ///
    /// Nothing happens until the stream is polled. The stream yields `Opened`
    /// once the response headers arrive, one `Message` per event, and ends
    /// with a single `TransportError` if the connection fails or the server
    /// hangs up.
    pub fn event_stream(&self, request_id: &str) -> BoxStream<'static, StreamSignal> {
        let url = self.endpoint(&format!("/stream/{}", request_id));

        futures::stream::unfold(
            EventStreamState::Connect {
                http: self.http.clone(),
                url,
            },
            |state| async move {
                match state {
                    EventStreamState::Connect { http, url } => {
                        tracing::info!("Connecting to event stream {}", url);
                        let response = http
                            .get(&url)
                            .header(ACCEPT, "text/event-stream")
                            .header(CACHE_CONTROL, "no-cache")
                            .send()
                            .await
                            .and_then(|r| r.error_for_status());

                        match response {
                            Ok(response) => Some((
                                StreamSignal::Opened,
                                EventStreamState::Reading {
                                    body: response.bytes_stream().boxed(),
                                    decoder: SseDecoder::new(),
                                    queued: VecDeque::new(),
                                },
                            )),
                            Err(e) => Some((
                                StreamSignal::TransportError(e.to_string()),
                                EventStreamState::Finished,
                            )),
                        }
                    }
                    EventStreamState::Reading {
                        mut body,
                        mut decoder,
                        mut queued,
                    } => loop {
                        if let Some(data) = queued.pop_front() {
                            return Some((
                                StreamSignal::Message(data),
                                EventStreamState::Reading {
                                    body,
                                    decoder,
                                    queued,
                                },
                            ));
                        }

                        match body.next().await {
                            Some(Ok(chunk)) => queued.extend(decoder.push(&chunk)),
                            Some(Err(e)) => {
                                return Some((
                                    StreamSignal::TransportError(e.to_string()),
                                    EventStreamState::Finished,
                                ))
                            }
                            None => {
                                return Some((
                                    StreamSignal::TransportError(
                                        "event stream closed by server".to_string(),
                                    ),
                                    EventStreamState::Finished,
                                ))
                            }
                        }
                    },
                    EventStreamState::Finished => None,
                }
            },
        )
        .boxed()
    }

    /// Download file with progress stream
    /// Returns (total_size, stream)
    pub async fn download_file_stream(
        &self,
        download_url: &str,
    ) -> Result<(Option<u64>, impl Stream<Item = Result<bytes::Bytes>>)> {
        let response = self
            .http
            .get(download_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::ApiError(format!("Download request failed: {}", e)))?;

        let total_size = response.content_length();
        let stream = response.bytes_stream().map_err(ApiError::RequestError);

        Ok((total_size, stream))
    }
}

enum EventStreamState {
    Connect {
        http: Client,
        url: String,
    },
    Reading {
        body: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
        decoder: SseDecoder,
        queued: VecDeque<String>,
    },
    Finished,
}
