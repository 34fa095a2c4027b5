//! Reconciles the pushed progress messages of one download job into a
//! [`ProgressState`] and owns the connection those messages arrive on.
//!
//! Events must be delivered serially. The reconciler never blocks; it is
//! driven entirely by [`ProgressReconciler::handle`] (or the individual
//! `on_*` methods), and callers read the result through
//! [`ProgressReconciler::state`] after each delivery.

use futures::stream::{AbortHandle, Abortable, BoxStream, StreamExt};

use super::events::StreamEvent;
use crate::api::{ApiClient, StreamSignal};
use crate::domain::{AppError, ProgressState, StreamPhase, VideoPreview};
use crate::utils::resolve_download_url;

/// An open push connection. Closing must be safe from any state and any
/// number of times.
pub trait StreamHandle {
    fn close(&mut self);
}

/// Opens push connections for request ids.
pub trait StreamSource {
    type Handle: StreamHandle;

    fn open(&mut self, request_id: &str) -> Self::Handle;
}

pub struct ProgressReconciler<S: StreamSource> {
    source: S,
    handle: Option<S::Handle>,
    request_id: Option<String>,
    download_base: String,
    monotonic: bool,
    state: ProgressState,
}

impl<S: StreamSource> ProgressReconciler<S> {
    pub fn new(source: S, download_base: impl Into<String>) -> Self {
        Self {
            source,
            handle: None,
            request_id: None,
            download_base: download_base.into(),
            monotonic: false,
            state: ProgressState::default(),
        }
    }

    /// Refuse progress updates lower than the last applied percentage.
    /// Off by default: the backend's numbers are shown as they come.
    pub fn with_monotonic_progress(mut self, monotonic: bool) -> Self {
        self.monotonic = monotonic;
        self
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// The resolved file URL, once the job has completed.
    pub fn final_download_url(&self) -> Result<&str, AppError> {
        self.state
            .final_download_url
            .as_deref()
            .filter(|_| self.state.completed())
            .ok_or(AppError::ResourceUnavailable)
    }

    /// Begin tracking `request_id`. Any stream still open from an earlier
    /// start is closed first, then exactly one new connection is opened.
    pub fn start(
        &mut self,
        request_id: &str,
        preview: Option<VideoPreview>,
    ) -> Result<(), AppError> {
        self.close_stream();
        self.state = ProgressState {
            preview,
            ..ProgressState::default()
        };

        let request_id = request_id.trim();
        if request_id.is_empty() {
            tracing::error!("Refusing to stream without a request id");
            self.request_id = None;
            self.state.phase = StreamPhase::Errored;
            self.state.error_message = Some(AppError::InvalidRequest.to_string());
            return Err(AppError::InvalidRequest);
        }

        tracing::info!("Opening progress stream for request {}", request_id);
        self.request_id = Some(request_id.to_string());
        self.handle = Some(self.source.open(request_id));
        Ok(())
    }

    /// Route a transport signal to the matching handler.
    pub fn handle(&mut self, signal: StreamSignal) {
        match signal {
            StreamSignal::Opened => self.on_open(),
            StreamSignal::Message(raw) => self.on_event(&raw),
            StreamSignal::TransportError(detail) => self.on_transport_error(&detail),
        }
    }

    pub fn on_open(&mut self) {
        if self.accepting() && self.state.phase == StreamPhase::Initializing {
            tracing::debug!("Progress stream connected");
            self.state.phase = StreamPhase::Streaming;
        }
    }

    pub fn on_event(&mut self, raw: &str) {
        if !self.accepting() {
            tracing::debug!("Ignoring event on an inactive stream: {}", raw);
            return;
        }
        tracing::debug!("Raw stream payload: {}", raw);

        let event = match StreamEvent::parse(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Dropping stream payload {:?}: {}", raw, e);
                return;
            }
        };

        match event {
            StreamEvent::PreviewUpdate(info) => {
                tracing::debug!("Preview update: {:?}", info);
                self.state.preview = Some(VideoPreview::amended(self.state.preview.as_ref(), &info));
            }
            StreamEvent::Progress { percent, message } => {
                if self.monotonic && percent < self.state.percent {
                    tracing::debug!(
                        "Ignoring regressing progress {}% (currently {}%)",
                        percent,
                        self.state.percent
                    );
                } else {
                    self.state.percent = percent;
                }
                if let Some(message) = message {
                    self.state.status = message;
                }
            }
            StreamEvent::Completed {
                download_path: None,
            } => {
                tracing::warn!("Completion reported without a download_url, waiting for the final message");
                return;
            }
            StreamEvent::Completed {
                download_path: Some(path),
            } => {
                let url = resolve_download_url(&path, &self.download_base);
                tracing::info!("Download ready at {}", url);
                self.state.final_download_url = Some(url);
                self.state.phase = StreamPhase::Completed;
                self.close_stream();
                return;
            }
            StreamEvent::Unrecognised => {
                tracing::debug!("Unrecognised stream payload: {}", raw);
                return;
            }
        }

        if self.state.phase == StreamPhase::Initializing {
            self.state.phase = StreamPhase::Streaming;
        }
    }

    pub fn on_transport_error(&mut self, detail: &str) {
        if self.state.completed() {
            tracing::debug!("Ignoring transport error after completion: {}", detail);
            self.close_stream();
            return;
        }
        if !self.accepting() {
            tracing::debug!("Ignoring transport error on an inactive stream: {}", detail);
            return;
        }

        tracing::error!("Progress stream connection error: {}", detail);
        self.state.phase = StreamPhase::Errored;
        self.state.error_message = Some(AppError::Transport(detail.to_string()).to_string());
        self.close_stream();
    }

    /// Release the connection if one is open. State is left as it is.
    pub fn stop(&mut self) {
        if self.handle.is_some() {
            tracing::debug!("Stopping progress stream");
        }
        self.close_stream();
    }

    fn accepting(&self) -> bool {
        self.handle.is_some() && !self.state.phase.is_terminal()
    }

    fn close_stream(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
    }
}

impl<S: StreamSource> Drop for ProgressReconciler<S> {
    fn drop(&mut self) {
        self.close_stream();
    }
}

/// [`StreamSource`] backed by the backend's Server-Sent-Events endpoint.
///
/// `open` only builds the stream. The caller picks it up with
/// [`SseStreamSource::take_pending`] and drives it on its runtime, feeding
/// every signal back into the reconciler.
pub struct SseStreamSource {
    client: ApiClient,
    pending: Option<BoxStream<'static, StreamSignal>>,
}

impl SseStreamSource {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            pending: None,
        }
    }

    pub fn take_pending(&mut self) -> Option<BoxStream<'static, StreamSignal>> {
        self.pending.take()
    }
}

impl StreamSource for SseStreamSource {
    type Handle = SseHandle;

    fn open(&mut self, request_id: &str) -> SseHandle {
        let (abort, registration) = AbortHandle::new_pair();
        let stream = Abortable::new(self.client.event_stream(request_id), registration);
        self.pending = Some(stream.boxed());
        SseHandle { abort }
    }
}

pub struct SseHandle {
    abort: AbortHandle,
}

impl StreamHandle for SseHandle {
    fn close(&mut self) {
        self.abort.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiConfig;
    use crate::domain::{DisplayCount, VideoInfo};
    use std::cell::RefCell;
    use std::rc::Rc;

    const BASE: &str = "https://videosaver.online";

    #[derive(Clone, Default)]
    struct FakeSource {
        log: Rc<RefCell<Vec<String>>>,
    }

    impl FakeSource {
        fn log(&self) -> Vec<String> {
            self.log.borrow().clone()
        }

        fn opens(&self) -> usize {
            self.log().iter().filter(|e| e.starts_with("open")).count()
        }

        fn closes(&self) -> usize {
            self.log().iter().filter(|e| e.starts_with("close")).count()
        }
    }

    struct FakeHandle {
        id: String,
        log: Rc<RefCell<Vec<String>>>,
        closed: bool,
    }

    impl StreamHandle for FakeHandle {
        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.log.borrow_mut().push(format!("close {}", self.id));
            }
        }
    }

    impl StreamSource for FakeSource {
        type Handle = FakeHandle;

        fn open(&mut self, request_id: &str) -> FakeHandle {
            self.log.borrow_mut().push(format!("open {}", request_id));
            FakeHandle {
                id: request_id.to_string(),
                log: self.log.clone(),
                closed: false,
            }
        }
    }

    fn reconciler() -> (ProgressReconciler<FakeSource>, FakeSource) {
        let source = FakeSource::default();
        (ProgressReconciler::new(source.clone(), BASE), source)
    }

    fn started() -> (ProgressReconciler<FakeSource>, FakeSource) {
        let (mut reconciler, source) = reconciler();
        reconciler.start("r1", None).unwrap();
        reconciler.on_open();
        (reconciler, source)
    }

    #[test]
    fn test_blank_request_ids_never_open_a_stream() {
        for id in ["", "   ", "\t\n"] {
            let (mut reconciler, source) = reconciler();
            assert_eq!(reconciler.start(id, None), Err(AppError::InvalidRequest));
            assert_eq!(source.opens(), 0);
            assert!(reconciler.state().errored());
            assert_eq!(
                reconciler.state().error_message.as_deref(),
                Some("Invalid request ID.")
            );
            assert!(!reconciler.is_connected());
        }
    }

    #[test]
    fn test_start_seeds_preview_and_opens_once() {
        let (mut reconciler, source) = reconciler();
        let preview = VideoPreview::from_info(None, Some("https://youtu.be/abc"));
        reconciler.start(" r1 ", Some(preview.clone())).unwrap();

        assert_eq!(source.log(), vec!["open r1"]);
        assert_eq!(reconciler.request_id(), Some("r1"));
        assert_eq!(reconciler.state().preview, Some(preview));
        assert_eq!(reconciler.state().phase, StreamPhase::Initializing);

        reconciler.on_open();
        assert_eq!(reconciler.state().phase, StreamPhase::Streaming);
    }

    #[test]
    fn test_full_download_scenario() {
        let (mut reconciler, source) = started();

        reconciler.on_event(r#"{"percent":10,"message":"starting"}"#);
        assert_eq!(reconciler.state().percent, 10);
        assert_eq!(reconciler.state().status, "starting");
        assert!(!reconciler.state().completed());

        let before = reconciler.state().clone();
        reconciler.on_event(r#"{"status":"completed","result":{}}"#);
        assert_eq!(reconciler.state(), &before);
        assert!(reconciler.is_connected());

        reconciler.on_event(r#"{"status":"completed","result":{"download_url":"/out/v.mp4"}}"#);
        assert!(reconciler.state().completed());
        assert_eq!(
            reconciler.state().final_download_url.as_deref(),
            Some("https://videosaver.online/out/v.mp4")
        );
        assert_eq!(reconciler.final_download_url(), Ok("https://videosaver.online/out/v.mp4"));
        assert!(!reconciler.is_connected());
        assert_eq!(source.log(), vec!["open r1", "close r1"]);
    }

    #[test]
    fn test_late_transport_error_after_completion_is_ignored() {
        let (mut reconciler, _source) = started();
        reconciler.on_event(r#"{"status":"completed","result":{"download_url":"https://cdn/x.mp4"}}"#);

        reconciler.on_transport_error("stream closed");
        assert!(!reconciler.state().errored());
        assert!(reconciler.state().completed());
        assert!(reconciler.state().error_message.is_none());
    }

    #[test]
    fn test_nothing_changes_after_completion() {
        let (mut reconciler, _source) = started();
        reconciler.on_event(r#"{"percent":90,"message":"muxing"}"#);
        reconciler.on_event(r#"{"status":"completed","result":{"download_url":"/out/v.mp4"}}"#);
        let finished = reconciler.state().clone();

        reconciler.on_event(r#"{"percent":5,"message":"again"}"#);
        reconciler.on_event(r#"{"status":"completed","result":{"download_url":"/other.mp4"}}"#);
        reconciler.on_event(r#"{"video_info":{"title":"late"}}"#);
        reconciler.on_transport_error("boom");
        assert_eq!(reconciler.state(), &finished);
    }

    #[test]
    fn test_transport_error_while_streaming() {
        let (mut reconciler, source) = started();
        reconciler.on_event(r#"{"percent":30}"#);

        reconciler.on_transport_error("connection reset");
        assert!(reconciler.state().errored());
        assert_eq!(
            reconciler.state().error_message.as_deref(),
            Some("Connection lost. Please try again.")
        );
        assert_eq!(reconciler.state().percent, 30);
        assert!(!reconciler.is_connected());
        assert_eq!(source.closes(), 1);

        reconciler.on_event(r#"{"percent":60}"#);
        assert_eq!(reconciler.state().percent, 30);
        assert_eq!(reconciler.final_download_url(), Err(AppError::ResourceUnavailable));
    }

    #[test]
    fn test_transport_error_before_connect() {
        let (mut reconciler, _source) = reconciler();
        reconciler.start("r1", None).unwrap();
        reconciler.handle(StreamSignal::TransportError("404".to_string()));
        assert!(reconciler.state().errored());
    }

    #[test]
    fn test_malformed_payloads_leave_state_untouched() {
        let (mut reconciler, _source) = started();
        reconciler.on_event(r#"{"percent":20,"message":"working"}"#);
        let before = reconciler.state().clone();

        for raw in ["", "garbage", "{\"percent\":", "[]", r#"{"video_info":{"views":[1]}}"#] {
            reconciler.on_event(raw);
            assert_eq!(reconciler.state(), &before);
        }
        assert!(reconciler.is_connected());
    }

    #[test]
    fn test_progress_without_message_keeps_status() {
        let (mut reconciler, _source) = started();
        reconciler.on_event(r#"{"percent":10,"message":"downloading"}"#);
        reconciler.on_event(r#"{"percent":15}"#);
        assert_eq!(reconciler.state().percent, 15);
        assert_eq!(reconciler.state().status, "downloading");
    }

    #[test]
    fn test_regressing_progress_is_applied_by_default() {
        let (mut reconciler, _source) = started();
        reconciler.on_event(r#"{"percent":60}"#);
        reconciler.on_event(r#"{"percent":40,"message":"retrying"}"#);
        assert_eq!(reconciler.state().percent, 40);
        assert_eq!(reconciler.state().status, "retrying");
    }

    #[test]
    fn test_monotonic_progress_refuses_regressions() {
        let source = FakeSource::default();
        let mut reconciler =
            ProgressReconciler::new(source, BASE).with_monotonic_progress(true);
        reconciler.start("r1", None).unwrap();

        reconciler.on_event(r#"{"percent":60}"#);
        reconciler.on_event(r#"{"percent":40,"message":"retrying"}"#);
        assert_eq!(reconciler.state().percent, 60);
        assert_eq!(reconciler.state().status, "retrying");

        reconciler.on_event(r#"{"percent":75}"#);
        assert_eq!(reconciler.state().percent, 75);
    }

    #[test]
    fn test_preview_update_keeps_requested_url() {
        let (mut reconciler, _source) = reconciler();
        let preview = VideoPreview::from_info(None, Some("https://youtu.be/abc"));
        reconciler.start("r1", Some(preview)).unwrap();
        reconciler.on_event(r#"{"percent":50,"message":"half"}"#);

        reconciler.on_event(r#"{"video_info":{"title":"Clip","views":"2K","percent":99}}"#);
        let state = reconciler.state();
        let preview = state.preview.as_ref().unwrap();
        assert_eq!(preview.title, "Clip");
        assert_eq!(preview.views, DisplayCount::Text("2K".to_string()));
        assert_eq!(preview.requested_url, "https://youtu.be/abc");
        assert_eq!(state.percent, 50);
        assert_eq!(state.status, "half");
        assert!(!state.completed());
    }

    #[test]
    fn test_preview_update_with_its_own_url() {
        let (mut reconciler, _source) = started();
        let info = VideoInfo {
            url: Some("https://youtu.be/new".to_string()),
            ..Default::default()
        };
        let raw = serde_json::json!({ "video_info": info }).to_string();
        reconciler.on_event(&raw);
        assert_eq!(
            reconciler.state().preview.as_ref().unwrap().requested_url,
            "https://youtu.be/new"
        );
    }

    #[test]
    fn test_event_before_open_moves_to_streaming() {
        let (mut reconciler, _source) = reconciler();
        reconciler.start("r1", None).unwrap();
        reconciler.on_event(r#"{"percent":1}"#);
        assert_eq!(reconciler.state().phase, StreamPhase::Streaming);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut reconciler, source) = started();
        reconciler.on_event(r#"{"percent":10}"#);

        reconciler.stop();
        let once = reconciler.state().clone();
        reconciler.stop();
        assert_eq!(reconciler.state(), &once);
        assert_eq!(source.closes(), 1);
        assert!(!reconciler.is_connected());
    }

    #[test]
    fn test_stop_before_start_and_after_terminal_is_safe() {
        let (mut reconciler, source) = reconciler();
        reconciler.stop();
        assert_eq!(source.closes(), 0);

        reconciler.start("r1", None).unwrap();
        reconciler.on_transport_error("gone");
        reconciler.stop();
        assert!(reconciler.state().errored());
        assert_eq!(source.closes(), 1);
    }

    #[test]
    fn test_events_after_stop_are_ignored() {
        let (mut reconciler, _source) = started();
        reconciler.stop();
        reconciler.on_event(r#"{"percent":80}"#);
        reconciler.on_transport_error("late");
        assert_eq!(reconciler.state().percent, 0);
        assert!(!reconciler.state().errored());
    }

    #[test]
    fn test_repeated_start_stop_cycles_do_not_leak() {
        let (mut reconciler, source) = reconciler();
        for i in 0..5 {
            reconciler.start(&format!("r{}", i), None).unwrap();
            reconciler.stop();
        }
        reconciler.start("again", None).unwrap();
        reconciler.start("replacement", None).unwrap();
        drop(reconciler);

        assert_eq!(source.opens(), 7);
        assert_eq!(source.closes(), 7);
    }

    #[test]
    fn test_drop_releases_open_stream() {
        let (reconciler, source) = started();
        drop(reconciler);
        assert_eq!(source.log(), vec!["open r1", "close r1"]);
    }

    #[test]
    fn test_restart_resets_state() {
        let (mut reconciler, _source) = started();
        reconciler.on_transport_error("gone");
        reconciler.start("r2", None).unwrap();
        assert_eq!(reconciler.state().phase, StreamPhase::Initializing);
        assert!(reconciler.state().error_message.is_none());
        assert!(reconciler.is_connected());
    }

    #[tokio::test]
    async fn test_closed_sse_handle_stops_pending_stream() {
        let client = ApiClient::new(ApiConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            ..ApiConfig::default()
        });
        let mut source = SseStreamSource::new(client);
        let mut handle = source.open("r1");
        let stream = source.take_pending().unwrap();
        assert!(source.take_pending().is_none());

        handle.close();
        handle.close();
        let signals: Vec<StreamSignal> = stream.collect().await;
        assert!(signals.is_empty());
    }

    #[tokio::test]
    async fn test_sse_source_end_to_end() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/stream/r1")
            .with_header("content-type", "text/event-stream")
            .with_body(
                "data: {\"percent\":10,\"message\":\"starting\"}\n\n\
                 data: not-json\n\n\
                 data: {\"status\":\"completed\",\"result\":{}}\n\n\
                 data: {\"status\":\"completed\",\"result\":{\"download_url\":\"/out/my video.mp4\"}}\n\n",
            )
            .create_async()
            .await;

        let client = ApiClient::new(ApiConfig {
            api_base: server.url(),
            download_base: BASE.to_string(),
            ..ApiConfig::default()
        });
        let mut reconciler = ProgressReconciler::new(SseStreamSource::new(client), BASE);
        reconciler.start("r1", None).unwrap();
        let mut stream = reconciler.source_mut().take_pending().unwrap();

        while let Some(signal) = stream.next().await {
            reconciler.handle(signal);
        }

        let state = reconciler.state();
        assert!(state.completed());
        assert!(!state.errored());
        assert_eq!(state.percent, 10);
        assert_eq!(
            state.final_download_url.as_deref(),
            Some("https://videosaver.online/out/my%20video.mp4")
        );
    }
}
