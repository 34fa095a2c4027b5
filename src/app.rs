use std::path::PathBuf;

use futures::StreamExt;
use iced::Task;

use crate::api::{ApiClient, StreamSignal};
use crate::application::{
    DownloadCoordinator, InitiatedDownload, PreviewSlot, ProgressReconciler, SaveEvent,
    SseStreamSource,
};
use crate::config::AppConfig;
use crate::domain::AppError;
use crate::ui::{HomeMessage, HomeView, ProgressMessage, ProgressView};
use crate::utils::detect_platform;

pub struct VideoSaverApp {
    screen: Screen,
    coordinator: DownloadCoordinator,
    api_client: ApiClient,
    handoff: PreviewSlot,
    monotonic_progress: bool,
}

enum Screen {
    Home(HomeView),
    Progress(ProgressScreen),
}

struct ProgressScreen {
    reconciler: ProgressReconciler<SseStreamSource>,
    view: ProgressView,
}

impl VideoSaverApp {
    pub fn new(config: AppConfig) -> Self {
        let api_client = ApiClient::new(config.api);
        let coordinator = DownloadCoordinator::new(api_client.clone(), config.quality_policy);

        Self {
            screen: Screen::Home(HomeView::new(coordinator.policy())),
            coordinator,
            api_client,
            handoff: PreviewSlot::new(),
            monotonic_progress: config.monotonic_progress,
        }
    }

    fn go_home(&mut self) {
        if let Screen::Progress(screen) = &mut self.screen {
            if let Some(request_id) = screen.reconciler.request_id() {
                tracing::info!(
                    "Leaving progress view for {} (connected: {})",
                    request_id,
                    screen.reconciler.is_connected()
                );
            }
            screen.reconciler.stop();
        }
        self.screen = Screen::Home(HomeView::new(self.coordinator.policy()));
    }

    /// Switch to the progress screen for `request_id` and hand back the task
    /// that drives its event stream.
    fn open_progress(&mut self, request_id: &str) -> Task<Message> {
        let source = SseStreamSource::new(self.api_client.clone());
        let mut reconciler =
            ProgressReconciler::new(source, self.api_client.config().download_base.clone())
                .with_monotonic_progress(self.monotonic_progress);

        let preview = self.handoff.take();
        let task = match reconciler.start(request_id, preview) {
            Ok(()) => match reconciler.source_mut().take_pending() {
                Some(stream) => Task::stream(stream.map(Message::Stream)),
                None => Task::none(),
            },
            Err(e) => {
                tracing::error!("Cannot track download: {}", e);
                Task::none()
            }
        };

        self.screen = Screen::Progress(ProgressScreen {
            reconciler,
            view: ProgressView::default(),
        });
        task
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Home(HomeMessage),
    Progress(ProgressMessage),
    DownloadInitiated(Result<InitiatedDownload, AppError>),
    Stream(StreamSignal),
    /// (Selected Path, Download URL)
    SavePathSelected(Option<PathBuf>, String),
    Save(SaveEvent),
}

pub fn update(app: &mut VideoSaverApp, message: Message) -> Task<Message> {
    match message {
        Message::Home(home_msg) => {
            let Screen::Home(view) = &mut app.screen else {
                return Task::none();
            };
            view.update(home_msg.clone());

            if let HomeMessage::DownloadPressed = home_msg {
                if view.is_submitting {
                    return Task::none();
                }
                match app
                    .coordinator
                    .prepare_request(&view.url, view.quality, view.audio_only)
                {
                    Ok(request) => {
                        view.is_submitting = true;
                        view.status_message = match detect_platform(&request.url) {
                            Some(platform) => format!("Requesting {} video...", platform),
                            None => "Requesting video...".to_string(),
                        };

                        let coordinator = app.coordinator.clone();
                        return Task::perform(
                            async move { coordinator.initiate(request).await },
                            Message::DownloadInitiated,
                        );
                    }
                    Err(e) => {
                        view.status_message = e.to_string();
                    }
                }
            }
        }
        Message::DownloadInitiated(result) => match result {
            Ok(initiated) => {
                app.handoff.put(Some(initiated.preview));
                return app.open_progress(&initiated.request_id);
            }
            Err(e) => {
                if let Screen::Home(view) = &mut app.screen {
                    view.is_submitting = false;
                    view.status_message = format!("Failed to start download: {}", e);
                }
            }
        },
        Message::Stream(signal) => {
            if let Screen::Progress(screen) = &mut app.screen {
                screen.reconciler.handle(signal);
            }
        }
        Message::Progress(ProgressMessage::BackPressed) => {
            app.go_home();
        }
        Message::Progress(ProgressMessage::SavePressed) => {
            let Screen::Progress(screen) = &mut app.screen else {
                return Task::none();
            };
            match app.coordinator.plan_save(
                screen.reconciler.final_download_url(),
                screen.reconciler.state().preview.as_ref(),
            ) {
                Ok(plan) => {
                    screen.view.save_status = Some("Please select save location...".to_string());
                    let coordinator = app.coordinator.clone();
                    let url = plan.download_url;
                    return Task::perform(
                        async move {
                            let path = coordinator.choose_save_path(plan.suggested_filename).await;
                            (path, url)
                        },
                        |(path, url)| Message::SavePathSelected(path, url),
                    );
                }
                Err(e) => {
                    screen.view.save_status = Some(e.to_string());
                }
            }
        }
        Message::SavePathSelected(path_opt, url) => {
            let Screen::Progress(screen) = &mut app.screen else {
                return Task::none();
            };
            match path_opt {
                Some(path) => {
                    screen.view.is_saving = true;
                    screen.view.save_progress = Some(0.0);
                    screen.view.save_status = Some(format!("Saving to: {}", path.display()));
                    return Task::stream(
                        app.coordinator
                            .download_stream(url, path)
                            .map(Message::Save),
                    );
                }
                None => {
                    screen.view.save_status = Some("Save cancelled".to_string());
                }
            }
        }
        Message::Save(event) => {
            let Screen::Progress(screen) = &mut app.screen else {
                return Task::none();
            };
            match event {
                SaveEvent::Progress(progress) => {
                    screen.view.save_progress = Some(progress);
                    screen.view.save_status = Some(if progress >= 1.0 {
                        "Download complete, finalizing...".to_string()
                    } else {
                        format!("Saving: {:.1}%", progress * 100.0)
                    });
                }
                SaveEvent::Completed(path) => {
                    screen.view.is_saving = false;
                    screen.view.save_progress = None;
                    screen.view.save_status = Some(format!("Saved: {}", path.display()));
                }
                SaveEvent::Failed(e) => {
                    screen.view.is_saving = false;
                    screen.view.save_progress = None;
                    screen.view.save_status = Some(format!("Save failed: {}", e));
                }
            }
        }
    }
    Task::none()
}

pub fn view(app: &VideoSaverApp) -> iced::Element<'_, Message> {
    match &app.screen {
        Screen::Home(view) => view.view().map(Message::Home),
        Screen::Progress(screen) => screen
            .view
            .view(screen.reconciler.state())
            .map(Message::Progress),
    }
}
