pub mod progress;

pub use progress::{ProgressMessage, ProgressView};

use iced::{
    widget::{button, column, pick_list, row, text, text_input, Space},
    Element, Length,
};

use crate::domain::{AppError, Quality, QualityOption, QualityPolicy};

/// Submission screen state
pub struct HomeView {
    pub url: String,
    pub quality: Quality,
    pub audio_only: bool,
    pub status_message: String,
    pub is_submitting: bool,
    options: Vec<QualityOption>,
}

#[derive(Debug, Clone)]
pub enum HomeMessage {
    UrlChanged(String),
    QualitySelected(QualityOption),
    AudioOnlyToggled,
    DownloadPressed,
}

impl HomeView {
    pub fn new(policy: &QualityPolicy) -> Self {
        Self {
            url: String::new(),
            quality: Quality::default(),
            audio_only: false,
            status_message: "Paste a YouTube, Instagram, TikTok or Facebook link".to_string(),
            is_submitting: false,
            options: policy.options(),
        }
    }

    pub fn update(&mut self, message: HomeMessage) {
        match message {
            HomeMessage::UrlChanged(url) => {
                self.url = url;
            }
            HomeMessage::QualitySelected(option) => {
                if self.audio_only {
                    return;
                }
                if option.gated {
                    self.status_message = AppError::GatedQuality(option.quality).to_string();
                } else {
                    self.quality = option.quality;
                }
            }
            HomeMessage::AudioOnlyToggled => {
                self.audio_only = !self.audio_only;
            }
            HomeMessage::DownloadPressed => {
                // Will be handled by the app
            }
        }
    }

    fn selected_option(&self) -> Option<QualityOption> {
        self.options
            .iter()
            .find(|option| option.quality == self.quality)
            .copied()
    }

    pub fn view(&self) -> Element<'_, HomeMessage> {
        let quality_picker: Element<'_, HomeMessage> = if self.audio_only {
            text("Quality: audio only").size(16).into()
        } else {
            pick_list(
                self.options.as_slice(),
                self.selected_option(),
                HomeMessage::QualitySelected,
            )
            .padding(8)
            .into()
        };

        let audio_label = if self.audio_only {
            "Audio only: on"
        } else {
            "Audio only: off"
        };

        column![
            text("Video Saver").size(32),
            Space::new().height(Length::Fixed(20.0)),
            text("Video URL:").size(16),
            text_input("Paste video URL here...", &self.url)
                .on_input(HomeMessage::UrlChanged)
                .on_submit(HomeMessage::DownloadPressed)
                .padding(10),
            row![
                quality_picker,
                button(audio_label)
                    .on_press(HomeMessage::AudioOnlyToggled)
                    .padding([8, 16]),
            ]
            .spacing(10),
            Space::new().height(Length::Fixed(10.0)),
            text(&self.status_message).size(14),
            Space::new().height(Length::Fixed(20.0)),
            button(if self.is_submitting {
                "Preparing..."
            } else {
                "Download"
            })
            .on_press_maybe((!self.is_submitting).then_some(HomeMessage::DownloadPressed))
            .padding([10, 20]),
        ]
        .padding(20)
        .spacing(10)
        .into()
    }
}
