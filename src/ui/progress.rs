use iced::{
    widget::{button, column, progress_bar, text, Space},
    Element, Length,
};

use crate::domain::ProgressState;

/// Progress screen state that is not owned by the reconciler.
#[derive(Default)]
pub struct ProgressView {
    pub save_status: Option<String>,
    pub save_progress: Option<f32>,
    pub is_saving: bool,
}

#[derive(Debug, Clone)]
pub enum ProgressMessage {
    SavePressed,
    BackPressed,
}

impl ProgressView {
    pub fn view<'a>(&'a self, state: &'a ProgressState) -> Element<'a, ProgressMessage> {
        let mut content = column![].padding(20).spacing(10);

        match &state.preview {
            Some(preview) if !preview.title.is_empty() => {
                content = content
                    .push(text(&preview.title).size(24))
                    .push(text(format!("by {}", preview.uploader)).size(14))
                    .push(
                        text(format!(
                            "{} views · {} likes · {} comments",
                            preview.views, preview.likes, preview.comments
                        ))
                        .size(12),
                    );
            }
            _ => {
                content = content.push(text("Preparing your video...").size(24));
            }
        }
        if let Some(preview) = &state.preview {
            if !preview.requested_url.is_empty() {
                content = content.push(text(&preview.requested_url).size(12));
            }
        }

        content = content
            .push(Space::new().height(Length::Fixed(20.0)))
            .push(progress_bar(0.0..=100.0, f32::from(state.percent)))
            .push(text(format!("{}%", state.percent)).size(16))
            .push(text(&state.status).size(14));

        if state.errored() {
            if let Some(error) = &state.error_message {
                content = content.push(text(error).size(14));
            }
        }

        if state.completed() {
            content = content.push(text("Your download is ready.").size(16)).push(
                button(if self.is_saving { "Saving..." } else { "Save video" })
                    .on_press_maybe((!self.is_saving).then_some(ProgressMessage::SavePressed))
                    .padding([10, 20]),
            );
        }

        if let Some(progress) = self.save_progress {
            content = content.push(progress_bar(0.0..=1.0, progress));
        }
        if let Some(status) = &self.save_status {
            content = content.push(text(status).size(14));
        }

        let back_label = if state.phase.is_terminal() {
            "Back"
        } else {
            "Cancel"
        };
        content
            .push(Space::new().height(Length::Fixed(20.0)))
            .push(
                button(back_label)
                    .on_press(ProgressMessage::BackPressed)
                    .padding([10, 20]),
            )
            .into()
    }
}
