pub mod download_coordinator;
pub mod events;
pub mod handoff;
pub mod progress;

pub use download_coordinator::{DownloadCoordinator, InitiatedDownload, SaveEvent};
pub use handoff::PreviewSlot;
pub use progress::{ProgressReconciler, SseStreamSource};
