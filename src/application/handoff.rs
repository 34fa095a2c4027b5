use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::VideoPreview;

/// Single-slot hand-off of a preview between the submission screen and the
/// progress screen. Whatever is put in can be taken out exactly once.
#[derive(Debug, Clone, Default)]
pub struct PreviewSlot {
    inner: Arc<Mutex<Option<VideoPreview>>>,
}

impl PreviewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<VideoPreview>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Preview slot lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Store a preview, replacing anything not yet taken.
    pub fn put(&self, preview: Option<VideoPreview>) {
        *self.lock() = preview;
    }

    /// Take the stored preview and clear the slot.
    pub fn take(&self) -> Option<VideoPreview> {
        self.lock().take()
    }
}
