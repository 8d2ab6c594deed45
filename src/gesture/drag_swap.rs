//! Drag-swap tracking: remembers the dragged selection between drag start
//! and drop.

use std::sync::{Mutex, PoisonError};

/// A drop whose target selection differs from the dragged text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSwap {
    pub dragged: String,
    pub dropped: String,
}

#[derive(Debug, Default)]
pub struct DragTracker {
    source: Mutex<Option<String>>,
}

impl DragTracker {
    pub fn start(&self, text: String) {
        *self.source.lock().unwrap_or_else(PoisonError::into_inner) = Some(text);
    }

    /// Forget any drag in progress, returning its text.
    pub fn take(&self) -> Option<String> {
        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_dragging(&self) -> bool {
        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// End the drag at a drop target holding `dropped`.
    pub fn finish(&self, dropped: Option<String>) -> Option<DragSwap> {
        let dragged = self.take()?;
        let dropped = dropped.filter(|d| !d.is_empty() && *d != dragged)?;
        Some(DragSwap { dragged, dropped })
    }
}
