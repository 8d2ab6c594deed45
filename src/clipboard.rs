//! Clipboard bridge.
//!
//! Wraps the permission-gated clipboard API with fail-closed reads and
//! best-effort writes. A write that the API rejects falls back to the
//! legacy path: a hidden scratch node holding the text is inserted into
//! the top-level document, copied with the native copy command, and
//! detached again before control returns to the event loop.
//!
//! The scratch node is visible to any mutation observer the host page
//! runs for the short time it is attached. That race is not handled.

use std::sync::Arc;
use std::time::Instant;

use crate::host::{ClipboardProvider, DocumentHost, HostSet, NativeCommand};

/// Where a [`ClipboardSnapshot`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    /// Text carried on the paste event itself.
    Event,
    /// An explicit read through the clipboard API.
    Clipboard,
}

/// Clipboard content at one instant. Stale as soon as anything writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardSnapshot {
    pub text: String,
    pub captured_at: Instant,
    pub source: SnapshotSource,
}

impl ClipboardSnapshot {
    pub fn new(text: impl Into<String>, source: SnapshotSource) -> Self {
        Self {
            text: text.into(),
            captured_at: Instant::now(),
            source,
        }
    }
}

#[derive(Clone)]
pub struct ClipboardBridge {
    clipboard: Arc<dyn ClipboardProvider>,
    documents: Arc<dyn DocumentHost>,
}

impl ClipboardBridge {
    pub fn new(hosts: &HostSet) -> Self {
        Self {
            clipboard: hosts.clipboard.clone(),
            documents: hosts.documents.clone(),
        }
    }

    /// Read clipboard text. `None` if the API is missing, denied, or fails.
    pub async fn read(&self) -> Option<String> {
        match self.clipboard.read_text().await {
            Ok(text) => {
                tracing::trace!(len = text.len(), "clipboard read");
                Some(text)
            }
            Err(e) => {
                tracing::warn!(error = %e, "clipboard read failed");
                None
            }
        }
    }

    /// Read clipboard text as a timestamped snapshot.
    pub async fn snapshot(&self) -> Option<ClipboardSnapshot> {
        self.read()
            .await
            .map(|text| ClipboardSnapshot::new(text, SnapshotSource::Clipboard))
    }

    /// Write clipboard text. Returns false only if both the API and the
    /// legacy path failed.
    pub async fn write(&self, text: &str) -> bool {
        match self.clipboard.write_text(text).await {
            Ok(()) => {
                tracing::trace!(len = text.len(), "clipboard written");
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "clipboard write rejected, trying legacy copy");
                self.legacy_write(text)
            }
        }
    }

    /// Synchronous scratch-node copy. Never suspends, so the node is
    /// detached within the same task that attached it.
    fn legacy_write(&self, text: &str) -> bool {
        let doc = self.documents.top_document();
        let scratch = match self.documents.insert_scratch(doc, text) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "legacy clipboard write failed");
                return false;
            }
        };
        let copied = self.documents.exec_command(doc, NativeCommand::Copy);
        self.documents.remove_scratch(scratch);
        match copied {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!("legacy copy command refused");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "legacy copy command threw");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CommandDelays;
    use crate::host::page::{ClipboardAccess, PageHost};

    fn bridge(page: &Arc<PageHost>) -> ClipboardBridge {
        let hosts = HostSet::from_page(page.clone(), Arc::new(CommandDelays::default()));
        ClipboardBridge::new(&hosts)
    }

    #[tokio::test]
    async fn read_returns_text() {
        let page = Arc::new(PageHost::builder().clipboard("banana").build());
        assert_eq!(bridge(&page).read().await.as_deref(), Some("banana"));
    }

    #[tokio::test]
    async fn read_fails_closed() {
        let page = Arc::new(
            PageHost::builder()
                .clipboard("banana")
                .read_access(ClipboardAccess::Denied)
                .build(),
        );
        assert_eq!(bridge(&page).read().await, None);
        assert!(bridge(&page).snapshot().await.is_none());
    }

    #[tokio::test]
    async fn write_uses_api_when_granted() {
        let page = Arc::new(PageHost::builder().build());
        assert!(bridge(&page).write("apple").await);
        assert_eq!(page.clipboard_writes(), vec!["apple".to_string()]);
        assert_eq!(page.scratch_inserts(), 0);
    }

    #[tokio::test]
    async fn write_falls_back_to_legacy_copy() {
        let page = Arc::new(
            PageHost::builder()
                .clipboard("old")
                .write_access(ClipboardAccess::Unavailable)
                .build(),
        );
        assert!(bridge(&page).write("apple").await);
        assert_eq!(page.clipboard(), "apple");
        assert_eq!(page.scratch_inserts(), 1);
        assert!(!page.scratch_attached());
    }

    #[tokio::test]
    async fn write_fails_when_both_paths_fail() {
        let page = Arc::new(
            PageHost::builder()
                .clipboard("old")
                .write_access(ClipboardAccess::Denied)
                .legacy_copy(false)
                .build(),
        );
        assert!(!bridge(&page).write("apple").await);
        assert_eq!(page.clipboard(), "old");
        assert!(!page.scratch_attached());
    }

    #[tokio::test]
    async fn snapshot_is_tagged() {
        let page = Arc::new(PageHost::builder().clipboard("c").build());
        let snap = bridge(&page).snapshot().await.unwrap();
        assert_eq!(snap.text, "c");
        assert_eq!(snap.source, SnapshotSource::Clipboard);
    }
}
