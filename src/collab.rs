//! Collaborators consumed by the exchange-paste core: settings, history,
//! and user feedback.
//!
//! The core only ever calls these fire-and-forget or through the
//! fail-open [`load_settings`]; nothing here can change a protocol
//! outcome.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::history::{HistoryEntry, HistoryRing, epoch_millis, preview};
use crate::settings::{Settings, SettingsPatch};

/// Errors raised by collaborator stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("no stored value")]
    Missing,
    #[error("malformed stored value: {0}")]
    Malformed(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The background daemon answered with an error reason.
    #[error("request rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self) -> Result<Settings, StoreError>;

    /// Apply `patch` and return the resulting settings.
    async fn set(&self, patch: SettingsPatch) -> Result<Settings, StoreError>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Record `text` as the newest entry.
    async fn append(&self, text: &str) -> Result<(), StoreError>;

    /// Entries newest first.
    async fn entries(&self) -> Result<Vec<HistoryEntry>, StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}

/// Transient user notification. Safe to call any number of times.
pub trait FeedbackPresenter: Send + Sync {
    fn show(&self, text: &str);
}

/// One of each collaborator.
#[derive(Clone)]
pub struct Collaborators {
    pub settings: Arc<dyn SettingsStore>,
    pub history: Arc<dyn HistoryStore>,
    pub feedback: Arc<dyn FeedbackPresenter>,
}

impl Collaborators {
    /// In-memory stores with log feedback.
    pub fn standalone() -> Self {
        Self {
            settings: Arc::new(MemorySettings::default()),
            history: Arc::new(MemoryHistory::default()),
            feedback: Arc::new(LogFeedback),
        }
    }
}

/// Read settings, treating any failure as the defaults (enabled).
pub async fn load_settings(store: &dyn SettingsStore) -> Settings {
    match store.get().await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "settings unreadable, using defaults");
            Settings::default()
        }
    }
}

/// Toast shown after a successful exchange.
pub fn swap_toast(displaced: &str) -> String {
    format!("Swapped to clipboard: {}", preview(displaced, 50))
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Settings held in memory. `None` behaves like an empty store.
#[derive(Debug)]
pub struct MemorySettings {
    value: Mutex<Option<Settings>>,
}

impl MemorySettings {
    pub fn new(value: Option<Settings>) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self::new(Some(Settings::default()))
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self) -> Result<Settings, StoreError> {
        (*lock(&self.value)).ok_or(StoreError::Missing)
    }

    async fn set(&self, patch: SettingsPatch) -> Result<Settings, StoreError> {
        let mut value = lock(&self.value);
        let settings = value.get_or_insert_with(Settings::default);
        patch.apply(settings);
        Ok(*settings)
    }
}

#[derive(Debug, Default)]
pub struct MemoryHistory {
    ring: Mutex<HistoryRing>,
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn append(&self, text: &str) -> Result<(), StoreError> {
        lock(&self.ring).push(text.to_string(), epoch_millis());
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(lock(&self.ring).entries())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        lock(&self.ring).clear();
        Ok(())
    }
}

/// Writes notifications to the log.
#[derive(Debug, Default)]
pub struct LogFeedback;

impl FeedbackPresenter for LogFeedback {
    fn show(&self, text: &str) {
        tracing::info!(target: "smartswap::feedback", "{text}");
    }
}

/// Keeps every notification; used by tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingFeedback {
    shown: Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingFeedback {
    pub fn shown(&self) -> Vec<String> {
        lock(&self.shown).clone()
    }
}

#[cfg(test)]
impl FeedbackPresenter for RecordingFeedback {
    fn show(&self, text: &str) {
        lock(&self.shown).push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Corrupt;

    #[async_trait]
    impl SettingsStore for Corrupt {
        async fn get(&self) -> Result<Settings, StoreError> {
            Err(StoreError::Malformed("enabled: \"yes\"".into()))
        }

        async fn set(&self, _: SettingsPatch) -> Result<Settings, StoreError> {
            Err(StoreError::Unavailable("read-only".into()))
        }
    }

    #[tokio::test]
    async fn load_settings_fails_open() {
        assert!(load_settings(&Corrupt).await.enabled);
        assert!(load_settings(&MemorySettings::new(None)).await.enabled);
    }

    #[tokio::test]
    async fn memory_settings_set_on_empty_store() {
        let store = MemorySettings::new(None);
        let s = store.set(SettingsPatch::swap_mode(true)).await.unwrap();
        assert!(s.enabled);
        assert!(s.swap_mode_enabled);
        assert_eq!(store.get().await, Ok(s));
    }

    #[tokio::test]
    async fn memory_history_keeps_three() {
        let h = MemoryHistory::default();
        for t in ["a", "b", "c", "d"] {
            h.append(t).await.unwrap();
        }
        let texts: Vec<_> = h.entries().await.unwrap().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, ["d", "c", "b"]);
        h.clear().await.unwrap();
        assert!(h.entries().await.unwrap().is_empty());
    }

    #[test]
    fn swap_toast_truncates() {
        assert_eq!(swap_toast("apple"), "Swapped to clipboard: apple");
        let long = "x".repeat(60);
        assert_eq!(swap_toast(&long), format!("Swapped to clipboard: {}...", "x".repeat(47)));
    }
}
