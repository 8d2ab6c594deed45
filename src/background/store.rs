//! On-disk store for settings and history.
//!
//! One MessagePack file holding `{settings, history}`. A missing or
//! unreadable file loads as the defaults so the feature stays enabled.
//! Saves write a sibling temp file and rename it over the store.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::history::HistoryEntry;
use crate::settings::Settings;

const STORE_FILE: &str = "store.msgpack";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the store, falling back to defaults.
    pub async fn load(&self) -> StoreSnapshot {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no store file, using defaults");
                return StoreSnapshot::default();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "store unreadable, using defaults");
                return StoreSnapshot::default();
            }
        };
        match rmp_serde::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "store corrupt, using defaults");
                StoreSnapshot::default()
            }
        }
    }

    pub async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), SaveError> {
        let bytes = rmp_serde::to_vec_named(snapshot)?;
        let io_err = |source: std::io::Error| SaveError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let tmp = self.path.with_extension("msgpack.tmp");
        tokio::fs::write(&tmp, &bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        tracing::trace!(path = %self.path.display(), len = bytes.len(), "store saved");
        Ok(())
    }
}

/// `$XDG_STATE_HOME/smartswap/store.msgpack`, falling back to
/// `$HOME/.local/state/smartswap/store.msgpack`.
pub fn default_store_path() -> Option<PathBuf> {
    let env = |key| std::env::var_os(key).filter(|v| !v.is_empty());
    let base = match env("XDG_STATE_HOME") {
        Some(state) => PathBuf::from(state),
        None => PathBuf::from(env("HOME")?).join(".local").join("state"),
    };
    Some(base.join("smartswap").join(STORE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("none.msgpack"));
        let snap = store.load().await;
        assert!(snap.settings.enabled);
        assert!(snap.history.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.msgpack");
        std::fs::write(&path, b"\xc1\xc1 not msgpack").unwrap();
        assert_eq!(Store::new(&path).load().await, StoreSnapshot::default());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("nested").join("store.msgpack"));
        let snap = StoreSnapshot {
            settings: Settings {
                enabled: false,
                swap_mode_enabled: true,
            },
            history: vec![HistoryEntry {
                text: "apple".into(),
                timestamp: 42,
            }],
        };
        store.save(&snap).await.unwrap();
        assert_eq!(store.load().await, snap);
        assert!(!store.path().with_extension("msgpack.tmp").exists());
    }

    #[tokio::test]
    async fn partial_record_fills_defaults() {
        #[derive(Serialize)]
        struct Partial {
            history: Vec<HistoryEntry>,
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.msgpack");
        std::fs::write(&path, rmp_serde::to_vec_named(&Partial { history: vec![] }).unwrap())
            .unwrap();
        let snap = Store::new(&path).load().await;
        assert!(snap.settings.enabled);
    }

    #[tokio::test]
    async fn save_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let store = Store::new(blocker.join("store.msgpack"));
        assert!(matches!(
            store.save(&StoreSnapshot::default()).await,
            Err(SaveError::Io { .. })
        ));
    }
}
