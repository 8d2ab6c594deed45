//! Background state: settings, history ring and connected peers.
//!
//! Owned by the background loop alone. All methods are pure state
//! transitions; persistence happens in the loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::history::{HISTORY_CAPACITY, HistoryEntry, HistoryRing};
use crate::ipc::protocol::Role;
use crate::settings::{Settings, SettingsPatch};

use super::store::StoreSnapshot;

/// Identifies one accepted connection for the lifetime of the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
pub struct BackgroundState {
    settings: Settings,
    history: HistoryRing,
    /// Connections that completed the handshake.
    connections: HashMap<ConnectionId, Role>,
}

impl BackgroundState {
    pub fn new(snapshot: StoreSnapshot) -> Self {
        Self {
            settings: snapshot.settings,
            history: HistoryRing::from_entries(snapshot.history, HISTORY_CAPACITY),
            connections: HashMap::new(),
        }
    }

    pub fn add_connection(&mut self, id: ConnectionId, role: Role) {
        self.connections.insert(id, role);
    }

    pub fn remove_connection(&mut self, id: ConnectionId) {
        self.connections.remove(&id);
    }

    pub fn role(&self, id: ConnectionId) -> Option<Role> {
        self.connections.get(&id).copied()
    }

    /// Content connections other than `except`.
    pub fn content_peers(&self, except: ConnectionId) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|&(&id, &role)| id != except && role == Role::Content)
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Returns true if anything changed.
    pub fn update_settings(&mut self, patch: SettingsPatch) -> bool {
        patch.apply(&mut self.settings)
    }

    /// Returns false for empty text.
    pub fn add_history(&mut self, text: String, timestamp: u64) -> bool {
        self.history.push(text, timestamp)
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.entries()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// The persisted part of the state.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            settings: self.settings,
            history: self.history.entries(),
        }
    }

    /// Put back a snapshot taken before a change that failed to persist.
    pub fn restore(&mut self, snapshot: StoreSnapshot) {
        self.settings = snapshot.settings;
        self.history = HistoryRing::from_entries(snapshot.history, HISTORY_CAPACITY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_peers_excludes_sender_and_popups() {
        let mut state = BackgroundState::new(StoreSnapshot::default());
        let (a, b, popup) = (ConnectionId::new(), ConnectionId::new(), ConnectionId::new());
        state.add_connection(a, Role::Content);
        state.add_connection(b, Role::Content);
        state.add_connection(popup, Role::Popup);
        assert_eq!(state.content_peers(a), vec![b]);
        assert_eq!(state.content_peers(popup).len(), 2);
        state.remove_connection(b);
        assert!(state.content_peers(a).is_empty());
    }

    #[test]
    fn restore_undoes_changes() {
        let mut state = BackgroundState::new(StoreSnapshot::default());
        let before = state.snapshot();
        assert!(state.update_settings(SettingsPatch::enabled(false)));
        assert!(state.add_history("apple".into(), 1));
        state.restore(before);
        assert!(state.settings().enabled);
        assert!(state.history().is_empty());
    }

    #[test]
    fn loaded_history_is_capped() {
        let history = (0..5)
            .map(|i| HistoryEntry {
                text: format!("t{i}"),
                timestamp: i,
            })
            .collect();
        let state = BackgroundState::new(StoreSnapshot {
            settings: Settings::default(),
            history,
        });
        assert_eq!(state.history().len(), HISTORY_CAPACITY);
        assert_eq!(state.history()[0].text, "t0");
    }
}
