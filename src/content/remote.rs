//! Link from a content runtime to the background daemon.
//!
//! Implements the settings and history collaborators over the socket.
//! A reader task routes responses to their requesters by id and applies
//! `state_changed` pushes to the local [`OrchestratorState`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::sync::oneshot;
use tokio_util::codec::Framed;

use crate::collab::{HistoryStore, SettingsStore, StoreError};
use crate::exchange::state::OrchestratorState;
use crate::history::HistoryEntry;
use crate::ipc::codec::MessageCodec;
use crate::ipc::protocol::{Message, PROTOCOL_VERSION, Role, Status};
use crate::settings::{Settings, SettingsPatch};

/// Bound on a single request; the daemon replies after its store write.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

type Pending = Arc<Mutex<HashMap<u32, oneshot::Sender<Message>>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct BackgroundLink {
    sink: tokio::sync::Mutex<SplitSink<Framed<UnixStream, MessageCodec>, Message>>,
    pending: Pending,
    next_id: AtomicU32,
}

impl BackgroundLink {
    /// Connect as a content runtime and start the reader task.
    pub async fn connect(path: &Path, state: Arc<OrchestratorState>) -> Result<Arc<Self>, StoreError> {
        let unavailable = |what: &str, e: &dyn std::fmt::Display| {
            StoreError::Unavailable(format!("{what}: {e}"))
        };
        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| unavailable("connect", &e))?;
        let mut framed = Framed::new(stream, MessageCodec::new());

        framed
            .send(Message::Hello {
                id: 0,
                version: PROTOCOL_VERSION,
                role: Role::Content,
            })
            .await
            .map_err(|e| unavailable("send hello", &e))?;
        match framed.next().await {
            Some(Ok(Message::HelloAck {
                status: Status::Ok, ..
            })) => {}
            Some(Ok(Message::HelloAck { error, .. })) => {
                return Err(StoreError::Rejected(error.unwrap_or_default()));
            }
            other => {
                return Err(StoreError::Unavailable(format!(
                    "unexpected handshake response: {other:?}"
                )));
            }
        }

        let (sink, stream) = framed.split();
        let pending = Pending::default();
        tokio::spawn(read_loop(stream, Arc::clone(&pending), state));
        tracing::info!(path = %path.display(), "connected to background");

        Ok(Arc::new(Self {
            sink: tokio::sync::Mutex::new(sink),
            pending,
            next_id: AtomicU32::new(1),
        }))
    }

    async fn request(&self, build: impl FnOnce(u32) -> Message) -> Result<Message, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        let sent = self.sink.lock().await.send(build(id)).await;
        if let Err(e) = sent {
            lock(&self.pending).remove(&id);
            return Err(StoreError::Unavailable(format!("send: {e}")));
        }

        let response = match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(StoreError::Unavailable("background link closed".into())),
            Err(_) => {
                lock(&self.pending).remove(&id);
                return Err(StoreError::Unavailable("request timed out".into()));
            }
        };
        match response {
            Message::Response {
                status: Status::Ok, ..
            } => Ok(response),
            Message::Response { error, .. } => Err(StoreError::Rejected(error.unwrap_or_default())),
            other => Err(StoreError::Malformed(format!("{other:?}"))),
        }
    }
}

async fn read_loop(
    mut stream: SplitStream<Framed<UnixStream, MessageCodec>>,
    pending: Pending,
    state: Arc<OrchestratorState>,
) {
    while let Some(frame) = stream.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "background link read failed");
                break;
            }
        };
        match msg {
            Message::StateChanged { settings, .. } => {
                tracing::debug!(
                    enabled = settings.enabled,
                    swap_mode = settings.swap_mode_enabled,
                    "state changed"
                );
                state.apply(&settings);
            }
            Message::Response { id, .. } => match lock(&pending).remove(&id) {
                Some(tx) => {
                    let _ = tx.send(msg);
                }
                None => tracing::debug!(id, "response without requester"),
            },
            other => tracing::warn!(msg = ?other, "unexpected message from background"),
        }
    }
    // Wake everyone still waiting.
    lock(&pending).clear();
    tracing::warn!("background link closed");
}

#[async_trait]
impl SettingsStore for BackgroundLink {
    async fn get(&self) -> Result<Settings, StoreError> {
        match self.request(|id| Message::GetState { id }).await? {
            Message::Response {
                settings: Some(settings),
                ..
            } => Ok(settings),
            _ => Err(StoreError::Missing),
        }
    }

    async fn set(&self, patch: SettingsPatch) -> Result<Settings, StoreError> {
        let mut latest = None;
        if let Some(enabled) = patch.enabled {
            latest = settings_of(self.request(|id| Message::SetEnabled { id, enabled }).await?);
        }
        if let Some(enabled) = patch.swap_mode_enabled {
            latest = settings_of(self.request(|id| Message::SetSwapMode { id, enabled }).await?);
        }
        match latest {
            Some(settings) => Ok(settings),
            None => self.get().await,
        }
    }
}

fn settings_of(msg: Message) -> Option<Settings> {
    match msg {
        Message::Response { settings, .. } => settings,
        _ => None,
    }
}

#[async_trait]
impl HistoryStore for BackgroundLink {
    async fn append(&self, text: &str) -> Result<(), StoreError> {
        let text = text.to_string();
        self.request(|id| Message::AddHistory { id, text }).await?;
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        match self.request(|id| Message::GetHistory { id }).await? {
            Message::Response {
                history: Some(history),
                ..
            } => Ok(history),
            _ => Ok(Vec::new()),
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.request(|id| Message::ClearHistory { id }).await?;
        Ok(())
    }
}
