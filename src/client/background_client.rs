//! One-shot connection to the background daemon as the popup.

use std::path::Path;

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;

use crate::history::HistoryEntry;
use crate::ipc::codec::MessageCodec;
use crate::ipc::protocol::{Message, PROTOCOL_VERSION, Role, Status};
use crate::settings::Settings;

use super::ClientError;

/// Payload of a successful response.
#[derive(Debug, Default)]
struct Reply {
    settings: Option<Settings>,
    history: Option<Vec<HistoryEntry>>,
}

/// Each CLI invocation performs a few request/response cycles, so there
/// is no reader task; pushed `state_changed` messages never reach popups.
pub struct BackgroundClient {
    framed: Framed<UnixStream, MessageCodec>,
    next_id: u32,
}

impl BackgroundClient {
    /// Connect to the daemon's default socket.
    pub async fn connect() -> Result<Self, ClientError> {
        let path = crate::ipc::socket_path().ok_or(ClientError::NoRuntimeDir)?;
        Self::connect_at(&path).await
    }

    pub async fn connect_at(path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path).await.map_err(|e| {
            ClientError::Background(format!("connect {} failed: {e}", path.display()))
        })?;
        let mut framed = Framed::new(stream, MessageCodec::new());

        framed
            .send(Message::Hello {
                id: 0,
                version: PROTOCOL_VERSION,
                role: Role::Popup,
            })
            .await
            .map_err(|e| ClientError::Background(format!("send hello: {e}")))?;

        match framed.next().await {
            Some(Ok(Message::HelloAck {
                status: Status::Ok, ..
            })) => {}
            Some(Ok(Message::HelloAck { error, .. })) => {
                return Err(ClientError::Background(format!(
                    "handshake rejected: {}",
                    error.unwrap_or_default()
                )));
            }
            other => {
                return Err(ClientError::Background(format!(
                    "unexpected handshake response: {other:?}"
                )));
            }
        }

        Ok(Self { framed, next_id: 1 })
    }

    pub async fn get_state(&mut self) -> Result<(Settings, Vec<HistoryEntry>), ClientError> {
        let reply = self.request("get_state", |id| Message::GetState { id }).await?;
        Ok((
            reply.settings.unwrap_or_default(),
            reply.history.unwrap_or_default(),
        ))
    }

    pub async fn set_enabled(&mut self, enabled: bool) -> Result<Settings, ClientError> {
        let reply = self
            .request("set_enabled", |id| Message::SetEnabled { id, enabled })
            .await?;
        Ok(reply.settings.unwrap_or_default())
    }

    pub async fn set_swap_mode(&mut self, enabled: bool) -> Result<Settings, ClientError> {
        let reply = self
            .request("set_swap_mode", |id| Message::SetSwapMode { id, enabled })
            .await?;
        Ok(reply.settings.unwrap_or_default())
    }

    pub async fn history(&mut self) -> Result<Vec<HistoryEntry>, ClientError> {
        let reply = self
            .request("get_history", |id| Message::GetHistory { id })
            .await?;
        Ok(reply.history.unwrap_or_default())
    }

    pub async fn clear_history(&mut self) -> Result<(), ClientError> {
        self.request("clear_history", |id| Message::ClearHistory { id })
            .await
            .map(drop)
    }

    async fn request(
        &mut self,
        what: &str,
        build: impl FnOnce(u32) -> Message,
    ) -> Result<Reply, ClientError> {
        let id = self.next_id;
        self.next_id += 1;

        self.framed
            .send(build(id))
            .await
            .map_err(|e| ClientError::Background(format!("send {what}: {e}")))?;

        match self.framed.next().await {
            Some(Ok(Message::Response {
                id: got,
                status: Status::Ok,
                settings,
                history,
                ..
            })) if got == id => Ok(Reply { settings, history }),
            Some(Ok(Message::Response {
                id: got, error, ..
            })) if got == id => Err(ClientError::Background(format!(
                "{what} failed: {}",
                error.unwrap_or_default()
            ))),
            other => Err(ClientError::Background(format!(
                "unexpected {what} response: {other:?}"
            ))),
        }
    }
}
