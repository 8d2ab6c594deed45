//! Message vocabulary shared by the background daemon, content runtimes
//! and the popup client.
//!
//! Every message is a MessagePack map with at least `type` and `id`.
//! Requests carry a caller-chosen non-zero `id` echoed by the matching
//! `response`; the handshake and unsolicited broadcasts use id 0.

use serde::{Deserialize, Serialize};

use crate::history::HistoryEntry;
use crate::settings::Settings;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Message {
    // -- Handshake --
    #[serde(rename = "hello")]
    Hello { id: u32, version: u32, role: Role },

    #[serde(rename = "hello_ack")]
    HelloAck {
        id: u32,
        status: Status,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    // -- Settings --
    /// Settings plus history.
    #[serde(rename = "get_state")]
    GetState { id: u32 },

    #[serde(rename = "set_enabled")]
    SetEnabled { id: u32, enabled: bool },

    #[serde(rename = "set_swap_mode")]
    SetSwapMode { id: u32, enabled: bool },

    // -- History --
    #[serde(rename = "add_history")]
    AddHistory { id: u32, text: String },

    #[serde(rename = "get_history")]
    GetHistory { id: u32 },

    #[serde(rename = "clear_history")]
    ClearHistory { id: u32 },

    // -- Unsolicited (background → content) --
    #[serde(rename = "state_changed")]
    StateChanged { id: u32, settings: Settings },

    #[serde(rename = "response")]
    Response {
        id: u32,
        status: Status,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        settings: Option<Settings>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        history: Option<Vec<HistoryEntry>>,
    },
}

impl Message {
    pub fn id(&self) -> u32 {
        match self {
            Message::Hello { id, .. }
            | Message::HelloAck { id, .. }
            | Message::GetState { id }
            | Message::SetEnabled { id, .. }
            | Message::SetSwapMode { id, .. }
            | Message::AddHistory { id, .. }
            | Message::GetHistory { id }
            | Message::ClearHistory { id }
            | Message::StateChanged { id, .. }
            | Message::Response { id, .. } => *id,
        }
    }

    pub fn ok(id: u32) -> Self {
        Message::Response {
            id,
            status: Status::Ok,
            error: None,
            settings: None,
            history: None,
        }
    }

    pub fn error(id: u32, reason: &str) -> Self {
        Message::Response {
            id,
            status: Status::Error,
            error: Some(reason.into()),
            settings: None,
            history: None,
        }
    }
}

/// Who is on the other end of a connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A content runtime attached to an editor page.
    Content,
    /// The one-shot popup client.
    Popup,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum payload size (1 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// `{type, id}` of a message whose type is not in [`Message`], so the
/// error reply can echo the id.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub id: u32,
}
