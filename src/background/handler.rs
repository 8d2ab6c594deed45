//! Request dispatch for the background loop.
//!
//! Pure logic over [`BackgroundState`]: each request yields a response
//! and the [`Effects`] the loop must carry out before and after sending
//! it.

use crate::history::epoch_millis;
use crate::ipc::protocol::{Message, PROTOCOL_VERSION, Role, Status};
use crate::settings::SettingsPatch;

use super::state::{BackgroundState, ConnectionId};

/// Follow-up work for the background loop.
#[derive(Debug, Default, PartialEq)]
pub struct Effects {
    /// The store must be written before the response is sent.
    pub persist: bool,
    /// Pushed to every other content connection after the response.
    pub broadcast: Option<Message>,
}

impl Effects {
    fn none() -> Self {
        Self::default()
    }

    fn persist() -> Self {
        Self {
            persist: true,
            broadcast: None,
        }
    }
}

pub fn handle_message(
    state: &mut BackgroundState,
    request: Message,
    connection_id: ConnectionId,
) -> (Message, Effects) {
    match request {
        Message::Hello { id, version, role } => (
            handle_hello(state, id, version, role, connection_id),
            Effects::none(),
        ),
        Message::GetState { id } => (
            Message::Response {
                id,
                status: Status::Ok,
                error: None,
                settings: Some(state.settings()),
                history: Some(state.history()),
            },
            Effects::none(),
        ),
        Message::SetEnabled { id, enabled } => {
            handle_settings(state, id, SettingsPatch::enabled(enabled))
        }
        Message::SetSwapMode { id, enabled } => {
            handle_settings(state, id, SettingsPatch::swap_mode(enabled))
        }
        Message::AddHistory { id, text } => {
            // Only content runtimes displace clipboard text.
            if state.role(connection_id) != Some(Role::Content) {
                return (Message::error(id, "unknown_type"), Effects::none());
            }
            if state.add_history(text, epoch_millis()) {
                (Message::ok(id), Effects::persist())
            } else {
                (Message::error(id, "empty_text"), Effects::none())
            }
        }
        Message::GetHistory { id } => (
            Message::Response {
                id,
                status: Status::Ok,
                error: None,
                settings: None,
                history: Some(state.history()),
            },
            Effects::none(),
        ),
        Message::ClearHistory { id } => {
            state.clear_history();
            (Message::ok(id), Effects::persist())
        }
        // Daemon-originated messages are never valid requests.
        Message::HelloAck { id, .. }
        | Message::StateChanged { id, .. }
        | Message::Response { id, .. } => (Message::error(id, "unknown_type"), Effects::none()),
    }
}

fn handle_hello(
    state: &mut BackgroundState,
    id: u32,
    version: u32,
    role: Role,
    connection_id: ConnectionId,
) -> Message {
    let reject = |reason: &str| Message::HelloAck {
        id: 0,
        status: Status::Error,
        error: Some(reason.into()),
    };
    if id != 0 {
        return reject("invalid_hello_id");
    }
    if version != PROTOCOL_VERSION {
        return reject("version_mismatch");
    }
    state.add_connection(connection_id, role);
    tracing::debug!(?connection_id, ?role, "handshake complete");
    Message::HelloAck {
        id: 0,
        status: Status::Ok,
        error: None,
    }
}

fn handle_settings(state: &mut BackgroundState, id: u32, patch: SettingsPatch) -> (Message, Effects) {
    let changed = state.update_settings(patch);
    let settings = state.settings();
    let response = Message::Response {
        id,
        status: Status::Ok,
        error: None,
        settings: Some(settings),
        history: None,
    };
    if !changed {
        return (response, Effects::none());
    }
    tracing::info!(
        enabled = settings.enabled,
        swap_mode = settings.swap_mode_enabled,
        "settings changed"
    );
    (
        response,
        Effects {
            persist: true,
            broadcast: Some(Message::StateChanged { id: 0, settings }),
        },
    )
}
