//! Background daemon: the single owner of settings and clipboard
//! history.
//!
//! Content runtimes and the popup client connect over a Unix socket.
//! One loop owns [`state::BackgroundState`]; connection tasks forward
//! requests to it over a channel and wait for the reply. Requests that
//! change state are answered only after the store has been written, and
//! settings changes are pushed to every other content connection.

mod connection;
mod handler;
pub mod state;
pub mod store;

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;

use connection::{DisconnectNotice, Request};
use state::{BackgroundState, ConnectionId};
use store::Store;

use crate::ipc::protocol::Message;

#[derive(Debug, thiserror::Error)]
pub enum BackgroundError {
    #[error("$XDG_RUNTIME_DIR is not set")]
    NoRuntimeDir,
    #[error("neither $XDG_STATE_HOME nor $HOME is set; pass --store")]
    NoStorePath,
    #[error("background already running at {0}")]
    AlreadyRunning(PathBuf),
    #[error("failed to create directory {path}: {source}")]
    MkdirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to bind socket {path}: {source}")]
    BindFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

type PushSenders = HashMap<ConnectionId, mpsc::UnboundedSender<Message>>;

/// Run the daemon until SIGTERM or SIGINT, then remove the socket.
pub async fn run(store_path: Option<PathBuf>) -> Result<(), BackgroundError> {
    let socket_path = crate::ipc::socket_path().ok_or(BackgroundError::NoRuntimeDir)?;
    let store_path = store_path
        .or_else(store::default_store_path)
        .ok_or(BackgroundError::NoStorePath)?;
    let listener = bind_socket(&socket_path).await?;
    tracing::info!(
        path = %socket_path.display(),
        store = %store_path.display(),
        "background listening"
    );

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        }
    };

    serve(listener, Store::new(store_path), shutdown).await;

    if let Err(e) = std::fs::remove_file(&socket_path) {
        tracing::warn!(error = %e, path = %socket_path.display(), "failed to remove socket");
    }
    tracing::info!("background stopped");
    Ok(())
}

/// The background loop. Returns when `shutdown` completes.
pub async fn serve(listener: UnixListener, store: Store, shutdown: impl Future<Output = ()>) {
    let (request_tx, mut request_rx) = mpsc::unbounded_channel::<Request>();
    let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel::<DisconnectNotice>();
    let mut push_senders = PushSenders::new();
    let mut state = BackgroundState::new(store.load().await);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, _addr)) => {
                    accept_connection(stream, &request_tx, &disconnect_tx, &mut push_senders);
                }
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            },

            Some(request) = request_rx.recv() => {
                handle_request(&mut state, &store, &push_senders, request).await;
            }

            Some(notice) = disconnect_rx.recv() => {
                let conn_id = notice.connection_id;
                push_senders.remove(&conn_id);
                state.remove_connection(conn_id);
                tracing::debug!(?conn_id, "connection cleaned up");
            }

            () = &mut shutdown => break,
        }
    }
}

async fn handle_request(
    state: &mut BackgroundState,
    store: &Store,
    push_senders: &PushSenders,
    request: Request,
) {
    let before = state.snapshot();
    let origin = request.connection_id;
    let (mut response, effects) = handler::handle_message(state, request.message, origin);
    let mut broadcast = effects.broadcast;

    if effects.persist {
        if let Err(e) = store.save(&state.snapshot()).await {
            tracing::error!(error = %e, "failed to persist state");
            state.restore(before);
            response = Message::error(response.id(), "storage_failed");
            broadcast = None;
        }
    }

    if request.response_tx.send(response).is_err() {
        tracing::debug!(conn_id = ?origin, "requester went away before the reply");
    }
    if let Some(msg) = broadcast {
        push_to_content(state, push_senders, origin, msg);
    }
}

fn accept_connection(
    stream: UnixStream,
    request_tx: &mpsc::UnboundedSender<Request>,
    disconnect_tx: &mpsc::UnboundedSender<DisconnectNotice>,
    push_senders: &mut PushSenders,
) {
    let conn_id = ConnectionId::new();
    let (push_tx, push_rx) = mpsc::unbounded_channel();
    push_senders.insert(conn_id, push_tx);
    connection::spawn_connection(
        stream,
        conn_id,
        request_tx.clone(),
        push_rx,
        disconnect_tx.clone(),
    );
    tracing::debug!(?conn_id, "accepted connection");
}

/// Push `msg` to every content connection except `origin`.
fn push_to_content(
    state: &BackgroundState,
    push_senders: &PushSenders,
    origin: ConnectionId,
    msg: Message,
) {
    for conn_id in state.content_peers(origin) {
        match push_senders.get(&conn_id) {
            Some(tx) => {
                if tx.send(msg.clone()).is_err() {
                    tracing::warn!(?conn_id, "push failed, content disconnected");
                }
            }
            None => tracing::warn!(?conn_id, "push target not found"),
        }
    }
}

// -- Socket setup --

/// Create the socket directory (mode 0700) and bind, replacing a stale
/// socket left by a daemon that is no longer running.
async fn bind_socket(path: &Path) -> Result<UnixListener, BackgroundError> {
    let mkdir_failed = |parent: &Path, source: std::io::Error| BackgroundError::MkdirFailed {
        path: parent.to_path_buf(),
        source,
    };
    let bind_failed = |source: std::io::Error| BackgroundError::BindFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = path
        .parent()
        .ok_or_else(|| bind_failed(std::io::ErrorKind::InvalidInput.into()))?;
    std::fs::create_dir_all(parent).map_err(|e| mkdir_failed(parent, e))?;
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))
            .map_err(|e| mkdir_failed(parent, e))?;
    }

    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            if UnixStream::connect(path).await.is_ok() {
                return Err(BackgroundError::AlreadyRunning(path.to_path_buf()));
            }
            tracing::info!(path = %path.display(), "removing stale socket");
            std::fs::remove_file(path).map_err(bind_failed)?;
            UnixListener::bind(path).map_err(bind_failed)
        }
        Err(e) => Err(bind_failed(e)),
    }
}
