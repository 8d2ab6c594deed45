//! Per-connection task: framing, handshake, request forwarding and
//! delivery of pushed messages.

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;

use crate::ipc::codec::{CodecError, DecodeResult, FrameCodec, decode_frame};
use crate::ipc::protocol::{Message, Status};

use super::state::ConnectionId;

/// A request forwarded to the background loop.
#[derive(Debug)]
pub struct Request {
    pub message: Message,
    pub response_tx: oneshot::Sender<Message>,
    pub connection_id: ConnectionId,
}

#[derive(Debug)]
pub struct DisconnectNotice {
    pub connection_id: ConnectionId,
}

#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("unexpected EOF during handshake")]
    HandshakeEof,
    #[error("first message must be hello")]
    NotHello,
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] rmp_serde::decode::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("background loop closed")]
    LoopGone,
    #[error("response channel closed")]
    ResponseDropped,
}

/// Serve one connection until it closes, then report the disconnect.
pub fn spawn_connection(
    stream: UnixStream,
    conn_id: ConnectionId,
    request_tx: mpsc::UnboundedSender<Request>,
    push_rx: mpsc::UnboundedReceiver<Message>,
    disconnect_tx: mpsc::UnboundedSender<DisconnectNotice>,
) {
    tokio::spawn(async move {
        if let Err(e) = handle_connection(stream, conn_id, request_tx, push_rx).await {
            tracing::debug!(?conn_id, error = %e, "connection closed");
        }
        let _ = disconnect_tx.send(DisconnectNotice {
            connection_id: conn_id,
        });
    });
}

async fn handle_connection(
    stream: UnixStream,
    conn_id: ConnectionId,
    request_tx: mpsc::UnboundedSender<Request>,
    mut push_rx: mpsc::UnboundedReceiver<Message>,
) -> Result<(), ConnectionError> {
    let mut framed = Framed::new(stream, FrameCodec::new());

    let first = framed.next().await.ok_or(ConnectionError::HandshakeEof)??;
    let hello = match decode_frame(&first) {
        DecodeResult::Ok(msg @ Message::Hello { .. }) => msg,
        DecodeResult::Ok(_) | DecodeResult::UnknownType(_) => {
            return Err(ConnectionError::NotHello);
        }
        DecodeResult::Malformed(e) => return Err(ConnectionError::MalformedFrame(e)),
    };

    let ack = forward(&request_tx, hello, conn_id).await?;
    let rejected = matches!(
        ack,
        Message::HelloAck {
            status: Status::Error,
            ..
        }
    );
    framed.send(ack).await?;
    if rejected {
        return Ok(());
    }

    loop {
        tokio::select! {
            frame = framed.next() => {
                let raw = match frame {
                    Some(raw) => raw?,
                    None => return Ok(()),
                };
                let response = match decode_frame(&raw) {
                    DecodeResult::Ok(msg) => forward(&request_tx, msg, conn_id).await?,
                    DecodeResult::UnknownType(envelope) => {
                        tracing::debug!(?conn_id, msg_type = %envelope.msg_type, "unknown message type");
                        Message::error(envelope.id, "unknown_type")
                    }
                    DecodeResult::Malformed(e) => return Err(ConnectionError::MalformedFrame(e)),
                };
                framed.send(response).await?;
            }
            pushed = push_rx.recv() => {
                match pushed {
                    Some(msg) => framed.send(msg).await?,
                    // The loop dropped our sender: shutting down.
                    None => return Ok(()),
                }
            }
        }
    }
}

/// Hand a request to the background loop and wait for its response.
/// The loop answers mutating requests only after the store is written.
async fn forward(
    request_tx: &mpsc::UnboundedSender<Request>,
    message: Message,
    conn_id: ConnectionId,
) -> Result<Message, ConnectionError> {
    let (response_tx, response_rx) = oneshot::channel();
    request_tx
        .send(Request {
            message,
            response_tx,
            connection_id: conn_id,
        })
        .map_err(|_| ConnectionError::LoopGone)?;
    response_rx.await.map_err(|_| ConnectionError::ResponseDropped)
}
