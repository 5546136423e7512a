//! Live play socket. One task per connection drives both directions: frames
//! from the client go through the move processor, frames queued for this
//! seat by the connection manager go out to the client.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::Path,
    response::Response,
    Extension,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use sgf_core::Color;

use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::live::connection::OPPONENT_LEFT_NOTICE;
use crate::live::{
    ConnectionHandle, Followup, LiveError, MoveProcessor, Outbound, Session, SessionRegistry,
};

const BIND_ATTEMPTS: usize = 3;
const OPPONENT_OFFLINE: &str = "opponent is not connected";

/// GET /ws/games/{key}?token=...
///
/// `key` may be the public or the secret key. Unknown games, completed games
/// and users without a seat are rejected before the upgrade.
pub async fn play(
    ws: WebSocketUpgrade,
    Path(key): Path<String>,
    user: AuthUser,
    Extension(registry): Extension<Arc<SessionRegistry>>,
    Extension(processor): Extension<Arc<MoveProcessor>>,
) -> Result<Response, AppError> {
    let session = registry.resolve_key(&key).await?;
    let seat = match registry.seat_for(&session, &user.id).await {
        Ok(seat) => seat,
        Err(e) => {
            tracing::warn!(game = %session.secret_key(), user = %user.id, "Upgrade refused: {e}");
            return Err(e.into());
        }
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, session, seat, registry, processor)))
}

async fn handle_socket(
    socket: WebSocket,
    session: Arc<Session>,
    seat: Color,
    registry: Arc<SessionRegistry>,
    processor: Arc<MoveProcessor>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (conn, mut outbound) = ConnectionHandle::new();

    let session = match bind(session, seat, &conn, &registry).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(seat = %seat, "Could not bind connection: {e}");
            let _ = sender.send(Message::Text(e.to_string().into())).await;
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    tracing::info!(game = %session.secret_key(), seat = %seat, conn = conn.id(), "Player connected");

    loop {
        tokio::select! {
            queued = outbound.recv() => match queued {
                Some(Outbound::Frame(text)) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close(notice)) => {
                    let _ = sender.send(Message::Text(notice.into())).await;
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if handle_frame(&mut sender, &processor, &session, seat, text.as_str())
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    // A displaced connection must not clear its replacement's binding.
    if session.connections().unbind(seat, &conn).await {
        session
            .connections()
            .deliver(seat, OPPONENT_LEFT_NOTICE.to_string())
            .await;
    }
    tracing::info!(game = %session.secret_key(), seat = %seat, conn = conn.id(), "Player disconnected");
}

/// Bind `conn`, re-resolving when the session was retired between lookup
/// and bind.
async fn bind(
    mut session: Arc<Session>,
    seat: Color,
    conn: &ConnectionHandle,
    registry: &SessionRegistry,
) -> Result<Arc<Session>, LiveError> {
    for _ in 0..BIND_ATTEMPTS {
        match session.connections().bind(seat, conn.clone()).await {
            Ok(()) => return Ok(session),
            Err(LiveError::Retired) => {
                session = registry.resolve(session.secret_key()).await?;
            }
            Err(e) => return Err(e),
        }
    }
    Err(LiveError::Retired)
}

/// Run one inbound frame through the processor and tell the mover what
/// happened. Errors only when the socket itself is gone.
async fn handle_frame(
    sender: &mut SplitSink<WebSocket, Message>,
    processor: &MoveProcessor,
    session: &Session,
    seat: Color,
    raw: &str,
) -> Result<(), axum::Error> {
    let reply = match processor.process_inbound_move(session, seat, raw).await {
        Ok(accepted) => match accepted.followup {
            Followup::Delivered | Followup::Engine(_) => None,
            Followup::OpponentOffline => Some(OPPONENT_OFFLINE.to_string()),
            Followup::EngineFailed(reason) => Some(format!("engine failed to respond: {reason}")),
        },
        Err(e) => {
            tracing::warn!(game = %session.secret_key(), seat = %seat, "Move rejected: {e}");
            Some(format!("move rejected: {e}"))
        }
    };

    match reply {
        Some(text) => sender.send(Message::Text(text.into())).await,
        None => Ok(()),
    }
}
