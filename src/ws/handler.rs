//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::ConnectionId;
use crate::session::{Outbound, SessionEvent};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

type WsSink = futures::stream::SplitSink<WebSocket, Message>;
type WsStream = futures::stream::SplitStream<WebSocket>;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let conn_id: ConnectionId = Uuid::new_v4().to_string();
    debug!(conn_id = %conn_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, conn_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, conn_id: ConnectionId, state: AppState) {
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (outbox_tx, outbox_rx) = mpsc::channel::<Outbound>(16);
    let state_rx = state.session.subscribe();
    let events_tx = state.session.events_tx.clone();

    // Writer task: addressed messages and broadcasts -> WebSocket
    let mut writer_handle = tokio::spawn(run_writer(conn_id.clone(), ws_sink, outbox_rx, state_rx));

    // Reader: WebSocket -> session. Ends when the client goes away or the
    // writer closes the socket after a rejected join.
    tokio::select! {
        _ = run_reader(&conn_id, ws_stream, &events_tx, outbox_tx) => {
            writer_handle.abort();
        }
        _ = &mut writer_handle => {
            debug!(conn_id = %conn_id, "Writer finished first");
        }
    }

    // Removing an unknown connection is a no-op, so always report it
    let _ = events_tx
        .send(SessionEvent::Disconnect {
            conn_id: conn_id.clone(),
        })
        .await;

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

async fn run_reader(
    conn_id: &ConnectionId,
    mut ws_stream: WsStream,
    events_tx: &mpsc::Sender<SessionEvent>,
    outbox_tx: mpsc::Sender<Outbound>,
) {
    let rate_limiter = ConnectionRateLimiter::new();

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, "Rate limited input message");
                    continue;
                }

                let event = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Join { player_id }) => SessionEvent::Join {
                        conn_id: conn_id.clone(),
                        player_id,
                        outbox: outbox_tx.clone(),
                    },
                    Ok(ClientMsg::MovePaddle { direction }) => SessionEvent::Move {
                        conn_id: conn_id.clone(),
                        direction,
                    },
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                if events_tx.send(event).await.is_err() {
                    debug!(conn_id = %conn_id, "Session channel closed");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(conn_id = %conn_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

async fn run_writer(
    conn_id: ConnectionId,
    mut ws_sink: WsSink,
    mut outbox_rx: mpsc::Receiver<Outbound>,
    mut state_rx: broadcast::Receiver<ServerMsg>,
) {
    loop {
        // Addressed messages go out ahead of broadcasts
        let result = tokio::select! {
            biased;

            outbound = outbox_rx.recv() => match outbound {
                Some(Outbound::Send(msg)) => send_msg(&mut ws_sink, &msg).await,
                Some(Outbound::Close) => {
                    info!(conn_id = %conn_id, "Closing connection");
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break;
                }
                // Reader is gone
                None => break,
            },

            broadcast = state_rx.recv() => match broadcast {
                Ok(msg) => send_msg(&mut ws_sink, &msg).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        conn_id = %conn_id,
                        lagged_count = n,
                        "Client lagged, skipping {} snapshots", n
                    );
                    // Continue - don't disconnect for lag
                    Ok(())
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(conn_id = %conn_id, "State channel closed");
                    break;
                }
            },
        };

        if let Err(e) = result {
            debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
