use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use pipeline::ChannelMessage;
use types::ids::AccountId;

/// Live updates: a long-lived channel tagged with the caller's identity,
/// receiving every lifecycle event for their orders from the moment of
/// connection (no backfill).
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Response, AppError> {
    state
        .rate_limiter
        .check(&format!("{}:ws_connect", user.account_id), 10, 1.0)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user.account_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, account_id: AccountId) {
    let (channel_id, mut events) = state.notifier.subscribe(account_id);
    let (mut sink, mut stream) = socket.split();
    tracing::debug!(%account_id, channel = channel_id, "websocket connected");

    loop {
        tokio::select! {
            outbound = events.recv() => {
                match outbound {
                    Some(message @ ChannelMessage::Event { .. }) => {
                        let Ok(text) = serde_json::to_string(&message) else { continue };
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Some(message @ ChannelMessage::Closed { .. }) => {
                        // Evicted by the liveness sweep: relay the reason,
                        // close the socket, and end the task. The registry
                        // has already dropped this channel.
                        if let Ok(text) = serde_json::to_string(&message) {
                            let _ = sink.send(Message::Text(text)).await;
                        }
                        let _ = sink.send(Message::Close(None)).await;
                        return;
                    }
                    // Dropped by the notifier (lagging); nothing to relay
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    // Any client traffic counts as liveness activity
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => state.notifier.touch(account_id, channel_id),
                    Some(Err(_)) | None => break,
                }
            }
        }
    }

    state.notifier.unsubscribe(account_id, channel_id);
    tracing::debug!(%account_id, channel = channel_id, "websocket disconnected");
}
