use std::{net::SocketAddr, sync::Arc, time::Instant};

use {
    axum::extract::ws::{Message, WebSocket},
    futures::{SinkExt, stream::StreamExt},
    tokio::sync::broadcast::error::RecvError,
    tracing::{debug, info, warn},
};

use crate::{
    broadcast::PushFrame,
    state::{CONNECTING_TEXT, GatewayState},
};

/// Handle one push-channel connection: greet, replay the current state,
/// then relay broadcast frames until either side goes away.
pub async fn handle_connection(
    socket: WebSocket,
    state: Arc<GatewayState>,
    remote_addr: SocketAddr,
) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let connected_at = Instant::now();
    info!(conn_id = %conn_id, remote_ip = %remote_addr.ip(), "ws: new connection");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (mut frames, snapshot) = state.subscribe().await;

    let greeting = std::iter::once(PushFrame::message(CONNECTING_TEXT)).chain(snapshot);
    for frame in greeting {
        if send_frame(&mut ws_tx, &frame).await.is_err() {
            debug!(conn_id = %conn_id, "ws: closed during greeting");
            return;
        }
    }

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    if send_frame(&mut ws_tx, &frame).await.is_err() {
                        debug!(conn_id = %conn_id, "ws: write failed");
                        break;
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(conn_id = %conn_id, skipped, "ws: client lagging, frames dropped");
                },
                Err(RecvError::Closed) => break,
            },
            incoming = ws_rx.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(conn_id = %conn_id, error = %e, "ws: read error");
                    break;
                },
                // The push channel is one-way; client frames are ignored.
                Some(Ok(_)) => {},
            },
        }
    }

    info!(
        conn_id = %conn_id,
        duration_secs = connected_at.elapsed().as_secs(),
        "ws: connection closed"
    );
}

async fn send_frame(
    ws_tx: &mut futures::stream::SplitSink<WebSocket, Message>,
    frame: &PushFrame,
) -> anyhow::Result<()> {
    let json = serde_json::to_string(frame)?;
    ws_tx.send(Message::Text(json.into())).await?;
    Ok(())
}
