//! Per-connection WebSocket tasks.
//!
//! Each socket gets a writer that drains the connection's hub queue into the
//! socket and a reader that watches for the client going away. Whichever
//! side ends first unregisters the connection; the other side follows.

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use super::messages::ConnectionNotice;
use crate::domain::{ChannelTag, ConnectionHandle, ConnectionLink, Frame, HubHandle};

/// Registers the socket on `tag` and runs it until either side closes.
pub async fn run_connection(socket: WebSocket, hub: HubHandle, tag: ChannelTag) {
    let handle = match hub.register(tag).await {
        Ok(handle) => handle,
        Err(err) => {
            tracing::warn!(error = %err, "ws connection rejected");
            return;
        }
    };
    drop(hub);

    let (mut ws_tx, ws_rx) = socket.split();
    tracing::info!(connection_id = %handle.id(), tag = %handle.tag(), "ws client connected");

    let greeting = ConnectionNotice::Connected {
        connection_id: handle.id(),
        instance: handle.tag().clone(),
        timestamp: Utc::now(),
    };
    let greeted = match Frame::encode(&greeting) {
        Ok(frame) => send_frame(&mut ws_tx, &frame).await,
        Err(err) => {
            tracing::warn!(error = %err, "failed to encode greeting");
            false
        }
    };

    let reader = tokio::spawn(read_loop(ws_rx, handle.link()));
    if greeted {
        write_loop(ws_tx, handle).await;
    } else {
        handle.finish().await;
    }
    reader.abort();
}

/// Drains the hub queue into the socket, then closes both.
async fn write_loop(mut ws_tx: SplitSink<WebSocket, Message>, mut handle: ConnectionHandle) {
    let mut delivered: u64 = 0;

    while let Some(frame) = handle.recv().await {
        if !send_frame(&mut ws_tx, &frame).await {
            tracing::debug!(connection_id = %handle.id(), "ws write failed");
            break;
        }
        delivered = delivered.saturating_add(1);
    }

    let _ = ws_tx.send(Message::Close(None)).await;
    let _ = ws_tx.close().await;

    tracing::info!(
        connection_id = %handle.id(),
        tag = %handle.tag(),
        delivered,
        "ws client disconnected"
    );
    handle.finish().await;
}

/// Waits for the client to close or fail, then unregisters it.
async fn read_loop(mut ws_rx: SplitStream<WebSocket>, link: ConnectionLink) {
    loop {
        match ws_rx.next().await {
            Some(Ok(Message::Text(text))) => {
                tracing::trace!(connection_id = %link.id(), len = text.as_str().len(), "ignoring client text");
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(err)) => {
                tracing::debug!(connection_id = %link.id(), error = %err, "ws read failed");
                break;
            }
            Some(Ok(_)) => {}
        }
    }
    link.unregister().await;
}

async fn send_frame(ws_tx: &mut SplitSink<WebSocket, Message>, frame: &Frame) -> bool {
    ws_tx
        .send(Message::text(frame.as_str()))
        .await
        .is_ok()
}
