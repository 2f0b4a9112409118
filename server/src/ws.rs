//! The WebSocket transport (spec §4.10): message-framed request/response
//! with the same batch/pipelining semantics as the HTTP transport, plus
//! the connection-state tracking HTTP doesn't need (a request arriving
//! before the handshake completes, or after close, is rejected with a
//! typed error naming the current state). `tokio-tungstenite` is the
//! pack's WebSocket crate of choice (`rerun-io-rerun`'s `re_ws_comms`).

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use edgegraph_rpc::{
    parse_safe, run_batch, BatchFrame, Connection, RpcContext, RpcError, SafeParseLimits, SubRequest,
};

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Incoming {
    Batch(BatchFrame),
    Single(SubRequest),
}

pub async fn serve(addr: &str, rpc: Arc<RpcContext>, limits: SafeParseLimits) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr, "starting WebSocket RPC listener");
    loop {
        let (stream, peer) = listener.accept().await?;
        let rpc = rpc.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, rpc, limits).await {
                debug!(%peer, error = %e, "websocket connection ended");
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    rpc: Arc<RpcContext>,
    limits: SafeParseLimits,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();
    let conn = Arc::new(Connection::new());
    conn.mark_open();

    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!(%peer, error = %e, "websocket read error");
                break;
            }
        };
        match msg {
            Message::Text(text) => {
                let response = handle_frame(&conn, &rpc, &limits, text.as_bytes()).await;
                if write.send(Message::Text(response)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            Message::Ping(payload) => {
                if write.send(Message::Pong(payload)).await.is_err() {
                    break;
                }
            }
            _ => {}
        }
    }

    conn.mark_closing();
    conn.close();
    Ok(())
}

async fn handle_frame(conn: &Connection, rpc: &RpcContext, limits: &SafeParseLimits, raw: &[u8]) -> String {
    if let Err(e) = conn.guard_open() {
        return serde_json::to_string(&e.to_ws_envelope(None)).unwrap_or_default();
    }

    let value = match parse_safe(raw, limits) {
        Ok(v) => v,
        Err(e) => return serde_json::to_string(&RpcError::from(e).to_ws_envelope(None)).unwrap_or_default(),
    };
    let incoming: Incoming = match serde_json::from_value(value) {
        Ok(i) => i,
        Err(e) => return serde_json::to_string(&RpcError::from(e).to_ws_envelope(None)).unwrap_or_default(),
    };

    match incoming {
        Incoming::Single(sub) => {
            let rx = conn.track_pending(sub.id.clone());
            let dispatch = rpc.dispatch(&sub.method, sub.args);
            tokio::select! {
                result = dispatch => {
                    conn.complete(&sub.id);
                    match result {
                        Ok(value) => serde_json::to_string(&serde_json::json!({ "id": sub.id, "result": value })).unwrap_or_default(),
                        Err(e) => serde_json::to_string(&e.to_ws_envelope(Some(sub.id))).unwrap_or_default(),
                    }
                }
                closed = rx => {
                    let err = closed.unwrap_or_else(|_| RpcError::connection_closed());
                    serde_json::to_string(&err.to_ws_envelope(Some(sub.id))).unwrap_or_default()
                }
            }
        }
        Incoming::Batch(frame) => {
            let response = run_batch(frame, |method, args| async move { rpc.dispatch(&method, args).await }).await;
            serde_json::to_string(&response).unwrap_or_default()
        }
    }
}
