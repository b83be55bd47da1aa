//! One websocket connection with request/response correlation.
//!
//! A background task owns the read half and resolves pending requests by
//! envelope id. There is no timeout, retry, or reconnect: a lost conductor
//! surfaces as failed in-flight calls and immediate errors on later ones.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::error::ConductorError;
use crate::wire::{Payload, WireKind, WireMessage};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type PendingMap = HashMap<u64, oneshot::Sender<Result<Payload, ConductorError>>>;

/// In-flight request senders until the read loop exits, then the close
/// reason. Checking for close and filing a sender happen under one lock.
enum PendingState {
    Open(PendingMap),
    Closed(String),
}

/// Aborts the read task once the last connection clone drops.
struct ReadTask(JoinHandle<()>);

impl Drop for ReadTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Clone)]
pub(crate) struct Connection {
    label: &'static str,
    pending: Arc<Mutex<PendingState>>,
    sink: Arc<Mutex<WsSink>>,
    next_id: Arc<AtomicU64>,
    _read_task: Arc<ReadTask>,
}

impl Connection {
    /// Connect and spawn the read loop.
    pub(crate) async fn connect(url: &str, label: &'static str) -> Result<Self, ConductorError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|source| ConductorError::Connect {
                url: url.to_string(),
                source,
            })?;
        debug!(url, label, "conductor websocket connected");

        let (sink, stream) = ws.split();
        let pending = Arc::new(Mutex::new(PendingState::Open(HashMap::new())));
        let read_task = tokio::spawn(read_loop(label, Arc::clone(&pending), stream));

        Ok(Self {
            label,
            pending,
            sink: Arc::new(Mutex::new(sink)),
            next_id: Arc::new(AtomicU64::new(0)),
            _read_task: Arc::new(ReadTask(read_task)),
        })
    }

    /// Send one request frame and wait for the matching response payload.
    pub(crate) async fn request(&self, data: Payload) -> Result<Payload, ConductorError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = WireMessage::request(id, data).encode()?;

        let (tx, rx) = oneshot::channel();
        match &mut *self.pending.lock().await {
            PendingState::Open(map) => {
                map.insert(id, tx);
            }
            PendingState::Closed(reason) => {
                return Err(ConductorError::Transport(reason.clone()));
            }
        }

        let sent = {
            let mut sink = self.sink.lock().await;
            sink.send(Message::Binary(frame)).await
        };
        if let Err(err) = sent {
            if let PendingState::Open(map) = &mut *self.pending.lock().await {
                map.remove(&id);
            }
            return Err(ConductorError::Transport(format!("send failed: {err}")));
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ConductorError::Transport(format!(
                "{} connection closed",
                self.label
            ))),
        }
    }
}

async fn read_loop(label: &'static str, pending: Arc<Mutex<PendingState>>, mut stream: WsStream) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(Message::Binary(bytes))) => handle_frame(label, &pending, &bytes).await,
            Some(Ok(Message::Close(_))) => break "conductor closed the connection".to_string(),
            // ping/pong/text: nothing to correlate
            Some(Ok(_)) => {}
            Some(Err(err)) => break format!("websocket error: {err}"),
            None => break "connection dropped".to_string(),
        }
    };

    warn!(label, %reason, "conductor read loop ended");
    let drained = std::mem::replace(
        &mut *pending.lock().await,
        PendingState::Closed(reason.clone()),
    );
    if let PendingState::Open(map) = drained {
        for (_, tx) in map {
            let _ = tx.send(Err(ConductorError::Transport(reason.clone())));
        }
    }
}

async fn handle_frame(label: &'static str, pending: &Mutex<PendingState>, bytes: &[u8]) {
    let msg = match WireMessage::decode(bytes) {
        Ok(msg) => msg,
        Err(err) => {
            warn!(label, %err, "dropping undecodable frame");
            return;
        }
    };

    match msg.kind {
        WireKind::Response => {
            let tx = match &mut *pending.lock().await {
                PendingState::Open(map) => map.remove(&msg.id),
                PendingState::Closed(_) => None,
            };
            match tx {
                Some(tx) => {
                    let _ = tx.send(Ok(msg.data));
                }
                None => warn!(label, id = msg.id, "response for unknown request id"),
            }
        }
        // nothing subscribes to signals; note them and move on
        WireKind::Signal => debug!(label, id = msg.id, "ignoring signal frame"),
        WireKind::Request => warn!(label, id = msg.id, "unexpected request frame"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bind an ephemeral listener and run `handler` on the first websocket
    /// that connects.
    async fn spawn_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });
        format!("ws://{addr}")
    }

    async fn read_request(ws: &mut WebSocketStream<TcpStream>) -> WireMessage {
        loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Binary(bytes) => return WireMessage::decode(&bytes).unwrap(),
                _ => continue,
            }
        }
    }

    async fn send_response(ws: &mut WebSocketStream<TcpStream>, id: u64, data: Payload) {
        let frame = WireMessage::response(id, data).encode().unwrap();
        ws.send(Message::Binary(frame)).await.unwrap();
    }

    #[tokio::test]
    async fn request_gets_matching_response() {
        let url = spawn_server(|mut ws| async move {
            let req = read_request(&mut ws).await;
            assert_eq!(req.kind, WireKind::Request);
            let body: String = req.data.decode().unwrap();
            let reply = Payload::encode(&format!("{body}!")).unwrap();
            send_response(&mut ws, req.id, reply).await;
        })
        .await;

        let conn = Connection::connect(&url, "test").await.unwrap();
        let resp = conn
            .request(Payload::encode(&"hello".to_string()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.decode::<String>().unwrap(), "hello!");
    }

    #[tokio::test]
    async fn out_of_order_responses_resolve_by_id() {
        let url = spawn_server(|mut ws| async move {
            let first = read_request(&mut ws).await;
            let second = read_request(&mut ws).await;
            // answer in reverse arrival order
            send_response(&mut ws, second.id, second.data).await;
            send_response(&mut ws, first.id, first.data).await;
        })
        .await;

        let conn = Connection::connect(&url, "test").await.unwrap();
        let a = conn.request(Payload::encode(&1u32).unwrap());
        let b = conn.request(Payload::encode(&2u32).unwrap());
        let (ra, rb) = tokio::join!(a, b);
        assert_eq!(ra.unwrap().decode::<u32>().unwrap(), 1);
        assert_eq!(rb.unwrap().decode::<u32>().unwrap(), 2);
    }

    #[tokio::test]
    async fn close_fails_in_flight_requests() {
        let url = spawn_server(|mut ws| async move {
            let _ = read_request(&mut ws).await;
            ws.close(None).await.unwrap();
        })
        .await;

        let conn = Connection::connect(&url, "test").await.unwrap();
        let err = conn
            .request(Payload::encode(&()).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ConductorError::Transport(_)));
    }

    #[tokio::test]
    async fn requests_overlapping_a_close_still_fail() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((tcp, _)) = listener.accept().await else { return };
                let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else { continue };
                let _ = ws.close(None).await;
            }
        });

        // a large body keeps the send busy while the close lands
        let body = vec![0u8; 256 * 1024];
        for _ in 0..16 {
            let conn = Connection::connect(&format!("ws://{addr}"), "test")
                .await
                .unwrap();
            let res = tokio::time::timeout(
                std::time::Duration::from_secs(5),
                conn.request(Payload::encode(&body).unwrap()),
            )
            .await
            .expect("request did not resolve after the close");
            assert!(matches!(res, Err(ConductorError::Transport(_))));
        }
    }

    #[tokio::test]
    async fn unknown_response_ids_are_ignored() {
        let url = spawn_server(|mut ws| async move {
            let req = read_request(&mut ws).await;
            // a stray response first, then the real one
            send_response(&mut ws, req.id + 1000, Payload::encode(&0u8).unwrap()).await;
            send_response(&mut ws, req.id, Payload::encode(&7u8).unwrap()).await;
        })
        .await;

        let conn = Connection::connect(&url, "test").await.unwrap();
        let resp = conn.request(Payload::encode(&()).unwrap()).await.unwrap();
        assert_eq!(resp.decode::<u8>().unwrap(), 7);
    }

    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let res = Connection::connect(&format!("ws://{addr}"), "test").await;
        assert!(matches!(res, Err(ConductorError::Connect { .. })));
    }
}
