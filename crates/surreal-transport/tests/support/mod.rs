//! In-process RPC server for transport tests.
//!
//! Each test scripts the server's behaviour per method with a responder
//! closure, and can push raw frames, send a close frame or drop the socket
//! on every open connection. [`stalled_peer`] stands in for a server that
//! stops reading altogether.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{CloseFrame, Message, WebSocket, close_code},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// What the server does with one request.
pub enum Script {
    /// Reply with `{id, result}`
    Result(Value),
    /// Reply with `{id, error: {code, message}}`
    Error(i64, &'static str),
    /// Run the inner script after a delay, without holding up other requests
    Delayed(Duration, Box<Script>),
    /// Never reply
    Silent,
    /// Drop the socket without a close frame
    Hangup,
}

impl Script {
    pub fn after(delay: Duration, script: Script) -> Self {
        Self::Delayed(delay, Box::new(script))
    }
}

#[derive(Clone)]
enum Control {
    Push(String),
    Close,
    Hangup,
}

type Responder = Box<dyn Fn(&str, &[Value]) -> Script + Send + Sync>;

struct ServerState {
    responder: Responder,
    pings: AtomicUsize,
    connections: AtomicUsize,
    open: AtomicUsize,
    control: broadcast::Sender<Control>,
}

pub struct MockServer {
    pub url: String,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(responder: impl Fn(&str, &[Value]) -> Script + Send + Sync + 'static) -> Self {
        let (control, _) = broadcast::channel(1024);
        let state = Arc::new(ServerState {
            responder: Box::new(responder),
            pings: AtomicUsize::new(0),
            connections: AtomicUsize::new(0),
            open: AtomicUsize::new(0),
            control,
        });

        let app = Router::new()
            .route("/rpc", get(upgrade))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            url: format!("ws://127.0.0.1:{port}/rpc"),
            state,
            task,
        }
    }

    /// Pings received across all connections.
    pub fn pings(&self) -> usize {
        self.state.pings.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Connections whose socket is still being served.
    pub fn open_connections(&self) -> usize {
        self.state.open.load(Ordering::SeqCst)
    }

    pub fn push(&self, frame: Value) {
        self.push_raw(&frame.to_string());
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self.state.control.send(Control::Push(text.to_string()));
    }

    /// Send a "going away" close frame on every connection.
    pub fn close_all(&self) {
        let _ = self.state.control.send(Control::Close);
    }

    /// Drop every connection's socket without a close frame.
    pub fn hangup(&self) {
        let _ = self.state.control.send(Control::Hangup);
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(socket: WebSocket, state: Arc<ServerState>) {
    let mut control = state.control.subscribe();
    state.connections.fetch_add(1, Ordering::SeqCst);
    state.open.fetch_add(1, Ordering::SeqCst);

    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let request: Value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
                    let id = request["id"].clone();
                    let method = request["method"].as_str().unwrap_or_default().to_string();
                    let params = request["params"].as_array().cloned().unwrap_or_default();
                    if !run_script(&out_tx, id, (state.responder)(&method, &params)) {
                        break;
                    }
                }
                Some(Ok(Message::Ping(_))) => {
                    state.pings.fetch_add(1, Ordering::SeqCst);
                }
                Some(Ok(_)) => {}
                _ => break,
            },
            control = control.recv() => match control {
                Ok(Control::Push(text)) => {
                    let _ = out_tx.send(Message::Text(text.into()));
                }
                Ok(Control::Close) => {
                    let frame = CloseFrame {
                        code: close_code::AWAY,
                        reason: "going away".into(),
                    };
                    let _ = out_tx.send(Message::Close(Some(frame)));
                }
                Ok(Control::Hangup) | Err(_) => break,
            },
        }
    }

    writer.abort();
    state.open.fetch_sub(1, Ordering::SeqCst);
}

/// Returns false when the connection should be dropped.
fn run_script(out: &mpsc::UnboundedSender<Message>, id: Value, script: Script) -> bool {
    match script {
        Script::Result(result) => {
            let _ = out.send(text(json!({ "id": id, "result": result })));
        }
        Script::Error(code, message) => {
            let _ = out.send(text(json!({ "id": id, "error": { "code": code, "message": message } })));
        }
        Script::Delayed(delay, inner) => {
            let out = out.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                run_script(&out, id, *inner);
            });
        }
        Script::Silent => {}
        Script::Hangup => return false,
    }
    true
}

fn text(value: Value) -> Message {
    Message::Text(value.to_string().into())
}

/// A peer that completes the handshake and then never reads, so a large
/// enough write from the client blocks once the socket buffers are full.
pub async fn stalled_peer() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            if let Ok(ws) = tokio_tungstenite::accept_async(tcp).await {
                held.push(ws);
            }
        }
    });

    format!("ws://127.0.0.1:{port}/rpc")
}
