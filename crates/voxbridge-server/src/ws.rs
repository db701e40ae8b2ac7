use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::protocol::{InboundMessage, OutboundMessage};
use crate::traits::{AudioSink, Broadcaster, CommandDispatcher};

const HUB_CAPACITY: usize = 256;
const OUT_CAPACITY: usize = 64;
const AUDIO_CAPACITY: usize = 64;

#[derive(Clone)]
struct ServerState {
    hub: broadcast::Sender<OutboundMessage>,
    audio_sink: Arc<dyn AudioSink>,
    commands: Arc<dyn CommandDispatcher>,
    clients: Arc<AtomicUsize>,
}

/// Shared handle to the running server: publishes transcriptions to every
/// connected client and exposes the connection gauge.
#[derive(Clone)]
pub struct ServerHandle {
    hub: broadcast::Sender<OutboundMessage>,
    clients: Arc<AtomicUsize>,
}

impl ServerHandle {
    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::Relaxed)
    }

    pub fn send_status(&self, message: &str) {
        let _ = self.hub.send(OutboundMessage::Status {
            message: message.to_string(),
        });
    }
}

impl Broadcaster for ServerHandle {
    fn broadcast(&self, text: &str, session_id: &str, confidence: f32) {
        // A send with no connected clients is not an error
        let _ = self.hub.send(OutboundMessage::Transcribe {
            content: text.to_string(),
            session_id: session_id.to_string(),
            confidence,
            is_final: true,
        });
    }
}

/// WebSocket transcription server. Accepts JSON audio and command frames,
/// forwards audio to the sink on a blocking worker, answers commands inline
/// and fans transcription broadcasts out in enqueue order.
pub struct TranscriptionServer {
    state: ServerState,
}

impl TranscriptionServer {
    pub fn new(
        audio_sink: Arc<dyn AudioSink>,
        commands: Arc<dyn CommandDispatcher>,
    ) -> (Self, ServerHandle) {
        let (hub, _) = broadcast::channel(HUB_CAPACITY);
        let clients = Arc::new(AtomicUsize::new(0));

        let handle = ServerHandle {
            hub: hub.clone(),
            clients: Arc::clone(&clients),
        };
        let server = Self {
            state: ServerState {
                hub,
                audio_sink,
                commands,
                clients,
            },
        };
        (server, handle)
    }

    /// Bind and serve until the shutdown future resolves. A bind failure is
    /// returned to the caller (fatal at startup).
    pub async fn serve(
        self,
        port: u16,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let app = Router::new()
            .route("/", get(ws_handler))
            .with_state(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("WebSocket server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

async fn ws_handler(
    State(state): State<ServerState>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| async move {
        state.clients.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = handle_socket(state.clone(), socket).await {
            debug!("WebSocket session ended with error: {}", err);
        }
        state.clients.fetch_sub(1, Ordering::Relaxed);
    })
}

async fn handle_socket(state: ServerState, socket: WebSocket) -> Result<(), axum::Error> {
    let (mut sender, mut receiver) = socket.split();

    let (out_tx, mut out_rx) = mpsc::channel::<OutboundMessage>(OUT_CAPACITY);
    let mut hub_rx = state.hub.subscribe();

    let _ = out_tx
        .send(OutboundMessage::Status {
            message: "connected".to_string(),
        })
        .await;

    // One writer per connection: merges direct replies with hub broadcasts
    let send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                direct = out_rx.recv() => match direct {
                    Some(msg) => msg,
                    None => break,
                },
                published = hub_rx.recv() => match published {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Client fell behind, skipped {} broadcasts", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(err) => {
                    error!("Failed to serialize outbound payload: {}", err);
                    continue;
                }
            };
            if sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    // Engine calls block, so inbound audio drains through a blocking worker
    let (audio_tx, mut audio_rx) = mpsc::channel::<(Vec<i16>, String)>(AUDIO_CAPACITY);
    let sink = Arc::clone(&state.audio_sink);
    let audio_task = tokio::task::spawn_blocking(move || {
        while let Some((samples, session_id)) = audio_rx.blocking_recv() {
            sink.on_audio(&samples, &session_id);
        }
    });

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<InboundMessage>(&text) {
                Ok(InboundMessage::Audio {
                    audio, session_id, ..
                }) => {
                    if audio_tx.send((audio, session_id)).await.is_err() {
                        break;
                    }
                }
                Ok(InboundMessage::Command {
                    command, params, ..
                }) => {
                    debug!("Received command: {}", command);
                    let result = state.commands.handle_command(&command, &params);
                    let response = OutboundMessage::command_response(&command, result);
                    if out_tx.send(response).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!("Malformed inbound message: {}", err);
                    let _ = out_tx
                        .send(OutboundMessage::Error {
                            message: format!("malformed message: {err}"),
                        })
                        .await;
                }
            },
            Message::Binary(_) => {
                let _ = out_tx
                    .send(OutboundMessage::Error {
                        message: "binary frames are not supported; send JSON text".to_string(),
                    })
                    .await;
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    drop(audio_tx);
    drop(out_tx);
    let _ = audio_task.await;
    send_task.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    struct NullSink;
    impl AudioSink for NullSink {
        fn on_audio(&self, _samples: &[i16], _session_id: &str) {}
    }

    struct EchoCommands;
    impl CommandDispatcher for EchoCommands {
        fn handle_command(&self, command: &str, _params: &Value) -> Value {
            json!({"status": "ok", "echo": command})
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let (server, handle) =
            TranscriptionServer::new(Arc::new(NullSink), Arc::new(EchoCommands));
        let mut rx = server.state.hub.subscribe();

        handle.broadcast("hello world", "mic-capture", 1.0);

        match rx.recv().await.unwrap() {
            OutboundMessage::Transcribe {
                content,
                session_id,
                confidence,
                is_final,
            } => {
                assert_eq!(content, "hello world");
                assert_eq!(session_id, "mic-capture");
                assert_eq!(confidence, 1.0);
                assert!(is_final);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn broadcast_order_is_preserved() {
        let (server, handle) =
            TranscriptionServer::new(Arc::new(NullSink), Arc::new(EchoCommands));
        let mut rx = server.state.hub.subscribe();

        handle.broadcast("first", "s", 1.0);
        handle.broadcast("second", "s", 1.0);

        let texts: Vec<String> = [rx.recv().await.unwrap(), rx.recv().await.unwrap()]
            .into_iter()
            .map(|msg| match msg {
                OutboundMessage::Transcribe { content, .. } => content,
                other => panic!("unexpected message: {other:?}"),
            })
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn broadcast_without_clients_is_silent() {
        let (_server, handle) =
            TranscriptionServer::new(Arc::new(NullSink), Arc::new(EchoCommands));
        handle.broadcast("nobody listening", "s", 0.5);
        assert_eq!(handle.client_count(), 0);
    }
}
