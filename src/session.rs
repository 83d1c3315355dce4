//! Realtime session: connection lifecycle, send path, receive loop,
//! transcript accumulation, and tool-call dispatch.
//!
//! One worker task owns the transport for the session's lifetime. Callers
//! reach it only through a bounded channel; the worker runs a single
//! `select!` loop over cancellation, outbound frames, and inbound frames, so
//! every event is logged in the order it crosses the wire.

use base64::prelude::*;
use bytes::Bytes;
use parking_lot::{Mutex as SyncMutex, RwLock};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::audio::{AudioBridge, bytes_to_pcm};
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::events::{ClientEvent, ConversationItem, ServerEvent, SessionSettings};
use crate::log::{Direction, EventLog, LogEntry};
use crate::tools::{Tool, ToolRegistry};
use crate::transport::{Frame, Transport, WsTransport};

/// Channel capacity for outbound frames.
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No live transport
    #[default]
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Transport live, worker running
    Connected,
    /// Teardown requested, awaiting worker termination
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Outbound frame queued for the worker, paired with the log entry the
/// worker appends once the transport write succeeds. A frame that never
/// reaches the wire is never logged as sent.
struct Outbound {
    frame: OutboundFrame,
    log: String,
}

enum OutboundFrame {
    Text(String),
    Binary(Bytes),
}

/// State shared between the session handle and its worker task.
struct WorkerState {
    registry: Arc<ToolRegistry>,
    log: Arc<EventLog>,
    playback: Arc<AudioBridge>,
    transcript: Arc<RwLock<String>>,
    pending_finals: Arc<SyncMutex<Vec<String>>>,
    connected: Arc<AtomicBool>,
    state: Arc<RwLock<ConnectionState>>,
}

/// A client-side realtime session.
///
/// Constructed once per logical conversation. `connect` opens a transport
/// and spawns the receive worker; `disconnect` tears both down. Reconnecting
/// opens a fresh transport under the same session object and never resets
/// the event log.
pub struct RealtimeSession {
    config: SessionConfig,
    registry: Arc<ToolRegistry>,
    log: Arc<EventLog>,
    playback: Arc<AudioBridge>,
    transcript: Arc<RwLock<String>>,
    pending_finals: Arc<SyncMutex<Vec<String>>>,
    connected: Arc<AtomicBool>,
    state: Arc<RwLock<ConnectionState>>,
    outbound: Mutex<Option<mpsc::Sender<Outbound>>>,
    cancel: Mutex<Option<CancellationToken>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeSession {
    /// Create an unconnected session.
    pub fn new(config: SessionConfig) -> Self {
        let playback = Arc::new(AudioBridge::bounded(
            config.frame_samples,
            // Bound playback buffering to roughly ten seconds of audio
            config.sample_rate as usize * 10,
        ));
        Self {
            log: Arc::new(EventLog::new(config.debug)),
            playback,
            config,
            registry: Arc::new(ToolRegistry::new()),
            transcript: Arc::new(RwLock::new(String::new())),
            pending_finals: Arc::new(SyncMutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(false)),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            outbound: Mutex::new(None),
            cancel: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Create a session configured from the process environment.
    pub fn from_env() -> Self {
        Self::new(SessionConfig::from_env())
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// True only while a live transport worker exists.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// The accumulated transcript.
    pub fn transcript(&self) -> String {
        self.transcript.read().clone()
    }

    /// The event log.
    pub fn log(&self) -> Arc<EventLog> {
        self.log.clone()
    }

    /// Snapshot of all logged events.
    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.log.entries()
    }

    /// Bridge carrying decoded remote audio for speaker playback.
    pub fn playback(&self) -> Arc<AudioBridge> {
        self.playback.clone()
    }

    /// Register a tool. When connected, pushes an updated tool list to the
    /// remote peer.
    pub async fn register_tool(&self, tool: Tool) -> SessionResult<()> {
        self.registry.register(tool)?;
        if self.is_connected() {
            self.push_session_update().await?;
        }
        Ok(())
    }

    /// Open the WebSocket transport and start the session.
    ///
    /// Fails with `AlreadyConnected` when connected and `MissingCredentials`
    /// when the configured environment variable is absent. Returns once the
    /// handshake completes; no remote acknowledgment is awaited.
    pub async fn connect(&self) -> SessionResult<()> {
        if self.is_connected() {
            return Err(SessionError::AlreadyConnected);
        }
        let api_key = self.config.api_key()?;

        *self.state.write() = ConnectionState::Connecting;
        match WsTransport::connect(&self.config.ws_url(), &api_key).await {
            Ok(transport) => self.attach(Box::new(transport)).await,
            Err(e) => {
                *self.state.write() = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Start the session over an already-negotiated transport.
    pub async fn connect_with_transport(
        &self,
        transport: Box<dyn Transport>,
    ) -> SessionResult<()> {
        if self.is_connected() {
            return Err(SessionError::AlreadyConnected);
        }
        *self.state.write() = ConnectionState::Connecting;
        self.attach(transport).await
    }

    /// Spawn the worker over `transport` and send the initial
    /// `session.update` enumerating registered tools.
    async fn attach(&self, transport: Box<dyn Transport>) -> SessionResult<()> {
        let (tx, rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let token = CancellationToken::new();

        *self.outbound.lock().await = Some(tx);
        *self.cancel.lock().await = Some(token.clone());
        self.connected.store(true, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Connected;

        let ctx = WorkerState {
            registry: self.registry.clone(),
            log: self.log.clone(),
            playback: self.playback.clone(),
            transcript: self.transcript.clone(),
            pending_finals: self.pending_finals.clone(),
            connected: self.connected.clone(),
            state: self.state.clone(),
        };
        let handle = tokio::spawn(run_worker(transport, rx, token, ctx));
        *self.worker.lock().await = Some(handle);

        tracing::info!("realtime session connected");
        self.push_session_update().await
    }

    /// Tear the session down. Idempotent; a no-op success when not
    /// connected.
    ///
    /// Cancels the worker cooperatively and awaits its termination before
    /// returning; cancellation is an expected outcome, not an error.
    pub async fn disconnect(&self) -> SessionResult<()> {
        if let Some(token) = self.cancel.lock().await.take() {
            *self.state.write() = ConnectionState::Disconnecting;
            token.cancel();
        }
        *self.outbound.lock().await = None;
        if let Some(handle) = self.worker.lock().await.take() {
            let _ = handle.await;
        }
        self.connected.store(false, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Disconnected;
        tracing::info!("realtime session disconnected");
        Ok(())
    }

    /// Send a protocol event.
    ///
    /// Fails with `NotConnected` when no transport is live, leaving the log
    /// untouched. `input_audio_buffer.append` payloads are decoded and sent
    /// as binary frames, logged as `{"type":"audio_sent","size":N}` rather
    /// than the raw audio; `input_audio_buffer.commit` is logged as a commit
    /// marker; every other event type is merged with its payload and logged
    /// verbatim. The worker appends the log entry after the wire write
    /// succeeds, so log order matches wire order and a failed write is
    /// surfaced as an error entry instead of a phantom send.
    pub async fn send(&self, event_type: &str, payload: Option<Value>) -> SessionResult<()> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        if event_type.is_empty() {
            return Err(SessionError::InvalidPayload(
                "event type must be non-empty".to_string(),
            ));
        }

        match event_type {
            "input_audio_buffer.append" => {
                let encoded = payload
                    .as_ref()
                    .and_then(|p| p.get("audio"))
                    .and_then(|a| a.as_str())
                    .ok_or_else(|| {
                        SessionError::InvalidPayload("audio payload missing".to_string())
                    })?;
                let audio = BASE64_STANDARD
                    .decode(encoded)
                    .map_err(|e| SessionError::InvalidPayload(format!("invalid base64: {e}")))?;
                let size = audio.len();
                self.enqueue(
                    OutboundFrame::Binary(Bytes::from(audio)),
                    json!({"type": "audio_sent", "size": size}).to_string(),
                )
                .await
            }
            "input_audio_buffer.commit" => {
                let text = serde_json::to_string(&ClientEvent::InputAudioBufferCommit)?;
                self.enqueue(
                    OutboundFrame::Text(text),
                    json!({"type": "audio_commit"}).to_string(),
                )
                .await
            }
            _ => {
                let mut event = json!({ "type": event_type });
                if let Some(payload) = payload {
                    match payload {
                        Value::Object(fields) => {
                            for (key, value) in fields {
                                event[key] = value;
                            }
                        }
                        other => {
                            return Err(SessionError::InvalidPayload(format!(
                                "payload must be a JSON object, got {other}"
                            )));
                        }
                    }
                }
                let text = event.to_string();
                self.enqueue(OutboundFrame::Text(text.clone()), text).await
            }
        }
    }

    /// Send the current tool list with the `auto` tool-choice policy.
    async fn push_session_update(&self) -> SessionResult<()> {
        let event = ClientEvent::SessionUpdate {
            session: SessionSettings {
                tools: self.registry.definitions(),
                tool_choice: "auto".to_string(),
            },
        };
        let text = serde_json::to_string(&event)?;
        self.enqueue(OutboundFrame::Text(text.clone()), text).await
    }

    async fn enqueue(&self, frame: OutboundFrame, log: String) -> SessionResult<()> {
        let tx = self.outbound.lock().await.clone();
        match tx {
            Some(tx) => tx
                .send(Outbound { frame, log })
                .await
                .map_err(|_| SessionError::NotConnected),
            None => Err(SessionError::NotConnected),
        }
    }
}

// =============================================================================
// Worker
// =============================================================================

async fn run_worker(
    mut transport: Box<dyn Transport>,
    mut rx: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
    ctx: WorkerState,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = transport.close().await;
                break;
            }

            outbound = rx.recv() => {
                let Some(outbound) = outbound else {
                    let _ = transport.close().await;
                    break;
                };
                let result = match outbound.frame {
                    OutboundFrame::Text(text) => transport.send_text(&text).await,
                    OutboundFrame::Binary(data) => transport.send_binary(data).await,
                };
                match result {
                    Ok(()) => ctx.log.append(Direction::Outbound, outbound.log),
                    Err(e) => {
                        tracing::error!("transport send failed: {e}");
                        ctx.log.append_json(
                            Direction::Outbound,
                            &json!({"type": "error", "message": e.to_string()}),
                        );
                        break;
                    }
                }
            }

            inbound = transport.recv() => {
                match inbound {
                    Some(Ok(frame)) => {
                        if let Err(e) = handle_frame(frame, &mut transport, &ctx).await {
                            tracing::error!("transport send failed during dispatch: {e}");
                            ctx.log.append_json(
                                Direction::Outbound,
                                &json!({"type": "error", "message": e.to_string()}),
                            );
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!("transport receive failed: {e}");
                        ctx.log.append_json(
                            Direction::Inbound,
                            &json!({"type": "error", "message": e.to_string()}),
                        );
                        break;
                    }
                    None => {
                        tracing::info!("transport closed by remote");
                        ctx.log.append_json(
                            Direction::Inbound,
                            &json!({"type": "connection_closed"}),
                        );
                        break;
                    }
                }
            }
        }
    }

    ctx.connected.store(false, Ordering::SeqCst);
    *ctx.state.write() = ConnectionState::Disconnected;
    tracing::debug!("session worker ended");
}

/// Handle one inbound frame: log it, then route by event type.
async fn handle_frame(
    frame: Frame,
    transport: &mut Box<dyn Transport>,
    ctx: &WorkerState,
) -> SessionResult<()> {
    let text = match frame {
        Frame::Binary(data) => {
            // Raw audio outside the JSON envelope goes straight to playback
            ctx.log.append_json(
                Direction::Inbound,
                &json!({"type": "audio_received", "size": data.len()}),
            );
            match bytes_to_pcm(&data) {
                Some(samples) => ctx.playback.push(&samples),
                None => tracing::warn!("dropping odd-length binary audio frame"),
            }
            return Ok(());
        }
        Frame::Text(text) => text,
    };

    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("dropping malformed inbound message: {e}");
            ctx.log.append_json(
                Direction::Inbound,
                &json!({"type": "parse_error", "message": e.to_string()}),
            );
            return Ok(());
        }
    };
    let Some(event) = ServerEvent::classify(&value) else {
        tracing::warn!("dropping inbound event without a type tag");
        ctx.log.append_json(
            Direction::Inbound,
            &json!({"type": "parse_error", "message": "missing event type"}),
        );
        return Ok(());
    };

    // Every event is logged before any dispatch
    ctx.log.append(Direction::Inbound, text);

    match event {
        ServerEvent::FunctionCallDone {
            name,
            call_id,
            arguments,
        } => dispatch_tool_call(name, call_id, arguments, transport, ctx).await?,

        ServerEvent::AudioDelta { delta } => match BASE64_STANDARD.decode(&delta) {
            Ok(audio) => match bytes_to_pcm(&audio) {
                Some(samples) => ctx.playback.push(&samples),
                None => tracing::warn!("dropping odd-length audio delta"),
            },
            Err(e) => tracing::warn!("failed to decode audio delta: {e}"),
        },

        ServerEvent::TranscriptDelta { delta } => {
            ctx.transcript.write().push_str(&delta);
        }

        ServerEvent::TranscriptFinal { transcript } => {
            ctx.pending_finals.lock().push(transcript);
        }

        ServerEvent::UtteranceEnd => {
            let utterance = {
                let mut finals = ctx.pending_finals.lock();
                if finals.is_empty() {
                    None
                } else {
                    let joined = finals.join(" ");
                    finals.clear();
                    Some(joined)
                }
            };
            if let Some(utterance) = utterance {
                let mut transcript = ctx.transcript.write();
                transcript.push_str(&utterance);
                transcript.push('\n');
            }
        }

        ServerEvent::Error { message } => {
            tracing::warn!("remote error: {message}");
        }

        ServerEvent::Other => {}
    }
    Ok(())
}

/// Invoke a registered tool and reply with exactly one function-output event
/// followed by a response-continuation request.
///
/// Unknown tools are dropped silently; argument and handler failures produce
/// an error-carrying output so the remote always receives a matching reply.
async fn dispatch_tool_call(
    name: String,
    call_id: String,
    arguments: String,
    transport: &mut Box<dyn Transport>,
    ctx: &WorkerState,
) -> SessionResult<()> {
    let Some(tool) = ctx.registry.get(&name) else {
        tracing::warn!(tool = %name, %call_id, "unknown tool, dropping call");
        return Ok(());
    };

    let output = match serde_json::from_str::<Value>(&arguments) {
        Ok(args) => match (tool.handler)(args).await {
            Ok(result) => result.to_string(),
            Err(message) => {
                tracing::warn!(tool = %name, %call_id, "tool handler failed: {message}");
                json!({ "error": message }).to_string()
            }
        },
        Err(e) => {
            tracing::warn!(tool = %name, %call_id, "malformed tool arguments: {e}");
            json!({ "error": format!("invalid arguments: {e}") }).to_string()
        }
    };

    send_worker_event(
        transport,
        ctx,
        &ClientEvent::ConversationItemCreate {
            item: ConversationItem::function_call_output(call_id, output),
        },
    )
    .await?;
    send_worker_event(transport, ctx, &ClientEvent::ResponseCreate).await
}

async fn send_worker_event(
    transport: &mut Box<dyn Transport>,
    ctx: &WorkerState,
    event: &ClientEvent,
) -> SessionResult<()> {
    let text = serde_json::to_string(event)?;
    transport.send_text(&text).await?;
    ctx.log.append(Direction::Outbound, text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(ConnectionState::Disconnecting.to_string(), "Disconnecting");
    }

    #[tokio::test]
    async fn test_new_session_is_disconnected() {
        let session = RealtimeSession::new(SessionConfig::default());
        assert!(!session.is_connected());
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(session.log_entries().is_empty());
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let session = RealtimeSession::new(SessionConfig::default());
        let result = session.send("response.create", None).await;
        assert!(matches!(result, Err(SessionError::NotConnected)));
        assert!(session.log_entries().is_empty());
    }

    #[tokio::test]
    async fn test_connect_without_credentials_fails() {
        let config = SessionConfig {
            api_key_env: "VOICEWIRE_TEST_NO_SUCH_KEY".to_string(),
            ..Default::default()
        };
        unsafe { std::env::remove_var("VOICEWIRE_TEST_NO_SUCH_KEY") };
        let session = RealtimeSession::new(config);
        let result = session.connect().await;
        assert!(matches!(result, Err(SessionError::MissingCredentials(_))));
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent_when_never_connected() {
        let session = RealtimeSession::new(SessionConfig::default());
        session.disconnect().await.unwrap();
        session.disconnect().await.unwrap();
        assert!(!session.is_connected());
    }
}
