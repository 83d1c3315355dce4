//! Client-side engine for bidirectional realtime voice sessions.
//!
//! A [`RealtimeSession`] owns one WebSocket connection to a realtime voice
//! endpoint. Outbound microphone audio flows through an [`AudioBridge`] and
//! a background [`AudioSender`]; inbound events are classified and routed to
//! playback, transcript accumulation, or tool dispatch; every event crossing
//! the wire lands in the session's [`EventLog`].

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod log;
pub mod session;
pub mod tools;
pub mod transport;

// Re-export commonly used items for convenience
pub use audio::{AudioBridge, AudioSender, bytes_to_pcm, pcm_to_bytes};
pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use events::{ClientEvent, ConversationItem, ServerEvent, SessionSettings, ToolDef};
pub use log::{Direction, EventLog, LogEntry};
pub use session::{ConnectionState, RealtimeSession};
pub use tools::{ParamSpec, ParamType, Tool, ToolHandler, ToolRegistry, ToolSchema, handler};
pub use transport::{Frame, Transport, WsTransport};
