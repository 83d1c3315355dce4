//! Wire event types for the realtime protocol.
//!
//! All events are JSON objects carrying a `type` tag.
//!
//! Client events (sent to server):
//! - session.update - Announce tool definitions and tool-choice policy
//! - input_audio_buffer.commit - Signal end of utterance
//! - conversation.item.create - Add an item (tool-call replies)
//! - response.create - Ask the remote to resume generating output
//!
//! Server events (received from server) are classified rather than fully
//! typed: the session logs every inbound event verbatim and only the type
//! families below trigger further action.

use serde::Serialize;
use serde_json::Value;

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent over the transport.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration (tools and tool-choice policy)
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session settings
        session: SessionSettings,
    },

    /// Commit the input audio buffer, marking end of utterance
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    /// Create a conversation item
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        /// Item to create
        item: ConversationItem,
    },

    /// Ask the remote to resume generating output
    #[serde(rename = "response.create")]
    ResponseCreate,
}

/// Session settings carried by a `session.update` event.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSettings {
    /// Registered tool definitions
    pub tools: Vec<ToolDef>,
    /// Tool selection policy
    pub tool_choice: String,
}

/// Wire-format tool definition.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Tool name
    pub name: String,
    /// Tool description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for parameters
    pub parameters: Value,
}

/// Conversation item carried by `conversation.item.create`.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationItem {
    /// Item type
    #[serde(rename = "type")]
    pub item_type: String,
    /// Call ID this item replies to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Serialized tool output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ConversationItem {
    /// Build a function-call-output item keyed to `call_id`.
    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            item_type: "function_call_output".to_string(),
            call_id: Some(call_id.into()),
            output: Some(output.into()),
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Classified inbound event.
///
/// Unrecognized types map to `Other`; they are logged by the session and
/// need no further action.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// A tool call's argument accumulation completed
    FunctionCallDone {
        /// Tool name
        name: String,
        /// Call ID the reply must be keyed to
        call_id: String,
        /// JSON-encoded arguments string
        arguments: String,
    },
    /// Base64-encoded PCM audio chunk
    AudioDelta {
        /// Base64 payload
        delta: String,
    },
    /// Transcript text fragment
    TranscriptDelta {
        /// Text fragment
        delta: String,
    },
    /// A finalized transcript fragment, not yet utterance-complete
    TranscriptFinal {
        /// Finalized text
        transcript: String,
    },
    /// The remote signaled utterance completion
    UtteranceEnd,
    /// Remote error report
    Error {
        /// Error message
        message: String,
    },
    /// Logged-only event
    Other,
}

impl ServerEvent {
    /// Classify an inbound event by its `type` field.
    ///
    /// Returns `None` when the `type` tag is absent or empty, which violates
    /// the event envelope invariant.
    pub fn classify(event: &Value) -> Option<ServerEvent> {
        let event_type = event.get("type").and_then(|t| t.as_str())?;
        if event_type.is_empty() {
            return None;
        }

        let str_field = |key: &str| {
            event
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        Some(match event_type {
            // A call without a name or call id cannot be dispatched or
            // answered; it degrades to a logged-only event.
            "response.function_call_arguments.done" => {
                let name = str_field("name");
                let call_id = str_field("call_id");
                if name.is_empty() || call_id.is_empty() {
                    ServerEvent::Other
                } else {
                    ServerEvent::FunctionCallDone {
                        name,
                        call_id,
                        arguments: str_field("arguments"),
                    }
                }
            }
            "response.audio.delta" => ServerEvent::AudioDelta {
                delta: str_field("delta"),
            },
            "response.audio_transcript.delta" => ServerEvent::TranscriptDelta {
                delta: str_field("delta"),
            },
            "conversation.item.input_audio_transcription.completed" => {
                ServerEvent::TranscriptFinal {
                    transcript: str_field("transcript"),
                }
            }
            "input_audio_buffer.committed" => ServerEvent::UtteranceEnd,
            "error" => ServerEvent::Error {
                message: event
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .unwrap_or_default()
                    .to_string(),
            },
            _ => ServerEvent::Other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_update_serialization() {
        let event = ClientEvent::SessionUpdate {
            session: SessionSettings {
                tools: vec![ToolDef {
                    tool_type: "function".to_string(),
                    name: "get_time".to_string(),
                    description: None,
                    parameters: json!({"type": "object", "properties": {}}),
                }],
                tool_choice: "auto".to_string(),
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "session.update");
        assert_eq!(value["session"]["tool_choice"], "auto");
        assert_eq!(value["session"]["tools"][0]["name"], "get_time");
        assert_eq!(value["session"]["tools"][0]["type"], "function");
    }

    #[test]
    fn test_commit_serialization() {
        let json = serde_json::to_string(&ClientEvent::InputAudioBufferCommit).unwrap();
        assert!(json.contains("input_audio_buffer.commit"));
    }

    #[test]
    fn test_function_call_output_serialization() {
        let event = ClientEvent::ConversationItemCreate {
            item: ConversationItem::function_call_output("call_1", r#"{"ok":true}"#),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "conversation.item.create");
        assert_eq!(value["item"]["type"], "function_call_output");
        assert_eq!(value["item"]["call_id"], "call_1");
        assert_eq!(value["item"]["output"], r#"{"ok":true}"#);
    }

    #[test]
    fn test_classify_function_call_done() {
        let event = json!({
            "type": "response.function_call_arguments.done",
            "name": "get_time",
            "call_id": "1",
            "arguments": "{}"
        });
        assert_eq!(
            ServerEvent::classify(&event),
            Some(ServerEvent::FunctionCallDone {
                name: "get_time".to_string(),
                call_id: "1".to_string(),
                arguments: "{}".to_string(),
            })
        );
    }

    #[test]
    fn test_classify_audio_family() {
        let delta = json!({"type": "response.audio.delta", "delta": "AAAA"});
        assert!(matches!(
            ServerEvent::classify(&delta),
            Some(ServerEvent::AudioDelta { .. })
        ));

        let transcript = json!({"type": "response.audio_transcript.delta", "delta": "hi"});
        assert_eq!(
            ServerEvent::classify(&transcript),
            Some(ServerEvent::TranscriptDelta {
                delta: "hi".to_string()
            })
        );

        // Other audio-family events are log-only
        let done = json!({"type": "response.audio.done"});
        assert_eq!(ServerEvent::classify(&done), Some(ServerEvent::Other));
    }

    #[test]
    fn test_classify_function_call_requires_name_and_call_id() {
        let missing_call_id = json!({
            "type": "response.function_call_arguments.done",
            "name": "get_time",
            "arguments": "{}"
        });
        assert_eq!(
            ServerEvent::classify(&missing_call_id),
            Some(ServerEvent::Other)
        );

        let missing_name = json!({
            "type": "response.function_call_arguments.done",
            "call_id": "1",
            "arguments": "{}"
        });
        assert_eq!(ServerEvent::classify(&missing_name), Some(ServerEvent::Other));

        // Missing arguments still dispatch; the malformed-JSON path answers
        // the call with an error output.
        let missing_arguments = json!({
            "type": "response.function_call_arguments.done",
            "name": "get_time",
            "call_id": "1"
        });
        assert!(matches!(
            ServerEvent::classify(&missing_arguments),
            Some(ServerEvent::FunctionCallDone { .. })
        ));
    }

    #[test]
    fn test_classify_rejects_missing_type() {
        assert!(ServerEvent::classify(&json!({"delta": "x"})).is_none());
        assert!(ServerEvent::classify(&json!({"type": ""})).is_none());
        assert!(ServerEvent::classify(&json!({"type": 42})).is_none());
    }

    #[test]
    fn test_classify_error_event() {
        let event = json!({
            "type": "error",
            "error": {"type": "invalid_request_error", "message": "bad"}
        });
        assert_eq!(
            ServerEvent::classify(&event),
            Some(ServerEvent::Error {
                message: "bad".to_string()
            })
        );
    }
}
