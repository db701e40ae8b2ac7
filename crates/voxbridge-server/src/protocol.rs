use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Messages from clients. PCM samples travel as JSON arrays of signed
/// 16-bit values.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    Audio {
        audio: Vec<i16>,
        #[serde(default = "default_sample_rate")]
        sample_rate: u32,
        #[serde(default = "default_channels")]
        channels: u16,
        #[serde(default)]
        session_id: String,
        #[serde(default)]
        timestamp: u64,
    },
    Command {
        command: String,
        #[serde(default)]
        params: Value,
        #[serde(default)]
        session_id: String,
        #[serde(default)]
        timestamp: u64,
    },
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_channels() -> u16 {
    1
}

/// Messages to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Transcribe {
        content: String,
        session_id: String,
        confidence: f32,
        is_final: bool,
    },
    Status {
        message: String,
    },
    Error {
        message: String,
    },
    CommandResponse {
        command: String,
        #[serde(flatten)]
        payload: Map<String, Value>,
    },
}

impl OutboundMessage {
    /// Build a command response by merging the dispatcher's result object
    /// into the payload.
    pub fn command_response(command: &str, result: Value) -> Self {
        let payload = match result {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        Self::CommandResponse {
            command: command.to_string(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_audio_message() {
        let raw = r#"{
            "type": "audio",
            "audio": [0, 1, -2, 3],
            "sample_rate": 16000,
            "channels": 1,
            "session_id": "client-7",
            "timestamp": 1234
        }"#;

        match serde_json::from_str::<InboundMessage>(raw).unwrap() {
            InboundMessage::Audio {
                audio,
                sample_rate,
                channels,
                session_id,
                timestamp,
            } => {
                assert_eq!(audio, vec![0, 1, -2, 3]);
                assert_eq!(sample_rate, 16_000);
                assert_eq!(channels, 1);
                assert_eq!(session_id, "client-7");
                assert_eq!(timestamp, 1234);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn parses_command_with_defaults() {
        let raw = r#"{"type": "command", "command": "stats"}"#;

        match serde_json::from_str::<InboundMessage>(raw).unwrap() {
            InboundMessage::Command {
                command,
                params,
                session_id,
                ..
            } => {
                assert_eq!(command, "stats");
                assert!(params.is_null());
                assert!(session_id.is_empty());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_type() {
        let raw = r#"{"type": "video", "data": []}"#;
        assert!(serde_json::from_str::<InboundMessage>(raw).is_err());
    }

    #[test]
    fn transcribe_wire_shape() {
        let msg = OutboundMessage::Transcribe {
            content: "hello world".into(),
            session_id: "mic-capture".into(),
            confidence: 1.0,
            is_final: true,
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "transcribe");
        assert_eq!(value["content"], "hello world");
        assert_eq!(value["session_id"], "mic-capture");
        assert_eq!(value["confidence"], 1.0);
        assert_eq!(value["is_final"], true);
    }

    #[test]
    fn command_response_merges_payload() {
        let msg = OutboundMessage::command_response(
            "stats",
            json!({"status": "ok", "stats": {"running": true}}),
        );

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "command_response");
        assert_eq!(value["command"], "stats");
        assert_eq!(value["status"], "ok");
        assert_eq!(value["stats"]["running"], true);
    }

    #[test]
    fn error_wire_shape() {
        let value =
            serde_json::to_value(OutboundMessage::Error {
                message: "Unknown command".into(),
            })
            .unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], "Unknown command");
    }
}
