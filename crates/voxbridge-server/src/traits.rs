use serde_json::Value;

/// Fan a final transcript out to every subscriber of a session. Broadcast
/// order per session follows the call order.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, text: &str, session_id: &str, confidence: f32);
}

/// Receives inbound PCM payloads from network clients. Called from a
/// blocking worker; implementations may take their time.
pub trait AudioSink: Send + Sync {
    fn on_audio(&self, samples: &[i16], session_id: &str);
}

/// Answers control commands. The returned value is merged into the
/// command-response payload.
pub trait CommandDispatcher: Send + Sync {
    fn handle_command(&self, command: &str, params: &Value) -> Value;
}
