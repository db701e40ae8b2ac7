//! Scripted test doubles for the processor and glue seams.
#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use voxbridge_server::Broadcaster;
use voxbridge_stt::SpeechEngine;
use voxbridge_vad::VadEngine;

/// Speech engine that replays canned JSON responses: one queue for audio
/// feeds, one for forced finalizations.
pub struct ScriptedEngine {
    feed: Mutex<VecDeque<String>>,
    finals: Mutex<VecDeque<String>>,
    grammars: Mutex<Vec<String>>,
    resets: AtomicUsize,
    samples: AtomicU64,
    partial_enabled: bool,
}

impl ScriptedEngine {
    pub fn new(feed: &[&str], finals: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            feed: Mutex::new(feed.iter().map(|s| s.to_string()).collect()),
            finals: Mutex::new(finals.iter().map(|s| s.to_string()).collect()),
            grammars: Mutex::new(Vec::new()),
            resets: AtomicUsize::new(0),
            samples: AtomicU64::new(0),
            partial_enabled: true,
        })
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn grammars(&self) -> Vec<String> {
        self.grammars.lock().clone()
    }

    pub fn remaining_feeds(&self) -> usize {
        self.feed.lock().len()
    }
}

impl SpeechEngine for ScriptedEngine {
    fn process_audio(&self, samples: &[i16], is_final: bool) -> String {
        if samples.is_empty() && !is_final {
            return "{}".to_string();
        }
        self.samples.fetch_add(samples.len() as u64, Ordering::Relaxed);

        if is_final {
            self.finals
                .lock()
                .pop_front()
                .unwrap_or_else(|| "{}".to_string())
        } else {
            self.feed
                .lock()
                .pop_front()
                .unwrap_or_else(|| "{}".to_string())
        }
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn set_grammar(&self, grammar_json: &str) {
        self.grammars.lock().push(grammar_json.to_string());
    }

    fn set_max_alternatives(&self, _max: u32) {}

    fn enable_nlsml_output(&self, _enable: bool) {}

    fn has_partial_result(&self) -> bool {
        false
    }

    fn has_partial_enabled(&self) -> bool {
        self.partial_enabled
    }

    fn total_samples_processed(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }
}

/// Records every broadcast for assertion.
#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<(String, String, f32)>>,
}

impl RecordingBroadcaster {
    pub fn broadcasts(&self) -> Vec<(String, String, f32)> {
        self.events.lock().clone()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast(&self, text: &str, session_id: &str, confidence: f32) {
        self.events
            .lock()
            .push((text.to_string(), session_id.to_string(), confidence));
    }
}

/// Speaking gate that replays a fixed decision sequence; once exhausted it
/// reports silence.
pub struct ScriptedGate {
    decisions: Mutex<VecDeque<bool>>,
    speaking: bool,
}

impl ScriptedGate {
    pub fn new(decisions: &[bool]) -> Box<Self> {
        Box::new(Self {
            decisions: Mutex::new(decisions.iter().copied().collect()),
            speaking: false,
        })
    }
}

impl VadEngine for ScriptedGate {
    fn process(&mut self, _chunk: &[i16]) -> bool {
        self.speaking = self.decisions.lock().pop_front().unwrap_or(false);
        self.speaking
    }

    fn is_speaking(&self) -> bool {
        self.speaking
    }

    fn reset(&mut self) {
        self.speaking = false;
    }
}
