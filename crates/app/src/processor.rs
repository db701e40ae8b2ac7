use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use voxbridge_bench::{BenchmarkManager, SegmentKind};
use voxbridge_foundation::AppError;
use voxbridge_server::Broadcaster;
use voxbridge_stt::SpeechEngine;
use voxbridge_vad::VadEngine;

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Gate recognition on the speaking signal. When disabled every chunk is
    /// treated as speech and only time-based finalization applies.
    pub use_vad: bool,
    /// Consecutive silence chunks after speech that trigger finalization.
    pub silence_frames_threshold: u32,
    /// Forced finalization interval during continuous speech.
    pub finalize_interval_ms: u64,
    pub buffer_ms: u32,
    pub session_id: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            use_vad: true,
            silence_frames_threshold: 5,
            finalize_interval_ms: 2_000,
            buffer_ms: 100,
            session_id: "mic-capture".to_string(),
        }
    }
}

struct ProcessorState {
    vad: Option<Box<dyn VadEngine>>,
    was_speaking: bool,
    silence_frames: u32,
    last_finalize_at: Instant,
    last_final_text: String,
    last_partial_text: String,
    accumulated_samples: u64,
}

/// The pipeline hub: consumes PCM chunks, consults the VAD gate, feeds the
/// speech engine, deduplicates results and publishes finals.
///
/// `process_chunk` is driven from the capture consumer thread and never
/// panics outward; recognizer JSON that fails to parse is logged and
/// dropped.
pub struct AudioProcessor {
    engine: Arc<dyn SpeechEngine>,
    broadcaster: Arc<dyn Broadcaster>,
    benchmark: Option<Arc<BenchmarkManager>>,
    config: ProcessorConfig,
    show_partial: bool,
    state: Mutex<ProcessorState>,
}

impl AudioProcessor {
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        broadcaster: Arc<dyn Broadcaster>,
        vad: Option<Box<dyn VadEngine>>,
        benchmark: Option<Arc<BenchmarkManager>>,
        config: ProcessorConfig,
    ) -> Result<Self, AppError> {
        if config.use_vad && vad.is_none() {
            return Err(AppError::Config(
                "VAD enabled but no speaking gate was provided".to_string(),
            ));
        }

        let show_partial = engine.has_partial_enabled();
        info!(
            use_vad = config.use_vad,
            finalize_interval_ms = config.finalize_interval_ms,
            buffer_ms = config.buffer_ms,
            "Audio processor initialized"
        );

        Ok(Self {
            engine,
            broadcaster,
            benchmark,
            config,
            show_partial,
            state: Mutex::new(ProcessorState {
                vad,
                was_speaking: false,
                silence_frames: 0,
                last_finalize_at: Instant::now(),
                last_final_text: String::new(),
                last_partial_text: String::new(),
                accumulated_samples: 0,
            }),
        })
    }

    /// Run one chunk through the pipeline.
    pub fn process_chunk(&self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }

        let mut state = self.state.lock();
        state.accumulated_samples += samples.len() as u64;

        let is_speech = if self.config.use_vad {
            let silence_before = state.silence_frames;
            let decision = state
                .vad
                .as_mut()
                .map(|vad| vad.process(samples))
                .unwrap_or(true);
            if let Some(bench) = &self.benchmark {
                bench.add_vad_decision(decision, silence_before);
            }
            decision
        } else {
            true
        };

        if is_speech {
            state.was_speaking = true;
            state.silence_frames = 0;

            let result = self.engine.process_audio(samples, false);
            self.handle_result(&mut state, &result);

            let elapsed_ms = state.last_finalize_at.elapsed().as_millis() as u64;
            if elapsed_ms >= self.config.finalize_interval_ms {
                info!("Time-based finalization after {}ms", elapsed_ms);
                self.force_finalize_locked(&mut state);
            }
        } else if state.was_speaking {
            state.silence_frames += 1;
            if state.silence_frames >= self.config.silence_frames_threshold {
                info!(
                    "Silence-based finalization after {} silent chunks",
                    state.silence_frames
                );
                self.force_finalize_locked(&mut state);
            }
        }
    }

    /// Flush the recognizer, dispatch whatever it held and reset for the
    /// next utterance. Safe to call repeatedly and while idle.
    pub fn force_finalize(&self) {
        let mut state = self.state.lock();
        self.force_finalize_locked(&mut state);
    }

    fn force_finalize_locked(&self, state: &mut ProcessorState) {
        let result = self.engine.process_audio(&[], true);

        match serde_json::from_str::<Value>(&result) {
            Ok(parsed) => {
                if let Some(text) = parsed.get("text").and_then(Value::as_str) {
                    let text = text.trim();
                    if !text.is_empty() && text != state.last_final_text {
                        self.handle_final(state, text);
                    }
                }
            }
            Err(e) => error!("Error parsing final result: {}", e),
        }

        self.engine.reset();
        state.silence_frames = 0;
        state.was_speaking = false;
        state.last_partial_text.clear();
        state.last_finalize_at = Instant::now();
    }

    fn handle_result(&self, state: &mut ProcessorState, result_json: &str) {
        let parsed: Value = match serde_json::from_str(result_json) {
            Ok(value) => value,
            Err(e) => {
                error!("Error parsing recognizer result: {}", e);
                return;
            }
        };

        // A present "text" claims the result even when it dedupes to nothing
        match parsed.get("text").and_then(Value::as_str) {
            Some(text) => {
                let text = text.trim();
                if !text.is_empty() && text != state.last_final_text {
                    self.handle_final(state, text);
                }
            }
            None => {
                if !self.show_partial {
                    return;
                }
                if let Some(partial) = parsed.get("partial").and_then(Value::as_str) {
                    let partial = partial.trim();
                    if !partial.is_empty() && partial != state.last_partial_text {
                        state.last_partial_text = partial.to_string();
                        debug!("[partial] {}", partial);
                    }
                }
            }
        }
    }

    fn handle_final(&self, state: &mut ProcessorState, text: &str) {
        state.last_final_text = text.to_string();
        self.broadcaster
            .broadcast(text, &self.config.session_id, 1.0);
        info!("[final] {}", text);

        if let Some(bench) = &self.benchmark {
            let latency_ms = state.last_finalize_at.elapsed().as_secs_f64() * 1000.0;
            bench.add_transcription(
                text,
                SegmentKind::Final,
                1.0,
                state.accumulated_samples,
                latency_ms,
            );
            state.accumulated_samples = 0;
        }

        state.last_finalize_at = Instant::now();
    }
}
