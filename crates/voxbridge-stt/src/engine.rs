use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};
use vosk::{CompleteResult, DecodingState, Model, Recognizer, SpeakerModel};

use crate::types::{EngineError, SpeechEngine, SpeechEngineConfig};

/// Samples per recognizer feed: 100 ms at the configured rate.
fn feed_chunk_size(sample_rate: u32) -> usize {
    sample_rate as usize / 10
}

struct RecognizerState {
    recognizer: Recognizer,
    /// Set when the last call produced a final. The next non-empty feed must
    /// reset the recognizer first or the tail of the previous utterance
    /// bleeds into the new one as an echo.
    just_got_final: bool,
    max_alternatives: u32,
    nlsml: bool,
}

/// Thread-safe facade over a vosk recognizer.
///
/// All recognizer access is serialized by a single mutex; the sample counter
/// is atomic and monotonic across resets.
pub struct VoskEngine {
    config: SpeechEngineConfig,
    model: Model,
    speaker_model: Option<SpeakerModel>,
    state: Mutex<RecognizerState>,
    total_samples: AtomicU64,
    chunk_size: usize,
}

impl VoskEngine {
    pub fn new(model_path: &str, config: SpeechEngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let model = Model::new(model_path).ok_or_else(|| EngineError::ModelLoad {
            path: model_path.to_string(),
        })?;

        let mut config = config;
        let speaker_model = if config.enable_speaker_id && !config.speaker_model_path.is_empty() {
            match SpeakerModel::new(&config.speaker_model_path) {
                Some(spk) => Some(spk),
                None => {
                    warn!(
                        "Failed to load speaker model from '{}', continuing without speaker ID",
                        config.speaker_model_path
                    );
                    config.enable_speaker_id = false;
                    None
                }
            }
        } else {
            config.enable_speaker_id = false;
            None
        };

        let recognizer = build_recognizer(&model, speaker_model.as_ref(), &config, None)?;

        info!(
            model = model_path,
            sample_rate = config.sample_rate,
            speaker_id = config.enable_speaker_id,
            "Speech engine initialized"
        );

        let state = RecognizerState {
            recognizer,
            just_got_final: false,
            max_alternatives: config.max_alternatives,
            nlsml: false,
        };

        Ok(Self {
            chunk_size: feed_chunk_size(config.sample_rate),
            model,
            speaker_model,
            state: Mutex::new(state),
            total_samples: AtomicU64::new(0),
            config,
        })
    }

    pub fn config(&self) -> &SpeechEngineConfig {
        &self.config
    }

    fn rebuild_recognizer(&self, state: &mut RecognizerState, grammar: Option<&[String]>) {
        match build_recognizer(&self.model, self.speaker_model.as_ref(), &self.config, grammar) {
            Ok(mut recognizer) => {
                recognizer.set_max_alternatives(state.max_alternatives as u16);
                recognizer.set_nlsml(state.nlsml);
                state.recognizer = recognizer;
                state.just_got_final = false;
            }
            Err(e) => error!("Failed to rebuild recognizer: {}", e),
        }
    }
}

fn build_recognizer(
    model: &Model,
    speaker_model: Option<&SpeakerModel>,
    config: &SpeechEngineConfig,
    grammar: Option<&[String]>,
) -> Result<Recognizer, EngineError> {
    let sample_rate = config.sample_rate as f32;
    let mut recognizer = match grammar {
        // A grammar-constrained recognizer does not carry speaker adaptation
        Some(phrases) => Recognizer::new_with_grammar(model, sample_rate, phrases),
        None => match speaker_model {
            Some(spk) => Recognizer::new_with_speaker(model, sample_rate, spk),
            None => Recognizer::new(model, sample_rate),
        },
    }
    .ok_or(EngineError::RecognizerInit {
        sample_rate: config.sample_rate,
    })?;

    recognizer.set_max_alternatives(config.max_alternatives as u16);
    recognizer.set_words(config.enable_word_times);
    recognizer.set_partial_words(config.enable_partial_words && config.enable_word_times);

    Ok(recognizer)
}

impl SpeechEngine for VoskEngine {
    fn process_audio(&self, samples: &[i16], is_final: bool) -> String {
        if samples.is_empty() && !is_final {
            return "{}".to_string();
        }

        let mut state = self.state.lock();
        self.total_samples
            .fetch_add(samples.len() as u64, Ordering::Relaxed);

        if !samples.is_empty() {
            if state.just_got_final {
                state.just_got_final = false;
                state.recognizer.reset();
                debug!("Reset recognizer after final result");
            }

            let mut last_partial: Option<String> = None;

            for chunk in samples.chunks(self.chunk_size) {
                match state.recognizer.accept_waveform(chunk) {
                    Ok(DecodingState::Finalized) => {
                        let result = state.recognizer.result();
                        let text =
                            complete_result_json(result, self.config.enable_word_times);
                        info!("Final result: {}", truncate(&text, 200));
                        state.just_got_final = true;
                        return text;
                    }
                    Ok(DecodingState::Running) => {
                        let partial = state.recognizer.partial_result();
                        last_partial = Some(json!({ "partial": partial.partial }).to_string());
                    }
                    Ok(DecodingState::Failed) => {
                        error!("Recognition failed for current chunk");
                    }
                    Err(e) => {
                        error!("Waveform not accepted: {:?}", e);
                    }
                }
            }

            if !is_final {
                return last_partial.unwrap_or_else(|| "{}".to_string());
            }
        }

        // is_final forces a flush of whatever the recognizer holds
        let result = state.recognizer.final_result();
        let text = complete_result_json(result, self.config.enable_word_times);
        info!("Final result (forced): {}", truncate(&text, 200));
        state.just_got_final = true;
        text
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.recognizer.reset();
        state.just_got_final = false;
    }

    fn set_grammar(&self, grammar_json: &str) {
        let mut state = self.state.lock();
        if grammar_json.is_empty() {
            self.rebuild_recognizer(&mut state, None);
            info!("Grammar constraint removed");
            return;
        }

        match serde_json::from_str::<Vec<String>>(grammar_json) {
            Ok(phrases) => {
                self.rebuild_recognizer(&mut state, Some(&phrases));
                info!("Grammar set ({} phrases)", phrases.len());
            }
            Err(e) => warn!("Ignoring malformed grammar '{}': {}", grammar_json, e),
        }
    }

    fn set_max_alternatives(&self, max: u32) {
        let mut state = self.state.lock();
        state.max_alternatives = max;
        state.recognizer.set_max_alternatives(max as u16);
    }

    fn enable_nlsml_output(&self, enable: bool) {
        let mut state = self.state.lock();
        state.nlsml = enable;
        state.recognizer.set_nlsml(enable);
    }

    fn has_partial_result(&self) -> bool {
        let mut state = self.state.lock();
        !state.recognizer.partial_result().partial.trim().is_empty()
    }

    fn has_partial_enabled(&self) -> bool {
        self.config.enable_partial_words
    }

    fn total_samples_processed(&self) -> u64 {
        self.total_samples.load(Ordering::Relaxed)
    }
}

fn complete_result_json(result: CompleteResult, include_words: bool) -> String {
    match result {
        CompleteResult::Single(single) => {
            let mut obj = json!({ "text": single.text });
            if include_words && !single.result.is_empty() {
                obj["result"] = single
                    .result
                    .iter()
                    .map(|w| {
                        json!({
                            "word": w.word,
                            "start": w.start,
                            "end": w.end,
                            "conf": w.conf,
                        })
                    })
                    .collect();
            }
            obj.to_string()
        }
        CompleteResult::Multiple(multiple) => {
            let best = multiple.alternatives.first().map(|a| a.text).unwrap_or("");
            json!({
                "text": best,
                "alternatives": multiple
                    .alternatives
                    .iter()
                    .map(|a| json!({ "text": a.text, "confidence": a.confidence }))
                    .collect::<Vec<_>>(),
            })
            .to_string()
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_chunks_are_100ms() {
        assert_eq!(feed_chunk_size(16_000), 1_600);
        assert_eq!(feed_chunk_size(8_000), 800);
        assert_eq!(feed_chunk_size(48_000), 4_800);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 200), "hello");
        assert_eq!(truncate("hello", 2), "he");
    }

    #[test]
    fn bad_model_path_is_a_load_error() {
        let err = VoskEngine::new("/nonexistent/model", SpeechEngineConfig::default())
            .err()
            .expect("model load must fail");
        assert!(matches!(err, EngineError::ModelLoad { .. }));
    }
}
