use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to load speech model from '{path}'")]
    ModelLoad { path: String },

    #[error("failed to create recognizer (sample rate {sample_rate} Hz)")]
    RecognizerInit { sample_rate: u32 },

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone)]
pub struct SpeechEngineConfig {
    pub sample_rate: u32,
    /// Attach a speaker-identification model. Downgraded with a warning when
    /// the model at `speaker_model_path` cannot be loaded.
    pub enable_speaker_id: bool,
    pub speaker_model_path: String,
    /// Include word-level timing in final results.
    pub enable_word_times: bool,
    /// Surface partial hypotheses while an utterance is open.
    pub enable_partial_words: bool,
    /// N-best output; 0 disables alternatives. Valid range 0..=10.
    pub max_alternatives: u32,
}

impl Default for SpeechEngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            enable_speaker_id: false,
            speaker_model_path: String::new(),
            enable_word_times: false,
            enable_partial_words: true,
            max_alternatives: 0,
        }
    }
}

impl SpeechEngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_alternatives > 10 {
            return Err(EngineError::InvalidConfig(format!(
                "max alternatives must be between 0 and 10, got {}",
                self.max_alternatives
            )));
        }
        if !matches!(self.sample_rate, 8_000 | 16_000 | 32_000 | 48_000) {
            return Err(EngineError::InvalidConfig(format!(
                "sample rate must be 8000, 16000, 32000 or 48000 Hz, got {}",
                self.sample_rate
            )));
        }
        Ok(())
    }
}

/// Capability seam between the pipeline and the recognizer. All methods are
/// safe to call from any thread; implementations serialize recognizer access
/// internally.
pub trait SpeechEngine: Send + Sync {
    /// Feed PCM samples and return the recognizer's JSON response. With
    /// `is_final` a final extraction is forced regardless of input.
    fn process_audio(&self, samples: &[i16], is_final: bool) -> String;

    /// Clear recognizer state, keep configuration.
    fn reset(&self);

    /// Constrain recognition to a JSON array of phrases; an empty string
    /// removes the constraint.
    fn set_grammar(&self, grammar_json: &str);

    fn set_max_alternatives(&self, max: u32);

    fn enable_nlsml_output(&self, enable: bool);

    /// Whether an open utterance currently has a non-empty partial.
    fn has_partial_result(&self) -> bool;

    /// Configured partial-output policy.
    fn has_partial_enabled(&self) -> bool;

    /// Total samples fed across the engine's lifetime, monotonic across
    /// resets.
    fn total_samples_processed(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SpeechEngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_excess_alternatives() {
        let config = SpeechEngineConfig {
            max_alternatives: 11,
            ..SpeechEngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_odd_sample_rate() {
        let config = SpeechEngineConfig {
            sample_rate: 44_100,
            ..SpeechEngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
