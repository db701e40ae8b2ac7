use earshot::{VoiceActivityDetector, VoiceActivityProfile};

use crate::config::{Aggressiveness, VadConfig, VadConfigError};

/// Frame-level speech classifier.
///
/// Accepts chunks of arbitrary length, buffers leftovers internally and runs
/// the underlying detector on complete frames only. Chunk boundaries and
/// frame boundaries are unrelated; the residual buffer always holds fewer
/// than `frame_size` samples after a call.
pub struct FrameVad {
    config: VadConfig,
    detector: VoiceActivityDetector,
    frame_size: usize,
    buffer: Vec<i16>,
    last_result: bool,
}

impl FrameVad {
    pub fn new(config: VadConfig) -> Result<Self, VadConfigError> {
        config.validate()?;
        let frame_size = config.frame_size();
        Ok(Self {
            detector: VoiceActivityDetector::new(profile_for(config.mode)),
            frame_size,
            buffer: Vec::with_capacity(frame_size * 2),
            config,
            last_result: false,
        })
    }

    /// Classify a chunk. Returns `true` iff any complete frame in this call
    /// was speech; when the chunk completes no frame, the previous result is
    /// reported again.
    pub fn process(&mut self, chunk: &[i16]) -> bool {
        self.buffer.extend_from_slice(chunk);

        let complete_frames = self.buffer.len() / self.frame_size;
        if complete_frames > 0 {
            let mut any_speech = false;
            for i in 0..complete_frames {
                let start = i * self.frame_size;
                let frame = &self.buffer[start..start + self.frame_size];
                if predict(&mut self.detector, self.config.sample_rate, frame) {
                    any_speech = true;
                }
            }
            self.buffer.drain(..complete_frames * self.frame_size);
            self.last_result = any_speech;
        }

        self.last_result
    }

    /// Classify exactly one frame. `samples.len()` must equal
    /// [`VadConfig::frame_size`]; a mismatched length is reported as
    /// non-speech.
    pub fn process_frame(&mut self, samples: &[i16]) -> bool {
        if samples.len() != self.frame_size {
            tracing::warn!(
                got = samples.len(),
                expected = self.frame_size,
                "VAD frame size mismatch"
            );
            return false;
        }
        predict(&mut self.detector, self.config.sample_rate, samples)
    }

    /// Clear the residual buffer, the detector state and the last result.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.last_result = false;
        self.detector.reset();
    }

    /// Switch aggressiveness at runtime.
    pub fn set_mode(&mut self, mode: Aggressiveness) {
        self.detector = VoiceActivityDetector::new(profile_for(mode));
        self.config.mode = mode;
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Residual samples currently buffered.
    pub fn pending_samples(&self) -> usize {
        self.buffer.len()
    }
}

fn profile_for(mode: Aggressiveness) -> VoiceActivityProfile {
    match mode {
        Aggressiveness::Quality => VoiceActivityProfile::QUALITY,
        Aggressiveness::LowBitrate => VoiceActivityProfile::LBR,
        Aggressiveness::Aggressive => VoiceActivityProfile::AGGRESSIVE,
        Aggressiveness::VeryAggressive => VoiceActivityProfile::VERY_AGGRESSIVE,
    }
}

fn predict(detector: &mut VoiceActivityDetector, sample_rate: u32, frame: &[i16]) -> bool {
    let result = match sample_rate {
        8_000 => detector.predict_8khz(frame),
        16_000 => detector.predict_16khz(frame),
        32_000 => detector.predict_32khz(frame),
        48_000 => detector.predict_48khz(frame),
        // Unreachable for validated configs
        _ => return false,
    };
    match result {
        Ok(is_speech) => is_speech,
        Err(e) => {
            tracing::error!("VAD prediction failed: {:?}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vad() -> FrameVad {
        FrameVad::new(VadConfig::default()).unwrap()
    }

    #[test]
    fn silence_is_not_speech() {
        let mut vad = vad();
        assert!(!vad.process(&vec![0i16; 1600]));
    }

    #[test]
    fn residual_stays_below_frame_size() {
        let mut vad = vad();
        // 20ms at 16kHz = 320 samples per frame; odd chunk sizes leave a tail
        for chunk_len in [100usize, 250, 333, 500, 799] {
            vad.process(&vec![0i16; chunk_len]);
            assert!(vad.pending_samples() < vad.frame_size());
        }
    }

    #[test]
    fn incomplete_frame_reports_previous_result() {
        let mut vad = vad();
        // Nothing classified yet: defaults to non-speech
        assert!(!vad.process(&[0i16; 100]));
        assert_eq!(vad.pending_samples(), 100);
    }

    #[test]
    fn short_frame_is_rejected() {
        let mut vad = vad();
        assert!(!vad.process_frame(&[0i16; 100]));
    }

    #[test]
    fn reset_clears_residual() {
        let mut vad = vad();
        vad.process(&[0i16; 100]);
        vad.reset();
        assert_eq!(vad.pending_samples(), 0);
    }

    #[test]
    fn mode_switch_keeps_frame_size() {
        let mut vad = vad();
        vad.set_mode(Aggressiveness::VeryAggressive);
        assert_eq!(vad.frame_size(), 320);
        assert!(!vad.process(&vec![0i16; 320]));
    }
}
