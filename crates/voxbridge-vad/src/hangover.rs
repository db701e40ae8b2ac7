use std::time::Instant;

use crate::config::{VadConfig, VadConfigError};
use crate::engine::FrameVad;

/// The speaking gate the audio processor consumes. Implementations turn raw
/// chunks into a smoothed SPEAKING signal.
pub trait VadEngine: Send {
    fn process(&mut self, chunk: &[i16]) -> bool;
    fn is_speaking(&self) -> bool;
    fn reset(&mut self);
}

#[derive(Debug, Clone)]
pub struct HangoverConfig {
    /// Grace interval after the last speech frame before leaving SPEAKING.
    pub hangover_ms: u64,
    /// Minimum sustained speech before entering SPEAKING.
    pub startup_ms: u64,
    pub vad: VadConfig,
}

impl Default for HangoverConfig {
    fn default() -> Self {
        Self {
            hangover_ms: 300,
            startup_ms: 100,
            vad: VadConfig::default(),
        }
    }
}

/// Temporal smoothing over [`FrameVad`] output.
///
/// Requires `startup_ms` of consecutive speech frames to enter SPEAKING and
/// keeps SPEAKING for `hangover_ms` of wall time after the last speech
/// frame. Exactly one transition is applied per processed chunk.
pub struct HangoverVad {
    config: HangoverConfig,
    vad: FrameVad,
    startup_frames: u32,
    speaking: bool,
    speech_frames: u32,
    silence_frames: u32,
    speech_start: Option<Instant>,
    last_speech: Option<Instant>,
}

impl HangoverVad {
    pub fn new(config: HangoverConfig) -> Result<Self, VadConfigError> {
        let vad = FrameVad::new(config.vad.clone())?;
        let startup_frames = (config.startup_ms / config.vad.frame_ms as u64).max(1) as u32;
        Ok(Self {
            config,
            vad,
            startup_frames,
            speaking: false,
            speech_frames: 0,
            silence_frames: 0,
            speech_start: None,
            last_speech: None,
        })
    }

    /// Apply one state transition for a frame-level decision. Split out from
    /// [`HangoverVad::process`] so the machine can be driven directly.
    pub fn update(&mut self, frame_is_speech: bool) -> bool {
        let now = Instant::now();

        if frame_is_speech {
            self.speech_frames += 1;
            self.silence_frames = 0;
            self.last_speech = Some(now);

            if !self.speaking && self.speech_frames >= self.startup_frames {
                self.speaking = true;
                self.speech_start = Some(now);
                tracing::info!("Speech started");
            }
        } else {
            self.silence_frames += 1;
            self.speech_frames = 0;

            if self.speaking {
                let silence_elapsed = self
                    .last_speech
                    .map(|t| now.duration_since(t).as_millis() as u64)
                    .unwrap_or(u64::MAX);

                if silence_elapsed > self.config.hangover_ms {
                    self.speaking = false;
                    if let Some(start) = self.speech_start.take() {
                        tracing::info!(
                            "Speech ended after {}ms",
                            now.duration_since(start).as_millis()
                        );
                    }
                }
            }
        }

        self.speaking
    }

    pub fn set_mode(&mut self, mode: crate::config::Aggressiveness) {
        self.vad.set_mode(mode);
    }
}

impl VadEngine for HangoverVad {
    fn process(&mut self, chunk: &[i16]) -> bool {
        let frame_is_speech = self.vad.process(chunk);
        self.update(frame_is_speech)
    }

    fn is_speaking(&self) -> bool {
        self.speaking
    }

    fn reset(&mut self) {
        self.vad.reset();
        self.speaking = false;
        self.speech_frames = 0;
        self.silence_frames = 0;
        self.speech_start = None;
        self.last_speech = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn gate(hangover_ms: u64, startup_ms: u64) -> HangoverVad {
        HangoverVad::new(HangoverConfig {
            hangover_ms,
            startup_ms,
            vad: VadConfig::default(),
        })
        .unwrap()
    }

    #[test]
    fn startup_debounces_brief_noise() {
        // 100ms startup at 20ms frames: five consecutive speech frames
        let mut gate = gate(300, 100);

        for _ in 0..4 {
            assert!(!gate.update(true));
        }
        assert!(gate.update(true));
        assert!(gate.is_speaking());
    }

    #[test]
    fn silence_resets_startup_count() {
        let mut gate = gate(300, 100);

        gate.update(true);
        gate.update(true);
        gate.update(false);
        for _ in 0..4 {
            assert!(!gate.update(true));
        }
        assert!(gate.update(true));
    }

    #[test]
    fn hangover_keeps_speaking_through_short_pauses() {
        let mut gate = gate(200, 20);

        assert!(gate.update(true));
        // Silence immediately after speech: well inside the hangover window
        assert!(gate.update(false));
        assert!(gate.update(false));
        assert!(gate.is_speaking());
    }

    #[test]
    fn hangover_expiry_ends_speech() {
        let mut gate = gate(30, 20);

        assert!(gate.update(true));
        sleep(Duration::from_millis(50));
        assert!(!gate.update(false));
        assert!(!gate.is_speaking());
    }

    #[test]
    fn speech_refreshes_the_hangover_window() {
        let mut gate = gate(40, 20);

        assert!(gate.update(true));
        sleep(Duration::from_millis(25));
        assert!(gate.update(true));
        sleep(Duration::from_millis(25));
        // Only 25ms since the latest speech frame: still inside the window
        assert!(gate.update(false));
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut gate = gate(300, 40);

        gate.update(true);
        gate.update(true);
        assert!(gate.is_speaking());

        gate.reset();
        assert!(!gate.is_speaking());
        // Startup must be re-earned after reset
        assert!(!gate.update(true));
        assert!(gate.update(true));
    }

    #[test]
    fn silence_chunks_keep_gate_idle() {
        let mut gate = gate(300, 100);
        for _ in 0..10 {
            assert!(!VadEngine::process(&mut gate, &vec![0i16; 320]));
        }
    }
}
