use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VadConfigError {
    #[error("invalid VAD configuration: {0}")]
    InvalidConfig(String),
}

/// Aggressiveness of the frame classifier. Higher levels reject more noise
/// at the cost of occasionally clipping speech onsets and tails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggressiveness {
    Quality,
    LowBitrate,
    Aggressive,
    VeryAggressive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    /// Must be 8000, 16000, 32000 or 48000 Hz.
    pub sample_rate: u32,
    /// Must be 10, 20 or 30 ms.
    pub frame_ms: u32,
    pub mode: Aggressiveness,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_ms: 20,
            mode: Aggressiveness::LowBitrate,
        }
    }
}

impl VadConfig {
    pub fn validate(&self) -> Result<(), VadConfigError> {
        if !matches!(self.sample_rate, 8_000 | 16_000 | 32_000 | 48_000) {
            return Err(VadConfigError::InvalidConfig(format!(
                "sample rate must be 8000, 16000, 32000 or 48000 Hz, got {}",
                self.sample_rate
            )));
        }
        if !matches!(self.frame_ms, 10 | 20 | 30) {
            return Err(VadConfigError::InvalidConfig(format!(
                "frame duration must be 10, 20 or 30 ms, got {}",
                self.frame_ms
            )));
        }
        Ok(())
    }

    /// Samples per classifier frame.
    pub fn frame_size(&self) -> usize {
        (self.sample_rate as usize * self.frame_ms as usize) / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = VadConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_size(), 320);
    }

    #[test]
    fn rejects_unsupported_rate() {
        let config = VadConfig {
            sample_rate: 44_100,
            ..VadConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VadConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_unsupported_frame_duration() {
        let config = VadConfig {
            frame_ms: 25,
            ..VadConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn frame_size_across_rates() {
        for (rate, frame_ms, expected) in [
            (8_000, 10, 80),
            (16_000, 20, 320),
            (32_000, 30, 960),
            (48_000, 10, 480),
        ] {
            let config = VadConfig {
                sample_rate: rate,
                frame_ms,
                ..VadConfig::default()
            };
            assert!(config.validate().is_ok());
            assert_eq!(config.frame_size(), expected);
        }
    }
}
