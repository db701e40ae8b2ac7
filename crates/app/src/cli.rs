use clap::Parser;
use std::path::PathBuf;

use voxbridge_bench::ExportFormat;

use crate::glue::AppConfig;

/// Real-time speech recognition server. Streams microphone or WebSocket
/// audio through an offline recognizer and broadcasts final transcripts.
#[derive(Parser, Debug)]
#[command(
    name = "voxbridge",
    version,
    after_help = "Examples:\n  \
        Fast response:     --buffer-ms 50 --finalize-ms 1000\n  \
        Balanced:          --buffer-ms 100 --finalize-ms 2000\n  \
        Long context:      --buffer-ms 200 --finalize-ms 5000\n\n\
        Benchmark examples:\n  \
        File benchmark:    --model model --benchmark reference.txt --mic\n  \
        Live benchmark:    --model model --benchmark-live --mic\n  \
        JSON output:       --benchmark ref.txt --benchmark-format json"
)]
pub struct Args {
    /// Path to the speech model directory
    #[arg(long, required_unless_present = "list_devices")]
    pub model: Option<PathBuf>,

    /// WebSocket server port
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Path to a speaker-identification model
    #[arg(long)]
    pub spk_model: Option<PathBuf>,

    /// Enable N-best results (0 disables alternatives)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub alternatives: u32,

    /// Disable partial results
    #[arg(long)]
    pub no_partial: bool,

    /// Grammar as a JSON array of phrases
    #[arg(long, default_value = "")]
    pub grammar: String,

    /// Log verbosity (-1 = warn, 0 = info, 1 = debug, 2+ = trace)
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub log_level: i32,

    /// Enable microphone capture
    #[arg(long)]
    pub mic: bool,

    /// Microphone device index (see --list-devices)
    #[arg(long)]
    pub mic_device: Option<usize>,

    /// Audio buffer size in milliseconds
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=5000))]
    pub buffer_ms: u32,

    /// Forced finalization interval in milliseconds
    #[arg(long, default_value_t = 2000, value_parser = clap::value_parser!(u64).range(1..=30000))]
    pub finalize_ms: u64,

    /// Silence duration that closes an utterance (VAD mode only)
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u32).range(0..=10000))]
    pub silence_ms: u32,

    /// Disable voice activity detection
    #[arg(long)]
    pub no_vad: bool,

    /// List available audio input devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Enable benchmarking against a reference text file
    #[arg(long, value_name = "FILE")]
    pub benchmark: Option<PathBuf>,

    /// Enable live benchmarking without a reference
    #[arg(long)]
    pub benchmark_live: bool,

    /// Output file for benchmark results
    #[arg(long, value_name = "FILE")]
    pub benchmark_output: Option<PathBuf>,

    /// Benchmark output format: txt, json or csv
    #[arg(long, default_value = "txt")]
    pub benchmark_format: String,
}

impl Args {
    pub fn into_config(self) -> Result<AppConfig, String> {
        let benchmark_format: ExportFormat = self.benchmark_format.parse()?;
        let benchmark_enabled = self.benchmark.is_some() || self.benchmark_live;

        Ok(AppConfig {
            model_path: self
                .model
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            port: self.port,
            speaker_model_path: self
                .spk_model
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            max_alternatives: self.alternatives,
            enable_partial_words: !self.no_partial,
            grammar: self.grammar,
            use_mic: self.mic,
            mic_device: self.mic_device,
            buffer_ms: self.buffer_ms,
            finalize_ms: self.finalize_ms,
            silence_ms: self.silence_ms,
            use_vad: !self.no_vad,
            benchmark_enabled,
            benchmark_live: self.benchmark_live,
            benchmark_reference_file: self.benchmark,
            benchmark_output: self.benchmark_output,
            benchmark_format,
            ..AppConfig::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let args = Args::try_parse_from(["voxbridge", "--model", "m"]).unwrap();
        assert_eq!(args.port, 8080);
        assert_eq!(args.buffer_ms, 100);
        assert_eq!(args.finalize_ms, 2000);
        assert_eq!(args.silence_ms, 500);
        assert_eq!(args.alternatives, 0);
        assert!(!args.no_partial);
        assert!(!args.no_vad);
        assert!(!args.mic);
    }

    #[test]
    fn model_is_required_without_list_devices() {
        assert!(Args::try_parse_from(["voxbridge"]).is_err());
        assert!(Args::try_parse_from(["voxbridge", "--list-devices"]).is_ok());
    }

    #[test]
    fn range_validation() {
        assert!(Args::try_parse_from(["voxbridge", "--model", "m", "--alternatives", "11"])
            .is_err());
        assert!(Args::try_parse_from(["voxbridge", "--model", "m", "--buffer-ms", "0"]).is_err());
        assert!(
            Args::try_parse_from(["voxbridge", "--model", "m", "--buffer-ms", "5001"]).is_err()
        );
        assert!(
            Args::try_parse_from(["voxbridge", "--model", "m", "--finalize-ms", "30001"])
                .is_err()
        );
        assert!(
            Args::try_parse_from(["voxbridge", "--model", "m", "--silence-ms", "10001"]).is_err()
        );
    }

    #[test]
    fn benchmark_flags_enable_benchmarking() {
        let args =
            Args::try_parse_from(["voxbridge", "--model", "m", "--benchmark", "ref.txt"]).unwrap();
        let config = args.into_config().unwrap();
        assert!(config.benchmark_enabled);
        assert_eq!(
            config.benchmark_reference_file,
            Some(PathBuf::from("ref.txt"))
        );

        let live = Args::try_parse_from(["voxbridge", "--model", "m", "--benchmark-live"])
            .unwrap()
            .into_config()
            .unwrap();
        assert!(live.benchmark_enabled);
        assert!(live.benchmark_live);
    }

    #[test]
    fn bad_benchmark_format_is_rejected() {
        let args = Args::try_parse_from([
            "voxbridge",
            "--model",
            "m",
            "--benchmark-format",
            "xml",
        ])
        .unwrap();
        assert!(args.into_config().is_err());
    }

    #[test]
    fn flags_map_into_config() {
        let config = Args::try_parse_from([
            "voxbridge",
            "--model",
            "model-dir",
            "--no-partial",
            "--no-vad",
            "--mic",
            "--mic-device",
            "2",
            "--grammar",
            r#"["yes","no"]"#,
        ])
        .unwrap()
        .into_config()
        .unwrap();

        assert_eq!(config.model_path, "model-dir");
        assert!(!config.enable_partial_words);
        assert!(!config.use_vad);
        assert!(config.use_mic);
        assert_eq!(config.mic_device, Some(2));
        assert_eq!(config.grammar, r#"["yes","no"]"#);
    }
}
