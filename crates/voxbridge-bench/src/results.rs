use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Partial,
    Final,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Partial => "partial",
            SegmentKind::Final => "final",
        }
    }
}

/// One recognized segment, appended in arrival order and never mutated
/// afterwards except for the VAD annotations attached by the next
/// `add_vad_decision` call.
#[derive(Debug, Clone)]
pub struct TranscriptionSegment {
    pub text: String,
    pub kind: SegmentKind,
    pub start: Instant,
    pub end: Instant,
    pub confidence: f64,
    pub audio_samples: u64,
    pub processing_latency_ms: f64,
    pub vad_detected: bool,
    pub silence_frames_before: u32,
}

/// Aggregate metrics for a benchmark session, derived on demand from the
/// segment sequence. The serialized form covers the summary only; segments
/// stay in memory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BenchmarkResults {
    // Accuracy
    pub word_error_rate: f64,
    pub character_error_rate: f64,
    pub total_words: usize,
    pub word_errors: u32,
    pub word_substitutions: u32,
    pub word_deletions: u32,
    pub word_insertions: u32,

    // Timing
    pub total_audio_duration_ms: f64,
    pub total_processing_time_ms: f64,
    pub real_time_factor: f64,
    pub average_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,

    // Engine-specific
    pub partial_segments: usize,
    pub final_segments: usize,
    pub partial_to_final_ratio: f64,

    // Quality
    pub average_confidence: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,

    // VAD (populated only when ground truth was provided)
    pub vad_ground_truth_provided: bool,
    pub vad_accuracy: f64,
    pub vad_false_positives: u32,
    pub vad_false_negatives: u32,
    pub average_silence_before_speech_ms: f64,

    // Throughput
    pub total_samples_processed: u64,
    pub total_segments: usize,
    pub samples_per_second: f64,

    // Text
    pub reference_text: String,
    pub hypothesis_text: String,

    #[serde(skip)]
    pub segments: Vec<TranscriptionSegment>,
}
