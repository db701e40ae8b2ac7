use parking_lot::RwLock;
use std::time::Instant;
use tracing::{debug, info};

use crate::results::{BenchmarkResults, SegmentKind, TranscriptionSegment};
use crate::text::{calculate_cer, calculate_wer, normalize_text, tokenize};

/// Audio duration in the aggregates is derived at a fixed rate for report
/// compatibility across configurations.
const DURATION_SAMPLE_RATE: f64 = 16_000.0;

pub type ProgressCallback = Box<dyn Fn(&BenchmarkResults) + Send + Sync>;

struct Inner {
    running: bool,
    reference_text: String,
    vad_ground_truth: Vec<bool>,
    vad_frame_duration_ms: f64,
    segments: Vec<TranscriptionSegment>,
    vad_decisions: Vec<bool>,
    total_samples: u64,
    start_time: Instant,
    stopped_at: Option<Instant>,
    last_segment_time: Instant,
    progress_callback: Option<ProgressCallback>,
}

/// Accumulates segments and VAD decisions across a session and derives
/// aggregate metrics on demand.
///
/// Single-writer model: one component submits segments; any thread may take
/// a snapshot through `get_current_results`.
pub struct BenchmarkManager {
    inner: RwLock<Inner>,
}

impl BenchmarkManager {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            inner: RwLock::new(Inner {
                running: false,
                reference_text: String::new(),
                vad_ground_truth: Vec::new(),
                vad_frame_duration_ms: 20.0,
                segments: Vec::new(),
                vad_decisions: Vec::new(),
                total_samples: 0,
                start_time: now,
                stopped_at: None,
                last_segment_time: now,
                progress_callback: None,
            }),
        }
    }

    pub fn set_reference_text(&self, text: &str) {
        let mut inner = self.inner.write();
        inner.reference_text = normalize_text(text);
        info!(
            "Benchmark reference text set ({} characters)",
            inner.reference_text.len()
        );
    }

    pub fn set_vad_ground_truth(&self, labels: Vec<bool>, frame_duration_ms: f64) {
        let mut inner = self.inner.write();
        info!(
            "VAD ground truth set ({} frames, {}ms per frame)",
            labels.len(),
            frame_duration_ms
        );
        inner.vad_ground_truth = labels;
        inner.vad_frame_duration_ms = frame_duration_ms;
    }

    pub fn set_progress_callback(&self, callback: ProgressCallback) {
        self.inner.write().progress_callback = Some(callback);
    }

    /// Begin a session: clears segments and counters, freezes configuration.
    pub fn start(&self) {
        let mut inner = self.inner.write();
        inner.segments.clear();
        inner.vad_decisions.clear();
        inner.total_samples = 0;
        inner.running = true;
        inner.start_time = Instant::now();
        inner.stopped_at = None;
        inner.last_segment_time = inner.start_time;
        info!("Benchmark session started");
    }

    /// End the session and return the frozen results.
    pub fn stop(&self) -> BenchmarkResults {
        let mut inner = self.inner.write();
        inner.running = false;
        inner.stopped_at = Some(Instant::now());
        let results = compute_results(&inner);

        info!(
            "Benchmark completed - WER: {:.2}%, CER: {:.2}%, RTF: {:.2}x",
            results.word_error_rate, results.character_error_rate, results.real_time_factor
        );
        results
    }

    pub fn is_running(&self) -> bool {
        self.inner.read().running
    }

    /// Record one recognized segment. Ignored while the session is stopped.
    pub fn add_transcription(
        &self,
        text: &str,
        kind: SegmentKind,
        confidence: f64,
        audio_samples: u64,
        processing_latency_ms: f64,
    ) {
        let mut inner = self.inner.write();
        if !inner.running {
            return;
        }

        let now = Instant::now();
        let start = inner.last_segment_time;
        let latency = if processing_latency_ms > 0.0 {
            processing_latency_ms
        } else {
            // Fall back to time between submissions
            now.duration_since(start).as_secs_f64() * 1000.0
        };

        inner.segments.push(TranscriptionSegment {
            text: normalize_text(text),
            kind,
            start,
            end: now,
            confidence,
            audio_samples,
            processing_latency_ms: latency,
            vad_detected: false,
            silence_frames_before: 0,
        });
        inner.total_samples += audio_samples;
        inner.last_segment_time = now;

        if kind == SegmentKind::Final && !text.is_empty() {
            debug!(
                "Benchmark final transcription: {} (confidence: {:.3})",
                text, confidence
            );
        }

        if inner.progress_callback.is_some() {
            let results = compute_results(&inner);
            if let Some(cb) = inner.progress_callback.as_ref() {
                cb(&results);
            }
        }
    }

    /// Record one smoothed VAD decision and annotate the latest segment.
    pub fn add_vad_decision(&self, is_speech: bool, silence_frames_before: u32) {
        let mut inner = self.inner.write();
        if !inner.running {
            return;
        }

        inner.vad_decisions.push(is_speech);
        if let Some(last) = inner.segments.last_mut() {
            last.vad_detected = is_speech;
            last.silence_frames_before = silence_frames_before;
        }
    }

    /// Snapshot of the aggregates as of now.
    pub fn get_current_results(&self) -> BenchmarkResults {
        compute_results(&self.inner.read())
    }
}

impl Default for BenchmarkManager {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_results(inner: &Inner) -> BenchmarkResults {
    let mut results = BenchmarkResults::default();

    // Hypothesis is the normalized concatenation of non-empty finals
    let mut final_texts: Vec<&str> = Vec::new();
    for segment in &inner.segments {
        match segment.kind {
            SegmentKind::Final if !segment.text.is_empty() => {
                final_texts.push(&segment.text);
                results.final_segments += 1;
            }
            SegmentKind::Final => {}
            SegmentKind::Partial => results.partial_segments += 1,
        }
    }
    results.hypothesis_text = normalize_text(&final_texts.join(" "));
    results.reference_text = inner.reference_text.clone();
    results.partial_to_final_ratio = if results.final_segments > 0 {
        results.partial_segments as f64 / results.final_segments as f64
    } else {
        0.0
    };

    if !inner.reference_text.is_empty() && !results.hypothesis_text.is_empty() {
        let breakdown = calculate_wer(&inner.reference_text, &results.hypothesis_text);
        results.word_error_rate = breakdown.wer;
        results.word_substitutions = breakdown.substitutions;
        results.word_deletions = breakdown.deletions;
        results.word_insertions = breakdown.insertions;
        results.word_errors =
            breakdown.substitutions + breakdown.deletions + breakdown.insertions;
        results.total_words = tokenize(&inner.reference_text).len();
        results.character_error_rate =
            calculate_cer(&inner.reference_text, &results.hypothesis_text);
    }

    if !inner.segments.is_empty() {
        let mut latencies: Vec<f64> = Vec::new();
        let mut confidences: Vec<f64> = Vec::new();
        let mut silence_before_speech: Vec<f64> = Vec::new();

        for segment in &inner.segments {
            if segment.processing_latency_ms > 0.0 {
                latencies.push(segment.processing_latency_ms);
            }
            confidences.push(segment.confidence);
            if segment.vad_detected && segment.silence_frames_before > 0 {
                silence_before_speech
                    .push(segment.silence_frames_before as f64 * inner.vad_frame_duration_ms);
            }
        }

        if !latencies.is_empty() {
            results.average_latency_ms =
                latencies.iter().sum::<f64>() / latencies.len() as f64;
            results.min_latency_ms = latencies.iter().cloned().fold(f64::MAX, f64::min);
            results.max_latency_ms = latencies.iter().cloned().fold(f64::MIN, f64::max);
        }

        if !confidences.is_empty() {
            results.average_confidence =
                confidences.iter().sum::<f64>() / confidences.len() as f64;
            results.min_confidence = confidences.iter().cloned().fold(f64::MAX, f64::min);
            results.max_confidence = confidences.iter().cloned().fold(f64::MIN, f64::max);
        }

        if !silence_before_speech.is_empty() {
            results.average_silence_before_speech_ms = silence_before_speech.iter().sum::<f64>()
                / silence_before_speech.len() as f64;
        }
    }

    results.vad_ground_truth_provided = !inner.vad_ground_truth.is_empty();

    if !inner.vad_ground_truth.is_empty() && !inner.vad_decisions.is_empty() {
        let overlap = inner.vad_ground_truth.len().min(inner.vad_decisions.len());
        let mut correct = 0u32;
        let mut false_positives = 0u32;
        let mut false_negatives = 0u32;

        for i in 0..overlap {
            let truth = inner.vad_ground_truth[i];
            let decision = inner.vad_decisions[i];
            if truth == decision {
                correct += 1;
            } else if decision {
                false_positives += 1;
            } else {
                false_negatives += 1;
            }
        }

        results.vad_accuracy = (correct as f64 / overlap as f64) * 100.0;
        results.vad_false_positives = false_positives;
        results.vad_false_negatives = false_negatives;
    }

    results.total_samples_processed = inner.total_samples;
    results.total_segments = inner.segments.len();

    let processing_ms = inner
        .stopped_at
        .unwrap_or_else(Instant::now)
        .duration_since(inner.start_time)
        .as_secs_f64()
        * 1000.0;
    results.total_processing_time_ms = processing_ms;

    if inner.running && processing_ms > 0.0 {
        results.samples_per_second = inner.total_samples as f64 / (processing_ms / 1000.0);
    }

    results.total_audio_duration_ms =
        (inner.total_samples as f64 / DURATION_SAMPLE_RATE) * 1000.0;
    if results.total_audio_duration_ms > 0.0 && processing_ms > 0.0 {
        results.real_time_factor = processing_ms / results.total_audio_duration_ms;
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn segments_before_start_are_ignored() {
        let manager = BenchmarkManager::new();
        manager.add_transcription("hello", SegmentKind::Final, 1.0, 1600, 5.0);
        assert_eq!(manager.get_current_results().total_segments, 0);
    }

    #[test]
    fn start_clears_previous_session() {
        let manager = BenchmarkManager::new();
        manager.start();
        manager.add_transcription("hello", SegmentKind::Final, 1.0, 1600, 5.0);
        manager.stop();

        manager.start();
        let results = manager.get_current_results();
        assert_eq!(results.total_segments, 0);
        assert_eq!(results.total_samples_processed, 0);
    }

    #[test]
    fn hypothesis_joins_final_segments_only() {
        let manager = BenchmarkManager::new();
        manager.start();
        manager.add_transcription("Hello", SegmentKind::Final, 1.0, 1600, 5.0);
        manager.add_transcription("ignored", SegmentKind::Partial, 1.0, 0, 1.0);
        manager.add_transcription("World", SegmentKind::Final, 1.0, 1600, 5.0);

        let results = manager.get_current_results();
        assert_eq!(results.hypothesis_text, "hello world");
        assert_eq!(results.final_segments, 2);
        assert_eq!(results.partial_segments, 1);
        assert_eq!(results.partial_to_final_ratio, 0.5);
    }

    #[test]
    fn wer_against_reference() {
        let manager = BenchmarkManager::new();
        manager.set_reference_text("hello world");
        manager.start();
        manager.add_transcription("hello word", SegmentKind::Final, 0.9, 32_000, 12.0);

        let results = manager.get_current_results();
        assert_eq!(results.word_error_rate, 50.0);
        assert_eq!(results.word_substitutions, 1);
        assert_eq!(results.total_words, 2);
        assert_eq!(results.word_errors, 1);
        // 32000 samples at the fixed 16kHz derivation: two seconds of audio
        assert!((results.total_audio_duration_ms - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn latency_and_confidence_aggregates() {
        let manager = BenchmarkManager::new();
        manager.start();
        manager.add_transcription("a", SegmentKind::Final, 0.5, 100, 10.0);
        manager.add_transcription("b", SegmentKind::Final, 0.9, 100, 30.0);

        let results = manager.get_current_results();
        assert!((results.average_latency_ms - 20.0).abs() < 1e-9);
        assert_eq!(results.min_latency_ms, 10.0);
        assert_eq!(results.max_latency_ms, 30.0);
        assert!((results.average_confidence - 0.7).abs() < 1e-9);
        assert_eq!(results.min_confidence, 0.5);
        assert_eq!(results.max_confidence, 0.9);
    }

    #[test]
    fn vad_accuracy_over_overlap() {
        let manager = BenchmarkManager::new();
        manager.set_vad_ground_truth(vec![true, true, false, false], 20.0);
        manager.start();
        manager.add_transcription("x", SegmentKind::Final, 1.0, 100, 1.0);
        manager.add_vad_decision(true, 0);
        manager.add_vad_decision(false, 0);
        manager.add_vad_decision(false, 0);
        manager.add_vad_decision(true, 0);

        let results = manager.get_current_results();
        assert!(results.vad_ground_truth_provided);
        assert_eq!(results.vad_accuracy, 50.0);
        assert_eq!(results.vad_false_positives, 1);
        assert_eq!(results.vad_false_negatives, 1);
    }

    #[test]
    fn vad_flag_tracks_ground_truth_only() {
        let manager = BenchmarkManager::new();
        manager.start();
        assert!(!manager.get_current_results().vad_ground_truth_provided);

        manager.set_vad_ground_truth(vec![true, false], 20.0);
        assert!(manager.get_current_results().vad_ground_truth_provided);
    }

    #[test]
    fn vad_decision_annotates_latest_segment() {
        let manager = BenchmarkManager::new();
        manager.start();
        manager.add_transcription("x", SegmentKind::Final, 1.0, 100, 1.0);
        manager.add_vad_decision(true, 7);

        let results = manager.get_current_results();
        assert!(results.segments[0].vad_detected);
        assert_eq!(results.segments[0].silence_frames_before, 7);
        // 7 frames of 20ms before speech
        assert!((results.average_silence_before_speech_ms - 140.0).abs() < 1e-9);
    }

    #[test]
    fn stop_freezes_processing_time() {
        let manager = BenchmarkManager::new();
        manager.start();
        manager.add_transcription("x", SegmentKind::Final, 1.0, 16_000, 1.0);
        let stopped = manager.stop();
        assert!(stopped.total_processing_time_ms > 0.0);
        assert!(stopped.real_time_factor > 0.0);
        // Stopped sessions report no live throughput
        assert_eq!(stopped.samples_per_second, 0.0);
    }

    #[test]
    fn progress_callback_fires_per_segment() {
        let manager = BenchmarkManager::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        manager.set_progress_callback(Box::new(move |results| {
            assert!(results.total_segments >= 1);
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        manager.start();
        manager.add_transcription("a", SegmentKind::Final, 1.0, 100, 1.0);
        manager.add_transcription("b", SegmentKind::Final, 1.0, 100, 1.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
