//! Benchmarking for speech-recognition sessions.
//!
//! A [`BenchmarkManager`] accumulates transcription segments and VAD
//! decisions over a run, derives accuracy (WER/CER), timing, confidence and
//! throughput aggregates on demand, and serializes reports as plain text,
//! JSON or CSV.

pub mod export;
pub mod manager;
pub mod results;
pub mod text;

pub use export::{export_comparison, export_results, ExportFormat};
pub use manager::BenchmarkManager;
pub use results::{BenchmarkResults, SegmentKind, TranscriptionSegment};
pub use text::{calculate_cer, calculate_wer, normalize_text, tokenize, WerBreakdown};
