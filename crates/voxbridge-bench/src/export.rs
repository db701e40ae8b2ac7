use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use chrono::Local;
use serde_json::json;
use tracing::info;

use crate::results::BenchmarkResults;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Txt,
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "txt" => Ok(Self::Txt),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(format!(
                "invalid benchmark format '{other}', must be: txt, json or csv"
            )),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Txt => "txt",
            Self::Json => "json",
            Self::Csv => "csv",
        })
    }
}

/// Serialize a result set to `path` in the requested format.
pub fn export_results(
    results: &BenchmarkResults,
    path: &Path,
    model_path: &str,
    format: ExportFormat,
) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);

    match format {
        ExportFormat::Json => write_json(results, &mut file, model_path)?,
        ExportFormat::Csv => write_csv(results, &mut file)?,
        ExportFormat::Txt => write_txt(results, &mut file, model_path)?,
    }

    file.flush()?;
    info!("Benchmark results exported to: {}", path.display());
    Ok(())
}

fn write_txt(
    results: &BenchmarkResults,
    w: &mut impl Write,
    model_path: &str,
) -> io::Result<()> {
    writeln!(w, "=== BENCHMARK RESULTS ===")?;
    writeln!(w)?;

    writeln!(w, "MODEL INFORMATION:")?;
    if !model_path.is_empty() {
        let name = Path::new(model_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| model_path.to_string());
        writeln!(w, "  Model: {}", name)?;
        writeln!(w, "  Full path: {}", model_path)?;
        match directory_size(Path::new(model_path)) {
            Some(bytes) => writeln!(
                w,
                "  Size: {:.2} MB ({} bytes)",
                bytes as f64 / (1024.0 * 1024.0),
                bytes
            )?,
            None => writeln!(w, "  Size: Unknown")?,
        }
    }
    writeln!(w, "  Timestamp: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(w)?;

    writeln!(w, "ACCURACY METRICS:")?;
    writeln!(w, "  Word Error Rate (WER): {:.2}%", results.word_error_rate)?;
    writeln!(
        w,
        "  Character Error Rate (CER): {:.2}%",
        results.character_error_rate
    )?;
    writeln!(w, "  Total Words: {}", results.total_words)?;
    writeln!(w, "  Word Errors: {}", results.word_errors)?;
    writeln!(w, "    Substitutions: {}", results.word_substitutions)?;
    writeln!(w, "    Deletions: {}", results.word_deletions)?;
    writeln!(w, "    Insertions: {}", results.word_insertions)?;
    writeln!(w)?;

    writeln!(w, "TIMING METRICS:")?;
    writeln!(
        w,
        "  Total Audio Duration: {:.2} s",
        results.total_audio_duration_ms / 1000.0
    )?;
    writeln!(
        w,
        "  Total Processing Time: {:.2} s",
        results.total_processing_time_ms / 1000.0
    )?;
    writeln!(w, "  Real-Time Factor: {:.2}x", results.real_time_factor)?;
    writeln!(w, "  Average Latency: {:.2} ms", results.average_latency_ms)?;
    writeln!(w, "  Min Latency: {:.2} ms", results.min_latency_ms)?;
    writeln!(w, "  Max Latency: {:.2} ms", results.max_latency_ms)?;
    writeln!(w)?;

    writeln!(w, "ENGINE METRICS:")?;
    writeln!(w, "  Partial Segments: {}", results.partial_segments)?;
    writeln!(w, "  Final Segments: {}", results.final_segments)?;
    writeln!(
        w,
        "  Partial/Final Ratio: {:.2}",
        results.partial_to_final_ratio
    )?;
    writeln!(w)?;

    writeln!(w, "QUALITY METRICS:")?;
    writeln!(
        w,
        "  Average Confidence: {:.3}",
        results.average_confidence
    )?;
    writeln!(w, "  Min Confidence: {:.3}", results.min_confidence)?;
    writeln!(w, "  Max Confidence: {:.3}", results.max_confidence)?;
    writeln!(w)?;

    if results.vad_ground_truth_provided {
        writeln!(w, "VAD METRICS:")?;
        writeln!(w, "  VAD Accuracy: {:.2}%", results.vad_accuracy)?;
        writeln!(w, "  False Positives: {}", results.vad_false_positives)?;
        writeln!(w, "  False Negatives: {}", results.vad_false_negatives)?;
        writeln!(
            w,
            "  Avg Silence Before Speech: {:.2} ms",
            results.average_silence_before_speech_ms
        )?;
        writeln!(w)?;
    }

    writeln!(w, "THROUGHPUT METRICS:")?;
    writeln!(w, "  Total Samples: {}", results.total_samples_processed)?;
    writeln!(w, "  Total Segments: {}", results.total_segments)?;
    writeln!(w, "  Samples/Second: {:.0}", results.samples_per_second)?;
    writeln!(w)?;

    if !results.reference_text.is_empty() {
        writeln!(w, "REFERENCE TEXT:")?;
        writeln!(w, "{}", results.reference_text)?;
        writeln!(w)?;
    }

    writeln!(w, "HYPOTHESIS TEXT:")?;
    writeln!(w, "{}", results.hypothesis_text)?;
    writeln!(w)?;

    if results.total_segments > 0 {
        let avg_segment_ms = results.total_audio_duration_ms / results.total_segments as f64;
        writeln!(w, "SEGMENT ANALYSIS:")?;
        writeln!(w, "  Average segment duration: {:.2} ms", avg_segment_ms)?;
        writeln!(
            w,
            "  Average processing time per segment: {:.2} ms",
            results.average_latency_ms
        )?;
        if avg_segment_ms > 0.0 {
            writeln!(
                w,
                "  Segment RTF: {:.2}x",
                results.average_latency_ms / avg_segment_ms
            )?;
        }
    }

    Ok(())
}

fn write_json(
    results: &BenchmarkResults,
    w: &mut impl Write,
    model_path: &str,
) -> io::Result<()> {
    let mut output = json!({
        "metadata": {
            "model_path": model_path,
            "timestamp": Local::now().timestamp(),
            "engine": "voxbridge",
            "backend": "vosk",
        },
        "accuracy": {
            "word_error_rate": results.word_error_rate,
            "character_error_rate": results.character_error_rate,
            "total_words": results.total_words,
            "word_errors": results.word_errors,
            "word_substitutions": results.word_substitutions,
            "word_deletions": results.word_deletions,
            "word_insertions": results.word_insertions,
        },
        "timing": {
            "total_audio_duration_ms": results.total_audio_duration_ms,
            "total_processing_time_ms": results.total_processing_time_ms,
            "real_time_factor": results.real_time_factor,
            "average_latency_ms": results.average_latency_ms,
            "min_latency_ms": results.min_latency_ms,
            "max_latency_ms": results.max_latency_ms,
        },
        "engine_metrics": {
            "partial_segments": results.partial_segments,
            "final_segments": results.final_segments,
            "partial_to_final_ratio": results.partial_to_final_ratio,
        },
        "quality": {
            "average_confidence": results.average_confidence,
            "min_confidence": results.min_confidence,
            "max_confidence": results.max_confidence,
        },
        "text": {
            "reference": results.reference_text,
            "hypothesis": results.hypothesis_text,
        },
        "throughput": {
            "total_samples": results.total_samples_processed,
            "total_segments": results.total_segments,
            "samples_per_second": results.samples_per_second,
        },
    });

    if results.vad_ground_truth_provided {
        output["vad"] = json!({
            "accuracy": results.vad_accuracy,
            "false_positives": results.vad_false_positives,
            "false_negatives": results.vad_false_negatives,
            "average_silence_before_speech_ms": results.average_silence_before_speech_ms,
        });
    }

    write!(w, "{}", serde_json::to_string_pretty(&output)?)
}

fn write_csv(results: &BenchmarkResults, w: &mut impl Write) -> io::Result<()> {
    writeln!(w, "metric,value,unit")?;
    writeln!(w, "word_error_rate,{},percent", results.word_error_rate)?;
    writeln!(
        w,
        "character_error_rate,{},percent",
        results.character_error_rate
    )?;
    writeln!(w, "real_time_factor,{},ratio", results.real_time_factor)?;
    writeln!(
        w,
        "average_latency,{},milliseconds",
        results.average_latency_ms
    )?;
    writeln!(
        w,
        "average_confidence,{},score",
        results.average_confidence
    )?;
    writeln!(w, "total_segments,{},count", results.total_segments)?;
    writeln!(w, "partial_segments,{},count", results.partial_segments)?;
    writeln!(w, "final_segments,{},count", results.final_segments)?;
    writeln!(w, "total_words,{},count", results.total_words)?;
    writeln!(w, "word_errors,{},count", results.word_errors)?;
    writeln!(
        w,
        "samples_per_second,{},rate",
        results.samples_per_second
    )?;

    if results.vad_ground_truth_provided {
        writeln!(w, "vad_accuracy,{},percent", results.vad_accuracy)?;
        writeln!(
            w,
            "vad_false_positives,{},count",
            results.vad_false_positives
        )?;
        writeln!(
            w,
            "vad_false_negatives,{},count",
            results.vad_false_negatives
        )?;
    }

    Ok(())
}

/// Side-by-side comparison of two result sets. Lower wins for error rates,
/// RTF and latency; higher wins for confidence. The overall winner takes the
/// majority of WER, RTF and confidence.
pub fn export_comparison(
    left_label: &str,
    left: &BenchmarkResults,
    right_label: &str,
    right: &BenchmarkResults,
    path: &Path,
) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    let w = &mut file;

    writeln!(w, "=== {} vs {} COMPARISON ===", left_label, right_label)?;
    writeln!(w)?;
    writeln!(w, "Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(w)?;

    writeln!(
        w,
        "{:<30}{:<15}{:<15}WINNER",
        "METRIC", left_label, right_label
    )?;
    writeln!(w, "{}", "-".repeat(75))?;

    let compare = |w: &mut dyn Write,
                       name: &str,
                       left_val: f64,
                       right_val: f64,
                       lower_is_better: bool,
                       unit: &str|
     -> io::Result<()> {
        let left_wins = if lower_is_better {
            left_val < right_val
        } else {
            left_val > right_val
        };
        writeln!(
            w,
            "{:<30}{:<15}{:<15}{}",
            name,
            format!("{:.2}{}", left_val, unit),
            format!("{:.2}{}", right_val, unit),
            if left_wins { left_label } else { right_label }
        )
    };

    compare(
        w,
        "Word Error Rate",
        left.word_error_rate,
        right.word_error_rate,
        true,
        "%",
    )?;
    compare(
        w,
        "Character Error Rate",
        left.character_error_rate,
        right.character_error_rate,
        true,
        "%",
    )?;
    compare(
        w,
        "Real-Time Factor",
        left.real_time_factor,
        right.real_time_factor,
        true,
        "x",
    )?;
    compare(
        w,
        "Average Latency",
        left.average_latency_ms,
        right.average_latency_ms,
        true,
        "ms",
    )?;
    compare(
        w,
        "Average Confidence",
        left.average_confidence,
        right.average_confidence,
        false,
        "",
    )?;

    writeln!(w)?;
    writeln!(w, "DETAILED ANALYSIS:")?;
    writeln!(
        w,
        "  {} processed {} segments",
        left_label, left.total_segments
    )?;
    writeln!(
        w,
        "  {} processed {} segments",
        right_label, right.total_segments
    )?;
    writeln!(
        w,
        "  {} partial/final ratio: {:.2}",
        left_label, left.partial_to_final_ratio
    )?;

    let mut left_wins = 0;
    let mut right_wins = 0;
    if left.word_error_rate < right.word_error_rate {
        left_wins += 1;
    } else {
        right_wins += 1;
    }
    if left.real_time_factor < right.real_time_factor {
        left_wins += 1;
    } else {
        right_wins += 1;
    }
    if left.average_confidence > right.average_confidence {
        left_wins += 1;
    } else {
        right_wins += 1;
    }

    writeln!(w)?;
    writeln!(
        w,
        "OVERALL WINNER: {} ({}/3 metrics)",
        if left_wins > right_wins {
            left_label
        } else {
            right_label
        },
        left_wins.max(right_wins)
    )?;

    file.flush()?;
    info!("Comparison exported to: {}", path.display());
    Ok(())
}

fn directory_size(path: &Path) -> Option<u64> {
    let mut total = 0u64;
    let mut stack = vec![path.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = std::fs::read_dir(&dir).ok()?;
        for entry in entries.flatten() {
            let meta = entry.metadata().ok()?;
            if meta.is_dir() {
                stack.push(entry.path());
            } else {
                total += meta.len();
            }
        }
    }

    Some(total)
}
