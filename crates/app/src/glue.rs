use parking_lot::Mutex;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use voxbridge_audio::{MicCapture, MicCaptureConfig};
use voxbridge_bench::{export_results, BenchmarkManager, ExportFormat, SegmentKind};
use voxbridge_foundation::{ShutdownGuard, ShutdownHandler};
use voxbridge_server::{
    AudioSink, Broadcaster, CommandDispatcher, ServerHandle, TranscriptionServer,
};
use voxbridge_stt::{SpeechEngine, SpeechEngineConfig, VoskEngine};
use voxbridge_vad::{HangoverConfig, HangoverVad, VadConfig};

use crate::processor::{AudioProcessor, ProcessorConfig};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model_path: String,
    pub port: u16,
    pub speaker_model_path: String,
    pub max_alternatives: u32,
    pub enable_partial_words: bool,
    pub grammar: String,
    pub use_mic: bool,
    pub mic_device: Option<usize>,
    pub buffer_ms: u32,
    pub finalize_ms: u64,
    pub silence_ms: u32,
    pub use_vad: bool,
    pub sample_rate: u32,
    pub benchmark_enabled: bool,
    pub benchmark_live: bool,
    pub benchmark_reference_file: Option<PathBuf>,
    pub benchmark_output: Option<PathBuf>,
    pub benchmark_format: ExportFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            port: 8080,
            speaker_model_path: String::new(),
            max_alternatives: 0,
            enable_partial_words: true,
            grammar: String::new(),
            use_mic: false,
            mic_device: None,
            buffer_ms: 100,
            finalize_ms: 2_000,
            silence_ms: 500,
            use_vad: true,
            sample_rate: 16_000,
            benchmark_enabled: false,
            benchmark_live: false,
            benchmark_reference_file: None,
            benchmark_output: None,
            benchmark_format: ExportFormat::Txt,
        }
    }
}

/// Owns every component and answers the server's callbacks: inbound
/// WebSocket audio and control commands.
pub struct AppCore {
    engine: Arc<dyn SpeechEngine>,
    benchmark: Option<Arc<BenchmarkManager>>,
    broadcaster: OnceLock<Arc<dyn Broadcaster>>,
    server: OnceLock<ServerHandle>,
    shutdown: OnceLock<ShutdownGuard>,
    mic: Mutex<Option<MicCapture>>,
    start_time: Instant,
    messages_processed: AtomicU64,
    running: AtomicBool,
}

impl AppCore {
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        benchmark: Option<Arc<BenchmarkManager>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            benchmark,
            broadcaster: OnceLock::new(),
            server: OnceLock::new(),
            shutdown: OnceLock::new(),
            mic: Mutex::new(None),
            start_time: Instant::now(),
            messages_processed: AtomicU64::new(0),
            running: AtomicBool::new(false),
        })
    }

    pub fn attach_broadcaster(&self, broadcaster: Arc<dyn Broadcaster>) {
        let _ = self.broadcaster.set(broadcaster);
    }

    pub fn attach_server(&self, handle: ServerHandle) {
        let _ = self.server.set(handle);
    }

    pub fn attach_shutdown(&self, guard: ShutdownGuard) {
        let _ = self.shutdown.set(guard);
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn install_mic(&self, mic: MicCapture) {
        *self.mic.lock() = Some(mic);
    }

    pub fn stop_mic(&self) {
        if let Some(mut mic) = self.mic.lock().take() {
            mic.stop();
        }
    }

    /// The stats snapshot served by the `stats` command and the periodic
    /// log line.
    pub fn stats_snapshot(&self) -> Value {
        let mut stats = json!({
            "uptime_seconds": self.start_time.elapsed().as_secs(),
            "messages_processed": self.messages_processed.load(Ordering::Relaxed),
            "running": self.running.load(Ordering::SeqCst),
            "samples_processed": self.engine.total_samples_processed(),
            "connected_clients": self
                .server
                .get()
                .map(|handle| handle.client_count())
                .unwrap_or(0),
        });

        let mic = self.mic.lock();
        match mic.as_ref() {
            Some(mic) => {
                stats["microphone_enabled"] = json!(true);
                stats["dropped_frames"] = json!(mic.dropped_frames());
            }
            None => {
                stats["microphone_enabled"] = json!(false);
            }
        }
        drop(mic);

        stats["benchmark"] = match &self.benchmark {
            Some(bench) => {
                let results = bench.get_current_results();
                json!({
                    "enabled": true,
                    "word_error_rate": results.word_error_rate,
                    "character_error_rate": results.character_error_rate,
                    "real_time_factor": results.real_time_factor,
                    "average_confidence": results.average_confidence,
                    "total_segments": results.total_segments,
                    "partial_segments": results.partial_segments,
                    "final_segments": results.final_segments,
                })
            }
            None => json!({ "enabled": false }),
        };

        stats
    }
}

impl AudioSink for AppCore {
    fn on_audio(&self, samples: &[i16], session_id: &str) {
        let t0 = Instant::now();
        let result = self.engine.process_audio(samples, false);
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        let latency_ms = t0.elapsed().as_secs_f64() * 1000.0;

        let parsed: Value = match serde_json::from_str(&result) {
            Ok(value) => value,
            Err(e) => {
                error!("Error parsing recognizer result: {}", e);
                return;
            }
        };

        let (text, kind) = if let Some(text) = parsed.get("text").and_then(Value::as_str) {
            (text.trim(), SegmentKind::Final)
        } else if let Some(partial) = parsed.get("partial").and_then(Value::as_str) {
            (partial.trim(), SegmentKind::Partial)
        } else {
            return;
        };

        if text.is_empty() {
            return;
        }

        let confidence = parsed
            .get("alternatives")
            .and_then(Value::as_array)
            .and_then(|alts| alts.first())
            .and_then(|alt| alt.get("confidence"))
            .and_then(Value::as_f64)
            .map(|c| c as f32)
            .unwrap_or(1.0);

        if let Some(broadcaster) = self.broadcaster.get() {
            broadcaster.broadcast(text, session_id, confidence);
        }
        debug!("WebSocket transcription queued: {}", text);

        if let Some(bench) = &self.benchmark {
            bench.add_transcription(
                text,
                kind,
                confidence as f64,
                samples.len() as u64,
                latency_ms,
            );
        }
    }
}

impl CommandDispatcher for AppCore {
    fn handle_command(&self, command: &str, params: &Value) -> Value {
        debug!("Received command: {}", command);

        match command {
            "reset" => {
                self.engine.reset();
                info!("Recognizer reset via command");
                json!({ "status": "ok", "message": "Recognizer reset" })
            }
            "set_grammar" => match params.get("grammar") {
                Some(grammar) => {
                    self.engine.set_grammar(&grammar.to_string());
                    info!("Grammar updated via command");
                    json!({ "status": "ok", "message": "Grammar updated" })
                }
                None => {
                    warn!("set_grammar command missing grammar parameter");
                    json!({ "status": "error", "message": "Missing grammar parameter" })
                }
            },
            "stats" => json!({ "status": "ok", "stats": self.stats_snapshot() }),
            "benchmark_results" => match &self.benchmark {
                Some(bench) => {
                    let results = bench.get_current_results();
                    json!({
                        "status": "ok",
                        "benchmark": {
                            "word_error_rate": results.word_error_rate,
                            "character_error_rate": results.character_error_rate,
                            "real_time_factor": results.real_time_factor,
                            "average_confidence": results.average_confidence,
                            "total_segments": results.total_segments,
                            "partial_segments": results.partial_segments,
                            "final_segments": results.final_segments,
                        }
                    })
                }
                None => json!({ "status": "error", "message": "Benchmark not enabled" }),
            },
            "stop" => {
                info!("Stop requested via command");
                if let Some(guard) = self.shutdown.get() {
                    guard.request_shutdown();
                }
                json!({ "status": "ok", "message": "Server stopping" })
            }
            _ => {
                warn!("Unknown command received: {}", command);
                json!({ "status": "error", "message": "Unknown command" })
            }
        }
    }
}

/// Wire everything up and run until shutdown. Fatal errors (bad model,
/// failed bind, failed mic start) surface as `Err`.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!("voxbridge - speech recognition server");
    info!("================================================");

    let engine_config = SpeechEngineConfig {
        sample_rate: config.sample_rate,
        enable_speaker_id: !config.speaker_model_path.is_empty(),
        speaker_model_path: config.speaker_model_path.clone(),
        enable_word_times: false,
        enable_partial_words: config.enable_partial_words,
        max_alternatives: config.max_alternatives,
    };

    info!("Initializing speech engine with model: {}", config.model_path);
    let engine: Arc<dyn SpeechEngine> =
        Arc::new(VoskEngine::new(&config.model_path, engine_config)?);
    if !config.grammar.is_empty() {
        engine.set_grammar(&config.grammar);
        info!("Grammar set: {}", config.grammar);
    }

    let benchmark = if config.benchmark_enabled {
        Some(init_benchmark(&config)?)
    } else {
        None
    };

    let core = AppCore::new(Arc::clone(&engine), benchmark.clone());

    let (server, handle) = TranscriptionServer::new(
        Arc::clone(&core) as Arc<dyn AudioSink>,
        Arc::clone(&core) as Arc<dyn CommandDispatcher>,
    );
    core.attach_server(handle.clone());
    core.attach_broadcaster(Arc::new(handle.clone()));

    let shutdown = ShutdownHandler::new().install().await;
    core.attach_shutdown(shutdown.clone());

    if config.use_mic {
        init_microphone(&config, &core, &engine, &handle, benchmark.as_ref())?;
    }

    info!("Starting WebSocket server on port {}...", config.port);
    let server_shutdown = shutdown.clone();
    let mut server_task = tokio::spawn(server.serve(config.port, async move {
        server_shutdown.wait().await;
    }));

    info!("Server ready. Waiting for connections...");
    core.set_running(true);

    let mut stats_interval = tokio::time::interval(Duration::from_secs(30));
    stats_interval.tick().await; // the first tick fires immediately

    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                info!("Shutdown signal received");
                break;
            }
            result = &mut server_task => {
                match result {
                    Ok(Ok(())) => info!("WebSocket server stopped"),
                    Ok(Err(e)) => {
                        error!("WebSocket server failed: {}", e);
                        core.set_running(false);
                        return Err(e.into());
                    }
                    Err(e) => error!("WebSocket server task panicked: {}", e),
                }
                break;
            }
            _ = stats_interval.tick() => {
                let stats = core.stats_snapshot();
                info!(
                    "Stats: {} clients, {} messages processed",
                    stats["connected_clients"], stats["messages_processed"]
                );
                if stats["benchmark"]["enabled"] == json!(true) {
                    info!(
                        "Benchmark: WER={:.2}%, RTF={:.2}x",
                        stats["benchmark"]["word_error_rate"].as_f64().unwrap_or(0.0),
                        stats["benchmark"]["real_time_factor"].as_f64().unwrap_or(0.0)
                    );
                }
            }
        }
    }

    info!("Shutting down...");
    core.set_running(false);

    if let Some(bench) = &benchmark {
        finalize_benchmark(&config, bench);
    }

    info!("Stopping microphone capture...");
    core.stop_mic();

    // The server observes the same shutdown guard; wait for it to drain
    shutdown.request_shutdown();
    if !server_task.is_finished() {
        let _ = tokio::time::timeout(Duration::from_secs(1), server_task).await;
    }

    info!("Server stopped successfully");
    Ok(())
}

fn init_benchmark(config: &AppConfig) -> anyhow::Result<Arc<BenchmarkManager>> {
    info!("Initializing benchmark manager...");
    let benchmark = Arc::new(BenchmarkManager::new());

    if let Some(reference) = &config.benchmark_reference_file {
        let text = std::fs::read_to_string(reference).map_err(|e| {
            anyhow::anyhow!(
                "cannot open benchmark reference file {}: {e}",
                reference.display()
            )
        })?;
        benchmark.set_reference_text(&text);
        info!("Benchmark reference loaded: {}", reference.display());
    } else if config.benchmark_live {
        info!("Benchmark mode: live performance monitoring");
    }

    if config.benchmark_live {
        let last_update = Mutex::new(Instant::now());
        benchmark.set_progress_callback(Box::new(move |results| {
            let mut last = last_update.lock();
            if last.elapsed() >= Duration::from_secs(5) {
                info!(
                    "[live] segments: {} | avg confidence: {:.3} | RTF: {:.2}x | WER: {:.2}%",
                    results.total_segments,
                    results.average_confidence,
                    results.real_time_factor,
                    results.word_error_rate
                );
                *last = Instant::now();
            }
        }));
    }

    benchmark.start();
    Ok(benchmark)
}

fn finalize_benchmark(config: &AppConfig, benchmark: &Arc<BenchmarkManager>) {
    info!("Finalizing benchmark results...");
    let results = benchmark.stop();

    let output = config.benchmark_output.clone().unwrap_or_else(|| {
        PathBuf::from(format!(
            "benchmark_results_{}.{}",
            chrono::Local::now().format("%Y%m%d_%H%M%S"),
            config.benchmark_format
        ))
    });

    if let Err(e) = export_results(
        &results,
        &output,
        &config.model_path,
        config.benchmark_format,
    ) {
        error!("Failed to export benchmark results: {}", e);
        return;
    }

    info!("=== BENCHMARK SUMMARY ===");
    info!("Word Error Rate: {:.2}%", results.word_error_rate);
    info!("Character Error Rate: {:.2}%", results.character_error_rate);
    info!("Real-time Factor: {:.2}x", results.real_time_factor);
    info!("Average Latency: {:.2} ms", results.average_latency_ms);
    info!("Average Confidence: {:.3}", results.average_confidence);
    info!("Results exported to: {}", output.display());
}

fn init_microphone(
    config: &AppConfig,
    core: &Arc<AppCore>,
    engine: &Arc<dyn SpeechEngine>,
    handle: &ServerHandle,
    benchmark: Option<&Arc<BenchmarkManager>>,
) -> anyhow::Result<()> {
    info!("Setting up microphone capture...");

    let vad = if config.use_vad {
        let gate = HangoverVad::new(HangoverConfig {
            vad: VadConfig {
                sample_rate: config.sample_rate,
                ..VadConfig::default()
            },
            ..HangoverConfig::default()
        })?;
        Some(Box::new(gate) as Box<dyn voxbridge_vad::VadEngine>)
    } else {
        None
    };

    let processor_config = ProcessorConfig {
        use_vad: config.use_vad,
        silence_frames_threshold: config.silence_ms / config.buffer_ms.max(1),
        finalize_interval_ms: config.finalize_ms,
        buffer_ms: config.buffer_ms,
        session_id: "mic-capture".to_string(),
    };

    let processor = Arc::new(AudioProcessor::new(
        Arc::clone(engine),
        Arc::new(handle.clone()) as Arc<dyn Broadcaster>,
        vad,
        benchmark.cloned(),
        processor_config,
    )?);

    let mic_config = MicCaptureConfig {
        sample_rate: config.sample_rate,
        channels: 1,
        frames_per_buffer: config.buffer_ms * config.sample_rate / 1000,
        device_index: config.mic_device,
        queue_size: 50,
        accumulate_ms: config.buffer_ms,
    };

    let mut mic = MicCapture::new(mic_config);
    mic.set_callback(Box::new(move |chunk| processor.process_chunk(chunk)));
    mic.start()?;
    core.install_mic(mic);

    info!("Microphone capture started successfully");
    info!("Configuration summary:");
    info!("  Buffer size: {}ms", config.buffer_ms);
    info!("  Finalization interval: {}ms", config.finalize_ms);
    info!(
        "  VAD: {}",
        if config.use_vad { "enabled" } else { "disabled" }
    );
    info!(
        "  Partial results: {}",
        if config.enable_partial_words {
            "enabled"
        } else {
            "disabled"
        }
    );
    info!(
        "  Benchmark enabled: {}",
        if config.benchmark_enabled { "yes" } else { "no" }
    );
    Ok(())
}
