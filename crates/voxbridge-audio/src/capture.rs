use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::chunk_queue::{ChunkConsumer, ChunkProducer, ChunkQueue, ChunkSignal};
use crate::device::resolve_input_device;
use voxbridge_foundation::AudioError;

/// Chunk consumer callback. Invoked on the capture consumer thread, one
/// fixed-duration chunk at a time, in arrival order.
pub type ChunkCallback = Box<dyn Fn(&[i16]) + Send + Sync>;

const CONSUMER_WAIT: Duration = Duration::from_millis(100);
const STREAM_START_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct MicCaptureConfig {
    pub sample_rate: u32,
    /// 1 or 2 input channels; chunks carry interleaved samples.
    pub channels: u16,
    pub frames_per_buffer: u32,
    /// Index into the enumerated input devices; `None` uses the host default.
    pub device_index: Option<usize>,
    /// Capacity of the chunk queue, in chunks.
    pub queue_size: usize,
    /// Target chunk duration; chunk length is `sample_rate·accumulate_ms/1000`
    /// frames per channel.
    pub accumulate_ms: u32,
}

impl Default for MicCaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            frames_per_buffer: 1_600,
            device_index: None,
            queue_size: 50,
            accumulate_ms: 100,
        }
    }
}

impl MicCaptureConfig {
    pub fn frames_to_accumulate(&self) -> usize {
        (self.sample_rate as usize * self.accumulate_ms as usize) / 1000
    }

    pub fn samples_per_chunk(&self) -> usize {
        self.frames_to_accumulate() * self.channels as usize
    }
}

/// Callback-side half of the capture path. Lives inside the cpal input
/// callback: appends incoming frames to a pre-sized accumulation buffer and
/// moves full chunks into the SPSC queue. Never blocks; a refused chunk is
/// counted into `dropped_frames` and its buffer reused.
pub(crate) struct ChunkAccumulator {
    producer: ChunkProducer,
    buffer: Vec<i16>,
    samples_per_chunk: usize,
    channels: usize,
    dropped_frames: Arc<AtomicU64>,
    signal: Arc<ChunkSignal>,
}

impl ChunkAccumulator {
    pub(crate) fn new(
        producer: ChunkProducer,
        samples_per_chunk: usize,
        channels: usize,
        dropped_frames: Arc<AtomicU64>,
        signal: Arc<ChunkSignal>,
    ) -> Self {
        Self {
            producer,
            buffer: Vec::with_capacity(samples_per_chunk),
            samples_per_chunk,
            channels,
            dropped_frames,
            signal,
        }
    }

    pub(crate) fn push_samples(&mut self, samples: &[i16]) {
        self.buffer.extend_from_slice(samples);

        while self.buffer.len() >= self.samples_per_chunk {
            // Chunks are handed over wholesale; the tail beyond a full chunk
            // stays accumulated for the next one.
            let mut chunk = std::mem::replace(
                &mut self.buffer,
                Vec::with_capacity(self.samples_per_chunk),
            );
            if chunk.len() > self.samples_per_chunk {
                let tail = chunk.split_off(self.samples_per_chunk);
                self.buffer.extend_from_slice(&tail);
            }

            match self.producer.try_push(chunk) {
                Ok(()) => self.signal.notify(),
                Err(mut rejected) => {
                    let frames = (rejected.len() / self.channels) as u64;
                    self.dropped_frames.fetch_add(frames, Ordering::Relaxed);
                    // The rejected buffer comes back with its capacity intact
                    rejected.clear();
                    if self.buffer.is_empty() {
                        self.buffer = rejected;
                    }
                }
            }
        }
    }
}

/// Real-time microphone capture.
///
/// Bridges the hardware callback (driver thread, must not block or allocate
/// unboundedly) to an arbitrary consumer. `start`/`stop` are idempotent.
pub struct MicCapture {
    config: MicCaptureConfig,
    callback: Arc<Mutex<Option<ChunkCallback>>>,
    consumer: Arc<Mutex<Option<ChunkConsumer>>>,
    signal: Arc<ChunkSignal>,
    running: Arc<AtomicBool>,
    dropped_frames: Arc<AtomicU64>,
    stream_thread: Option<JoinHandle<()>>,
    consumer_thread: Option<JoinHandle<()>>,
}

impl MicCapture {
    pub fn new(config: MicCaptureConfig) -> Self {
        Self {
            config,
            callback: Arc::new(Mutex::new(None)),
            consumer: Arc::new(Mutex::new(None)),
            signal: Arc::new(ChunkSignal::new()),
            running: Arc::new(AtomicBool::new(false)),
            dropped_frames: Arc::new(AtomicU64::new(0)),
            stream_thread: None,
            consumer_thread: None,
        }
    }

    /// Install, replace or remove (with `None`-like no-op semantics via
    /// `clear_callback`) the chunk consumer.
    pub fn set_callback(&self, callback: ChunkCallback) {
        *self.callback.lock() = Some(callback);
    }

    pub fn clear_callback(&self) {
        *self.callback.lock() = None;
    }

    /// Open the input stream and start delivering chunks. Returns an error
    /// and stays stopped if the device cannot be opened.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.dropped_frames.store(0, Ordering::SeqCst);

        let (producer, consumer) = ChunkQueue::new(self.config.queue_size).split();
        *self.consumer.lock() = Some(consumer);

        let accumulator = ChunkAccumulator::new(
            producer,
            self.config.samples_per_chunk(),
            self.config.channels as usize,
            Arc::clone(&self.dropped_frames),
            Arc::clone(&self.signal),
        );

        self.running.store(true, Ordering::SeqCst);

        // The cpal stream is not Send, so it lives on a dedicated thread for
        // the whole capture session. Startup success or failure is reported
        // back synchronously over a one-shot channel.
        let (startup_tx, startup_rx) = mpsc::channel::<Result<(), AudioError>>();
        let config = self.config.clone();
        let running = Arc::clone(&self.running);

        let stream_thread = thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || {
                let stream = match build_input_stream(&config, accumulator) {
                    Ok(stream) => stream,
                    Err(e) => {
                        running.store(false, Ordering::SeqCst);
                        let _ = startup_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    running.store(false, Ordering::SeqCst);
                    let _ = startup_tx.send(Err(e.into()));
                    return;
                }
                let _ = startup_tx.send(Ok(()));

                while running.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(100));
                }
                drop(stream);
            })
            .map_err(|e| AudioError::Fatal(format!("failed to spawn capture thread: {e}")))?;

        match startup_rx.recv_timeout(STREAM_START_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = stream_thread.join();
                self.teardown();
                return Err(e);
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = stream_thread.join();
                self.teardown();
                return Err(AudioError::DeviceUnavailable);
            }
        }
        self.stream_thread = Some(stream_thread);

        if self.callback.lock().is_some() {
            let running = Arc::clone(&self.running);
            let consumer = Arc::clone(&self.consumer);
            let callback = Arc::clone(&self.callback);
            let signal = Arc::clone(&self.signal);

            let handle = thread::Builder::new()
                .name("mic-consumer".into())
                .spawn(move || {
                    consumer_loop(running, consumer, callback, signal);
                })
                .map_err(|e| AudioError::Fatal(format!("failed to spawn consumer thread: {e}")))?;
            self.consumer_thread = Some(handle);
        }

        tracing::info!(
            sample_rate = self.config.sample_rate,
            accumulate_ms = self.config.accumulate_ms,
            "Microphone capture started"
        );
        Ok(())
    }

    /// Stop the stream, join the worker threads and drain the queue.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.signal.notify();

        if let Some(handle) = self.consumer_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.stream_thread.take() {
            let _ = handle.join();
        }
        self.teardown();
        tracing::info!("Microphone capture stopped");
    }

    /// Non-blocking pull of one chunk, for embedders that poll instead of
    /// registering a callback.
    pub fn dequeue(&self, out: &mut Vec<i16>) -> bool {
        let mut guard = self.consumer.lock();
        if let Some(consumer) = guard.as_mut() {
            if let Some(chunk) = consumer.pop() {
                *out = chunk;
                return true;
            }
        }
        false
    }

    /// Frames lost to a full queue since the last `start()`.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn teardown(&mut self) {
        // Drain whatever the callback queued before shutdown
        let mut guard = self.consumer.lock();
        if let Some(consumer) = guard.as_mut() {
            while consumer.pop().is_some() {}
        }
        *guard = None;
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn consumer_loop(
    running: Arc<AtomicBool>,
    consumer: Arc<Mutex<Option<ChunkConsumer>>>,
    callback: Arc<Mutex<Option<ChunkCallback>>>,
    signal: Arc<ChunkSignal>,
) {
    tracing::debug!("Capture consumer thread started");

    while running.load(Ordering::SeqCst) {
        let chunk = {
            let mut guard = consumer.lock();
            guard.as_mut().and_then(|c| c.pop())
        };

        match chunk {
            Some(chunk) => {
                if let Some(cb) = callback.lock().as_ref() {
                    cb(&chunk);
                }
            }
            None => signal.wait_timeout(CONSUMER_WAIT),
        }
    }

    tracing::debug!("Capture consumer thread stopped");
}

fn build_input_stream(
    config: &MicCaptureConfig,
    mut accumulator: ChunkAccumulator,
) -> Result<cpal::Stream, AudioError> {
    let device = resolve_input_device(config.device_index)?;
    if let Ok(name) = device.name() {
        tracing::info!("Using audio device: {}", name);
    }

    let sample_format = device
        .default_input_config()
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::I16);

    let stream_config = StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Fixed(config.frames_per_buffer),
    };

    let err_fn = |err: cpal::StreamError| {
        // Driver status problems are logged but never fatal to the pipeline
        tracing::warn!("Audio stream error: {}", err);
    };

    // Samples are converted to i16 in place inside the callback; the scratch
    // buffer is reused so the steady state does not allocate.
    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &_| {
                accumulator.push_samples(data);
            },
            err_fn,
            None,
        )?,
        SampleFormat::F32 => {
            let mut scratch: Vec<i16> = Vec::new();
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &_| {
                    scratch.clear();
                    scratch.reserve(data.len());
                    for &s in data {
                        scratch.push((s.clamp(-1.0, 1.0) * 32767.0).round() as i16);
                    }
                    accumulator.push_samples(&scratch);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::U16 => {
            let mut scratch: Vec<i16> = Vec::new();
            device.build_input_stream(
                &stream_config,
                move |data: &[u16], _: &_| {
                    scratch.clear();
                    scratch.reserve(data.len());
                    for &s in data {
                        scratch.push((s as i32 - 32768) as i16);
                    }
                    accumulator.push_samples(&scratch);
                },
                err_fn,
                None,
            )?
        }
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{:?}", other),
            });
        }
    };

    Ok(stream)
}
