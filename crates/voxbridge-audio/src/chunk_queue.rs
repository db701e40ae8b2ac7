use parking_lot::{Condvar, Mutex};
use rtrb::{Consumer, Producer, PushError, RingBuffer};
use std::time::Duration;

/// Bounded SPSC queue of whole PCM chunks.
///
/// Only the audio driver callback pushes and only the capture consumer
/// thread pops. Payloads are moved, never copied, so the callback side does
/// no work proportional to chunk size on handoff.
pub struct ChunkQueue {
    producer: Producer<Vec<i16>>,
    consumer: Consumer<Vec<i16>>,
}

impl ChunkQueue {
    pub fn new(capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity);
        Self { producer, consumer }
    }

    pub fn split(self) -> (ChunkProducer, ChunkConsumer) {
        (
            ChunkProducer {
                producer: self.producer,
            },
            ChunkConsumer {
                consumer: self.consumer,
            },
        )
    }
}

/// Producer half, owned by the audio callback.
pub struct ChunkProducer {
    producer: Producer<Vec<i16>>,
}

impl ChunkProducer {
    /// Non-blocking push. On a full queue the chunk is handed back so the
    /// caller can account for it and reuse its allocation.
    pub fn try_push(&mut self, chunk: Vec<i16>) -> Result<(), Vec<i16>> {
        match self.producer.push(chunk) {
            Ok(()) => Ok(()),
            Err(PushError::Full(rejected)) => Err(rejected),
        }
    }

    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

/// Consumer half, owned by the capture consumer thread (or a polling
/// embedder via `MicCapture::dequeue`).
pub struct ChunkConsumer {
    consumer: Consumer<Vec<i16>>,
}

impl ChunkConsumer {
    pub fn pop(&mut self) -> Option<Vec<i16>> {
        self.consumer.pop().ok()
    }

    pub fn slots(&self) -> usize {
        self.consumer.slots()
    }
}

/// Wake signal from the callback to the consumer. The callback only ever
/// calls `notify` (no lock held across the notification); the consumer waits
/// with a short timeout so shutdown stays responsive.
pub struct ChunkSignal {
    lock: Mutex<()>,
    cv: Condvar,
}

impl ChunkSignal {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            cv: Condvar::new(),
        }
    }

    pub fn notify(&self) {
        self.cv.notify_one();
    }

    pub fn wait_timeout(&self, timeout: Duration) {
        let mut guard = self.lock.lock();
        self.cv.wait_for(&mut guard, timeout);
    }
}

impl Default for ChunkSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_preserves_order() {
        let (mut producer, mut consumer) = ChunkQueue::new(4).split();

        producer.try_push(vec![1, 2]).unwrap();
        producer.try_push(vec![3, 4]).unwrap();

        assert_eq!(consumer.pop(), Some(vec![1, 2]));
        assert_eq!(consumer.pop(), Some(vec![3, 4]));
        assert_eq!(consumer.pop(), None);
    }

    #[test]
    fn full_queue_returns_chunk() {
        let (mut producer, mut consumer) = ChunkQueue::new(1).split();

        producer.try_push(vec![1; 160]).unwrap();
        let rejected = producer.try_push(vec![2; 160]).unwrap_err();
        assert_eq!(rejected.len(), 160);

        // Draining makes room again
        assert!(consumer.pop().is_some());
        producer.try_push(rejected).unwrap();
    }

    #[test]
    fn signal_wait_times_out() {
        let signal = ChunkSignal::new();
        // No notification pending: returns after the timeout without hanging
        signal.wait_timeout(Duration::from_millis(5));
    }
}
