use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Real-time safe sample ring between the audio callback and the analysis
/// loop. The callback must never block or allocate, so overruns drop samples
/// and count them instead of waiting.
pub struct SampleRing {
    producer: Producer<f32>,
    consumer: Consumer<f32>,
    dropped: Arc<AtomicU64>,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity);
        Self {
            producer,
            consumer,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn split(self) -> (SampleProducer, SampleConsumer) {
        (
            SampleProducer {
                producer: self.producer,
                dropped: self.dropped.clone(),
            },
            SampleConsumer {
                consumer: self.consumer,
                dropped: self.dropped,
            },
        )
    }
}

/// Producer half, owned by the cpal callback.
pub struct SampleProducer {
    producer: Producer<f32>,
    dropped: Arc<AtomicU64>,
}

impl SampleProducer {
    /// Push samples without blocking; samples that do not fit are dropped.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        let free = self.producer.slots();
        let writable = samples.len().min(free);
        if writable < samples.len() {
            self.dropped
                .fetch_add((samples.len() - writable) as u64, Ordering::Relaxed);
        }
        if writable == 0 {
            return 0;
        }

        let mut chunk = match self.producer.write_chunk_uninit(writable) {
            Ok(chunk) => chunk,
            Err(_) => return 0,
        };
        chunk.fill_from_iter(samples[..writable].iter().copied())
    }
}

/// Consumer half, owned by the analysis loop.
pub struct SampleConsumer {
    consumer: Consumer<f32>,
    dropped: Arc<AtomicU64>,
}

impl SampleConsumer {
    /// Drain everything currently buffered into `out`, returning the count read.
    pub fn drain_into(&mut self, out: &mut Vec<f32>) -> usize {
        let available = self.consumer.slots();
        if available == 0 {
            return 0;
        }
        let chunk = match self.consumer.read_chunk(available) {
            Ok(chunk) => chunk,
            Err(_) => return 0,
        };
        let (first, second) = chunk.as_slices();
        out.extend_from_slice(first);
        out.extend_from_slice(second);
        chunk.commit_all();
        available
    }

    /// Total samples dropped on the producer side since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_drain_round_trip() {
        let (mut tx, mut rx) = SampleRing::new(8).split();
        assert_eq!(tx.push(&[0.1, 0.2, 0.3]), 3);

        let mut out = Vec::new();
        assert_eq!(rx.drain_into(&mut out), 3);
        assert_eq!(out, vec![0.1, 0.2, 0.3]);
        assert_eq!(rx.dropped(), 0);
    }

    #[test]
    fn overrun_drops_and_counts() {
        let (mut tx, mut rx) = SampleRing::new(4).split();
        let written = tx.push(&[0.0; 10]);
        assert_eq!(written, 4);
        assert_eq!(rx.dropped(), 6);

        let mut out = Vec::new();
        rx.drain_into(&mut out);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn drain_on_empty_ring_reads_nothing() {
        let (_tx, mut rx) = SampleRing::new(4).split();
        let mut out = Vec::new();
        assert_eq!(rx.drain_into(&mut out), 0);
        assert!(out.is_empty());
    }
}
