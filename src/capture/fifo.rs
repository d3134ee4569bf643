//! Bounded sample FIFO between the capture thread and the DSP engine
//!
//! Single producer, single consumer, lock-free. The producer never blocks:
//! when the FIFO is full the oldest chunk is discarded and counted.

use crossbeam::queue::ArrayQueue;
use num_complex::Complex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// One block of complex samples as read from the capture endpoint
#[derive(Clone, Debug)]
pub struct SampleChunk {
    pub samples: Vec<Complex<i16>>,
    /// Capture time in microseconds since session start
    pub timestamp: u64,
    /// Chunk sequence number within the session
    pub sequence: u64,
}

impl SampleChunk {
    pub fn new(samples: Vec<Complex<i16>>, timestamp: u64, sequence: u64) -> Self {
        Self {
            samples,
            timestamp,
            sequence,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Chunk duration in microseconds, 0 for a zero sample rate
    pub fn duration_us(&self, sample_rate: u32) -> u64 {
        (self.samples.len() as u64 * 1_000_000)
            .checked_div(sample_rate as u64)
            .unwrap_or(0)
    }
}

/// Bounded drop-oldest FIFO of sample chunks
#[derive(Debug)]
pub struct SampleFifo {
    queue: ArrayQueue<SampleChunk>,
    chunk_size: usize,
    dropped_chunks: AtomicUsize,
    underrun_count: AtomicUsize,
    samples_written: AtomicU64,
}

impl SampleFifo {
    /// `capacity` chunks of `chunk_size` samples each
    pub fn new(capacity: usize, chunk_size: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            chunk_size,
            dropped_chunks: AtomicUsize::new(0),
            underrun_count: AtomicUsize::new(0),
            samples_written: AtomicU64::new(0),
        }
    }

    /// Push a chunk, evicting the oldest one if full
    ///
    /// Returns `false` when a chunk had to be dropped.
    pub fn push(&self, chunk: SampleChunk) -> bool {
        self.samples_written
            .fetch_add(chunk.len() as u64, Ordering::Relaxed);

        match self.queue.force_push(chunk) {
            None => true,
            Some(_oldest) => {
                self.dropped_chunks.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Pop the oldest chunk, counting an underrun when empty
    pub fn pop(&self) -> Option<SampleChunk> {
        match self.queue.pop() {
            Some(chunk) => Some(chunk),
            None => {
                self.underrun_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Pop without counting an underrun
    pub fn try_pop(&self) -> Option<SampleChunk> {
        self.queue.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Chunks currently queued
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Capacity in chunks
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Nominal samples per chunk
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn dropped_chunks(&self) -> usize {
        self.dropped_chunks.load(Ordering::Relaxed)
    }

    pub fn underrun_count(&self) -> usize {
        self.underrun_count.load(Ordering::Relaxed)
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written.load(Ordering::Relaxed)
    }

    pub fn reset_stats(&self) {
        self.dropped_chunks.store(0, Ordering::Relaxed);
        self.underrun_count.store(0, Ordering::Relaxed);
    }

    /// Fill level in [0, 1]
    pub fn fill_level(&self) -> f32 {
        self.len() as f32 / self.capacity() as f32
    }

    pub fn stats(&self) -> FifoStats {
        FifoStats {
            level: self.len(),
            capacity: self.capacity(),
            dropped_chunks: self.dropped_chunks(),
            underruns: self.underrun_count(),
            samples_written: self.samples_written(),
        }
    }
}

/// FIFO handle shared by the capture thread and the DSP engine
pub type SharedSampleFifo = Arc<SampleFifo>;

pub fn create_shared_fifo(capacity: usize, chunk_size: usize) -> SharedSampleFifo {
    Arc::new(SampleFifo::new(capacity, chunk_size))
}

/// Snapshot of FIFO counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FifoStats {
    pub level: usize,
    pub capacity: usize,
    pub dropped_chunks: usize,
    pub underruns: usize,
    pub samples_written: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(sequence: u64) -> SampleChunk {
        SampleChunk::new(vec![Complex::new(1, -1); 16], sequence * 10, sequence)
    }

    #[test]
    fn test_fifo_order() {
        let fifo = SampleFifo::new(4, 16);

        assert!(fifo.push(chunk(0)));
        assert!(fifo.push(chunk(1)));
        assert_eq!(fifo.len(), 2);

        assert_eq!(fifo.pop().unwrap().sequence, 0);
        assert_eq!(fifo.pop().unwrap().sequence, 1);
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let fifo = SampleFifo::new(3, 16);
        for seq in 0..5 {
            fifo.push(chunk(seq));
        }

        assert!(fifo.is_full());
        assert_eq!(fifo.dropped_chunks(), 2);
        assert_eq!(fifo.samples_written(), 5 * 16);

        let remaining: Vec<u64> = std::iter::from_fn(|| fifo.try_pop())
            .map(|c| c.sequence)
            .collect();
        assert_eq!(remaining, vec![2, 3, 4]);
    }

    #[test]
    fn test_underrun_counted() {
        let fifo = SampleFifo::new(2, 16);
        assert!(fifo.pop().is_none());
        assert!(fifo.try_pop().is_none());
        assert_eq!(fifo.underrun_count(), 1);

        fifo.reset_stats();
        assert_eq!(fifo.stats().underruns, 0);
    }

    #[test]
    fn test_chunk_duration() {
        let c = SampleChunk::new(vec![Complex::new(0, 0); 96], 0, 0);
        assert_eq!(c.duration_us(96_000), 1_000);
        assert_eq!(c.duration_us(0), 0);
    }

    #[test]
    fn test_shared_fifo_debug() {
        let fifo = create_shared_fifo(2, 16);
        fifo.push(chunk(0));
        let shown = format!("{:?}", fifo);
        assert!(shown.contains("SampleFifo"));
        assert!(shown.contains("chunk_size: 16"));
    }
}
