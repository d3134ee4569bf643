//! One streaming session: a capture thread reading a bound endpoint into
//! the FIFO.
//!
//! The session owns the thread, the endpoint and its FIFO reference.
//! Dropping it signals the thread, joins it and unbinds the endpoint, so no
//! exit path can leak any of the three.

use num_complex::Complex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use super::fifo::{SampleChunk, SharedSampleFifo};
use crate::error::CaptureError;
use crate::hardware::CaptureStream;

/// Running capture thread plus the resources it uses
pub struct CaptureSession {
    running: Arc<AtomicBool>,
    fifo: SharedSampleFifo,
    thread_handle: Option<JoinHandle<Box<dyn CaptureStream>>>,
    chunks_captured: Arc<AtomicU64>,
    sample_rate: u32,
}

impl CaptureSession {
    /// Spawn the capture thread over an already bound endpoint
    ///
    /// On spawn failure the endpoint is dropped, which unbinds it.
    pub fn start(
        stream: Box<dyn CaptureStream>,
        fifo: SharedSampleFifo,
    ) -> Result<Self, CaptureError> {
        let running = Arc::new(AtomicBool::new(true));
        let chunks_captured = Arc::new(AtomicU64::new(0));
        let sample_rate = stream.sample_rate();

        let thread_running = running.clone();
        let thread_fifo = fifo.clone();
        let thread_chunks = chunks_captured.clone();
        let chunk_size = fifo.chunk_size();

        let handle = thread::Builder::new()
            .name("fcdpro-capture".to_string())
            .spawn(move || {
                capture_loop(stream, thread_fifo, thread_running, thread_chunks, chunk_size)
            })
            .map_err(|e| CaptureError::Thread(e.to_string()))?;

        tracing::debug!("Capture thread started ({} samples/chunk)", chunk_size);

        Ok(Self {
            running,
            fifo,
            thread_handle: Some(handle),
            chunks_captured,
            sample_rate,
        })
    }

    /// Signal the thread, join it and unbind the endpoint
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            match handle.join() {
                Ok(mut stream) => stream.close(),
                Err(_) => tracing::error!("Capture thread panicked"),
            }
            tracing::debug!(
                "Capture thread stopped after {} chunks ({} dropped)",
                self.chunks_captured.load(Ordering::Relaxed),
                self.fifo.dropped_chunks()
            );
        }
    }

    /// Thread still producing
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self.thread_handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    pub fn fifo(&self) -> &SharedSampleFifo {
        &self.fifo
    }

    pub fn chunks_captured(&self) -> u64 {
        self.chunks_captured.load(Ordering::Relaxed)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop(
    mut stream: Box<dyn CaptureStream>,
    fifo: SharedSampleFifo,
    running: Arc<AtomicBool>,
    chunks_captured: Arc<AtomicU64>,
    chunk_size: usize,
) -> Box<dyn CaptureStream> {
    let start_time = Instant::now();
    let mut buf = vec![Complex::new(0i16, 0i16); chunk_size];
    let mut sequence = 0u64;

    while running.load(Ordering::Relaxed) {
        match stream.read(&mut buf) {
            Ok(0) => continue,
            Ok(n) => {
                let timestamp = start_time.elapsed().as_micros() as u64;
                let chunk = SampleChunk::new(buf[..n].to_vec(), timestamp, sequence);
                sequence += 1;
                chunks_captured.fetch_add(1, Ordering::Relaxed);

                if !fifo.push(chunk) {
                    tracing::trace!("Sample FIFO full, dropped oldest chunk");
                }
            }
            Err(CaptureError::Closed) => {
                tracing::warn!("Capture endpoint closed underneath the session");
                break;
            }
            Err(e) => {
                tracing::error!("Capture read failed: {}", e);
                break;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    stream
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::fifo::create_shared_fifo;
    use crate::hardware::sim::ToneSource;
    use crate::hardware::CaptureSource;
    use std::time::Duration;

    #[test]
    fn test_session_fills_fifo_and_unbinds() {
        let mut source = ToneSource::new(5_000.0, 256);
        let probe = source.probe();
        let stream = source.open_capture("FUNcube").unwrap();
        let fifo = create_shared_fifo(4, 256);

        let mut session = CaptureSession::start(stream, fifo.clone()).unwrap();
        assert!(session.is_running());

        thread::sleep(Duration::from_millis(60));
        session.stop();

        assert!(!session.is_running());
        assert!(session.chunks_captured() > 0);
        assert!(!fifo.is_empty());
        assert_eq!(probe.active(), 0);
    }

    #[test]
    fn test_drop_joins_thread() {
        let mut source = ToneSource::new(5_000.0, 128);
        let probe = source.probe();
        let fifo = create_shared_fifo(2, 128);

        {
            let stream = source.open_capture("FUNcube").unwrap();
            let _session = CaptureSession::start(stream, fifo.clone()).unwrap();
            assert_eq!(probe.active(), 1);
        }

        assert_eq!(probe.active(), 0);
        // Only the test's reference is left
        assert_eq!(Arc::strong_count(&fifo), 1);
    }
}
