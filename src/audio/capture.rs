//! Capture endpoint backed by the dongle's audio-class interface
//!
//! The cpal stream is built and kept alive on its own thread (streams are
//! not `Send` on every host); interleaved stereo `i16` buffers are
//! forwarded over a bounded channel and turned into I/Q samples on read.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use num_complex::Complex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::device::find_input_device;
use crate::constants::FCDPRO_SAMPLE_RATE;
use crate::error::CaptureError;
use crate::hardware::{CaptureSource, CaptureStream};

/// Buffers in flight between the audio callback and the reader
const CALLBACK_QUEUE_DEPTH: usize = 64;

/// How long `read` waits for a buffer before reporting nothing
const READ_POLL: Duration = Duration::from_millis(50);

/// How long `open_capture` waits for the stream to come up
const OPEN_TIMEOUT: Duration = Duration::from_secs(2);

/// [`CaptureSource`] over cpal input devices
#[derive(Debug, Clone)]
pub struct CpalCaptureSource {
    sample_rate: u32,
}

impl CpalCaptureSource {
    pub fn new() -> Self {
        Self {
            sample_rate: FCDPRO_SAMPLE_RATE,
        }
    }
}

impl Default for CpalCaptureSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for CpalCaptureSource {
    fn open_capture(&mut self, name: &str) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let device = find_input_device(name)?;
        let config = StreamConfig {
            channels: 2,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (data_tx, data_rx) = bounded::<Vec<i16>>(CALLBACK_QUEUE_DEPTH);
        let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);
        let running = Arc::new(AtomicBool::new(true));
        let running_for_loop = running.clone();
        let callback_drops = Arc::new(AtomicU64::new(0));
        let drops_for_callback = callback_drops.clone();

        let handle = thread::Builder::new()
            .name("fcdpro-audio".to_string())
            .spawn(move || {
                let stream = device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        forward_buffer(&data_tx, data, &drops_for_callback);
                    },
                    move |err| {
                        tracing::error!("Audio capture stream error: {}", err);
                    },
                    None,
                );

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while running_for_loop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
                // Stream dropped here, stopping capture
            })
            .map_err(|e| CaptureError::Thread(e.to_string()))?;

        let bound = match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(CaptureError::Bind(reason)),
            Err(_) => Err(CaptureError::Bind(format!("{} did not start", name))),
        };

        if let Err(e) = bound {
            running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            return Err(e);
        }

        tracing::info!("Audio capture endpoint '{}' bound at {} S/s", name, self.sample_rate);

        Ok(Box::new(CpalCaptureStream {
            data_rx,
            pending: Vec::new(),
            running,
            thread_handle: Some(handle),
            callback_drops,
            sample_rate: self.sample_rate,
        }))
    }
}

/// Hand one callback buffer to the reader without blocking
///
/// When the reader lags and the queue is full the buffer is dropped and
/// counted in `drops`. Returns `false` if the buffer did not go through.
fn forward_buffer(tx: &Sender<Vec<i16>>, data: &[i16], drops: &AtomicU64) -> bool {
    match tx.try_send(data.to_vec()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            let total = drops.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::trace!("Capture reader lagging, dropped callback buffer ({} total)", total);
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// Bound cpal endpoint
pub struct CpalCaptureStream {
    data_rx: Receiver<Vec<i16>>,
    /// Converted samples not yet handed out
    pending: Vec<Complex<i16>>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    /// Callback buffers dropped because the reader lagged
    callback_drops: Arc<AtomicU64>,
    sample_rate: u32,
}

impl CpalCaptureStream {
    pub fn callback_drops(&self) -> u64 {
        self.callback_drops.load(Ordering::Relaxed)
    }
}

/// Interleaved I/Q pairs to complex samples; a trailing odd value is dropped
pub fn interleaved_to_complex(data: &[i16]) -> Vec<Complex<i16>> {
    data.chunks_exact(2)
        .map(|pair| Complex::new(pair[0], pair[1]))
        .collect()
}

impl CaptureStream for CpalCaptureStream {
    fn read(&mut self, buf: &mut [Complex<i16>]) -> Result<usize, CaptureError> {
        if self.pending.is_empty() {
            match self.data_rx.recv_timeout(READ_POLL) {
                Ok(data) => self.pending = interleaved_to_complex(&data),
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => return Err(CaptureError::Closed),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            tracing::info!(
                "Audio capture endpoint unbound ({} callback buffers dropped)",
                self.callback_drops()
            );
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for CpalCaptureStream {
    fn drop(&mut self) {
        self.close();
    }
}
