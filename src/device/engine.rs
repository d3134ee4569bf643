//! Collaborators downstream of the control plane: the DSP engine that
//! drains the sample FIFO and the recording sink.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::capture::SharedSampleFifo;

/// Sample rate / center frequency change, forwarded downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalNotification {
    pub sample_rate: u32,
    pub center_frequency: i64,
}

/// Acquisition orchestration and DSP side
pub trait DeviceEngine: Send {
    /// Prepare a session; `false` refuses the start
    fn init_acquisition(&mut self) -> bool;

    /// Begin draining `fifo`
    fn start_acquisition(&mut self, fifo: SharedSampleFifo) -> bool;

    /// Stop draining and release the FIFO
    fn stop_acquisition(&mut self);

    fn configure_corrections(&mut self, dc_block: bool, iq_correction: bool);

    fn signal_changed(&mut self, notification: &SignalNotification);
}

/// Delegated recording of the sample stream
pub trait RecordSink: Send {
    fn set_file_name(&mut self, name: &str);

    /// Pick a fresh name derived from the device UID
    fn gen_unique_file_name(&mut self, device_uid: u32);

    fn start_recording(&mut self);

    fn stop_recording(&mut self);

    fn signal_changed(&mut self, notification: &SignalNotification);
}

/// `rec_<uid>_<UTC timestamp>.sdriq`
pub fn unique_record_file_name(device_uid: u32, now: DateTime<Utc>) -> String {
    format!("rec_{}_{}.sdriq", device_uid, now.format("%Y-%m-%dT%H_%M_%S_%3f"))
}

/// Counters of a [`DrainEngine`]
#[derive(Debug, Default)]
pub struct DrainStats {
    pub chunks: AtomicU64,
    pub samples: AtomicU64,
    pub notifications: AtomicU64,
}

/// Minimal DSP consumer: drains the FIFO on its own thread and counts what
/// it sees
pub struct DrainEngine {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    stats: Arc<DrainStats>,
    corrections: (bool, bool),
    last_signal: Option<SignalNotification>,
}

impl DrainEngine {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            stats: Arc::new(DrainStats::default()),
            corrections: (false, false),
            last_signal: None,
        }
    }

    pub fn stats(&self) -> Arc<DrainStats> {
        self.stats.clone()
    }

    pub fn last_signal(&self) -> Option<SignalNotification> {
        self.last_signal
    }

    pub fn corrections(&self) -> (bool, bool) {
        self.corrections
    }
}

impl Default for DrainEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceEngine for DrainEngine {
    fn init_acquisition(&mut self) -> bool {
        true
    }

    fn start_acquisition(&mut self, fifo: SharedSampleFifo) -> bool {
        self.stop_acquisition();
        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let stats = self.stats.clone();
        let spawned = thread::Builder::new()
            .name("fcdpro-drain".to_string())
            .spawn(move || {
                while running.load(Ordering::Relaxed) {
                    match fifo.try_pop() {
                        Some(chunk) => {
                            stats.chunks.fetch_add(1, Ordering::Relaxed);
                            stats.samples.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                        }
                        None => thread::sleep(Duration::from_millis(2)),
                    }
                }
            });

        match spawned {
            Ok(handle) => {
                self.thread_handle = Some(handle);
                true
            }
            Err(e) => {
                tracing::error!("Failed to spawn drain thread: {}", e);
                self.running.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    fn stop_acquisition(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    fn configure_corrections(&mut self, dc_block: bool, iq_correction: bool) {
        tracing::debug!("Corrections: dc_block={} iq_correction={}", dc_block, iq_correction);
        self.corrections = (dc_block, iq_correction);
    }

    fn signal_changed(&mut self, notification: &SignalNotification) {
        self.stats.notifications.fetch_add(1, Ordering::Relaxed);
        self.last_signal = Some(*notification);
    }
}

impl Drop for DrainEngine {
    fn drop(&mut self) {
        self.stop_acquisition();
    }
}

/// Recording sink that only tracks and logs the requested recording state;
/// the sample file itself is written by whoever owns the real sink
#[derive(Debug, Default)]
pub struct TracingRecorder {
    file_name: Option<String>,
    recording: bool,
    last_signal: Option<SignalNotification>,
}

impl TracingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }
}

impl RecordSink for TracingRecorder {
    fn set_file_name(&mut self, name: &str) {
        self.file_name = Some(name.to_string());
    }

    fn gen_unique_file_name(&mut self, device_uid: u32) {
        self.file_name = Some(unique_record_file_name(device_uid, Utc::now()));
    }

    fn start_recording(&mut self) {
        self.recording = true;
        tracing::info!(
            "Recording to {} started",
            self.file_name.as_deref().unwrap_or("<unnamed>")
        );
    }

    fn stop_recording(&mut self) {
        if self.recording {
            tracing::info!("Recording stopped");
        }
        self.recording = false;
    }

    fn signal_changed(&mut self, notification: &SignalNotification) {
        self.last_signal = Some(*notification);
    }
}
