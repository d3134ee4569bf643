//! Simulated dongle
//!
//! [`SimulatedTuner`] accepts HID commands and records every call;
//! [`ToneSource`] binds a synthetic capture endpoint producing a complex
//! tone in real time. Both hand out a cloneable probe so a test (or the
//! binary's status output) can observe them after ownership moved into the
//! control plane.

use num_complex::Complex;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{CaptureSource, CaptureStream, DeviceHandle, TunerControl};
use crate::constants::{FCDPRO_AUDIO_DEVICE_NAME, FCDPRO_SAMPLE_RATE};
use crate::error::{CaptureError, DeviceError};

/// One recorded tuner call
#[derive(Debug, Clone, PartialEq)]
pub enum TunerCall {
    Open(u32),
    Close,
    SetParam { command: u8, value: u8 },
    SetFrequency(u64),
}

#[derive(Debug)]
struct TunerState {
    present: bool,
    open: Option<DeviceHandle>,
    next_handle: u64,
    rejected: HashSet<u8>,
    calls: Vec<TunerCall>,
}

/// Inspection and fault-injection handle of a [`SimulatedTuner`]
#[derive(Debug, Clone)]
pub struct TunerProbe {
    state: Arc<Mutex<TunerState>>,
}

impl TunerProbe {
    pub fn calls(&self) -> Vec<TunerCall> {
        self.state.lock().calls.clone()
    }

    /// Parameter writes issued with `command`
    pub fn param_writes(&self, command: u8) -> Vec<u8> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                TunerCall::SetParam { command: cmd, value } if *cmd == command => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn frequency_writes(&self) -> Vec<u64> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                TunerCall::SetFrequency(f) => Some(*f),
                _ => None,
            })
            .collect()
    }

    /// Number of parameter and frequency writes
    pub fn write_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, TunerCall::SetParam { .. } | TunerCall::SetFrequency(_)))
            .count()
    }

    pub fn clear(&self) {
        self.state.lock().calls.clear();
    }

    /// Plug or unplug the simulated dongle
    pub fn set_present(&self, present: bool) {
        self.state.lock().present = present;
    }

    /// Make every write with `command` fail
    pub fn reject(&self, command: u8) {
        self.state.lock().rejected.insert(command);
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open.is_some()
    }
}

/// In-memory stand-in for the HID side of the dongle
#[derive(Debug)]
pub struct SimulatedTuner {
    state: Arc<Mutex<TunerState>>,
}

impl SimulatedTuner {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TunerState {
                present: true,
                open: None,
                next_handle: 1,
                rejected: HashSet::new(),
                calls: Vec::new(),
            })),
        }
    }

    /// A tuner whose dongle is unplugged
    pub fn absent() -> Self {
        let tuner = Self::new();
        tuner.probe().set_present(false);
        tuner
    }

    pub fn probe(&self) -> TunerProbe {
        TunerProbe {
            state: self.state.clone(),
        }
    }

    fn check(state: &TunerState, handle: DeviceHandle) -> Result<(), DeviceError> {
        if state.open == Some(handle) {
            Ok(())
        } else {
            Err(DeviceError::NotOpen)
        }
    }
}

impl Default for SimulatedTuner {
    fn default() -> Self {
        Self::new()
    }
}

impl TunerControl for SimulatedTuner {
    fn open(&mut self, index: u32) -> Option<DeviceHandle> {
        let mut state = self.state.lock();
        state.calls.push(TunerCall::Open(index));

        if !state.present || index != 0 {
            return None;
        }

        let handle = DeviceHandle(state.next_handle);
        state.next_handle += 1;
        state.open = Some(handle);
        Some(handle)
    }

    fn close(&mut self, handle: DeviceHandle) {
        let mut state = self.state.lock();
        state.calls.push(TunerCall::Close);
        if state.open == Some(handle) {
            state.open = None;
        }
    }

    fn set_param(&mut self, handle: DeviceHandle, command: u8, value: u8) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        Self::check(&state, handle)?;
        state.calls.push(TunerCall::SetParam { command, value });

        if state.rejected.contains(&command) {
            return Err(DeviceError::Rejected { command, value });
        }
        Ok(())
    }

    fn set_frequency(&mut self, handle: DeviceHandle, freq_hz: u64) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        Self::check(&state, handle)?;
        state.calls.push(TunerCall::SetFrequency(freq_hz));

        if state.rejected.contains(&super::hid::SET_FREQUENCY_HZ) {
            return Err(DeviceError::FrequencyRejected(freq_hz));
        }
        Ok(())
    }
}

/// Counters shared between a [`ToneSource`] and its streams
#[derive(Debug, Default)]
struct ToneCounters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    fail_bind: AtomicBool,
    fail_read: AtomicBool,
}

/// Inspection handle of a [`ToneSource`]
#[derive(Debug, Clone)]
pub struct ToneProbe {
    counters: Arc<ToneCounters>,
}

impl ToneProbe {
    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Streams currently bound
    pub fn active(&self) -> usize {
        self.opened() - self.closed()
    }

    /// Make the next binds fail
    pub fn set_fail_bind(&self, fail: bool) {
        self.counters.fail_bind.store(fail, Ordering::SeqCst);
    }

    /// Make bound streams fail their next read, as an unplugged dongle does
    pub fn set_fail_read(&self, fail: bool) {
        self.counters.fail_read.store(fail, Ordering::SeqCst);
    }
}

/// Synthetic capture endpoint
#[derive(Debug)]
pub struct ToneSource {
    endpoint_name: String,
    offset_hz: f64,
    chunk_size: usize,
    counters: Arc<ToneCounters>,
}

impl ToneSource {
    pub fn new(offset_hz: f64, chunk_size: usize) -> Self {
        Self {
            endpoint_name: FCDPRO_AUDIO_DEVICE_NAME.to_string(),
            offset_hz,
            chunk_size,
            counters: Arc::new(ToneCounters::default()),
        }
    }

    pub fn probe(&self) -> ToneProbe {
        ToneProbe {
            counters: self.counters.clone(),
        }
    }
}

impl CaptureSource for ToneSource {
    fn open_capture(&mut self, name: &str) -> Result<Box<dyn CaptureStream>, CaptureError> {
        if !self.endpoint_name.contains(name) {
            return Err(CaptureError::EndpointNotFound(name.to_string()));
        }
        if self.counters.fail_bind.load(Ordering::SeqCst) {
            return Err(CaptureError::Bind(format!("{} is busy", name)));
        }

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ToneStream {
            phase: 0.0,
            step: TAU * self.offset_hz / FCDPRO_SAMPLE_RATE as f64,
            chunk_size: self.chunk_size,
            counters: self.counters.clone(),
            closed: false,
        }))
    }
}

struct ToneStream {
    phase: f64,
    step: f64,
    chunk_size: usize,
    counters: Arc<ToneCounters>,
    closed: bool,
}

impl CaptureStream for ToneStream {
    fn read(&mut self, buf: &mut [Complex<i16>]) -> Result<usize, CaptureError> {
        if self.closed {
            return Err(CaptureError::Closed);
        }
        if self.counters.fail_read.load(Ordering::SeqCst) {
            return Err(CaptureError::Stream("endpoint vanished".to_string()));
        }

        let n = buf.len().min(self.chunk_size);
        // Pace like a real endpoint would
        let period = Duration::from_secs_f64(n as f64 / FCDPRO_SAMPLE_RATE as f64);
        thread::sleep(period);

        for sample in &mut buf[..n] {
            *sample = Complex::new(
                (self.phase.cos() * 16_000.0) as i16,
                (self.phase.sin() * 16_000.0) as i16,
            );
            self.phase = (self.phase + self.step) % TAU;
        }
        Ok(n)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sample_rate(&self) -> u32 {
        FCDPRO_SAMPLE_RATE
    }
}

impl Drop for ToneStream {
    fn drop(&mut self) {
        self.close();
    }
}
