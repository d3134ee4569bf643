//! Acquisition lifecycle: Closed -> OpenIdle -> OpenStreaming
//!
//! Owns the tuner handle and the capture session. The forced settings
//! re-apply that follows a start is issued by the owner
//! ([`super::FcdProInput::start`]), which holds the settings.

use serde::Serialize;
use std::fmt;

use crate::capture::{create_shared_fifo, CaptureSession, FifoStats, SharedSampleFifo};
use crate::error::{DeviceError, Error};
use crate::hardware::{CaptureSource, DeviceHandle, TunerControl};

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionState {
    Closed,
    OpenIdle,
    OpenStreaming,
}

impl AcquisitionState {
    /// Engine state as reported to peers
    pub fn as_engine_state(&self) -> &'static str {
        match self {
            AcquisitionState::Closed => "notopen",
            AcquisitionState::OpenIdle => "idle",
            AcquisitionState::OpenStreaming => "running",
        }
    }
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_engine_state())
    }
}

/// Borrowed access to an opened tuner
pub struct OpenTuner<'a> {
    tuner: &'a mut dyn TunerControl,
    handle: DeviceHandle,
}

impl OpenTuner<'_> {
    pub fn set_param(&mut self, command: u8, value: u8) -> Result<(), DeviceError> {
        self.tuner.set_param(self.handle, command, value)
    }

    pub fn set_frequency(&mut self, freq_hz: u64) -> Result<(), DeviceError> {
        self.tuner.set_frequency(self.handle, freq_hz)
    }
}

/// Capture path sizing and endpoint lookup
#[derive(Debug, Clone)]
pub struct CaptureParams {
    pub endpoint_name: String,
    pub chunk_size: usize,
    pub fifo_chunks: usize,
}

pub struct Acquisition {
    tuner: Box<dyn TunerControl>,
    capture: Box<dyn CaptureSource>,
    device_index: u32,
    params: CaptureParams,
    handle: Option<DeviceHandle>,
    session: Option<CaptureSession>,
}

impl Acquisition {
    pub fn new(
        tuner: Box<dyn TunerControl>,
        capture: Box<dyn CaptureSource>,
        device_index: u32,
        params: CaptureParams,
    ) -> Self {
        Self {
            tuner,
            capture,
            device_index,
            params,
            handle: None,
            session: None,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        match (&self.handle, &self.session) {
            (None, _) => AcquisitionState::Closed,
            (Some(_), None) => AcquisitionState::OpenIdle,
            (Some(_), Some(_)) => AcquisitionState::OpenStreaming,
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_streaming(&self) -> bool {
        self.session.is_some()
    }

    pub fn device_index(&self) -> u32 {
        self.device_index
    }

    /// Tuner access, `None` while Closed
    pub fn open_tuner(&mut self) -> Option<OpenTuner<'_>> {
        let handle = self.handle?;
        Some(OpenTuner {
            tuner: self.tuner.as_mut(),
            handle,
        })
    }

    /// Open the configured dongle, closing any previous handle first
    pub fn open_device(&mut self) -> Result<(), DeviceError> {
        if self.handle.is_some() {
            self.close_device();
        }

        tracing::debug!("Opening FCD Pro #{}", self.device_index);
        match self.tuner.open(self.device_index) {
            Some(handle) => {
                self.handle = Some(handle);
                tracing::info!("FCD Pro #{} opened", self.device_index);
                Ok(())
            }
            None => {
                tracing::warn!("Could not open FCD Pro #{}", self.device_index);
                Err(DeviceError::NotFound(self.device_index))
            }
        }
    }

    /// Release the tuner handle; stops streaming first
    pub fn close_device(&mut self) {
        self.stop();

        if let Some(handle) = self.handle.take() {
            self.tuner.close(handle);
            tracing::info!("FCD Pro #{} closed", self.device_index);
        }
    }

    /// Bind the capture endpoint and spawn the capture thread
    ///
    /// Restarts cleanly when already streaming. On failure nothing is
    /// retained: the FIFO and any bound endpoint are dropped.
    pub fn start_session(&mut self) -> Result<SharedSampleFifo, Error> {
        if self.handle.is_none() {
            return Err(DeviceError::NotOpen.into());
        }

        if self.session.is_some() {
            tracing::debug!("Restarting running capture session");
            self.stop();
        }

        let fifo = create_shared_fifo(self.params.fifo_chunks, self.params.chunk_size);
        let stream = self.capture.open_capture(&self.params.endpoint_name)?;
        tracing::debug!("Capture endpoint '{}' bound", self.params.endpoint_name);

        let session = CaptureSession::start(stream, fifo.clone())?;
        self.session = Some(session);
        tracing::info!("Acquisition streaming");

        Ok(fifo)
    }

    /// Tear down a session whose capture thread exited on its own
    ///
    /// Returns `true` when a dead session was released; the state is then
    /// back to OpenIdle.
    pub fn reap_finished(&mut self) -> bool {
        let finished = self.session.as_ref().map_or(false, |s| !s.is_running());
        if finished {
            tracing::warn!("Capture thread exited, acquisition back to idle");
            self.stop();
        }
        finished
    }

    /// Stop streaming; no-op unless streaming
    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
            tracing::info!("Acquisition stopped");
        }
    }

    pub fn fifo_stats(&self) -> Option<FifoStats> {
        self.session.as_ref().map(|s| s.fifo().stats())
    }
}

impl Drop for Acquisition {
    fn drop(&mut self) {
        self.stop();
        self.close_device();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureError;
    use crate::hardware::sim::{SimulatedTuner, ToneSource, TunerCall};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn params() -> CaptureParams {
        CaptureParams {
            endpoint_name: "FUNcube Dongle V1.0".into(),
            chunk_size: 128,
            fifo_chunks: 4,
        }
    }

    #[test]
    fn test_state_transitions() {
        let tone = ToneSource::new(1_000.0, 128);
        let tone_probe = tone.probe();
        let mut acq = Acquisition::new(Box::new(SimulatedTuner::new()), Box::new(tone), 0, params());

        assert_eq!(acq.state(), AcquisitionState::Closed);
        assert!(acq.open_tuner().is_none());

        acq.open_device().unwrap();
        assert_eq!(acq.state(), AcquisitionState::OpenIdle);

        let fifo = acq.start_session().unwrap();
        assert_eq!(acq.state(), AcquisitionState::OpenStreaming);
        assert_eq!(fifo.capacity(), 4);
        assert_eq!(tone_probe.active(), 1);

        acq.stop();
        assert_eq!(acq.state(), AcquisitionState::OpenIdle);
        assert_eq!(tone_probe.active(), 0);

        acq.close_device();
        assert_eq!(acq.state(), AcquisitionState::Closed);
    }

    #[test]
    fn test_start_requires_open() {
        let mut acq = Acquisition::new(
            Box::new(SimulatedTuner::absent()),
            Box::new(ToneSource::new(1_000.0, 128)),
            0,
            params(),
        );

        assert_eq!(acq.open_device(), Err(DeviceError::NotFound(0)));
        assert!(matches!(
            acq.start_session(),
            Err(Error::Device(DeviceError::NotOpen))
        ));
        assert_eq!(acq.state(), AcquisitionState::Closed);
    }

    #[test]
    fn test_restart_releases_previous_session() {
        let tone = ToneSource::new(1_000.0, 128);
        let tone_probe = tone.probe();
        let mut acq = Acquisition::new(Box::new(SimulatedTuner::new()), Box::new(tone), 0, params());
        acq.open_device().unwrap();

        let first = acq.start_session().unwrap();
        let second = acq.start_session().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        // Old session's thread and FIFO reference are gone
        assert_eq!(Arc::strong_count(&first), 1);
        assert_eq!(tone_probe.opened(), 2);
        assert_eq!(tone_probe.active(), 1);
    }

    #[test]
    fn test_bind_failure_retains_nothing() {
        let tone = ToneSource::new(1_000.0, 128);
        let tone_probe = tone.probe();
        tone_probe.set_fail_bind(true);
        let mut acq = Acquisition::new(Box::new(SimulatedTuner::new()), Box::new(tone), 0, params());
        acq.open_device().unwrap();

        let err = acq.start_session().unwrap_err();
        assert!(matches!(err, Error::Capture(CaptureError::Bind(_))));
        assert_eq!(acq.state(), AcquisitionState::OpenIdle);
        assert!(acq.fifo_stats().is_none());

        // Retry after the endpoint frees up
        tone_probe.set_fail_bind(false);
        assert!(acq.start_session().is_ok());
    }

    #[test]
    fn test_dead_capture_thread_is_reaped() {
        let tone = ToneSource::new(1_000.0, 128);
        let tone_probe = tone.probe();
        let mut acq = Acquisition::new(Box::new(SimulatedTuner::new()), Box::new(tone), 0, params());
        acq.open_device().unwrap();

        // Healthy session is left alone
        acq.start_session().unwrap();
        assert!(!acq.reap_finished());
        assert_eq!(acq.state(), AcquisitionState::OpenStreaming);

        tone_probe.set_fail_read(true);
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut reaped = false;
        while !reaped && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
            reaped = acq.reap_finished();
        }

        assert!(reaped);
        assert_eq!(acq.state(), AcquisitionState::OpenIdle);
        assert!(acq.fifo_stats().is_none());
        assert_eq!(tone_probe.active(), 0);
        assert!(!acq.reap_finished());
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let tuner = SimulatedTuner::new();
        let probe = tuner.probe();
        let mut acq = Acquisition::new(
            Box::new(tuner),
            Box::new(ToneSource::new(1_000.0, 128)),
            0,
            params(),
        );

        acq.stop();
        assert_eq!(acq.state(), AcquisitionState::Closed);
        acq.open_device().unwrap();
        acq.stop();
        assert_eq!(acq.state(), AcquisitionState::OpenIdle);
        assert_eq!(probe.calls(), vec![TunerCall::Open(0)]);
    }

    #[test]
    fn test_drop_tears_down() {
        let tuner = SimulatedTuner::new();
        let probe = tuner.probe();
        let tone = ToneSource::new(1_000.0, 128);
        let tone_probe = tone.probe();

        {
            let mut acq = Acquisition::new(Box::new(tuner), Box::new(tone), 0, params());
            acq.open_device().unwrap();
            acq.start_session().unwrap();
        }

        assert!(!probe.is_open());
        assert_eq!(tone_probe.active(), 0);
    }
}
