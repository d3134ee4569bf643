//! The device input: command queue consumer and facade
//!
//! [`FcdProInput`] is the single owner of the settings, the lifecycle and
//! the downstream collaborators. Everything else talks to it through a
//! cloneable [`InputHandle`] that enqueues [`Command`]s; the queue is
//! drained one command at a time, in order.
//!
//! ```text
//! InputHandle ──Command──> [queue] ──> FcdProInput ──> Reconciler ──> tuner
//!      │                                   │      └──> Acquisition ──> capture thread ──> FIFO
//!      └── snapshot / events <─────────────┘      └──> RemoteMirror (spawned)
//! ```

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::capture::{FifoStats, SharedSampleFifo};
use crate::config::AppConfig;
use crate::constants::{DEVICE_DESCRIPTION, FCDPRO_SAMPLE_RATE};
use crate::error::{DeviceError, Error, Result};
use crate::hardware::{CaptureSource, TunerControl};
use crate::network::RemoteMirror;
use crate::settings::{ChangeSet, FcdProSettings, SettingsKey};

use super::engine::{DeviceEngine, DrainEngine, RecordSink, TracingRecorder};
use super::lifecycle::{Acquisition, AcquisitionState, CaptureParams};
use super::reconcile::Reconciler;

/// Observers lagging further than this miss events
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// How often an idle consumer checks the capture thread
const CAPTURE_WATCH_INTERVAL: Duration = Duration::from_millis(100);

/// Messages accepted by the command queue
#[derive(Debug, Clone)]
pub enum Command {
    /// Reconcile the given settings; `force` pushes every field
    Configure { settings: FcdProSettings, force: bool },
    /// Start or stop acquisition
    StartStop { run: bool },
    /// Start or stop recording
    FileRecord { run: bool },
    /// Leave the consumer loop
    Shutdown,
}

/// Notifications for observers (GUI, API clients)
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    SettingsApplied { changes: Vec<SettingsKey>, force: bool },
    StateChanged(AcquisitionState),
    RecordingChanged(bool),
}

/// State readable without going through the queue
#[derive(Debug)]
struct SharedState {
    settings: RwLock<FcdProSettings>,
    state: RwLock<AcquisitionState>,
}

/// Cloneable front of a [`FcdProInput`]
#[derive(Debug, Clone)]
pub struct InputHandle {
    tx: Sender<Command>,
    shared: Arc<SharedState>,
    events: broadcast::Sender<DeviceEvent>,
}

impl InputHandle {
    pub fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| Error::QueueClosed)
    }

    pub fn configure(&self, settings: FcdProSettings, force: bool) -> Result<()> {
        self.send(Command::Configure { settings, force })
    }

    pub fn start_stop(&self, run: bool) -> Result<()> {
        self.send(Command::StartStop { run })
    }

    pub fn file_record(&self, run: bool) -> Result<()> {
        self.send(Command::FileRecord { run })
    }

    /// Push the whole current snapshot to the hardware
    pub fn init(&self) -> Result<()> {
        self.configure(self.settings(), true)
    }

    /// Retune, keeping every other setting of the current snapshot
    pub fn set_center_frequency(&self, hz: i64) -> Result<()> {
        let mut settings = self.settings();
        settings.center_frequency = hz;
        self.configure(settings, false)
    }

    /// Snapshot as of the last completed apply
    pub fn settings(&self) -> FcdProSettings {
        self.shared.settings.read().clone()
    }

    pub fn center_frequency(&self) -> i64 {
        self.shared.settings.read().center_frequency
    }

    pub fn sample_rate(&self) -> u32 {
        FCDPRO_SAMPLE_RATE
    }

    pub fn device_description(&self) -> &'static str {
        DEVICE_DESCRIPTION
    }

    pub fn state(&self) -> AcquisitionState {
        *self.shared.state.read()
    }

    /// "notopen", "idle" or "running"
    pub fn engine_state(&self) -> &'static str {
        self.state().as_engine_state()
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.shared.settings.read().serialize()
    }

    /// Restore from a blob
    ///
    /// A blob that does not decode resets to defaults: the forced configure
    /// is enqueued either way and the decode error is returned.
    pub fn deserialize(&self, data: &[u8]) -> Result<()> {
        match FcdProSettings::deserialize(data) {
            Ok(settings) => self.configure(settings, true),
            Err(e) => {
                tracing::warn!("Settings blob rejected ({}), reverting to defaults", e);
                self.configure(FcdProSettings::default(), true)?;
                Err(e.into())
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }
}

/// Builder for [`FcdProInput`]
///
/// Only the two hardware capabilities are mandatory; the engine defaults to
/// a [`DrainEngine`] and the recorder to a [`TracingRecorder`].
pub struct FcdProInputBuilder {
    tuner: Box<dyn TunerControl>,
    capture: Box<dyn CaptureSource>,
    device_index: u32,
    device_uid: u32,
    params: CaptureParams,
    settings: Option<FcdProSettings>,
    engine: Option<Box<dyn DeviceEngine>>,
    recorder: Option<Box<dyn RecordSink>>,
    mirror: Option<RemoteMirror>,
}

impl FcdProInputBuilder {
    pub fn new(tuner: impl TunerControl + 'static, capture: impl CaptureSource + 'static) -> Self {
        let defaults = AppConfig::default();
        Self {
            tuner: Box::new(tuner),
            capture: Box::new(capture),
            device_index: defaults.device.index,
            device_uid: defaults.device.uid,
            params: CaptureParams {
                endpoint_name: defaults.capture.driver_name,
                chunk_size: defaults.capture.chunk_size,
                fifo_chunks: defaults.capture.fifo_chunks,
            },
            settings: None,
            engine: None,
            recorder: None,
            mirror: None,
        }
    }

    /// Take device and capture sizing from the configuration
    pub fn config(mut self, config: &AppConfig) -> Self {
        self.device_index = config.device.index;
        self.device_uid = config.device.uid;
        self.params = CaptureParams {
            endpoint_name: config.capture.driver_name.clone(),
            chunk_size: config.capture.chunk_size,
            fifo_chunks: config.capture.fifo_chunks,
        };
        self
    }

    pub fn device_index(mut self, index: u32) -> Self {
        self.device_index = index;
        self
    }

    pub fn device_uid(mut self, uid: u32) -> Self {
        self.device_uid = uid;
        self
    }

    pub fn endpoint_name(mut self, name: &str) -> Self {
        self.params.endpoint_name = name.to_string();
        self
    }

    pub fn fifo(mut self, chunks: usize, chunk_size: usize) -> Self {
        self.params.fifo_chunks = chunks;
        self.params.chunk_size = chunk_size;
        self
    }

    /// Initial settings, force-applied on build
    pub fn settings(mut self, settings: FcdProSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn engine(mut self, engine: impl DeviceEngine + 'static) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    pub fn recorder(mut self, recorder: impl RecordSink + 'static) -> Self {
        self.recorder = Some(Box::new(recorder));
        self
    }

    pub fn mirror(mut self, mirror: RemoteMirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Open the device and wire the queue
    ///
    /// An absent device is not an error: the input starts Closed and
    /// retries the open on the next start.
    pub fn build(self) -> (FcdProInput, InputHandle) {
        let (tx, rx) = unbounded();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let mut acquisition =
            Acquisition::new(self.tuner, self.capture, self.device_index, self.params);
        if let Err(e) = acquisition.open_device() {
            tracing::warn!("Starting without device: {}", e);
        }

        let shared = Arc::new(SharedState {
            settings: RwLock::new(FcdProSettings::default()),
            state: RwLock::new(acquisition.state()),
        });

        let mut input = FcdProInput {
            rx,
            shared: shared.clone(),
            events: events.clone(),
            reconciler: Reconciler::default(),
            acquisition,
            engine: self.engine.unwrap_or_else(|| Box::new(DrainEngine::new())),
            recorder: self.recorder.unwrap_or_else(|| Box::new(TracingRecorder::new())),
            mirror: self.mirror,
            device_uid: self.device_uid,
        };

        if let Some(settings) = self.settings {
            input.apply_settings(settings, true);
        }

        let handle = InputHandle { tx, shared, events };
        (input, handle)
    }
}

/// Control plane of one FCD Pro
pub struct FcdProInput {
    rx: Receiver<Command>,
    shared: Arc<SharedState>,
    events: broadcast::Sender<DeviceEvent>,
    reconciler: Reconciler,
    acquisition: Acquisition,
    engine: Box<dyn DeviceEngine>,
    recorder: Box<dyn RecordSink>,
    mirror: Option<RemoteMirror>,
    device_uid: u32,
}

impl FcdProInput {
    pub fn builder(
        tuner: impl TunerControl + 'static,
        capture: impl CaptureSource + 'static,
    ) -> FcdProInputBuilder {
        FcdProInputBuilder::new(tuner, capture)
    }

    pub fn settings(&self) -> &FcdProSettings {
        self.reconciler.settings()
    }

    pub fn state(&self) -> AcquisitionState {
        self.acquisition.state()
    }

    pub fn fifo_stats(&self) -> Option<FifoStats> {
        self.acquisition.fifo_stats()
    }

    /// Drain every queued command on the calling thread
    ///
    /// Stops early at [`Command::Shutdown`]. Returns the number of commands
    /// handled. A capture thread found dead afterwards is reaped.
    pub fn handle_input_messages(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.rx.try_recv() {
                Ok(command) => {
                    handled += 1;
                    if !self.handle_message(command) {
                        return handled;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        self.reap_capture();
        handled
    }

    /// Drop back to OpenIdle if the capture thread died underneath us
    fn reap_capture(&mut self) {
        if self.acquisition.reap_finished() {
            self.engine.stop_acquisition();
            self.publish_state();
        }
    }

    /// Execute one command; `false` once the consumer should exit
    pub fn handle_message(&mut self, command: Command) -> bool {
        match command {
            Command::Configure { settings, force } => {
                tracing::debug!("Configure (force={})", force);
                self.apply_settings(settings, force);
            }
            Command::StartStop { run } => {
                tracing::debug!("StartStop run={}", run);
                if run {
                    self.start_acquisition();
                } else {
                    self.stop_acquisition();
                }

                let target = &self.reconciler.settings().remote_mirror;
                if target.enabled {
                    if let Some(mirror) = &self.mirror {
                        mirror.send_start_stop(target, run);
                    }
                }
            }
            Command::FileRecord { run } => {
                tracing::debug!("FileRecord run={}", run);
                self.file_record(run);
            }
            Command::Shutdown => {
                tracing::debug!("Shutdown requested");
                return false;
            }
        }
        true
    }

    /// Reconcile, notify downstream, publish the snapshot and mirror
    pub fn apply_settings(&mut self, settings: FcdProSettings, force: bool) -> ChangeSet {
        let applied = self
            .reconciler
            .apply(settings, force, self.acquisition.open_tuner());

        if let Some((dc_block, iq_correction)) = applied.corrections {
            self.engine.configure_corrections(dc_block, iq_correction);
        }

        let current = self.reconciler.settings();
        *self.shared.settings.write() = current.clone();

        if let Some(notification) = &applied.notification {
            self.engine.signal_changed(notification);
            self.recorder.signal_changed(notification);
        }

        let full = applied.full_update(force);
        if current.remote_mirror.enabled && (full || !applied.changes.is_empty()) {
            if let Some(mirror) = &self.mirror {
                mirror.send_settings(&current.remote_mirror, current, &applied.changes, full);
            }
        }

        if !applied.changes.is_empty() {
            tracing::debug!("Applied: {}", applied.changes.names().join(", "));
        }
        let _ = self.events.send(DeviceEvent::SettingsApplied {
            changes: applied.changes.iter().collect(),
            force,
        });

        applied.changes
    }

    /// Bring the capture path up and re-apply every setting
    ///
    /// A device that was absent is opened again first.
    pub fn start(&mut self) -> Result<SharedSampleFifo> {
        if !self.acquisition.is_open() {
            self.acquisition.open_device()?;
        }

        let fifo = self.acquisition.start_session();
        self.publish_state();
        let fifo = fifo?;

        let snapshot = self.reconciler.settings().clone();
        self.apply_settings(snapshot, true);

        Ok(fifo)
    }

    /// Stop streaming; no-op unless streaming
    pub fn stop(&mut self) {
        self.acquisition.stop();
        self.publish_state();
    }

    fn start_acquisition(&mut self) {
        if !self.engine.init_acquisition() {
            tracing::warn!("{}", DeviceError::AcquisitionRefused);
            return;
        }

        match self.start() {
            Ok(fifo) => {
                if !self.engine.start_acquisition(fifo) {
                    tracing::warn!("Engine failed to start, stopping capture");
                    self.stop();
                }
            }
            Err(e) => tracing::warn!("Could not start acquisition: {}", e),
        }
    }

    fn stop_acquisition(&mut self) {
        self.engine.stop_acquisition();
        self.stop();
    }

    fn file_record(&mut self, run: bool) {
        if run {
            let name = &self.reconciler.settings().file_record_name;
            if name.is_empty() {
                self.recorder.gen_unique_file_name(self.device_uid);
            } else {
                self.recorder.set_file_name(name);
            }
            self.recorder.start_recording();
        } else {
            self.recorder.stop_recording();
        }
        let _ = self.events.send(DeviceEvent::RecordingChanged(run));
    }

    fn publish_state(&self) {
        let state = self.acquisition.state();
        let previous = std::mem::replace(&mut *self.shared.state.write(), state);
        if previous != state {
            tracing::info!("Acquisition state: {} -> {}", previous, state);
            let _ = self.events.send(DeviceEvent::StateChanged(state));
        }
    }

    /// Block on the queue until shutdown or until every handle is gone
    ///
    /// Between commands the capture thread is watched, so a session that
    /// ends on a read error is published as OpenIdle.
    pub fn run(mut self) {
        loop {
            match self.rx.recv_timeout(CAPTURE_WATCH_INTERVAL) {
                Ok(command) => {
                    if !self.handle_message(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.reap_capture();
        }
        tracing::debug!("Command loop exited");
    }

    /// Run the consumer on its own thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("fcdpro-control".to_string())
            .spawn(move || self.run())
    }
}

impl Drop for FcdProInput {
    fn drop(&mut self) {
        if self.acquisition.is_streaming() {
            self.engine.stop_acquisition();
        }
        self.acquisition.close_device();
        self.publish_state();
    }
}
