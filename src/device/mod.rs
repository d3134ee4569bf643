//! Device control plane: reconciliation, lifecycle and the command queue

pub mod engine;
pub mod input;
pub mod lifecycle;
pub mod reconcile;

pub use engine::{
    unique_record_file_name, DeviceEngine, DrainEngine, RecordSink, SignalNotification,
    TracingRecorder,
};
pub use input::{Command, DeviceEvent, FcdProInput, FcdProInputBuilder, InputHandle};
pub use lifecycle::{Acquisition, AcquisitionState, CaptureParams, OpenTuner};
pub use reconcile::{Applied, Reconciler};
