//! Capture path: sample FIFO and capture session

pub mod fifo;
pub mod session;

pub use fifo::{create_shared_fifo, FifoStats, SampleChunk, SampleFifo, SharedSampleFifo};
pub use session::CaptureSession;
