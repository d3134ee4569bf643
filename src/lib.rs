//! # FCD Pro Control
//!
//! Device control plane for FUNcube Dongle Pro receivers: settings
//! reconciliation, acquisition lifecycle, a serialized command queue and
//! best-effort state mirroring to a peer instance.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │  Callers (GUI, REST API, scripts)                                         │
//! │        │ InputHandle::configure / start_stop / file_record                │
//! │        ▼                                                                  │
//! │  ┌─────────────────────┐                                                  │
//! │  │   Command queue     │  crossbeam channel, one consumer                 │
//! │  └──────────┬──────────┘                                                  │
//! │             ▼                                                             │
//! │  ┌─────────────────────────────────────────────────────────────────────┐ │
//! │  │                 FcdProInput (device::input)                          │ │
//! │  │  ┌──────────────────┐   ┌──────────────────┐   ┌─────────────────┐  │ │
//! │  │  │   Reconciler     │   │   Acquisition    │   │  RemoteMirror   │  │ │
//! │  │  │ diff + push HID  │   │ Closed/Idle/Run  │   │ PATCH/POST/DEL  │  │ │
//! │  │  └────────┬─────────┘   └────────┬─────────┘   └────────┬────────┘  │ │
//! │  └───────────┼──────────────────────┼──────────────────────┼───────────┘ │
//! │              ▼                      ▼                      ▼             │
//! │     ┌──────────────┐      ┌──────────────────┐     ┌──────────────┐      │
//! │     │ TunerControl │      │  Capture thread  │     │  Peer REST   │      │
//! │     │    (HID)     │      │ endpoint -> FIFO │     │     API      │      │
//! │     └──────────────┘      └────────┬─────────┘     └──────────────┘      │
//! │                                    ▼                                     │
//! │                           ┌──────────────────┐                           │
//! │                           │ DSP engine drain │                           │
//! │                           └──────────────────┘                           │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
#[cfg(feature = "audio-capture")]
pub mod audio;
pub mod capture;
pub mod config;
pub mod device;
pub mod error;
pub mod hardware;
pub mod network;
pub mod settings;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// I/Q sample rate of the FCD Pro audio endpoint
    pub const FCDPRO_SAMPLE_RATE: u32 = 96_000;

    /// Name fragment of the dongle's audio-class capture endpoint
    pub const FCDPRO_AUDIO_DEVICE_NAME: &str = "FUNcube Dongle V1.0";

    pub const DEVICE_DESCRIPTION: &str = "FunCube Dongle Pro";

    /// Center frequency of fresh settings, in Hz
    pub const DEFAULT_CENTER_FREQUENCY: i64 = 435_000_000;

    /// Complex samples per capture chunk
    pub const CAPTURE_CHUNK_SIZE: usize = 2048;

    /// Sample FIFO capacity in chunks
    pub const FIFO_CHUNKS: usize = 8;

    /// Per-request timeout of mirror calls
    pub const DEFAULT_MIRROR_TIMEOUT_MS: u64 = 2000;

    /// Default port of the peer REST API
    pub const DEFAULT_API_PORT: u16 = 8091;
}
