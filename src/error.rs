//! Error types for the control plane

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Mirror error: {0}")]
    Mirror(#[from] MirrorError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Command queue closed")]
    QueueClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tuner (HID side) errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Device #{0} not found")]
    NotFound(u32),

    #[error("Device is not open")]
    NotOpen,

    #[error("Command {command} rejected value {value}")]
    Rejected { command: u8, value: u8 },

    #[error("Frequency {0} Hz rejected")]
    FrequencyRejected(u64),

    #[error("Acquisition refused by engine")]
    AcquisitionRefused,

    #[error("HID transport error: {0}")]
    Transport(String),
}

/// Audio-class capture endpoint errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Capture endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("Failed to bind capture endpoint: {0}")]
    Bind(String),

    #[error("Capture stream error: {0}")]
    Stream(String),

    #[error("Failed to spawn capture thread: {0}")]
    Thread(String),

    #[error("Capture stream closed")]
    Closed,
}

/// Settings model errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Blob too short: {0} bytes")]
    Truncated(usize),

    #[error("Bad magic in settings blob")]
    BadMagic,

    #[error("Unsupported settings version: {0}")]
    UnsupportedVersion(u32),

    #[error("Malformed settings payload: {0}")]
    Malformed(String),

    #[error("Unknown settings key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Remote mirror errors
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("HTTP client initialization failed: {0}")]
    ClientInit(String),

    #[error("Request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("Peer at {url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("No async runtime available for mirroring")]
    NoRuntime,
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
