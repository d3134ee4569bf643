//! Application configuration
//!
//! Loaded from a TOML file; every section has defaults so a missing file or
//! a partial file is fine.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::Error;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub capture: CaptureConfig,
    pub mirror: MirrorConfig,
    pub api: ApiConfig,
    pub logging: LogConfig,
}

/// Which dongle to drive
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Sequence number of the dongle among identical devices
    pub index: u32,
    /// Unique id used for auto-generated record file names
    pub uid: u32,
}

/// Capture source backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBackend {
    /// Audio-class endpoint through cpal
    Audio,
    /// Synthetic tone
    Tone,
}

/// Capture path sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub backend: CaptureBackend,
    /// Substring matched against audio input device names
    pub driver_name: String,
    /// Complex samples per capture chunk
    pub chunk_size: usize,
    /// FIFO capacity in chunks
    pub fifo_chunks: usize,
    /// Frequency of the synthetic tone, relative to center
    pub tone_offset_hz: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend: CaptureBackend::Tone,
            driver_name: FCDPRO_AUDIO_DEVICE_NAME.to_string(),
            chunk_size: CAPTURE_CHUNK_SIZE,
            fifo_chunks: FIFO_CHUNKS,
            tone_offset_hz: 10_000.0,
        }
    }
}

/// Remote mirror HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_MIRROR_TIMEOUT_MS,
        }
    }
}

/// Peer REST API listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: IpAddr,
    pub http_port: u16,
    /// Device set index this instance answers for
    pub device_set_index: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            http_port: DEFAULT_API_PORT,
            device_set_index: 0,
        }
    }
}

/// Logging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when RUST_LOG is unset
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load from the explicit path if given, else the per-user default path,
    /// else fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.capture.chunk_size == 0 {
            return Err(Error::Config("capture.chunk_size must be > 0".into()));
        }
        if self.capture.fifo_chunks == 0 {
            return Err(Error::Config("capture.fifo_chunks must be > 0".into()));
        }
        if self.capture.driver_name.trim().is_empty() {
            return Err(Error::Config("capture.driver_name must not be empty".into()));
        }
        Ok(())
    }
}

/// `<config dir>/fcdpro-control/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "fcdpro", "fcdpro-control")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
