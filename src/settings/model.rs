//! The settings model of one FCD Pro device instance

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CENTER_FREQUENCY;
use crate::error::SettingsError;

/// Magic prefix of a serialized settings blob
const BLOB_MAGIC: &[u8; 4] = b"FCDP";

/// Current blob format version
const BLOB_VERSION: u32 = 1;

/// Where state changes get replicated to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMirrorSettings {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
    /// Device set index on the peer
    pub device_index: u16,
}

impl Default for RemoteMirrorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1".to_string(),
            port: 8888,
            device_index: 0,
        }
    }
}

/// Complete configuration record of the tuner
///
/// Indexed fields are positions in the option tables of
/// [`crate::settings::options`]; they are validated by the reconciliation
/// engine, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcdProSettings {
    /// Displayed center frequency in Hz
    pub center_frequency: i64,
    /// LO correction in tenths of ppm
    pub lo_ppm_tenths: i32,
    pub lna_gain_index: i32,
    pub rf_filter_index: i32,
    pub lna_enhance_index: i32,
    pub band_index: i32,
    pub mixer_gain_index: i32,
    pub mixer_filter_index: i32,
    pub bias_current_index: i32,
    /// IF gain mode
    pub mode_index: i32,
    pub gain1_index: i32,
    pub rc_filter_index: i32,
    pub gain2_index: i32,
    pub gain3_index: i32,
    pub gain4_index: i32,
    pub if_filter_index: i32,
    pub gain5_index: i32,
    pub gain6_index: i32,
    pub dc_block: bool,
    pub iq_correction: bool,
    pub transverter_mode: bool,
    pub transverter_delta_frequency: i64,
    /// Empty means auto-generate on record start
    pub file_record_name: String,
    pub remote_mirror: RemoteMirrorSettings,
}

impl Default for FcdProSettings {
    fn default() -> Self {
        Self {
            center_frequency: DEFAULT_CENTER_FREQUENCY,
            lo_ppm_tenths: 0,
            lna_gain_index: 0,
            rf_filter_index: 0,
            lna_enhance_index: 0,
            band_index: 0,
            mixer_gain_index: 0,
            mixer_filter_index: 0,
            bias_current_index: 0,
            mode_index: 0,
            gain1_index: 0,
            rc_filter_index: 0,
            gain2_index: 0,
            gain3_index: 0,
            gain4_index: 0,
            if_filter_index: 0,
            gain5_index: 0,
            gain6_index: 0,
            dc_block: false,
            iq_correction: false,
            transverter_mode: false,
            transverter_delta_frequency: 0,
            file_record_name: String::new(),
            remote_mirror: RemoteMirrorSettings::default(),
        }
    }
}

impl FcdProSettings {
    pub fn reset_to_defaults(&mut self) {
        *self = Self::default();
    }

    /// Frequency the tuner itself must be set to: the displayed frequency
    /// minus the transverter offset, never negative
    pub fn device_center_frequency(&self) -> i64 {
        let offset = if self.transverter_mode {
            self.transverter_delta_frequency
        } else {
            0
        };
        self.center_frequency.saturating_sub(offset).max(0)
    }

    /// Device frequency with the LO ppm correction applied
    pub fn corrected_device_frequency(&self) -> f64 {
        let freq = self.device_center_frequency() as f64;
        freq + freq * (self.lo_ppm_tenths as f64 / 10_000_000.0)
    }

    /// Opaque blob: magic, version, bincode payload
    pub fn serialize(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(128);
        blob.extend_from_slice(BLOB_MAGIC);
        blob.extend_from_slice(&BLOB_VERSION.to_le_bytes());
        // Encoding a plain struct into a Vec cannot fail
        if let Ok(payload) = bincode::serialize(self) {
            blob.extend_from_slice(&payload);
        }
        blob
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, SettingsError> {
        if data.len() < 8 {
            return Err(SettingsError::Truncated(data.len()));
        }
        if &data[..4] != BLOB_MAGIC {
            return Err(SettingsError::BadMagic);
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&data[4..8]);
        let version = u32::from_le_bytes(version);
        if version != BLOB_VERSION {
            return Err(SettingsError::UnsupportedVersion(version));
        }

        bincode::deserialize(&data[8..]).map_err(|e| SettingsError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_roundtrip() {
        let mut settings = FcdProSettings::default();
        settings.center_frequency = 145_800_000;
        settings.if_filter_index = 7;
        settings.file_record_name = "pass.sdriq".into();
        settings.remote_mirror.enabled = true;

        let blob = settings.serialize();
        assert_eq!(&blob[..4], b"FCDP");
        assert_eq!(FcdProSettings::deserialize(&blob).unwrap(), settings);
    }

    #[test]
    fn test_blob_errors() {
        assert_eq!(
            FcdProSettings::deserialize(b"FCD"),
            Err(SettingsError::Truncated(3))
        );
        assert_eq!(
            FcdProSettings::deserialize(b"XXXX\x01\x00\x00\x00"),
            Err(SettingsError::BadMagic)
        );
        assert_eq!(
            FcdProSettings::deserialize(b"FCDP\x09\x00\x00\x00"),
            Err(SettingsError::UnsupportedVersion(9))
        );

        let mut blob = FcdProSettings::default().serialize();
        blob.truncate(20);
        assert!(matches!(
            FcdProSettings::deserialize(&blob),
            Err(SettingsError::Malformed(_))
        ));
    }

    #[test]
    fn test_device_frequency_clamped() {
        let settings = FcdProSettings {
            center_frequency: 1000,
            transverter_mode: true,
            transverter_delta_frequency: 2000,
            ..Default::default()
        };
        assert_eq!(settings.device_center_frequency(), 0);
        assert_eq!(settings.corrected_device_frequency(), 0.0);
    }

    #[test]
    fn test_transverter_ignored_when_off() {
        let settings = FcdProSettings {
            center_frequency: 10_368_000_000,
            transverter_mode: false,
            transverter_delta_frequency: 10_224_000_000,
            ..Default::default()
        };
        assert_eq!(settings.device_center_frequency(), 10_368_000_000);
    }

    #[test]
    fn test_ppm_correction() {
        let settings = FcdProSettings {
            center_frequency: 100_000_000,
            lo_ppm_tenths: 25,
            ..Default::default()
        };
        // 2.5 ppm of 100 MHz is 250 Hz
        assert!((settings.corrected_device_frequency() - 100_000_250.0).abs() < 1e-6);
    }
}
