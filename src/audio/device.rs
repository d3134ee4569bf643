//! Audio input device enumeration

use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;

use crate::error::CaptureError;

/// Description of one audio input device
#[derive(Debug, Clone, Serialize)]
pub struct AudioInputInfo {
    pub name: String,
    pub is_default: bool,
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}

/// List all audio input devices of the default host
pub fn list_input_devices() -> Vec<AudioInputInfo> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let mut devices = Vec::new();

    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Ok(name) = device.name() {
                let (sample_rates, channels) = get_input_capabilities(&device);
                devices.push(AudioInputInfo {
                    is_default: default_name.as_ref() == Some(&name),
                    name,
                    sample_rates,
                    channels,
                });
            }
        }
    }

    devices
}

fn get_input_capabilities(device: &cpal::Device) -> (Vec<u32>, Vec<u16>) {
    let mut sample_rates = Vec::new();
    let mut channels = Vec::new();

    if let Ok(configs) = device.supported_input_configs() {
        for config in configs {
            for rate_val in [48_000u32, 96_000, 192_000] {
                let rate = cpal::SampleRate(rate_val);
                if rate >= config.min_sample_rate()
                    && rate <= config.max_sample_rate()
                    && !sample_rates.contains(&rate_val)
                {
                    sample_rates.push(rate_val);
                }
            }

            let ch = config.channels();
            if !channels.contains(&ch) {
                channels.push(ch);
            }
        }
    }

    sample_rates.sort();
    channels.sort();
    (sample_rates, channels)
}

/// First input device whose name contains `fragment`
pub fn find_input_device(fragment: &str) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    let inputs = host
        .input_devices()
        .map_err(|e| CaptureError::EndpointNotFound(e.to_string()))?;

    for device in inputs {
        if let Ok(name) = device.name() {
            if name.contains(fragment) {
                tracing::debug!("Matched audio input '{}' for '{}'", name, fragment);
                return Ok(device);
            }
        }
    }

    Err(CaptureError::EndpointNotFound(fragment.to_string()))
}
