//! Hardware capability seams
//!
//! The tuner is driven over two independent paths: HID commands for the
//! tuner parameters ([`TunerControl`]) and an audio-class endpoint delivering
//! the I/Q samples ([`CaptureSource`]).

pub mod sim;

use num_complex::Complex;

use crate::error::{CaptureError, DeviceError};

/// HID command identifiers of the FCD Pro application firmware
pub mod hid {
    pub const SET_FREQUENCY_HZ: u8 = 101;
    pub const SET_LNA_GAIN: u8 = 110;
    pub const SET_LNA_ENHANCE: u8 = 111;
    pub const SET_BAND: u8 = 112;
    pub const SET_RF_FILTER: u8 = 113;
    pub const SET_MIXER_GAIN: u8 = 114;
    pub const SET_BIAS_CURRENT: u8 = 115;
    pub const SET_MIXER_FILTER: u8 = 116;
    pub const SET_IF_GAIN1: u8 = 117;
    pub const SET_IF_GAIN_MODE: u8 = 118;
    pub const SET_IF_GAIN2: u8 = 119;
    pub const SET_IF_GAIN3: u8 = 120;
    pub const SET_IF_GAIN4: u8 = 121;
    pub const SET_IF_RC_FILTER: u8 = 122;
    pub const SET_IF_FILTER: u8 = 123;
    pub const SET_IF_GAIN5: u8 = 124;
    pub const SET_IF_GAIN6: u8 = 125;
}

/// Opaque token for an opened tuner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u64);

/// HID side of the dongle
pub trait TunerControl: Send {
    /// Open the `index`-th dongle; `None` if absent
    fn open(&mut self, index: u32) -> Option<DeviceHandle>;

    fn close(&mut self, handle: DeviceHandle);

    /// Send one parameter byte with the given command
    fn set_param(&mut self, handle: DeviceHandle, command: u8, value: u8) -> Result<(), DeviceError>;

    /// Tune the LO, in Hz
    fn set_frequency(&mut self, handle: DeviceHandle, freq_hz: u64) -> Result<(), DeviceError>;
}

/// A bound capture endpoint producing complex samples
pub trait CaptureStream: Send {
    /// Fill `buf` with up to `buf.len()` samples and return how many were
    /// written. `Ok(0)` means nothing arrived within the endpoint's poll
    /// interval; the caller polls again.
    fn read(&mut self, buf: &mut [Complex<i16>]) -> Result<usize, CaptureError>;

    /// Unbind the endpoint
    fn close(&mut self);

    /// Samples per second delivered by the endpoint
    fn sample_rate(&self) -> u32;
}

/// Factory of capture streams, looked up by endpoint name
pub trait CaptureSource: Send {
    fn open_capture(&mut self, name: &str) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

impl CaptureSource for Box<dyn CaptureSource> {
    fn open_capture(&mut self, name: &str) -> Result<Box<dyn CaptureStream>, CaptureError> {
        (**self).open_capture(name)
    }
}
