//! Audio-class capture endpoint (cpal)

pub mod capture;
pub mod device;

pub use capture::{CpalCaptureSource, CpalCaptureStream};
pub use device::{find_input_device, list_input_devices, AudioInputInfo};
