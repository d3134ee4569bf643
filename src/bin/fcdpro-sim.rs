//! FCD Pro control plane over a simulated tuner
//!
//! Drives the HID side through the simulator and captures either a
//! synthetic tone or the dongle's audio endpoint. Serves the peer REST API
//! so other instances can mirror into it.
//!
//! Usage: `fcdpro-sim [config.toml]`

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fcdpro_control::{
    api::ApiServer,
    config::{default_config_path, AppConfig, CaptureBackend},
    device::{DeviceEvent, DrainEngine, FcdProInput, TracingRecorder},
    hardware::{sim::SimulatedTuner, sim::ToneSource, CaptureSource},
    network::RemoteMirror,
};

fn capture_source(config: &AppConfig) -> Result<Box<dyn CaptureSource>> {
    match config.capture.backend {
        CaptureBackend::Tone => Ok(Box::new(ToneSource::new(
            config.capture.tone_offset_hz,
            config.capture.chunk_size,
        ))),
        #[cfg(feature = "audio-capture")]
        CaptureBackend::Audio => {
            use fcdpro_control::audio::{list_input_devices, CpalCaptureSource};

            println!("\n=== Available Audio Inputs ===");
            for device in list_input_devices() {
                let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
                println!("  {}{}:", device.name, default_marker);
                println!("    Sample rates: {:?}", device.sample_rates);
                println!("    Channels: {:?}", device.channels);
            }
            println!();

            Ok(Box::new(CpalCaptureSource::new()))
        }
        #[cfg(not(feature = "audio-capture"))]
        CaptureBackend::Audio => {
            anyhow::bail!("audio capture backend requires the audio-capture feature")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load_or_default(config_path.as_deref())?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting FCD Pro control plane (simulated tuner)");
    if config_path.is_none() {
        if let Some(path) = default_config_path() {
            tracing::debug!("Default configuration path: {}", path.display());
        }
    }

    let mirror = RemoteMirror::from_current(Duration::from_millis(config.mirror.timeout_ms))?;

    let (input, handle) = FcdProInput::builder(SimulatedTuner::new(), capture_source(&config)?)
        .config(&config)
        .engine(DrainEngine::new())
        .recorder(TracingRecorder::new())
        .mirror(mirror)
        .build();

    let mut events = handle.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(DeviceEvent::SettingsApplied { changes, force }) if !changes.is_empty() => {
                    tracing::info!("Settings applied ({} keys, force={})", changes.len(), force)
                }
                Ok(DeviceEvent::StateChanged(state)) => tracing::info!("Acquisition {}", state),
                Ok(DeviceEvent::RecordingChanged(on)) => tracing::info!("Recording: {}", on),
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => tracing::debug!("Missed {} events", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let consumer = input.spawn()?;
    handle.init()?;

    let api_handle = if config.api.enabled {
        let server = ApiServer::new(config.api.clone(), handle.clone());
        tracing::info!(
            "REST API at http://{}/sdrangel/deviceset/{}/device",
            server.addr(),
            config.api.device_set_index
        );
        Some(server.start_background())
    } else {
        None
    };

    tracing::info!("Running - press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    if let Some(api_handle) = api_handle {
        api_handle.abort();
    }
    handle.shutdown()?;
    tokio::task::spawn_blocking(move || consumer.join())
        .await?
        .map_err(|_| anyhow::anyhow!("control plane thread panicked"))?;

    Ok(())
}
