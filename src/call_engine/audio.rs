//! Mikrofon Capture
//!
//! Verwendet cpal für Cross-Platform Audio Input. Der cpal-Stream ist nicht
//! `Send`, deshalb lebt er auf einem eigenen Thread. Stoppen des Tracks
//! signalisiert dem Thread das Ende und kehrt sofort zurück.

use super::media::{LocalMedia, MediaError, MediaSource, MediaTrack};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use tokio::sync::oneshot;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Sample Rate (48kHz ist der Standard für Opus)
pub const SAMPLE_RATE: u32 = 48000;

/// Channels (Mono für Voice)
pub const CHANNELS: u16 = 1;

// ============================================================================
// MICROPHONE SOURCE
// ============================================================================

/// Standard-Eingabegerät des Systems
#[derive(Debug, Default, Clone)]
pub struct CpalMicrophone;

impl CpalMicrophone {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaSource for CpalMicrophone {
    async fn acquire(&self) -> Result<LocalMedia, MediaError> {
        let enabled = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let thread_enabled = Arc::clone(&enabled);
        // Der Thread wird nicht gejoint, er endet nach dem Stop von selbst
        std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || match open_input_stream(thread_enabled) {
                Ok((stream, device_name)) => {
                    let _ = ready_tx.send(Ok(device_name));
                    // Blockiert bis der Track gestoppt (Sender gedroppt) wird
                    let _ = stop_rx.recv();
                    drop(stream);
                    tracing::debug!("Audio capture thread finished");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| MediaError::StreamBuildError(e.to_string()))?;

        let device_name = ready_rx
            .await
            .map_err(|_| MediaError::StreamBuildError("capture thread exited".to_string()))??;

        tracing::info!("Microphone acquired: {}", device_name);

        let track = MicrophoneTrack::new(enabled, stop_tx);

        Ok(LocalMedia::new(
            uuid::Uuid::new_v4().to_string(),
            vec![Arc::new(track) as Arc<dyn MediaTrack>],
        ))
    }
}

/// Öffnet und startet den Input-Stream (läuft auf dem Capture-Thread)
fn open_input_stream(enabled: Arc<AtomicBool>) -> Result<(Stream, String), MediaError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(MediaError::NoInputDevice)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let supported = device.default_input_config().map_err(|e| match e {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => MediaError::NoInputDevice,
        other => MediaError::UnsupportedConfig(other.to_string()),
    })?;

    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();

    tracing::info!(
        "Starting audio capture: {} Hz, {} channels, {:?}",
        config.sample_rate.0,
        config.channels,
        sample_format
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, enabled)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, enabled)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, enabled)?,
        other => {
            return Err(MediaError::UnsupportedConfig(format!(
                "sample format {:?}",
                other
            )))
        }
    };

    stream
        .play()
        .map_err(|e| MediaError::StreamPlayError(e.to_string()))?;

    Ok((stream, device_name))
}

fn build_stream<T: SizedSample>(
    device: &Device,
    config: &StreamConfig,
    enabled: Arc<AtomicBool>,
) -> Result<Stream, MediaError> {
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if !enabled.load(Ordering::Relaxed) {
                    return;
                }
                // TODO: PCM an den lokalen RTP-Track weiterreichen, sobald ein Opus-Encoder eingebunden ist
                let _ = data;
            },
            |err| tracing::error!("Audio input error: {}", err),
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => MediaError::NoInputDevice,
            other => MediaError::StreamBuildError(other.to_string()),
        })
}

// ============================================================================
// MICROPHONE TRACK
// ============================================================================

/// Track eines laufenden Mikrofon-Streams
pub struct MicrophoneTrack {
    id: String,
    enabled: Arc<AtomicBool>,
    stopped: AtomicBool,
    stop_tx: Mutex<Option<std_mpsc::Sender<()>>>,
}

impl MicrophoneTrack {
    /// `stop_tx` hält den Capture-Thread am Leben, bis der Track gestoppt wird
    fn new(enabled: Arc<AtomicBool>, stop_tx: std_mpsc::Sender<()>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            enabled,
            stopped: AtomicBool::new(false),
            stop_tx: Mutex::new(Some(stop_tx)),
        }
    }
}

impl MediaTrack for MicrophoneTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.enabled.store(false, Ordering::SeqCst);

        // Sender droppen beendet den Capture-Thread, ohne auf ihn zu warten
        self.stop_tx.lock().take();
        tracing::info!("Microphone track {} stopped", self.id);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        if !self.is_stopped() {
            self.enabled.store(enabled, Ordering::SeqCst);
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl Drop for MicrophoneTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_stop_does_not_wait_for_capture_thread() {
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (done_tx, done_rx) = std_mpsc::channel::<()>();
        std::thread::spawn(move || {
            let _ = stop_rx.recv();
            // Langsames Freigeben des Streams
            std::thread::sleep(Duration::from_millis(300));
            let _ = done_tx.send(());
        });

        let track = MicrophoneTrack::new(Arc::new(AtomicBool::new(true)), stop_tx);
        let started = Instant::now();
        track.stop();

        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(track.is_stopped());
        assert!(!track.is_enabled());
        done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn test_stopped_track_cannot_be_enabled() {
        let (stop_tx, _stop_rx) = std_mpsc::channel::<()>();
        let track = MicrophoneTrack::new(Arc::new(AtomicBool::new(true)), stop_tx);

        track.set_enabled(false);
        assert!(!track.is_enabled());
        track.set_enabled(true);
        assert!(track.is_enabled());

        track.stop();
        track.set_enabled(true);
        assert!(!track.is_enabled());
    }
}
