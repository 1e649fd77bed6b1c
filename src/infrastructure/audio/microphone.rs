//! Microphone capture using cpal
//!
//! The input stream is owned by a dedicated thread (`cpal::Stream` is not
//! Send). Captured frames are optionally run through the voice processor and
//! queued for the graph to pull.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};

use crate::application::ports::{HostError, MicrophoneStream, PcmSource};
use crate::domain::device::ConstraintProfile;

use super::processing::VoiceProcessor;

/// Seconds of audio kept when the graph stops pulling
const MAX_BUFFERED_SECONDS: usize = 2;

/// How often the capture thread checks its running flag
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Map a cpal error message onto the port's error kinds
pub fn classify_backend_error(message: &str) -> HostError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not permitted")
    {
        HostError::PermissionDenied(message.to_string())
    } else if lower.contains("no such device") || lower.contains("not available") {
        HostError::NoDevice(message.to_string())
    } else {
        HostError::Device(message.to_string())
    }
}

/// Resolve the input device a profile asks for
pub fn find_input_device(
    host: &cpal::Host,
    device_id: Option<&str>,
) -> Result<cpal::Device, HostError> {
    match device_id {
        Some(id) => host
            .input_devices()
            .map_err(|e| classify_backend_error(&e.to_string()))?
            .find(|device| device.name().map(|name| name == id).unwrap_or(false))
            .ok_or_else(|| HostError::NoDevice(format!("input device '{}' not found", id))),
        None => host
            .default_input_device()
            .ok_or_else(|| HostError::NoDevice("no default input device".to_string())),
    }
}

/// Queue of captured interleaved samples
pub struct CaptureBuffer {
    channels: u16,
    sample_rate: u32,
    capacity: usize,
    queue: Mutex<VecDeque<f32>>,
}

impl CaptureBuffer {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        Self {
            channels,
            sample_rate,
            capacity: usize::from(channels) * sample_rate as usize * MAX_BUFFERED_SECONDS,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Append samples, dropping the oldest beyond capacity
    pub fn push(&self, samples: &[f32]) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(samples.iter().copied());
            let excess = queue.len().saturating_sub(self.capacity);
            if excess > 0 {
                // Keep frames aligned
                let excess = excess.div_ceil(usize::from(self.channels)) * usize::from(self.channels);
                let len = queue.len();
                queue.drain(..excess.min(len));
            }
        }
    }

    pub fn clear(&self) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.clear();
        }
    }
}

impl PcmSource for CaptureBuffer {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&self, out: &mut [f32]) -> usize {
        let Ok(mut queue) = self.queue.lock() else {
            return 0;
        };
        let n = out.len().min(queue.len());
        for (dst, src) in out.iter_mut().zip(queue.drain(..n)) {
            *dst = src;
        }
        n
    }
}

struct StreamInfo {
    label: String,
    channels: u16,
    sample_rate: u32,
}

/// A live cpal input stream
pub struct CpalMicrophone {
    label: String,
    channels: u16,
    buffer: Arc<CaptureBuffer>,
    running: Arc<AtomicBool>,
    live_tracks: Arc<AtomicBool>,
}

impl CpalMicrophone {
    /// Acquire the input device and start streaming
    pub async fn open(profile: &ConstraintProfile) -> Result<Self, HostError> {
        let profile = profile.clone();
        let running = Arc::new(AtomicBool::new(true));
        let live_tracks = Arc::new(AtomicBool::new(false));
        let buffer_slot: Arc<Mutex<Option<Arc<CaptureBuffer>>>> = Arc::new(Mutex::new(None));

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<StreamInfo, HostError>>(1);
        {
            let running = Arc::clone(&running);
            let live_tracks = Arc::clone(&live_tracks);
            let buffer_slot = Arc::clone(&buffer_slot);
            thread::Builder::new()
                .name("booth-microphone".to_string())
                .spawn(move || capture_thread(profile, running, live_tracks, buffer_slot, ready_tx))
                .map_err(|e| HostError::Backend(format!("Failed to start capture thread: {}", e)))?;
        }

        let info = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .map_err(|e| HostError::Backend(format!("Capture thread join error: {}", e)))?
            .map_err(|_| HostError::Backend("capture thread exited before starting".to_string()))?;

        let info = match info {
            Ok(info) => info,
            Err(e) => {
                running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let buffer = buffer_slot
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .ok_or_else(|| HostError::Backend("capture buffer missing".to_string()))?;

        log::info!(
            "Microphone opened: {} ({} ch @ {} Hz)",
            info.label,
            info.channels,
            info.sample_rate
        );

        Ok(Self {
            label: info.label,
            channels: info.channels,
            buffer,
            running,
            live_tracks,
        })
    }
}

fn capture_thread(
    profile: ConstraintProfile,
    running: Arc<AtomicBool>,
    live_tracks: Arc<AtomicBool>,
    buffer_slot: Arc<Mutex<Option<Arc<CaptureBuffer>>>>,
    ready: mpsc::SyncSender<Result<StreamInfo, HostError>>,
) {
    let stream = match build_stream(&profile, &live_tracks, &buffer_slot) {
        Ok((stream, info)) => {
            let _ = ready.send(Ok(info));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    while running.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);
    }

    live_tracks.store(false, Ordering::SeqCst);
    drop(stream);
    log::debug!("Microphone stream closed");
}

fn build_stream(
    profile: &ConstraintProfile,
    live_tracks: &Arc<AtomicBool>,
    buffer_slot: &Mutex<Option<Arc<CaptureBuffer>>>,
) -> Result<(cpal::Stream, StreamInfo), HostError> {
    let host = cpal::default_host();
    let device = find_input_device(&host, profile.device_id.as_deref())?;
    let label = device.name().unwrap_or_else(|_| "Unknown input".to_string());

    let supported = device
        .default_input_config()
        .map_err(|e| classify_backend_error(&e.to_string()))?;
    let sample_format = supported.sample_format();
    let channels = supported.channels();
    let sample_rate = supported.sample_rate().0;
    let config = StreamConfig {
        channels,
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };

    let buffer = Arc::new(CaptureBuffer::new(channels, sample_rate));
    if let Ok(mut slot) = buffer_slot.lock() {
        *slot = Some(Arc::clone(&buffer));
    }
    let processor = Mutex::new(VoiceProcessor::for_profile(profile, sample_rate, channels));

    let deliver = move |samples: &mut [f32]| {
        if let Ok(mut guard) = processor.lock() {
            if let Some(processor) = guard.as_mut() {
                processor.process(samples);
            }
        }
        buffer.push(samples);
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mut samples = data.to_vec();
                deliver(&mut samples);
            },
            |err| log::error!("Audio input stream error: {}", err),
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let mut samples: Vec<f32> = data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                deliver(&mut samples);
            },
            |err| log::error!("Audio input stream error: {}", err),
            None,
        ),
        other => {
            return Err(HostError::Unsupported(format!(
                "input sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| classify_backend_error(&e.to_string()))?;

    stream
        .play()
        .map_err(|e| classify_backend_error(&e.to_string()))?;
    live_tracks.store(true, Ordering::SeqCst);

    Ok((
        stream,
        StreamInfo {
            label,
            channels,
            sample_rate,
        },
    ))
}

impl MicrophoneStream for CpalMicrophone {
    fn track_count(&self) -> usize {
        usize::from(self.live_tracks.load(Ordering::SeqCst))
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn source(&self) -> Arc<dyn PcmSource> {
        Arc::clone(&self.buffer) as Arc<dyn PcmSource>
    }

    fn stop_tracks(&self) -> Result<(), HostError> {
        self.running.store(false, Ordering::SeqCst);
        self.live_tracks.store(false, Ordering::SeqCst);
        self.buffer.clear();
        Ok(())
    }
}

impl Drop for CpalMicrophone {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_errors_are_recognized() {
        assert!(matches!(
            classify_backend_error("Permission denied (os error 13)"),
            HostError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_backend_error("The requested device is no longer available"),
            HostError::NoDevice(_)
        ));
        assert!(matches!(
            classify_backend_error("snd_pcm_open failed"),
            HostError::Device(_)
        ));
    }

    #[test]
    fn buffer_reads_in_order() {
        let buffer = CaptureBuffer::new(1, 8_000);
        buffer.push(&[0.1, 0.2, 0.3]);
        let mut out = [0.0; 2];
        assert_eq!(buffer.read(&mut out), 2);
        assert_eq!(out, [0.1, 0.2]);
        let mut rest = [0.0; 4];
        assert_eq!(buffer.read(&mut rest), 1);
    }

    #[test]
    fn buffer_drops_oldest_frames() {
        let buffer = CaptureBuffer::new(2, 4);
        // Capacity is 2 ch * 4 Hz * 2 s = 16 samples
        let samples: Vec<f32> = (0..20).map(|i| i as f32).collect();
        buffer.push(&samples);
        let mut out = vec![0.0; 32];
        assert_eq!(buffer.read(&mut out), 16);
        assert_eq!(out[0], 4.0);
    }

    #[test]
    fn clear_empties_queue() {
        let buffer = CaptureBuffer::new(1, 8_000);
        buffer.push(&[0.5; 10]);
        buffer.clear();
        assert_eq!(buffer.read(&mut [0.0; 10]), 0);
    }
}
