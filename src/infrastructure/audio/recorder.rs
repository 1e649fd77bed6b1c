//! Capture recorder bound to a mixdown node
//!
//! The context pushes every rendered mixdown block into the recorder's tap.
//! On stop the buffered samples are encoded on a worker thread and handed
//! back as timeslice-sized chunks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::application::ports::{
    CaptureRecorder, HostError, NodeId, PendingCapture, RecorderOptions,
};
use crate::domain::audio::RecordingFormat;

use super::encoder;
use super::render::{interleave, Signal, DESTINATION_CHANNELS};

/// Receives mixdown blocks while its recorder is running
#[derive(Debug)]
pub struct RecorderTap {
    mixdown: NodeId,
    recording: AtomicBool,
    samples: Mutex<Vec<f32>>,
}

impl RecorderTap {
    fn new(mixdown: NodeId) -> Self {
        Self {
            mixdown,
            recording: AtomicBool::new(false),
            samples: Mutex::new(Vec::new()),
        }
    }

    pub fn mixdown(&self) -> NodeId {
        self.mixdown
    }

    /// Append one rendered block; ignored while not recording
    pub fn push(&self, block: &Signal) {
        if !self.recording.load(Ordering::SeqCst) {
            return;
        }
        if let Ok(mut samples) = self.samples.lock() {
            samples.extend(interleave(block));
        }
    }

    fn take(&self) -> Vec<f32> {
        self.samples
            .lock()
            .map(|mut samples| std::mem::take(&mut *samples))
            .unwrap_or_default()
    }
}

/// Encoded bytes per chunk for a timeslice at a bitrate, never zero
pub fn chunk_size(timeslice: Duration, bits_per_second: u32) -> usize {
    let bytes = timeslice.as_secs_f64() * f64::from(bits_per_second) / 8.0;
    (bytes.round() as usize).max(1)
}

/// Split an encoded payload into consecutive chunks
pub fn split_chunks(payload: Vec<u8>, chunk_size: usize) -> Vec<Vec<u8>> {
    if payload.is_empty() {
        return Vec::new();
    }
    payload
        .chunks(chunk_size.max(1))
        .map(<[u8]>::to_vec)
        .collect()
}

/// Recorder producing FLAC or WAV from a mixdown tap.
///
/// Chunks are not emitted while recording. The whole take is buffered as
/// samples and the timeslice only sizes the chunks cut from the encoded
/// payload after `stop`.
pub struct NativeCaptureRecorder {
    format: RecordingFormat,
    options: RecorderOptions,
    sample_rate: u32,
    tap: Arc<RecorderTap>,
    timeslice: Mutex<Duration>,
}

impl NativeCaptureRecorder {
    /// Create the recorder and the tap the context feeds
    pub fn new(
        mixdown: NodeId,
        options: &RecorderOptions,
        sample_rate: u32,
    ) -> Result<(Self, Arc<RecorderTap>), HostError> {
        if encoder::Container::for_mime(&options.format.mime_type()).is_none() {
            return Err(HostError::Unsupported(options.format.mime_type()));
        }
        let tap = Arc::new(RecorderTap::new(mixdown));
        let recorder = Self {
            format: options.format.clone(),
            options: options.clone(),
            sample_rate,
            tap: Arc::clone(&tap),
            timeslice: Mutex::new(Duration::from_millis(100)),
        };
        Ok((recorder, tap))
    }
}

impl CaptureRecorder for NativeCaptureRecorder {
    fn format(&self) -> &RecordingFormat {
        &self.format
    }

    fn start(&self, timeslice: Duration) -> Result<(), HostError> {
        if self.tap.recording.swap(true, Ordering::SeqCst) {
            return Err(HostError::Backend("recorder is already recording".to_string()));
        }
        if let Ok(mut slot) = self.timeslice.lock() {
            *slot = timeslice;
        }
        // Drop anything left from an earlier take
        self.tap.take();
        log::debug!(
            "Capture recorder started: {} @ {} bps, {:?} timeslice",
            self.format,
            self.options.bits_per_second,
            timeslice
        );
        Ok(())
    }

    fn stop(&self) -> Result<PendingCapture, HostError> {
        if !self.tap.recording.swap(false, Ordering::SeqCst) {
            return Err(HostError::Backend("recorder is not recording".to_string()));
        }

        let samples = self.tap.take();
        let mime_type = self.format.mime_type();
        let sample_rate = self.sample_rate;
        let timeslice = self
            .timeslice
            .lock()
            .map(|slot| *slot)
            .unwrap_or(Duration::from_millis(100));
        let chunk_bytes = chunk_size(timeslice, self.options.bits_per_second);

        let (delivery, pending) = PendingCapture::channel();
        thread::spawn(move || {
            log::debug!(
                "Encoding {} samples ({:.1}s) as {}",
                samples.len(),
                samples.len() as f64 / (DESTINATION_CHANNELS as f64 * f64::from(sample_rate)),
                mime_type
            );
            let result = encoder::encode(&mime_type, &samples, DESTINATION_CHANNELS as u16, sample_rate)
                .map(|payload| split_chunks(payload, chunk_bytes))
                .map_err(|e| HostError::Backend(e.to_string()));
            delivery.deliver(result);
        });

        Ok(pending)
    }

    fn is_recording(&self) -> bool {
        self.tap.recording.load(Ordering::SeqCst)
    }
}
