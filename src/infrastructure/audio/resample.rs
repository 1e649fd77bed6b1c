//! Sample-rate conversion for graph sources

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rubato::{FftFixedIn, Resampler};

use crate::application::ports::{HostError, PcmSource};

/// Input frames per resampler chunk
const CHUNK_FRAMES: usize = 1024;

/// Resample a whole interleaved buffer in one pass
pub fn resample_interleaved(
    samples: &[f32],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, HostError> {
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let channels = channels.max(1);
    let frames = samples.len() / channels;
    let ratio = f64::from(target_rate) / f64::from(source_rate);
    let output_frames = (frames as f64 * ratio).ceil() as usize;

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        CHUNK_FRAMES,
        2,
        channels,
    )
    .map_err(|e| HostError::Backend(format!("Resampler init failed: {}", e)))?;

    let planar = deinterleave(samples, channels);
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(output_frames); channels];
    let mut pos = 0;

    while pos < frames {
        let needed = resampler.input_frames_next();
        let end = (pos + needed).min(frames);
        let chunk: Vec<Vec<f32>> = planar
            .iter()
            .map(|channel| {
                let mut part = channel[pos..end].to_vec();
                part.resize(needed, 0.0);
                part
            })
            .collect();

        let resampled = resampler
            .process(&chunk, None)
            .map_err(|e| HostError::Backend(format!("Resampling failed: {}", e)))?;
        for (out, channel) in output.iter_mut().zip(resampled) {
            out.extend(channel);
        }
        pos = end;
    }

    for channel in output.iter_mut() {
        channel.truncate(output_frames);
    }
    Ok(interleave_planar(&output))
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let mut planar = vec![Vec::with_capacity(samples.len() / channels); channels];
    for (i, sample) in samples.iter().enumerate() {
        planar[i % channels].push(*sample);
    }
    planar
}

fn interleave_planar(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar.iter().map(Vec::len).min().unwrap_or(0);
    let mut out = Vec::with_capacity(frames * planar.len());
    for frame in 0..frames {
        for channel in planar {
            out.push(channel[frame]);
        }
    }
    out
}

struct StreamState {
    resampler: FftFixedIn<f32>,
    output: VecDeque<f32>,
}

/// Wraps a source running at another rate, converting on the fly
pub struct ResampledSource {
    inner: Arc<dyn PcmSource>,
    target_rate: u32,
    state: Mutex<StreamState>,
}

impl ResampledSource {
    pub fn new(inner: Arc<dyn PcmSource>, target_rate: u32) -> Result<Self, HostError> {
        let resampler = FftFixedIn::<f32>::new(
            inner.sample_rate() as usize,
            target_rate as usize,
            CHUNK_FRAMES,
            2,
            usize::from(inner.channels().max(1)),
        )
        .map_err(|e| HostError::Backend(format!("Resampler init failed: {}", e)))?;

        Ok(Self {
            inner,
            target_rate,
            state: Mutex::new(StreamState {
                resampler,
                output: VecDeque::new(),
            }),
        })
    }

    /// Wrap `source` only when its rate differs from `target_rate`
    pub fn wrap(source: Arc<dyn PcmSource>, target_rate: u32) -> Result<Arc<dyn PcmSource>, HostError> {
        if source.sample_rate() == target_rate {
            Ok(source)
        } else {
            Ok(Arc::new(Self::new(source, target_rate)?))
        }
    }
}

impl PcmSource for ResampledSource {
    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.target_rate
    }

    fn read(&self, out: &mut [f32]) -> usize {
        let Ok(mut state) = self.state.lock() else {
            return 0;
        };
        let channels = usize::from(self.inner.channels().max(1));

        while state.output.len() < out.len() {
            let needed = state.resampler.input_frames_next();
            let mut interleaved = vec![0.0; needed * channels];
            // Short reads are silence
            self.inner.read(&mut interleaved);
            let planar = deinterleave(&interleaved, channels);
            match state.resampler.process(&planar, None) {
                Ok(resampled) => {
                    let chunk = interleave_planar(&resampled);
                    state.output.extend(chunk);
                }
                Err(e) => {
                    log::warn!("Resampling failed: {}", e);
                    break;
                }
            }
        }

        let n = out.len().min(state.output.len());
        for (dst, src) in out.iter_mut().zip(state.output.drain(..n)) {
            *dst = src;
        }
        n
    }
}
