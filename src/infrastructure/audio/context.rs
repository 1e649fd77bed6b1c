//! Audio context driving a render graph
//!
//! Blocks are pulled by the cpal output stream callback so the monitor path is
//! heard locally. Without an output device a clock thread renders at real-time
//! pace instead. Each rendered mixdown block is handed to the recorder taps.
//!
//! The cpal stream lives on its own thread because `cpal::Stream` is not Send.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};

use crate::application::ports::{
    AudioContext, CaptureRecorder, ContextState, HostError, NodeId, PcmSource, RecorderOptions,
};

use super::recorder::{NativeCaptureRecorder, RecorderTap};
use super::render::{silence, RenderGraph, Signal, DESTINATION_CHANNELS};
use super::resample::ResampledSource;

/// Rate used when no output device reports one
pub const FALLBACK_SAMPLE_RATE: u32 = 48_000;

/// Block length of the clock thread
const CLOCK_BLOCK: Duration = Duration::from_millis(10);

/// How often the output thread checks its running flag
const OUTPUT_POLL: Duration = Duration::from_millis(50);

struct Shared {
    graph: Mutex<RenderGraph>,
    taps: Mutex<Vec<Weak<RecorderTap>>>,
}

impl Shared {
    /// Render one block, feed the taps and return the monitor signal
    fn render(&self, frames: usize) -> Signal {
        let block = match self.graph.lock() {
            Ok(mut graph) => graph.render(frames),
            Err(_) => return silence(DESTINATION_CHANNELS, frames),
        };

        if !block.mixdowns.is_empty() {
            if let Ok(mut taps) = self.taps.lock() {
                taps.retain(|tap| tap.strong_count() > 0);
                for tap in taps.iter().filter_map(Weak::upgrade) {
                    for (node, signal) in &block.mixdowns {
                        if *node == tap.mixdown() {
                            tap.push(signal);
                        }
                    }
                }
            }
        }

        block.monitor
    }
}

/// Native audio context
pub struct NativeAudioContext {
    shared: Arc<Shared>,
    sample_rate: u32,
    use_output_device: bool,
    state: Mutex<ContextState>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl NativeAudioContext {
    /// Context playing its monitor on the default output device
    pub fn with_output_device() -> Self {
        let sample_rate = cpal::default_host()
            .default_output_device()
            .and_then(|device| device.default_output_config().ok())
            .map(|config| config.sample_rate().0)
            .unwrap_or(FALLBACK_SAMPLE_RATE);
        Self::build(sample_rate, true)
    }

    /// Context rendering on a clock thread only
    pub fn headless(sample_rate: u32) -> Self {
        Self::build(sample_rate, false)
    }

    fn build(sample_rate: u32, use_output_device: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                graph: Mutex::new(RenderGraph::new(sample_rate)),
                taps: Mutex::new(Vec::new()),
            }),
            sample_rate,
            use_output_device,
            state: Mutex::new(ContextState::Suspended),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    fn current_state(&self) -> ContextState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(ContextState::Closed)
    }

    fn set_state(&self, next: ContextState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    fn graph(&self) -> Result<MutexGuard<'_, RenderGraph>, HostError> {
        if self.current_state() == ContextState::Closed {
            return Err(HostError::ContextClosed);
        }
        self.shared
            .graph
            .lock()
            .map_err(|_| HostError::Backend("render graph lock poisoned".to_string()))
    }

    /// Number of live connections, for diagnostics
    pub fn connection_count(&self) -> usize {
        self.shared
            .graph
            .lock()
            .map(|graph| graph.connection_count())
            .unwrap_or(0)
    }

    /// Render `frames` frames synchronously, returning the monitor signal
    pub fn render_now(&self, frames: usize) -> Signal {
        self.shared.render(frames)
    }
}

fn run_worker(shared: Arc<Shared>, running: Arc<AtomicBool>, sample_rate: u32, use_output: bool) {
    if use_output {
        match open_output_stream(Arc::clone(&shared), sample_rate) {
            Ok(stream) => {
                while running.load(Ordering::SeqCst) {
                    thread::sleep(OUTPUT_POLL);
                }
                drop(stream);
                return;
            }
            Err(e) => {
                log::warn!("No audio output available ({}); monitoring is silent", e);
            }
        }
    }
    run_clock(&shared, &running, sample_rate);
}

fn run_clock(shared: &Shared, running: &AtomicBool, sample_rate: u32) {
    let frames = (sample_rate as usize * CLOCK_BLOCK.as_millis() as usize / 1000).max(1);
    let mut next = Instant::now();

    while running.load(Ordering::SeqCst) {
        shared.render(frames);
        next += CLOCK_BLOCK;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        }
    }
}

/// Copy a planar monitor block into an interleaved device buffer
fn fill_device_buffer<T>(data: &mut [T], channels: usize, monitor: &Signal, convert: impl Fn(f32) -> T) {
    for (frame, out) in data.chunks_mut(channels).enumerate() {
        for (channel, sample) in out.iter_mut().enumerate() {
            let value = monitor
                .get(channel % monitor.len().max(1))
                .and_then(|c| c.get(frame))
                .copied()
                .unwrap_or(0.0);
            *sample = convert(value.clamp(-1.0, 1.0));
        }
    }
}

fn open_output_stream(shared: Arc<Shared>, sample_rate: u32) -> Result<cpal::Stream, String> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| "no default output device".to_string())?;
    let supported = device
        .default_output_config()
        .map_err(|e| format!("Failed to get output config: {}", e))?;
    let sample_format = supported.sample_format();
    let channels = usize::from(supported.channels().max(1));
    let config = StreamConfig {
        channels: supported.channels(),
        sample_rate: SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let monitor = shared.render(data.len() / channels);
                fill_device_buffer(data, channels, &monitor, |s| s);
            },
            |err| log::error!("Audio output stream error: {}", err),
            None,
        ),
        SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                let monitor = shared.render(data.len() / channels);
                fill_device_buffer(data, channels, &monitor, |s| (s * 32767.0) as i16);
            },
            |err| log::error!("Audio output stream error: {}", err),
            None,
        ),
        other => return Err(format!("Unsupported output sample format: {:?}", other)),
    }
    .map_err(|e| e.to_string())?;

    stream.play().map_err(|e| e.to_string())?;
    log::debug!(
        "Output stream running: {} channels @ {} Hz",
        channels,
        sample_rate
    );
    Ok(stream)
}

#[async_trait]
impl AudioContext for NativeAudioContext {
    fn state(&self) -> ContextState {
        self.current_state()
    }

    async fn resume(&self) -> Result<(), HostError> {
        match self.current_state() {
            ContextState::Closed => return Err(HostError::ContextClosed),
            ContextState::Running => return Ok(()),
            ContextState::Suspended => {}
        }

        self.running.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let running = Arc::clone(&self.running);
        let sample_rate = self.sample_rate;
        let use_output = self.use_output_device;
        let handle = thread::Builder::new()
            .name("booth-render".to_string())
            .spawn(move || run_worker(shared, running, sample_rate, use_output))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                HostError::Backend(format!("Failed to start render thread: {}", e))
            })?;

        if let Ok(mut worker) = self.worker.lock() {
            *worker = Some(handle);
        }
        self.set_state(ContextState::Running);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn create_source(&self, source: Arc<dyn PcmSource>) -> Result<NodeId, HostError> {
        let source = ResampledSource::wrap(source, self.sample_rate)?;
        Ok(self.graph()?.add_source(source))
    }

    fn create_gain(&self, gain: f32) -> Result<NodeId, HostError> {
        Ok(self.graph()?.add_gain(gain))
    }

    fn create_splitter(&self, outputs: usize) -> Result<NodeId, HostError> {
        Ok(self.graph()?.add_splitter(outputs))
    }

    fn create_merger(&self, inputs: usize) -> Result<NodeId, HostError> {
        Ok(self.graph()?.add_merger(inputs))
    }

    fn create_mixdown(&self) -> Result<NodeId, HostError> {
        Ok(self.graph()?.add_mixdown())
    }

    fn monitor_output(&self) -> NodeId {
        self.shared
            .graph
            .lock()
            .map(|graph| graph.monitor())
            .unwrap_or(NodeId(0))
    }

    fn connect(
        &self,
        from: NodeId,
        output: usize,
        to: NodeId,
        input: usize,
    ) -> Result<(), HostError> {
        self.graph()?.connect(from, output, to, input)
    }

    fn disconnect(&self, node: NodeId) -> Result<(), HostError> {
        self.graph()?.disconnect(node)
    }

    fn ramp_gain(&self, node: NodeId, target: f32, time_constant: f32) -> Result<(), HostError> {
        self.graph()?.set_gain_target(node, target, time_constant)
    }

    fn create_recorder(
        &self,
        mixdown: NodeId,
        options: &RecorderOptions,
    ) -> Result<Box<dyn CaptureRecorder>, HostError> {
        if !self.graph()?.contains(mixdown) {
            return Err(HostError::UnknownNode(mixdown));
        }
        let (recorder, tap) = NativeCaptureRecorder::new(mixdown, options, self.sample_rate)?;
        self.shared
            .taps
            .lock()
            .map_err(|_| HostError::Backend("recorder taps lock poisoned".to_string()))?
            .push(Arc::downgrade(&tap));
        Ok(Box::new(recorder))
    }

    async fn close(&self) -> Result<(), HostError> {
        if self.current_state() == ContextState::Closed {
            return Ok(());
        }
        self.set_state(ContextState::Closed);
        self.running.store(false, Ordering::SeqCst);

        let handle = self.worker.lock().ok().and_then(|mut worker| worker.take());
        if let Some(handle) = handle {
            tokio::task::spawn_blocking(move || {
                if handle.join().is_err() {
                    log::warn!("Render thread panicked");
                }
            })
            .await
            .map_err(|e| HostError::Backend(format!("Render thread join failed: {}", e)))?;
        }

        if let Ok(mut taps) = self.shared.taps.lock() {
            taps.clear();
        }
        log::debug!("Audio context closed");
        Ok(())
    }
}

impl Drop for NativeAudioContext {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
