//! Scripted in-memory audio host for engine and controller tests
//!
//! Every resource the host hands out reports into a shared probe: an ordered
//! event log, the number of live microphones and the graph of the most
//! recent context. Failures are injected through `Script`.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use freestyle_booth::application::ports::{
    AudioContext, AudioHost, BeatPlayer, CaptureRecorder, ContextState, CrossOrigin,
    HostEnvironment, HostError, MediaError, MicrophoneStream, NodeId, PcmSource, PendingCapture,
    RecorderOptions,
};
use freestyle_booth::domain::audio::{BeatDescriptor, RecordingFormat};
use freestyle_booth::domain::device::{ConstraintProfile, InputDeviceOption};

/// What the host does when asked for each resource
#[derive(Debug, Clone)]
pub struct Script {
    pub secure_transport: bool,
    pub capture_supported: bool,
    pub beat_load: Result<(), MediaError>,
    pub beat_load_delay: Duration,
    pub permission: Result<(), HostError>,
    pub microphone: Result<(), HostError>,
    pub mic_tracks: usize,
    pub mic_channels: u16,
    pub supported_formats: Vec<String>,
    pub devices: Vec<InputDeviceOption>,
    pub chunks: Vec<Vec<u8>>,
    pub finalize_delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            secure_transport: true,
            capture_supported: true,
            beat_load: Ok(()),
            beat_load_delay: Duration::ZERO,
            permission: Ok(()),
            microphone: Ok(()),
            mic_tracks: 1,
            mic_channels: 1,
            supported_formats: vec!["audio/flac".to_string(), "audio/wav".to_string()],
            devices: vec![
                device("usb-mic", "USB Microphone"),
                device("built-in", "Built-in Microphone"),
            ],
            chunks: vec![vec![1, 2, 3], vec![4, 5]],
            finalize_delay: Duration::ZERO,
        }
    }
}

pub fn device(id: &str, label: &str) -> InputDeviceOption {
    InputDeviceOption {
        device_id: id.to_string(),
        label: label.to_string(),
    }
}

pub fn beat(id: &str) -> BeatDescriptor {
    BeatDescriptor {
        id: id.to_string(),
        title: format!("Beat {}", id),
        audio_url: format!("https://cdn.example/{}.mp3", id),
        producer: None,
        bpm: Some(90),
    }
}

/// Node graph of one fake context
#[derive(Debug, Default)]
pub struct GraphProbe {
    pub nodes: Vec<(NodeId, String)>,
    pub gains: Vec<(NodeId, f32)>,
    pub connections: Vec<(NodeId, usize, NodeId, usize)>,
    pub ramps: Vec<(NodeId, f32, f32)>,
    pub state: Option<ContextState>,
}

impl GraphProbe {
    pub fn is_connected(&self, from: NodeId, output: usize, to: NodeId, input: usize) -> bool {
        self.connections.contains(&(from, output, to, input))
    }

    pub fn kind_of(&self, node: NodeId) -> Option<&str> {
        self.nodes
            .iter()
            .find(|(id, _)| *id == node)
            .map(|(_, kind)| kind.as_str())
    }

    pub fn initial_gain(&self, node: NodeId) -> Option<f32> {
        self.gains.iter().find(|(id, _)| *id == node).map(|(_, g)| *g)
    }
}

/// Observations shared by the host and everything it created
#[derive(Debug, Default)]
pub struct Probe {
    events: Mutex<Vec<String>>,
    live_mics: AtomicUsize,
    peak_live_mics: AtomicUsize,
    graphs: Mutex<Vec<Arc<Mutex<GraphProbe>>>>,
}

impl Probe {
    fn record(&self, event: impl Into<String>) {
        lock(&self.events).push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        lock(&self.events)
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    /// Index of the `nth` event starting with `prefix`
    pub fn position(&self, prefix: &str, nth: usize) -> Option<usize> {
        lock(&self.events)
            .iter()
            .enumerate()
            .filter(|(_, e)| e.starts_with(prefix))
            .nth(nth)
            .map(|(i, _)| i)
    }

    pub fn live_mics(&self) -> usize {
        self.live_mics.load(Ordering::SeqCst)
    }

    pub fn peak_live_mics(&self) -> usize {
        self.peak_live_mics.load(Ordering::SeqCst)
    }

    pub fn context_count(&self) -> usize {
        lock(&self.graphs).len()
    }

    /// Graph of the most recently created context
    pub fn last_graph(&self) -> Arc<Mutex<GraphProbe>> {
        lock(&self.graphs)
            .last()
            .cloned()
            .expect("no context was created")
    }

    fn mic_opened(&self) {
        let live = self.live_mics.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_live_mics.fetch_max(live, Ordering::SeqCst);
    }

    fn mic_stopped(&self) {
        self.live_mics.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

pub struct FakeHost {
    script: Mutex<Script>,
    probe: Arc<Probe>,
}

impl FakeHost {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            probe: Arc::new(Probe::default()),
        })
    }

    pub fn healthy() -> Arc<Self> {
        Self::new(Script::default())
    }

    pub fn probe(&self) -> &Probe {
        &self.probe
    }

    /// Change the script for resources created from now on
    pub fn rescript(&self, f: impl FnOnce(&mut Script)) {
        f(&mut lock(&self.script));
    }

    fn script(&self) -> Script {
        lock(&self.script).clone()
    }
}

#[async_trait]
impl AudioHost for FakeHost {
    fn environment(&self) -> HostEnvironment {
        let script = self.script();
        HostEnvironment {
            secure_transport: script.secure_transport,
            capture_supported: script.capture_supported,
        }
    }

    async fn create_context(&self) -> Result<Box<dyn AudioContext>, HostError> {
        self.probe.record("context.create");
        let graph = Arc::new(Mutex::new(GraphProbe {
            state: Some(ContextState::Suspended),
            ..Default::default()
        }));
        lock(&self.probe.graphs).push(Arc::clone(&graph));
        Ok(Box::new(FakeContext {
            probe: Arc::clone(&self.probe),
            graph,
            next_id: AtomicU64::new(1),
            chunks: self.script().chunks,
            finalize_delay: self.script().finalize_delay,
        }))
    }

    fn create_beat_player(
        &self,
        url: &str,
        _cross_origin: CrossOrigin,
    ) -> Result<Box<dyn BeatPlayer>, HostError> {
        let script = self.script();
        Ok(Box::new(FakeBeatPlayer {
            url: url.to_string(),
            probe: Arc::clone(&self.probe),
            load_result: script.beat_load,
            load_delay: script.beat_load_delay,
            loaded: AtomicBool::new(false),
        }))
    }

    async fn request_permission(&self) -> Result<(), HostError> {
        self.probe.record("permission.request");
        self.script().permission
    }

    async fn enumerate_input_devices(&self) -> Result<Vec<InputDeviceOption>, HostError> {
        self.probe.record("devices.enumerate");
        Ok(self.script().devices)
    }

    async fn open_microphone(
        &self,
        profile: &ConstraintProfile,
    ) -> Result<Box<dyn MicrophoneStream>, HostError> {
        let script = self.script();
        self.probe.record(format!(
            "mic.open {}",
            profile.device_id.as_deref().unwrap_or("default")
        ));
        script.microphone?;
        self.probe.mic_opened();
        Ok(Box::new(FakeMicrophone {
            probe: Arc::clone(&self.probe),
            tracks: script.mic_tracks,
            channels: script.mic_channels,
            live: AtomicBool::new(true),
        }))
    }

    fn is_format_supported(&self, mime_type: &str) -> bool {
        self.script()
            .supported_formats
            .iter()
            .any(|supported| supported == mime_type)
    }
}

struct FakeContext {
    probe: Arc<Probe>,
    graph: Arc<Mutex<GraphProbe>>,
    next_id: AtomicU64,
    chunks: Vec<Vec<u8>>,
    finalize_delay: Duration,
}

impl FakeContext {
    fn add(&self, kind: &str) -> Result<NodeId, HostError> {
        let mut graph = lock(&self.graph);
        if graph.state == Some(ContextState::Closed) {
            return Err(HostError::ContextClosed);
        }
        let id = NodeId(self.next_id.fetch_add(1, Ordering::SeqCst));
        graph.nodes.push((id, kind.to_string()));
        Ok(id)
    }
}

#[async_trait]
impl AudioContext for FakeContext {
    fn state(&self) -> ContextState {
        lock(&self.graph).state.unwrap_or(ContextState::Closed)
    }

    async fn resume(&self) -> Result<(), HostError> {
        lock(&self.graph).state = Some(ContextState::Running);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        48_000
    }

    fn create_source(&self, _source: Arc<dyn PcmSource>) -> Result<NodeId, HostError> {
        self.add("source")
    }

    fn create_gain(&self, gain: f32) -> Result<NodeId, HostError> {
        let id = self.add("gain")?;
        lock(&self.graph).gains.push((id, gain));
        Ok(id)
    }

    fn create_splitter(&self, _outputs: usize) -> Result<NodeId, HostError> {
        self.add("splitter")
    }

    fn create_merger(&self, _inputs: usize) -> Result<NodeId, HostError> {
        self.add("merger")
    }

    fn create_mixdown(&self) -> Result<NodeId, HostError> {
        self.add("mixdown")
    }

    fn monitor_output(&self) -> NodeId {
        NodeId(0)
    }

    fn connect(
        &self,
        from: NodeId,
        output: usize,
        to: NodeId,
        input: usize,
    ) -> Result<(), HostError> {
        lock(&self.graph).connections.push((from, output, to, input));
        Ok(())
    }

    fn disconnect(&self, node: NodeId) -> Result<(), HostError> {
        lock(&self.graph).connections.retain(|(from, ..)| *from != node);
        Ok(())
    }

    fn ramp_gain(&self, node: NodeId, target: f32, time_constant: f32) -> Result<(), HostError> {
        lock(&self.graph).ramps.push((node, target, time_constant));
        Ok(())
    }

    fn create_recorder(
        &self,
        _mixdown: NodeId,
        options: &RecorderOptions,
    ) -> Result<Box<dyn CaptureRecorder>, HostError> {
        self.probe
            .record(format!("recorder.create {}", options.format.mime_type()));
        Ok(Box::new(FakeRecorder {
            probe: Arc::clone(&self.probe),
            format: options.format.clone(),
            recording: AtomicBool::new(false),
            chunks: self.chunks.clone(),
            finalize_delay: self.finalize_delay,
        }))
    }

    async fn close(&self) -> Result<(), HostError> {
        self.probe.record("context.close");
        lock(&self.graph).state = Some(ContextState::Closed);
        Ok(())
    }
}

struct FakeBeatPlayer {
    url: String,
    probe: Arc<Probe>,
    load_result: Result<(), MediaError>,
    load_delay: Duration,
    loaded: AtomicBool,
}

#[async_trait]
impl BeatPlayer for FakeBeatPlayer {
    fn url(&self) -> &str {
        &self.url
    }

    async fn load(&self) -> Result<(), MediaError> {
        self.probe.record(format!("beat.load {}", self.url));
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        self.load_result.clone()?;
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn source(&self) -> Result<Arc<dyn PcmSource>, HostError> {
        Ok(Arc::new(Silence { channels: 2 }))
    }

    fn seek_to_start(&self) -> Result<(), HostError> {
        self.probe.record("beat.seek");
        Ok(())
    }

    fn play(&self) -> Result<(), HostError> {
        if !self.loaded.load(Ordering::SeqCst) {
            return Err(HostError::Backend("beat is not loaded".to_string()));
        }
        self.probe.record("beat.play");
        Ok(())
    }

    fn pause(&self) -> Result<(), HostError> {
        self.probe.record("beat.pause");
        Ok(())
    }

    fn unload(&self) -> Result<(), HostError> {
        self.probe.record(format!("beat.unload {}", self.url));
        self.loaded.store(false, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeMicrophone {
    probe: Arc<Probe>,
    tracks: usize,
    channels: u16,
    live: AtomicBool,
}

impl MicrophoneStream for FakeMicrophone {
    fn track_count(&self) -> usize {
        self.tracks
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn label(&self) -> String {
        "Fake Microphone".to_string()
    }

    fn source(&self) -> Arc<dyn PcmSource> {
        Arc::new(Silence {
            channels: self.channels,
        })
    }

    fn stop_tracks(&self) -> Result<(), HostError> {
        if self.live.swap(false, Ordering::SeqCst) {
            self.probe.record("mic.stop");
            self.probe.mic_stopped();
        }
        Ok(())
    }
}

struct FakeRecorder {
    probe: Arc<Probe>,
    format: RecordingFormat,
    recording: AtomicBool,
    chunks: Vec<Vec<u8>>,
    finalize_delay: Duration,
}

impl CaptureRecorder for FakeRecorder {
    fn format(&self) -> &RecordingFormat {
        &self.format
    }

    fn start(&self, _timeslice: Duration) -> Result<(), HostError> {
        if self.recording.swap(true, Ordering::SeqCst) {
            return Err(HostError::Backend("recorder already started".to_string()));
        }
        self.probe.record("recorder.start");
        Ok(())
    }

    fn stop(&self) -> Result<PendingCapture, HostError> {
        if !self.recording.swap(false, Ordering::SeqCst) {
            return Err(HostError::Backend("recorder is not recording".to_string()));
        }
        self.probe.record("recorder.stop");
        if self.finalize_delay.is_zero() {
            return Ok(PendingCapture::ready(Ok(self.chunks.clone())));
        }
        let (delivery, pending) = PendingCapture::channel();
        let chunks = self.chunks.clone();
        let delay = self.finalize_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            delivery.deliver(Ok(chunks));
        });
        Ok(pending)
    }

    fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }
}

struct Silence {
    channels: u16,
}

impl PcmSource for Silence {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        48_000
    }

    fn read(&self, out: &mut [f32]) -> usize {
        out.fill(0.0);
        out.len()
    }
}
