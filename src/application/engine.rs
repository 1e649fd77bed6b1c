//! Audio engine: builds, runs and tears down the live mixing graph
//!
//! Graph shape:
//!
//! ```text
//! beat source ─► beat gain ─┬─► mixdown ─► capture recorder
//!                           └─► monitor
//! mic source ─► [splitter ═► merger] ─► mic gain ─┬─► mixdown
//!                                                 └─► monitor (self-monitoring only)
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::audio::{CapturedAudio, RecordingFormat};
use crate::domain::device::ConstraintProfile;
use crate::domain::session::{ProcessingError, SetupError, StartError};

use super::ports::{
    AudioContext, AudioHost, BeatPlayer, CaptureRecorder, ContextState, CrossOrigin, HostError,
    MediaError, MicrophoneStream, NodeId, PendingCapture, RecorderOptions,
};

/// Interval between emitted capture chunks
pub const CHUNK_TIMESLICE: Duration = Duration::from_millis(100);

/// Target capture bitrate in bits per second
pub const CAPTURE_BITRATE: u32 = 128_000;

/// Time constant of the beat volume ramp, in seconds
pub const VOLUME_RAMP_TIME_CONSTANT: f32 = 0.05;

/// Default bound on beat loading
pub const DEFAULT_BEAT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Map a 0-100 volume to a linear gain
pub fn volume_to_gain(volume: u8) -> f32 {
    f32::from(volume.min(100)) / 100.0
}

/// Engine settings fixed for its lifetime
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Prioritized recording formats
    pub formats: Vec<RecordingFormat>,
    pub beat_load_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            formats: RecordingFormat::default_candidates(),
            beat_load_timeout: DEFAULT_BEAT_LOAD_TIMEOUT,
        }
    }
}

/// Splitter and merger folding a stereo microphone to one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonoFold {
    pub splitter: NodeId,
    pub merger: NodeId,
}

/// Every live resource of one recording session, fully constructed.
///
/// Only `GraphParts::finish` builds one, so a handle can never be observed
/// half-connected.
pub struct AudioGraphHandle {
    context: Box<dyn AudioContext>,
    beat_player: Box<dyn BeatPlayer>,
    microphone: Box<dyn MicrophoneStream>,
    recorder: Box<dyn CaptureRecorder>,
    format: RecordingFormat,
    beat_source: NodeId,
    beat_gain: NodeId,
    mic_source: NodeId,
    mic_gain: NodeId,
    mono_fold: Option<MonoFold>,
    mixdown: NodeId,
}

impl AudioGraphHandle {
    pub fn format(&self) -> &RecordingFormat {
        &self.format
    }

    pub fn beat_url(&self) -> &str {
        self.beat_player.url()
    }

    pub fn beat_gain(&self) -> NodeId {
        self.beat_gain
    }

    pub fn mic_gain(&self) -> NodeId {
        self.mic_gain
    }

    pub fn mixdown(&self) -> NodeId {
        self.mixdown
    }

    pub fn mono_fold(&self) -> Option<MonoFold> {
        self.mono_fold
    }

    /// Release every resource. Each step is guarded independently.
    pub async fn release(self) {
        GraphParts::from(self).release().await;
    }
}

impl fmt::Debug for AudioGraphHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioGraphHandle")
            .field("beat_url", &self.beat_player.url())
            .field("format", &self.format)
            .field("beat_gain", &self.beat_gain)
            .field("mic_gain", &self.mic_gain)
            .field("mono_fold", &self.mono_fold)
            .field("mixdown", &self.mixdown)
            .finish()
    }
}

/// Resources of a graph under construction or teardown.
#[derive(Default)]
pub struct GraphParts {
    context: Option<Box<dyn AudioContext>>,
    beat_player: Option<Box<dyn BeatPlayer>>,
    microphone: Option<Box<dyn MicrophoneStream>>,
    recorder: Option<Box<dyn CaptureRecorder>>,
    format: Option<RecordingFormat>,
    beat_source: Option<NodeId>,
    beat_gain: Option<NodeId>,
    mic_source: Option<NodeId>,
    mic_gain: Option<NodeId>,
    splitter: Option<NodeId>,
    merger: Option<NodeId>,
    mixdown: Option<NodeId>,
}

impl GraphParts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing is held
    pub fn is_empty(&self) -> bool {
        self.context.is_none()
            && self.beat_player.is_none()
            && self.microphone.is_none()
            && self.recorder.is_none()
            && self.format.is_none()
            && self.nodes().is_empty()
    }

    fn nodes(&self) -> Vec<NodeId> {
        [
            self.beat_source,
            self.beat_gain,
            self.mic_source,
            self.splitter,
            self.merger,
            self.mic_gain,
            self.mixdown,
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Promote to a handle, or give the parts back if anything is missing
    pub fn finish(mut self) -> Result<AudioGraphHandle, Self> {
        let mono_fold = match (self.splitter, self.merger) {
            (Some(splitter), Some(merger)) => Some(MonoFold { splitter, merger }),
            (None, None) => None,
            _ => return Err(self),
        };

        match (
            self.context.take(),
            self.beat_player.take(),
            self.microphone.take(),
            self.recorder.take(),
            self.format.take(),
        ) {
            (Some(context), Some(beat_player), Some(microphone), Some(recorder), Some(format)) => {
                match (
                    self.beat_source,
                    self.beat_gain,
                    self.mic_source,
                    self.mic_gain,
                    self.mixdown,
                ) {
                    (
                        Some(beat_source),
                        Some(beat_gain),
                        Some(mic_source),
                        Some(mic_gain),
                        Some(mixdown),
                    ) => Ok(AudioGraphHandle {
                        context,
                        beat_player,
                        microphone,
                        recorder,
                        format,
                        beat_source,
                        beat_gain,
                        mic_source,
                        mic_gain,
                        mono_fold,
                        mixdown,
                    }),
                    _ => {
                        self.context = Some(context);
                        self.beat_player = Some(beat_player);
                        self.microphone = Some(microphone);
                        self.recorder = Some(recorder);
                        self.format = Some(format);
                        Err(self)
                    }
                }
            }
            (context, beat_player, microphone, recorder, format) => {
                self.context = context;
                self.beat_player = beat_player;
                self.microphone = microphone;
                self.recorder = recorder;
                self.format = format;
                Err(self)
            }
        }
    }

    /// Release whatever is held and clear every field.
    ///
    /// Safe on empty or already-released parts. A failing step is logged and
    /// the remaining steps still run.
    pub async fn release(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            if recorder.is_recording() {
                if let Err(e) = recorder.stop() {
                    log::warn!("Failed to stop capture recorder: {}", e);
                }
            }
        }

        if let Some(player) = self.beat_player.take() {
            if let Err(e) = player.pause() {
                log::warn!("Failed to pause beat: {}", e);
            }
            if let Err(e) = player.unload() {
                log::warn!("Failed to unload beat: {}", e);
            }
        }

        if let Some(microphone) = self.microphone.take() {
            if let Err(e) = microphone.stop_tracks() {
                log::warn!("Failed to stop microphone tracks: {}", e);
            }
        }

        let nodes = self.nodes();
        self.beat_source = None;
        self.beat_gain = None;
        self.mic_source = None;
        self.splitter = None;
        self.merger = None;
        self.mic_gain = None;
        self.mixdown = None;

        if let Some(context) = self.context.take() {
            if context.state() != ContextState::Closed {
                for node in nodes {
                    if let Err(e) = context.disconnect(node) {
                        log::warn!("Failed to disconnect node {}: {}", node, e);
                    }
                }
                if let Err(e) = context.close().await {
                    log::warn!("Failed to close audio context: {}", e);
                }
            }
        }

        self.format = None;
    }
}

impl From<AudioGraphHandle> for GraphParts {
    fn from(handle: AudioGraphHandle) -> Self {
        let (splitter, merger) = match handle.mono_fold {
            Some(fold) => (Some(fold.splitter), Some(fold.merger)),
            None => (None, None),
        };
        Self {
            context: Some(handle.context),
            beat_player: Some(handle.beat_player),
            microphone: Some(handle.microphone),
            recorder: Some(handle.recorder),
            format: Some(handle.format),
            beat_source: Some(handle.beat_source),
            beat_gain: Some(handle.beat_gain),
            mic_source: Some(handle.mic_source),
            mic_gain: Some(handle.mic_gain),
            splitter,
            merger,
            mixdown: Some(handle.mixdown),
        }
    }
}

impl fmt::Debug for GraphParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphParts")
            .field("context", &self.context.is_some())
            .field("beat_player", &self.beat_player.is_some())
            .field("microphone", &self.microphone.is_some())
            .field("recorder", &self.recorder.is_some())
            .field("nodes", &self.nodes())
            .finish()
    }
}

/// A stopped capture awaiting finalization
#[derive(Debug)]
pub struct StoppedCapture {
    pending: PendingCapture,
    format: RecordingFormat,
}

impl StoppedCapture {
    pub fn format(&self) -> &RecordingFormat {
        &self.format
    }
}

struct Slot {
    epoch: u64,
    handle: Option<AudioGraphHandle>,
}

/// Audio engine owning at most one installed graph
pub struct AudioEngine<H: AudioHost> {
    host: Arc<H>,
    options: EngineOptions,
    slot: Mutex<Slot>,
}

impl<H: AudioHost> AudioEngine<H> {
    pub fn new(host: Arc<H>, options: EngineOptions) -> Self {
        Self {
            host,
            options,
            slot: Mutex::new(Slot {
                epoch: 0,
                handle: None,
            }),
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Current installation epoch. Bumped by every teardown.
    pub async fn epoch(&self) -> u64 {
        self.slot.lock().await.epoch
    }

    /// Whether a graph is installed
    pub async fn is_live(&self) -> bool {
        self.slot.lock().await.handle.is_some()
    }

    /// Build a complete graph for one session.
    ///
    /// On failure everything created by this attempt is released before the
    /// error is returned.
    pub async fn setup(
        &self,
        beat_url: &str,
        profile: &ConstraintProfile,
        beat_volume: u8,
    ) -> Result<AudioGraphHandle, SetupError> {
        let mut parts = GraphParts::new();

        match self.build(&mut parts, beat_url, profile, beat_volume).await {
            Ok(()) => match parts.finish() {
                Ok(handle) => Ok(handle),
                Err(mut parts) => {
                    parts.release().await;
                    Err(SetupError::Device("audio graph incomplete".to_string()))
                }
            },
            Err(e) => {
                log::debug!("Setup failed ({}), releasing partial graph", e);
                parts.release().await;
                Err(e)
            }
        }
    }

    async fn build(
        &self,
        parts: &mut GraphParts,
        beat_url: &str,
        profile: &ConstraintProfile,
        beat_volume: u8,
    ) -> Result<(), SetupError> {
        let env = self.host.environment();
        if !env.secure_transport {
            return Err(SetupError::InsecureContext);
        }
        if !env.capture_supported {
            return Err(SetupError::CaptureUnsupported);
        }

        log::debug!("Creating audio context");
        let context = self.host.create_context().await.map_err(context_error)?;
        let context = &**parts.context.insert(context);
        if context.state() == ContextState::Suspended {
            context.resume().await.map_err(context_error)?;
        }

        log::debug!("Loading beat from {}", beat_url);
        let player = self
            .host
            .create_beat_player(beat_url, CrossOrigin::Anonymous)
            .map_err(|e| SetupError::BeatLoad {
                code: None,
                message: e.to_string(),
            })?;
        let player = &**parts.beat_player.insert(player);
        match tokio::time::timeout(self.options.beat_load_timeout, player.load()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(beat_error(e)),
            Err(_) => {
                return Err(beat_error(MediaError::network(format!(
                    "beat did not become playable within {}s",
                    self.options.beat_load_timeout.as_secs()
                ))))
            }
        }

        let mixdown = *parts.mixdown.insert(context.create_mixdown().map_err(graph_error)?);

        log::debug!("Wiring beat path");
        let beat_pcm = player.source().map_err(graph_error)?;
        let beat_source = *parts
            .beat_source
            .insert(context.create_source(beat_pcm).map_err(graph_error)?);
        let beat_gain = *parts.beat_gain.insert(
            context
                .create_gain(volume_to_gain(beat_volume))
                .map_err(graph_error)?,
        );
        context
            .connect(beat_source, 0, beat_gain, 0)
            .map_err(graph_error)?;
        context.connect(beat_gain, 0, mixdown, 0).map_err(graph_error)?;
        context
            .connect(beat_gain, 0, context.monitor_output(), 0)
            .map_err(graph_error)?;

        log::debug!("Acquiring microphone");
        let microphone = self
            .host
            .open_microphone(profile)
            .await
            .map_err(microphone_error)?;
        let microphone = &**parts.microphone.insert(microphone);
        if microphone.track_count() == 0 {
            return Err(SetupError::NoAudioTracks);
        }
        log::debug!(
            "Microphone '{}' reports {} channel(s)",
            microphone.label(),
            microphone.channel_count()
        );

        let mic_source = *parts
            .mic_source
            .insert(context.create_source(microphone.source()).map_err(graph_error)?);
        let mic_gain = *parts
            .mic_gain
            .insert(context.create_gain(1.0).map_err(graph_error)?);

        if profile.force_mono && microphone.channel_count() == 2 {
            log::debug!("Folding stereo microphone to mono");
            let splitter = *parts
                .splitter
                .insert(context.create_splitter(2).map_err(graph_error)?);
            let merger = *parts
                .merger
                .insert(context.create_merger(1).map_err(graph_error)?);
            context
                .connect(mic_source, 0, splitter, 0)
                .map_err(graph_error)?;
            context.connect(splitter, 0, merger, 0).map_err(graph_error)?;
            context.connect(splitter, 1, merger, 0).map_err(graph_error)?;
            context.connect(merger, 0, mic_gain, 0).map_err(graph_error)?;
        } else {
            context
                .connect(mic_source, 0, mic_gain, 0)
                .map_err(graph_error)?;
        }

        context.connect(mic_gain, 0, mixdown, 0).map_err(graph_error)?;
        if profile.monitor_self {
            context
                .connect(mic_gain, 0, context.monitor_output(), 0)
                .map_err(graph_error)?;
        }

        let host = &self.host;
        let format =
            RecordingFormat::select_first_supported(&self.options.formats, |mime| {
                host.is_format_supported(mime)
            })
            .ok_or_else(|| SetupError::NoSupportedFormat {
                tried: self
                    .options
                    .formats
                    .iter()
                    .map(RecordingFormat::mime_type)
                    .collect(),
            })?;
        log::info!("Negotiated recording format {}", format);

        let recorder = context
            .create_recorder(
                mixdown,
                &RecorderOptions {
                    format: format.clone(),
                    bits_per_second: CAPTURE_BITRATE,
                },
            )
            .map_err(graph_error)?;
        parts.recorder = Some(recorder);
        parts.format = Some(format);

        Ok(())
    }

    /// Install a handle built for `epoch`.
    ///
    /// A handle built before the latest teardown is released instead and
    /// `false` is returned.
    pub async fn install(&self, handle: AudioGraphHandle, epoch: u64) -> bool {
        let mut slot = self.slot.lock().await;
        if slot.epoch != epoch || slot.handle.is_some() {
            drop(slot);
            log::debug!("Discarding graph built for stale session {}", epoch);
            handle.release().await;
            return false;
        }
        slot.handle = Some(handle);
        true
    }

    /// Start capture and beat playback from the top
    pub async fn start(&self) -> Result<(), StartError> {
        let slot = self.slot.lock().await;
        let handle = slot.handle.as_ref().ok_or(StartError::NotReady)?;

        handle
            .recorder
            .start(CHUNK_TIMESLICE)
            .map_err(|e| StartError::Capture(e.to_string()))?;
        handle
            .beat_player
            .seek_to_start()
            .map_err(|e| StartError::Playback(e.to_string()))?;
        handle
            .beat_player
            .play()
            .map_err(|e| StartError::Playback(e.to_string()))?;

        log::info!("Capture started");
        Ok(())
    }

    /// Halt capture and pause the beat. Finalization continues asynchronously.
    pub async fn stop(&self) -> Result<StoppedCapture, ProcessingError> {
        let slot = self.slot.lock().await;
        let handle = slot
            .handle
            .as_ref()
            .ok_or_else(|| ProcessingError::Finalize("audio engine is not set up".to_string()))?;

        let pending = handle
            .recorder
            .stop()
            .map_err(|e| ProcessingError::Finalize(e.to_string()))?;
        if let Err(e) = handle.beat_player.pause() {
            log::warn!("Failed to pause beat: {}", e);
        }

        log::info!("Capture stopped");
        Ok(StoppedCapture {
            pending,
            format: handle.format.clone(),
        })
    }

    /// Wait for the stopped recorder's chunks and assemble one payload
    pub async fn finalize(
        &self,
        stopped: StoppedCapture,
        duration_seconds: u32,
    ) -> Result<CapturedAudio, ProcessingError> {
        let chunks = stopped
            .pending
            .wait()
            .await
            .map_err(|e| ProcessingError::Finalize(e.to_string()))?;
        let audio = CapturedAudio::assemble(chunks, stopped.format, duration_seconds);
        if audio.is_empty() {
            return Err(ProcessingError::EmptyPayload);
        }
        log::info!(
            "Finalized {} of {} ({}s)",
            audio.human_readable_size(),
            audio.mime_type(),
            duration_seconds
        );
        Ok(audio)
    }

    /// Release the installed graph, if any, and invalidate in-flight setups.
    /// Idempotent.
    pub async fn teardown(&self) {
        let mut slot = self.slot.lock().await;
        Self::release_slot(&mut slot).await;
    }

    /// Tear down only if nothing has been torn down or installed since
    /// `epoch` was read. Returns false when the slot has moved on.
    pub async fn teardown_if(&self, epoch: u64) -> bool {
        let mut slot = self.slot.lock().await;
        if slot.epoch != epoch {
            log::debug!("Skipping teardown for stale epoch {}", epoch);
            return false;
        }
        Self::release_slot(&mut slot).await;
        true
    }

    async fn release_slot(slot: &mut Slot) {
        slot.epoch += 1;
        if let Some(handle) = slot.handle.take() {
            log::debug!("Tearing down audio graph");
            handle.release().await;
        }
    }

    /// Ramp the live beat gain. Returns false when no graph is live.
    pub async fn set_beat_volume(&self, volume: u8) -> bool {
        let slot = self.slot.lock().await;
        let Some(handle) = slot.handle.as_ref() else {
            return false;
        };
        match handle.context.ramp_gain(
            handle.beat_gain,
            volume_to_gain(volume),
            VOLUME_RAMP_TIME_CONSTANT,
        ) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to ramp beat volume: {}", e);
                false
            }
        }
    }

    /// Inspect the installed handle
    pub async fn with_handle<R>(&self, f: impl FnOnce(&AudioGraphHandle) -> R) -> Option<R> {
        self.slot.lock().await.handle.as_ref().map(f)
    }
}

fn beat_error(e: MediaError) -> SetupError {
    SetupError::BeatLoad {
        code: e.code,
        message: e.message,
    }
}

fn context_error(e: HostError) -> SetupError {
    match e {
        HostError::Unsupported(_) => SetupError::CaptureUnsupported,
        other => SetupError::Device(other.to_string()),
    }
}

fn graph_error(e: HostError) -> SetupError {
    SetupError::Device(e.to_string())
}

fn microphone_error(e: HostError) -> SetupError {
    match e {
        HostError::PermissionDenied(_) => SetupError::PermissionDenied,
        HostError::NoDevice(_) => SetupError::NoInputDevice,
        HostError::Unsupported(_) => SetupError::CaptureUnsupported,
        other => SetupError::Device(other.to_string()),
    }
}
