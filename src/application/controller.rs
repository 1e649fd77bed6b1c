//! Recording session controller
//!
//! Drives the session state machine against the audio engine: setup and
//! start, the one-second timer with auto-stop, finalization, forced teardown
//! and submission. Observers follow the session through a watch channel.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::domain::audio::{BeatDescriptor, CapturedAudio};
use crate::domain::config::DEFAULT_BEAT_VOLUME;
use crate::domain::device::ClientHints;
use crate::domain::session::{
    InvalidTransition, Phase, RecordingSession, SessionEvent, SessionSnapshot, SetupError,
    TickOutcome,
};

use super::engine::{AudioEngine, EngineOptions};
use super::negotiation::DeviceNegotiator;
use super::ports::{AudioHost, RecordingApi, SubmissionError, SubmissionMetadata, UploadTicket};
use super::submission::SubmissionBridge;

/// Timer resolution
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Errors from controller operations
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// Setup failed; the message is the user-facing diagnostic
    #[error("{0}")]
    Setup(String),

    #[error("{0}")]
    Start(String),

    #[error("{0}")]
    Processing(String),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("Session was reset before the operation completed")]
    Cancelled,
}

/// Controller settings
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub engine: EngineOptions,
    pub hints: ClientHints,
    pub beat_volume: u8,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            engine: EngineOptions::default(),
            hints: ClientHints::default(),
            beat_volume: DEFAULT_BEAT_VOLUME,
        }
    }
}

struct State {
    session: RecordingSession,
    /// Bumped by every forced teardown; stale continuations compare against it
    epoch: u64,
    beat: Option<BeatDescriptor>,
}

struct Inner<H: AudioHost> {
    engine: AudioEngine<H>,
    negotiator: AsyncMutex<DeviceNegotiator<H>>,
    state: Mutex<State>,
    snapshots: watch::Sender<SessionSnapshot>,
    beat_volume: AtomicU8,
    setup_gate: AsyncMutex<()>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Owns the visible session state and the engine lifecycle
pub struct RecordingSessionController<H: AudioHost + 'static> {
    inner: Arc<Inner<H>>,
}

impl<H: AudioHost + 'static> Clone for RecordingSessionController<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: AudioHost + 'static> RecordingSessionController<H> {
    pub fn new(host: Arc<H>, options: ControllerOptions) -> Self {
        let session = RecordingSession::new();
        let (snapshots, _) = watch::channel(session.snapshot());
        let negotiator = DeviceNegotiator::new(Arc::clone(&host), options.hints);

        Self {
            inner: Arc::new(Inner {
                engine: AudioEngine::new(host, options.engine),
                negotiator: AsyncMutex::new(negotiator),
                state: Mutex::new(State {
                    session,
                    epoch: 0,
                    beat: None,
                }),
                snapshots,
                beat_volume: AtomicU8::new(options.beat_volume.min(100)),
                setup_gate: AsyncMutex::new(()),
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn engine(&self) -> &AudioEngine<H> {
        &self.inner.engine
    }

    pub fn negotiator(&self) -> &AsyncMutex<DeviceNegotiator<H>> {
        &self.inner.negotiator
    }

    /// Follow session state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock_state().session.snapshot()
    }

    pub fn phase(&self) -> Phase {
        self.lock_state().session.phase()
    }

    /// The finished take, present only in Ready
    pub fn captured_audio(&self) -> Option<CapturedAudio> {
        self.lock_state().session.captured_audio().cloned()
    }

    pub fn selected_beat(&self) -> Option<BeatDescriptor> {
        self.lock_state().beat.clone()
    }

    pub fn beat_volume(&self) -> u8 {
        self.inner.beat_volume.load(Ordering::SeqCst)
    }

    /// Select the beat for the next session.
    /// A different beat forces teardown of the current session first.
    pub async fn select_beat(&self, beat: BeatDescriptor) {
        let changed = {
            let mut state = self.lock_state();
            let changed = state
                .beat
                .as_ref()
                .map(|current| !current.is_same_beat(&beat))
                .unwrap_or(true);
            state.beat = Some(beat);
            changed
        };

        if changed {
            self.force_reset("beat changed").await;
        }
    }

    /// Store the volume and ramp the live beat gain
    pub async fn set_beat_volume(&self, volume: u8) -> bool {
        let volume = volume.min(100);
        self.inner.beat_volume.store(volume, Ordering::SeqCst);
        self.inner.engine.set_beat_volume(volume).await
    }

    /// Idle -> Preparing -> Recording
    pub async fn start(&self) -> Result<(), ControllerError> {
        let (epoch, beat) = {
            let mut state = self.lock_state();
            let Some(beat) = state.beat.clone() else {
                return Err(ControllerError::Setup(
                    SetupError::NoBeatSelected.user_message(Default::default()),
                ));
            };
            state.session.apply(SessionEvent::StartRequested)?;
            self.publish(&state);
            (state.epoch, beat)
        };
        log::info!("Preparing session for beat {}", beat.id);

        let (profile, form_factor) = {
            let negotiator = self.inner.negotiator.lock().await;
            (negotiator.resolve_profile(), negotiator.form_factor())
        };
        let volume = self.beat_volume();

        let gate = self.inner.setup_gate.lock().await;
        if !self.is_current(epoch) {
            return Err(ControllerError::Cancelled);
        }

        // The previous graph must be gone before the microphone is acquired again
        self.inner.engine.teardown().await;
        let engine_epoch = self.inner.engine.epoch().await;

        let handle = match self
            .inner
            .engine
            .setup(&beat.audio_url, &profile, volume)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("Audio setup failed: {}", e);
                let message = e.user_message(form_factor);
                self.apply_if_current(epoch, SessionEvent::SetupFailed(message.clone()))
                    .ok();
                return Err(ControllerError::Setup(message));
            }
        };

        if !self.is_current(epoch) {
            handle.release().await;
            return Err(ControllerError::Cancelled);
        }
        if !self.inner.engine.install(handle, engine_epoch).await {
            return Err(ControllerError::Cancelled);
        }

        // Held through start so no other setup can install in between
        let started = self.inner.engine.start().await;
        drop(gate);

        if let Err(e) = started {
            log::warn!("Audio start failed: {}", e);
            self.inner.engine.teardown_if(engine_epoch).await;
            let message = e.user_message();
            self.apply_if_current(epoch, SessionEvent::SetupFailed(message.clone()))
                .ok();
            return Err(ControllerError::Start(message));
        }

        self.apply_if_current(epoch, SessionEvent::SetupSucceeded)?;
        self.spawn_timer(epoch);
        Ok(())
    }

    /// Recording -> Processing -> Ready
    pub async fn stop(&self) -> Result<CapturedAudio, ControllerError> {
        let epoch = self.lock_state().epoch;
        self.stop_session(epoch).await
    }

    async fn stop_session(&self, epoch: u64) -> Result<CapturedAudio, ControllerError> {
        let elapsed = {
            let mut state = self.lock_state();
            if state.epoch != epoch {
                return Err(ControllerError::Cancelled);
            }
            state.session.apply(SessionEvent::StopRequested)?;
            self.publish(&state);
            state.session.elapsed_seconds()
        };
        self.cancel_timer();

        // A forced reset while finalizing lets the next session install its
        // own graph; that one must survive this teardown
        let engine_epoch = self.inner.engine.epoch().await;
        let result = match self.inner.engine.stop().await {
            Ok(stopped) => self.inner.engine.finalize(stopped, elapsed).await,
            Err(e) => Err(e),
        };

        // Graph is not reused across takes
        self.inner.engine.teardown_if(engine_epoch).await;

        match result {
            Ok(audio) => {
                self.apply_if_current(epoch, SessionEvent::FinalizeSucceeded(audio.clone()))?;
                Ok(audio)
            }
            Err(e) => {
                log::warn!("Finalization failed: {}", e);
                let message = e.user_message();
                self.apply_if_current(epoch, SessionEvent::FinalizeFailed(message.clone()))?;
                Err(ControllerError::Processing(message))
            }
        }
    }

    /// Drop the current take or in-flight session and return to Idle
    pub async fn discard(&self) {
        self.force_reset("discarded").await;
    }

    /// Forced teardown on exit
    pub async fn shutdown(&self) {
        self.force_reset("shutdown").await;
    }

    /// Hand the finished take to the recordings API.
    /// On failure the session stays Ready with the take intact.
    pub async fn submit<A: RecordingApi>(
        &self,
        bridge: &SubmissionBridge<A>,
        metadata: &SubmissionMetadata,
    ) -> Result<UploadTicket, ControllerError> {
        let (epoch, audio) = {
            let state = self.lock_state();
            let audio = match (state.session.phase(), state.session.captured_audio()) {
                (Phase::Ready, Some(audio)) => audio.clone(),
                (current, _) => {
                    return Err(InvalidTransition {
                        current_phase: current,
                        action: "submit recording",
                    }
                    .into())
                }
            };
            (state.epoch, audio)
        };

        match bridge.submit(&audio, metadata).await {
            Ok(ticket) => {
                if self.is_current(epoch) {
                    self.force_reset("submitted").await;
                }
                Ok(ticket)
            }
            Err(e) => {
                log::warn!("Submission failed: {}", e);
                self.apply_if_current(epoch, SessionEvent::SubmissionFailed(e.to_string()))
                    .ok();
                Err(e.into())
            }
        }
    }

    async fn force_reset(&self, reason: &str) {
        {
            let mut state = self.lock_state();
            state.epoch += 1;
            if state.session.phase() != Phase::Idle || state.session.last_error().is_some() {
                log::info!("Resetting session ({})", reason);
            }
            if let Err(e) = state.session.apply(SessionEvent::Reset) {
                log::warn!("Reset rejected: {}", e);
            }
            self.publish(&state);
        }
        self.cancel_timer();
        self.inner.engine.teardown().await;
    }

    fn spawn_timer(&self, epoch: u64) {
        let controller = self.clone();
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + TICK_INTERVAL;
            let mut interval = tokio::time::interval_at(start, TICK_INTERVAL);
            loop {
                interval.tick().await;
                let outcome = {
                    let mut state = controller.lock_state();
                    if state.epoch != epoch {
                        break;
                    }
                    let outcome = state.session.tick();
                    controller.publish(&state);
                    outcome
                };
                match outcome {
                    TickOutcome::Counted(_) => {}
                    TickOutcome::LimitReached(elapsed) => {
                        log::info!("Recording limit reached at {}s, stopping", elapsed);
                        let stopper = controller.clone();
                        // Separate task: stopping cancels this timer
                        tokio::spawn(async move {
                            if let Err(e) = stopper.stop_session(epoch).await {
                                log::debug!("Auto-stop did not complete: {}", e);
                            }
                        });
                        break;
                    }
                    TickOutcome::Ignored => break,
                }
            }
        });

        let previous = self.lock_timer().replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn cancel_timer(&self) {
        if let Some(task) = self.lock_timer().take() {
            task.abort();
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock_state().epoch == epoch
    }

    fn apply_if_current(&self, epoch: u64, event: SessionEvent) -> Result<Phase, ControllerError> {
        let mut state = self.lock_state();
        if state.epoch != epoch {
            return Err(ControllerError::Cancelled);
        }
        let phase = state.session.apply(event)?;
        self.publish(&state);
        Ok(phase)
    }

    fn publish(&self, state: &State) {
        let snapshot = state.session.snapshot();
        log::debug!(
            "Session {} ({}s / {}s)",
            snapshot.phase,
            snapshot.elapsed_seconds,
            snapshot.max_duration_seconds
        );
        self.inner.snapshots.send_replace(snapshot);
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
