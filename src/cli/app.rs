//! Session runner: one take from beat selection to submission

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use crate::application::ports::{BeatCatalog, ConfigStore, SubmissionMetadata};
use crate::application::{
    ControllerError, ControllerOptions, EngineOptions, RecordingSessionController,
    SubmissionBridge,
};
use crate::domain::audio::{BeatDescriptor, CapturedAudio};
use crate::domain::config::AppConfig;
use crate::domain::session::Phase;
use crate::infrastructure::{
    HttpBeatCatalog, HttpRecordingApi, NativeAudioHost, NativeHostConfig, XdgConfigStore,
};

use super::args::SessionOptions;
use super::presenter::Presenter;
use super::signals::ShutdownSignal;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Performer name used when none is configured
const ANONYMOUS_PERFORMER: &str = "Anonymous";

/// Failure of a CLI run, carrying its exit code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    Usage(String),
    Failed(String),
}

impl RunError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Usage(_) => ExitCode::from(EXIT_USAGE_ERROR),
            Self::Failed(_) => ExitCode::from(EXIT_ERROR),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Usage(m) | Self::Failed(m) => m,
        }
    }
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = match store.load().await {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Ignoring config file {}: {}", store.path().display(), e);
            AppConfig::empty()
        }
    };

    let env_config = AppConfig {
        api_url: env::var("BOOTH_API_URL").ok().filter(|s| !s.is_empty()),
        token: env::var("BOOTH_TOKEN").ok().filter(|s| !s.is_empty()),
        ..Default::default()
    };

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config)
        .merge(cli_config)
}

/// Whether media at `url` is reached over an encrypted or local transport
pub fn is_secure_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("file://") {
        return true;
    }
    if let Some(rest) = lower.strip_prefix("http://") {
        let authority = rest.split('/').next().unwrap_or_default();
        let host = if authority.starts_with('[') {
            authority.split(']').next().map(|h| format!("{}]", h)).unwrap_or_default()
        } else {
            authority.split(':').next().unwrap_or_default().to_string()
        };
        return matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]");
    }
    // Anything without a scheme is a local path
    !lower.contains("://")
}

/// Resolve the beat from `--beat-url` or the catalog
pub async fn resolve_beat(
    options: &SessionOptions,
    config: &AppConfig,
) -> Result<BeatDescriptor, RunError> {
    if let Some(url) = &options.beat_url {
        return Ok(BeatDescriptor::from_url(url.clone()));
    }
    let Some(id) = &options.beat_id else {
        return Err(RunError::Usage(
            "No beat selected. Pass --beat <ID> or --beat-url <URL> (see `freestyle-booth beats`)"
                .to_string(),
        ));
    };
    let catalog = HttpBeatCatalog::new(config.api_url_or_default(), config.token.clone());
    catalog
        .get_beat(id)
        .await
        .map_err(|e| RunError::Failed(e.to_string()))
}

/// Record one take and submit it
pub async fn run_session(options: SessionOptions, config: AppConfig) -> ExitCode {
    let mut presenter = Presenter::new();

    match record_and_submit(&options, &config, &mut presenter).await {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            presenter.stop_spinner();
            presenter.error(e.message());
            e.exit_code()
        }
    }
}

async fn record_and_submit(
    options: &SessionOptions,
    config: &AppConfig,
    presenter: &mut Presenter,
) -> Result<(), RunError> {
    let beat = resolve_beat(options, config).await?;

    let secure_transport = is_secure_url(&beat.audio_url)
        && (options.dry_run || is_secure_url(config.api_url_or_default()));
    let host = Arc::new(NativeAudioHost::new(NativeHostConfig {
        secure_transport,
        monitor_output: true,
    }));
    let controller = RecordingSessionController::new(
        host,
        ControllerOptions {
            engine: EngineOptions {
                formats: config.formats_or_default(),
                beat_load_timeout: config.beat_load_timeout_or_default(),
            },
            hints: config.client_hints(),
            beat_volume: config.beat_volume_or_default(),
        },
    );

    negotiate_devices(&controller, config, presenter).await;

    let shutdown = ShutdownSignal::new();
    shutdown
        .setup()
        .await
        .map_err(|e| RunError::Failed(format!("Failed to setup signal handler: {}", e)))?;

    controller.select_beat(beat.clone()).await;
    let result = take(&controller, &shutdown, &beat, presenter).await;

    let outcome = match result {
        Ok(audio) => deliver(&controller, options, config, &beat, &audio, presenter).await,
        Err(e) => Err(e),
    };

    controller.shutdown().await;
    outcome
}

async fn negotiate_devices(
    controller: &RecordingSessionController<NativeAudioHost>,
    config: &AppConfig,
    presenter: &Presenter,
) {
    let mut negotiator = controller.negotiator().lock().await;
    log::info!("Client form factor: {:?}", negotiator.form_factor());

    if let Err(e) = negotiator.refresh_devices().await {
        log::warn!("Could not list input devices: {}", e);
    }
    if let Some(wanted) = &config.input_device {
        let known = negotiator.devices().iter().any(|d| &d.device_id == wanted);
        if known {
            negotiator.select_device(Some(wanted.clone()));
        } else {
            presenter.warn(&format!(
                "Input device '{}' not found, using the default input",
                wanted
            ));
        }
    }
    negotiator.set_force_mono(config.force_mono_or_default());
    negotiator.set_monitor_self(config.monitor_microphone_or_default());
}

/// Prepare, record until stop or the time limit, and wait for the take
async fn take(
    controller: &RecordingSessionController<NativeAudioHost>,
    shutdown: &ShutdownSignal,
    beat: &BeatDescriptor,
    presenter: &mut Presenter,
) -> Result<CapturedAudio, RunError> {
    presenter.start_spinner(&format!("Loading \"{}\"...", beat.title));

    // Setup keeps running on its own task so Ctrl+C can tear it down mid-flight
    let mut start = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.start().await })
    };
    let started = tokio::select! {
        joined = &mut start => joined
            .map_err(|e| RunError::Failed(format!("Setup task failed: {}", e)))?,
        _ = shutdown.wait() => {
            controller.discard().await;
            let _ = (&mut start).await;
            return Err(RunError::Failed("Cancelled".to_string()));
        }
    };
    if let Err(e) = started {
        return Err(RunError::Failed(controller_message(e)));
    }

    let mut snapshots = controller.subscribe();
    let mut stop_requested = false;
    {
        let snapshot = snapshots.borrow_and_update().clone();
        presenter.update_recording_progress(snapshot.elapsed_seconds, snapshot.max_duration_seconds);
    }

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Err(RunError::Failed("Session ended unexpectedly".to_string()));
                }
                let snapshot = snapshots.borrow_and_update().clone();
                match snapshot.phase {
                    Phase::Recording => presenter
                        .update_recording_progress(snapshot.elapsed_seconds, snapshot.max_duration_seconds),
                    Phase::Processing => presenter.update_spinner("Finalizing take..."),
                    Phase::Ready => {
                        presenter.stop_spinner();
                        return controller
                            .captured_audio()
                            .ok_or_else(|| RunError::Failed("Take was discarded".to_string()));
                    }
                    Phase::Idle => {
                        return Err(RunError::Failed(
                            snapshot
                                .last_error
                                .unwrap_or_else(|| "Recording was reset".to_string()),
                        ));
                    }
                    Phase::Preparing => {}
                }
            }
            _ = shutdown.wait(), if !stop_requested => {
                stop_requested = true;
                presenter.update_spinner("Finalizing take...");
                let controller = controller.clone();
                // Outcome arrives through the snapshot channel
                tokio::spawn(async move {
                    if let Err(e) = controller.stop().await {
                        log::debug!("Stop request ignored: {}", e);
                    }
                });
            }
        }
    }
}

/// Submit a finished take. The take lives only in memory and is gone once
/// the process exits.
async fn deliver(
    controller: &RecordingSessionController<NativeAudioHost>,
    options: &SessionOptions,
    config: &AppConfig,
    beat: &BeatDescriptor,
    audio: &CapturedAudio,
    presenter: &mut Presenter,
) -> Result<(), RunError> {
    presenter.take_summary(audio);

    if options.dry_run {
        presenter.info("Dry run, not submitting");
        controller.discard().await;
        return Ok(());
    }

    let metadata = SubmissionMetadata {
        beat_id: beat.id.clone(),
        title: options
            .title
            .clone()
            .unwrap_or_else(|| format!("Freestyle over {}", beat.title)),
        explicit: options.explicit,
        performer_name: config
            .performer
            .clone()
            .unwrap_or_else(|| ANONYMOUS_PERFORMER.to_string()),
        bearer_token: config.token.clone().unwrap_or_default(),
    };

    let bridge = SubmissionBridge::new(HttpRecordingApi::new(config.api_url_or_default()));
    presenter.start_spinner("Uploading take...");
    match controller.submit(&bridge, &metadata).await {
        Ok(ticket) => {
            presenter.spinner_success(&format!("Submitted \"{}\" ({})", metadata.title, ticket.id));
            Ok(())
        }
        Err(e) => {
            presenter.spinner_fail(&controller_message(e));
            Err(RunError::Failed("Submission failed".to_string()))
        }
    }
}

fn controller_message(e: ControllerError) -> String {
    match e {
        ControllerError::Cancelled => "Cancelled".to_string(),
        other => other.to_string(),
    }
}
