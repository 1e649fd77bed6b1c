//! Freestyle Booth CLI entry point

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use freestyle_booth::application::DeviceNegotiator;
use freestyle_booth::cli::{
    app::{load_merged_config, run_session, EXIT_ERROR},
    args::{Cli, Commands},
    beats_cmd::handle_beats_command,
    config_cmd::handle_config_command,
    devices_cmd::handle_devices_command,
    presenter::Presenter,
};
use freestyle_booth::domain::config::AppConfig;
use freestyle_booth::infrastructure::{
    HttpBeatCatalog, NativeAudioHost, NativeHostConfig, XdgConfigStore,
};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_timestamp_millis()
        .init();

    let presenter = Presenter::new();

    // Config edits work on the file alone
    if let Some(Commands::Config { action }) = &cli.command {
        let store = XdgConfigStore::new();
        if let Err(e) = handle_config_command(action.clone(), &store, &presenter).await {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
        return ExitCode::SUCCESS;
    }

    let cli_config = AppConfig {
        api_url: cli.api_url.clone(),
        beat_volume: cli.volume,
        input_device: cli.device.clone(),
        force_mono: cli.mono.then_some(true),
        monitor_microphone: cli.monitor.then_some(true),
        ..Default::default()
    };
    let config = load_merged_config(cli_config).await;

    match &cli.command {
        Some(Commands::Beats) => {
            let catalog = HttpBeatCatalog::new(config.api_url_or_default(), config.token.clone());
            if let Err(e) = handle_beats_command(&catalog, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
        Some(Commands::Devices) => {
            let host = Arc::new(NativeAudioHost::new(NativeHostConfig::default()));
            let mut negotiator = DeviceNegotiator::new(host, config.client_hints());
            if let Err(e) = handle_devices_command(&mut negotiator, &config, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
        Some(Commands::Config { .. }) => ExitCode::SUCCESS,
        None => run_session(cli.session_options(), config).await,
    }
}
