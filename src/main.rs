use std::path::{Path, PathBuf};
use std::process::ExitCode;

use log::{info, warn};

use aac_player::audio::{AacDecoder, AudioDecoder, AudioPlayer, CpalPlayer, DeviceManager, OfflinePlayer};
use aac_player::cli::{CliApp, Commands, ConfigAction, StatusDisplay, StatusPresenter};
use aac_player::config::{ConfigManager, PlayerConfig};
use aac_player::error::PlayerError;
use aac_player::logging::{AudioLogger, LOG_LEVEL_ENV};
use aac_player::models::{PlaybackOutcome, PlaybackSource, SessionState};
use aac_player::screen::{AacScreen, PlayerFactory, ScreenEvent};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = <CliApp as clap::Parser>::parse();

    // The CLI is quiet unless asked otherwise
    if std::env::var(LOG_LEVEL_ENV).is_err() {
        std::env::set_var(LOG_LEVEL_ENV, "warn");
    }
    if let Err(e) = AudioLogger::init() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            StatusDisplay::display_error(&e);
            ExitCode::from(2)
        }
    }
}

async fn run(command: Commands) -> Result<ExitCode, PlayerError> {
    match command {
        Commands::Play { path, volume, device } => {
            let mut config = ConfigManager::new()?.get_config().clone();
            if let Some(level) = volume {
                config.default_volume = level as f32 / 100.0;
            }
            if device.is_some() {
                config.preferred_device = device;
            }
            play(path, config).await
        }
        Commands::Check { path } => check(path).await,
        Commands::Probe { path } => {
            probe(&path)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Devices => {
            list_devices()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { action } => {
            handle_config(action)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Exit status for a session's final state
fn exit_code(state: Option<SessionState>) -> ExitCode {
    match state.and_then(|s| s.outcome()) {
        Some(PlaybackOutcome::Succeeded) => ExitCode::SUCCESS,
        _ => ExitCode::from(1),
    }
}

async fn play(path: PathBuf, config: PlayerConfig) -> Result<ExitCode, PlayerError> {
    let logger = AudioLogger::new();
    let player_logger = logger.clone();
    let factory: PlayerFactory = Box::new(move || {
        let player = CpalPlayer::new(&config, player_logger.clone())?;
        Ok(Box::new(player) as Box<dyn AudioPlayer>)
    });

    let mut screen = AacScreen::new(StatusPresenter::new(), factory, logger);

    if let Some(handle) = screen.dispatch_handle() {
        let result = ctrlc::set_handler(move || {
            handle.post(ScreenEvent::StopRequested);
        });
        if let Err(e) = result {
            warn!("Ctrl-C will not stop playback: {}", e);
        }
    }

    let session = screen.start_playback(PlaybackSource::File(path))?;
    let state = screen.wait_for_completion().await;
    info!("Session {} ended: {:?}", session, state);
    screen.dispose();
    Ok(exit_code(state))
}

async fn check(path: PathBuf) -> Result<ExitCode, PlayerError> {
    let logger = AudioLogger::new();
    let player_logger = logger.clone();
    let factory: PlayerFactory = Box::new(move || {
        Ok(Box::new(OfflinePlayer::new(player_logger.clone())) as Box<dyn AudioPlayer>)
    });

    let mut screen = AacScreen::new(StatusPresenter::new(), factory, logger);
    screen.start_playback(PlaybackSource::File(path))?;
    let state = screen.wait_for_completion().await;
    screen.dispose();
    Ok(exit_code(state))
}

fn probe(path: &Path) -> Result<(), PlayerError> {
    let decoder = AacDecoder::open(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    StatusDisplay::display_probe(&name, decoder.format(), decoder.duration(), decoder.metadata());
    Ok(())
}

fn list_devices() -> Result<(), PlayerError> {
    let manager = DeviceManager::new()?;
    let preferred = ConfigManager::new()
        .ok()
        .and_then(|c| c.get_config().preferred_device.clone());

    let devices = manager.list_devices();
    if devices.is_empty() {
        println!("No output devices found");
        return Ok(());
    }
    println!("Output devices:");
    for name in devices {
        let marker = if preferred.as_deref() == Some(name.as_str()) { "*" } else { " " };
        println!(" {} {}", marker, name);
    }
    Ok(())
}

fn handle_config(action: ConfigAction) -> Result<(), PlayerError> {
    let mut manager = ConfigManager::new()?;
    match action {
        ConfigAction::Show => {
            let config = manager.get_config();
            println!("Config file: {}", manager.config_path().display());
            println!("Volume: {}%", (config.default_volume * 100.0).round() as u8);
            println!(
                "Device: {}",
                config.preferred_device.as_deref().unwrap_or("Default")
            );
            println!("Buffer: {} ms", config.buffer_ms);
        }
        ConfigAction::Volume { level } => {
            manager.set_volume(level as f32 / 100.0)?;
            println!("Default volume set to {}%", level);
        }
        ConfigAction::Device { name } => {
            manager.set_preferred_device(name.clone())?;
            match name {
                Some(device) => println!("Preferred device set to '{}'", device),
                None => println!("Preferred device cleared"),
            }
        }
        ConfigAction::Buffer { ms } => {
            manager.set_buffer_ms(ms)?;
            println!("Output buffer set to {} ms", manager.get_config().buffer_ms);
        }
        ConfigAction::Reset => {
            manager.reset_to_defaults()?;
            println!("Configuration reset to defaults");
        }
    }
    Ok(())
}
