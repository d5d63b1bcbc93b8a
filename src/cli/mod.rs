use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{MAX_BUFFER_MS, MIN_BUFFER_MS};

pub mod status;
pub use status::{StatusDisplay, StatusPresenter};

/// AAC playback screen on the command line
#[derive(Debug, Parser)]
#[command(name = "aacplay")]
#[command(about = "Play AAC audio and report when playback finishes")]
#[command(version)]
pub struct CliApp {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Play a file through the output device; Ctrl-C stops
    Play {
        /// Audio file to play
        #[arg(value_parser = parse_path)]
        path: PathBuf,
        /// Volume level (0-100), defaults to the configured volume
        #[arg(long, value_parser = parse_volume)]
        volume: Option<u8>,
        /// Output device name, defaults to the configured device
        #[arg(long)]
        device: Option<String>,
    },
    /// Decode a whole file without a device and report the outcome
    Check {
        #[arg(value_parser = parse_path)]
        path: PathBuf,
    },
    /// Show stream format, duration and tags
    Probe {
        #[arg(value_parser = parse_path)]
        path: PathBuf,
    },
    /// List audio output devices
    Devices,
    /// Player configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Set the default volume (0-100)
    Volume {
        #[arg(value_parser = parse_volume)]
        level: u8,
    },
    /// Set the preferred output device; no name clears it
    Device { name: Option<String> },
    /// Set the output buffer length in milliseconds
    Buffer {
        #[arg(value_parser = parse_buffer_ms)]
        ms: u32,
    },
    /// Restore defaults
    Reset,
}

impl CliApp {
    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &str) -> PathBuf {
        match path.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(path)),
            None if path == "~" => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
            None => PathBuf::from(path),
        }
    }
}

fn parse_path(value: &str) -> Result<PathBuf, String> {
    if value.trim().is_empty() {
        return Err("path must not be empty".to_string());
    }
    Ok(CliApp::expand_path(value))
}

fn parse_volume(value: &str) -> Result<u8, String> {
    match value.parse::<u8>() {
        Ok(level) if level <= 100 => Ok(level),
        Ok(_) => Err(format!("volume {} out of range, expected 0-100", value)),
        Err(_) => Err(format!("'{}' is not a number 0-100", value)),
    }
}

fn parse_buffer_ms(value: &str) -> Result<u32, String> {
    match value.parse::<u32>() {
        Ok(ms) if (MIN_BUFFER_MS..=MAX_BUFFER_MS).contains(&ms) => Ok(ms),
        Ok(_) => Err(format!(
            "buffer {} ms out of range, expected {}-{}",
            value, MIN_BUFFER_MS, MAX_BUFFER_MS
        )),
        Err(_) => Err(format!("'{}' is not a number of milliseconds", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliApp, clap::Error> {
        CliApp::try_parse_from(std::iter::once("aacplay").chain(args.iter().copied()))
    }

    #[test]
    fn test_play_with_options() {
        let cli = parse(&["play", "/music/song.m4a", "--volume", "40", "--device", "USB DAC"]).unwrap();
        match cli.command {
            Commands::Play { path, volume, device } => {
                assert_eq!(path, PathBuf::from("/music/song.m4a"));
                assert_eq!(volume, Some(40));
                assert_eq!(device.as_deref(), Some("USB DAC"));
            }
            other => panic!("Expected Play, got {:?}", other),
        }
    }

    #[test]
    fn test_play_defaults() {
        let cli = parse(&["play", "song.aac"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Play { volume: None, device: None, .. }
        ));
    }

    #[test]
    fn test_volume_out_of_range() {
        assert!(parse(&["play", "song.aac", "--volume", "101"]).is_err());
        assert!(parse(&["config", "volume", "loud"]).is_err());
        assert!(parse(&["config", "volume", "100"]).is_ok());
    }

    #[test]
    fn test_play_requires_path() {
        assert!(parse(&["play"]).is_err());
        assert!(parse(&["check", ""]).is_err());
    }

    #[test]
    fn test_config_actions() {
        let cli = parse(&["config", "device"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config { action: ConfigAction::Device { name: None } }
        ));

        let cli = parse(&["config", "reset"]).unwrap();
        assert!(matches!(cli.command, Commands::Config { action: ConfigAction::Reset }));
    }

    #[test]
    fn test_config_buffer() {
        let cli = parse(&["config", "buffer", "250"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config { action: ConfigAction::Buffer { ms: 250 } }
        ));

        assert!(parse(&["config", "buffer", "10"]).is_err());
        assert!(parse(&["config", "buffer", "60000"]).is_err());
        assert!(parse(&["config", "buffer", "soon"]).is_err());
    }

    #[test]
    fn test_expand_path() {
        assert_eq!(CliApp::expand_path("/abs/file.m4a"), PathBuf::from("/abs/file.m4a"));
        assert_eq!(CliApp::expand_path("rel.aac"), PathBuf::from("rel.aac"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(CliApp::expand_path("~/a.m4a"), home.join("a.m4a"));
            assert_eq!(CliApp::expand_path("~"), home);
        }
    }
}
