use std::time::{Duration, Instant};

use crate::error::{AudioError, DecodeError, ErrorSeverity, PlayerError};
use crate::models::{AudioFormat, AudioMetadata, PlaybackUpdate, SessionState};
use crate::screen::ScreenPresenter;

/// Console presenter for the playback screen
#[derive(Debug, Default)]
pub struct StatusPresenter {
    last_state: Option<SessionState>,
    started: Option<Instant>,
    quiet: bool,
}

impl StatusPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presenter that tracks state without printing
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Self::default()
        }
    }

    pub fn last_state(&self) -> Option<SessionState> {
        self.last_state
    }

    /// One status line for an update
    pub fn render(update: &PlaybackUpdate, elapsed: Option<Duration>) -> String {
        let icon = match update.state {
            SessionState::NotStarted => "·",
            SessionState::Playing => "▶",
            SessionState::Finished => "✓",
            SessionState::Failed => "✗",
        };
        let mut line = format!(
            "{} {} {}: {}",
            icon,
            StatusDisplay::truncate(&update.source, 50),
            update.session,
            update.state.as_str()
        );
        if let Some(elapsed) = elapsed {
            line.push_str(&format!(" after {}", StatusDisplay::format_duration(elapsed)));
        }
        line
    }
}

impl ScreenPresenter for StatusPresenter {
    fn present(&mut self, update: &PlaybackUpdate) {
        let elapsed = match update.state {
            SessionState::Playing => {
                self.started = Some(Instant::now());
                None
            }
            state if state.is_terminal() => self.started.take().map(|t| t.elapsed()),
            _ => None,
        };
        self.last_state = Some(update.state);
        if !self.quiet {
            println!("{}", Self::render(update, elapsed));
        }
    }
}

/// Formatting helpers for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// Print stream format, duration and tags of a probed file
    pub fn display_probe(name: &str, format: &AudioFormat, duration: Duration, metadata: &AudioMetadata) {
        println!("┌─ {} ", Self::truncate(name, 54));
        println!("│ Format: {}", format.format_description());
        println!(
            "│ Channels: {} ({})",
            format.channels,
            Self::channel_description(format.channels)
        );
        println!(
            "│ Compression: {}",
            if format.codec.is_lossless() { "Lossless" } else { "Lossy" }
        );
        println!("│ Duration: {}", Self::format_duration(duration));

        if !metadata.is_empty() {
            println!("│");
            let tags = [
                ("Title", metadata.title.clone()),
                ("Artist", metadata.artist.clone()),
                ("Album", metadata.album.clone()),
                ("Year", metadata.year.map(|y| y.to_string())),
                ("Genre", metadata.genre.clone()),
            ];
            for (label, value) in tags {
                if let Some(value) = value {
                    println!("│ {}: {}", label, Self::truncate(&value, 50));
                }
            }
        }
        println!("└─────────────────────────────────────────────────────────");
    }

    /// Print an error with its severity and a hint where one helps
    pub fn display_error(error: &PlayerError) {
        let icon = match error.severity() {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };
        eprintln!("{} [{}] {}", icon, error.severity().as_str(), error.user_message());
        if let Some(hint) = Self::error_hint(error) {
            eprintln!("  {}", hint);
        }
    }

    fn error_hint(error: &PlayerError) -> Option<&'static str> {
        match error {
            PlayerError::Audio(AudioError::DeviceNotFound { .. }) => {
                Some("Use 'aacplay devices' to see available devices")
            }
            PlayerError::Audio(AudioError::Decode(DecodeError::UnsupportedFormat { .. }))
            | PlayerError::Decode(DecodeError::UnsupportedFormat { .. }) => {
                Some("Supported: AAC (ADTS, M4A), ALAC, MP3, FLAC, WAV")
            }
            PlayerError::Config(_) => Some("Configuration will use default values"),
            _ => None,
        }
    }

    /// Format duration as MM:SS or HH:MM:SS for longer sources
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    pub fn channel_description(channels: u16) -> &'static str {
        match channels {
            1 => "Mono",
            2 => "Stereo",
            6 => "5.1 Surround",
            8 => "7.1 Surround",
            _ => "Multichannel",
        }
    }

    /// Truncate to `max_len` characters, marking the cut with "..."
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", kept)
        }
    }
}
