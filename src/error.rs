use thiserror::Error;

use crate::models::{SessionEvent, SessionState};

/// Main player error type
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),
}

impl PlayerError {
    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::Audio(err) => err.user_message(),
            PlayerError::Decode(err) => err.user_message(),
            PlayerError::Config(err) => err.user_message(),
            PlayerError::Session(err) => err.user_message(),
            PlayerError::File(err) => match err.kind() {
                std::io::ErrorKind::NotFound => "File or directory not found".to_string(),
                std::io::ErrorKind::PermissionDenied => {
                    "Permission denied - cannot access file".to_string()
                }
                _ => format!("File system error: {}", err),
            },
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::Audio(AudioError::DeviceNotFound { .. }) => ErrorSeverity::Error,
            PlayerError::Audio(AudioError::AlreadyPlaying) => ErrorSeverity::Warning,
            PlayerError::Audio(_) => ErrorSeverity::Critical,
            PlayerError::Decode(DecodeError::UnsupportedFormat { .. }) => ErrorSeverity::Warning,
            PlayerError::Decode(_) => ErrorSeverity::Error,
            PlayerError::Config(_) => ErrorSeverity::Warning,
            PlayerError::Session(SessionError::ScreenDisposed) => ErrorSeverity::Info,
            PlayerError::Session(_) => ErrorSeverity::Warning,
            PlayerError::File(_) => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error | ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Audio engine errors
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("Audio initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Unsupported sample format: {format}")]
    UnsupportedSampleFormat { format: String },

    #[error("A playback is already in progress")]
    AlreadyPlaying,

    #[error("Cannot open source: {0}")]
    Decode(#[from] DecodeError),
}

impl AudioError {
    pub fn user_message(&self) -> String {
        match self {
            AudioError::DeviceNotFound { device } => {
                format!("Audio device '{}' is not available or has been disconnected", device)
            }
            AudioError::InitializationFailed(msg) => {
                format!("Failed to initialize audio system: {}", msg)
            }
            AudioError::StreamError(msg) => format!("Audio playback interrupted: {}", msg),
            AudioError::UnsupportedSampleFormat { format } => {
                format!("The output device uses an unsupported sample format ({})", format)
            }
            AudioError::AlreadyPlaying => {
                "Playback is already running - stop it before starting another".to_string()
            }
            AudioError::Decode(err) => err.user_message(),
        }
    }
}

/// Audio decoding errors
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("No decodable audio track found")]
    NoAudioTrack,

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    pub fn user_message(&self) -> String {
        match self {
            DecodeError::UnsupportedFormat { format } => {
                format!("Audio format '{}' is not supported", format)
            }
            DecodeError::NoAudioTrack => "The file does not contain a playable audio track".to_string(),
            DecodeError::DecodeFailed(msg) => format!("Failed to decode audio data: {}", msg),
            DecodeError::Io(err) => format!("Cannot read audio file: {}", err),
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => format!("Cannot access configuration file: {}", err),
            ConfigError::SerializationError(_) => "Failed to save configuration settings".to_string(),
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
        }
    }
}

/// Playback session and screen lifecycle errors
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Invalid session transition: {event:?} in state {from:?}")]
    InvalidTransition { from: SessionState, event: SessionEvent },

    #[error("A playback session is already active")]
    SessionActive,

    #[error("Screen has been disposed")]
    ScreenDisposed,

    #[error("The session's player has already been released")]
    PlayerReleased,
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            SessionError::InvalidTransition { from, .. } => {
                format!("Playback cannot change state from '{}'", from.as_str())
            }
            SessionError::SessionActive => "Another track is still playing".to_string(),
            SessionError::ScreenDisposed => "The player screen has been closed".to_string(),
            SessionError::PlayerReleased => "This playback can no longer be started".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        let err = PlayerError::from(AudioError::AlreadyPlaying);
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.severity().log_level(), log::Level::Warn);

        let err = PlayerError::from(SessionError::ScreenDisposed);
        assert_eq!(err.severity(), ErrorSeverity::Info);

        let err = PlayerError::from(AudioError::StreamError("device lost".to_string()));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.severity().as_str(), "CRITICAL");
    }

    #[test]
    fn test_decode_error_wraps_into_audio_error() {
        let err: AudioError = DecodeError::NoAudioTrack.into();
        assert!(matches!(err, AudioError::Decode(DecodeError::NoAudioTrack)));
        assert!(err.user_message().contains("playable audio track"));
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = SessionError::InvalidTransition {
            from: SessionState::Finished,
            event: SessionEvent::Start,
        };
        assert!(err.user_message().contains("finished"));
        assert!(err.to_string().contains("Start"));
    }

    #[test]
    fn test_file_error_message() {
        let err = PlayerError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "x"));
        assert_eq!(err.user_message(), "File or directory not found");
    }
}
