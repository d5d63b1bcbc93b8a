use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::SessionError;

/// Audio metadata extracted from files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AudioMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<u32>,
    pub genre: Option<String>,
}

impl AudioMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if metadata has any information
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.year.is_none()
            && self.genre.is_none()
    }
}

/// Stream description of a decoded source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub bit_depth: u16,
    pub channels: u16,
    pub codec: AudioCodec,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, bit_depth: u16, channels: u16, codec: AudioCodec) -> Self {
        Self {
            sample_rate,
            bit_depth,
            channels,
            codec,
        }
    }

    /// Get a human-readable format description
    pub fn format_description(&self) -> String {
        format!(
            "{} - {}-bit/{} Hz - {} channel{}",
            self.codec.name(),
            self.bit_depth,
            self.sample_rate,
            self.channels,
            if self.channels == 1 { "" } else { "s" }
        )
    }
}

/// Codecs the player can hand to the decoder
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AudioCodec {
    Aac,
    Alac,
    Mp3,
    Flac,
    Pcm,
}

impl AudioCodec {
    pub fn name(&self) -> &'static str {
        match self {
            AudioCodec::Aac => "AAC",
            AudioCodec::Alac => "ALAC",
            AudioCodec::Mp3 => "MP3",
            AudioCodec::Flac => "FLAC",
            AudioCodec::Pcm => "PCM",
        }
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self, AudioCodec::Alac | AudioCodec::Flac | AudioCodec::Pcm)
    }
}

/// Audio buffer holding interleaved f32 samples
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
    pub frames: usize,
}

impl AudioBuffer {
    pub fn new(channels: u16, sample_rate: u32, frames: usize) -> Self {
        Self {
            samples: vec![0.0; frames * channels as usize],
            channels,
            sample_rate,
            frames,
        }
    }

    /// Build a buffer from interleaved samples; trailing partial frames are dropped
    pub fn from_interleaved(mut samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        let frames = if channels == 0 { 0 } else { samples.len() / channels as usize };
        samples.truncate(frames * channels as usize);
        Self {
            samples,
            channels,
            sample_rate,
            frames,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playing time of the buffer at its own sample rate
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64)
    }
}

/// What an engine is asked to play
#[derive(Debug, Clone)]
pub enum PlaybackSource {
    File(PathBuf),
    Pcm(AudioBuffer),
}

impl PlaybackSource {
    /// Short label used in logs and on screen
    pub fn label(&self) -> String {
        match self {
            PlaybackSource::File(path) => path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown")
                .to_string(),
            PlaybackSource::Pcm(buffer) => format!(
                "pcm buffer ({} frames @ {} Hz)",
                buffer.frames, buffer.sample_rate
            ),
        }
    }
}

/// Identifier of a playback session, unique per screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of one playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    NotStarted,
    Playing,
    Finished,
    Failed,
}

/// Inputs that drive the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    Start,
    EngineSucceeded,
    EngineFailed,
}

impl From<PlaybackOutcome> for SessionEvent {
    fn from(outcome: PlaybackOutcome) -> Self {
        match outcome {
            PlaybackOutcome::Succeeded => SessionEvent::EngineSucceeded,
            PlaybackOutcome::Failed => SessionEvent::EngineFailed,
        }
    }
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NotStarted => "not started",
            SessionState::Playing => "playing",
            SessionState::Finished => "finished",
            SessionState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finished | SessionState::Failed)
    }

    /// How the session ended, if it has
    pub fn outcome(&self) -> Option<PlaybackOutcome> {
        match self {
            SessionState::Finished => Some(PlaybackOutcome::Succeeded),
            SessionState::Failed => Some(PlaybackOutcome::Failed),
            _ => None,
        }
    }

    /// Next state for `event`, or an error if the pair is not a valid transition
    pub fn apply(self, event: SessionEvent) -> Result<SessionState, SessionError> {
        match (self, event) {
            (SessionState::NotStarted, SessionEvent::Start) => Ok(SessionState::Playing),
            (SessionState::Playing, SessionEvent::EngineSucceeded) => Ok(SessionState::Finished),
            (SessionState::Playing, SessionEvent::EngineFailed) => Ok(SessionState::Failed),
            (from, event) => Err(SessionError::InvalidTransition { from, event }),
        }
    }
}

/// Terminal result of a playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackOutcome {
    Succeeded,
    Failed,
}

impl PlaybackOutcome {
    pub fn from_success(success: bool) -> Self {
        if success {
            PlaybackOutcome::Succeeded
        } else {
            PlaybackOutcome::Failed
        }
    }
}

/// State change handed to the screen's presenter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackUpdate {
    pub session: SessionId,
    pub state: SessionState,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [SessionState; 4] = [
        SessionState::NotStarted,
        SessionState::Playing,
        SessionState::Finished,
        SessionState::Failed,
    ];

    const ALL_EVENTS: [SessionEvent; 3] = [
        SessionEvent::Start,
        SessionEvent::EngineSucceeded,
        SessionEvent::EngineFailed,
    ];

    #[test]
    fn test_valid_transitions() {
        assert_eq!(SessionState::NotStarted.apply(SessionEvent::Start), Ok(SessionState::Playing));
        assert_eq!(
            SessionState::Playing.apply(SessionEvent::EngineSucceeded),
            Ok(SessionState::Finished)
        );
        assert_eq!(
            SessionState::Playing.apply(SessionEvent::EngineFailed),
            Ok(SessionState::Failed)
        );
    }

    #[test]
    fn test_only_three_transitions_exist() {
        let valid: Vec<_> = ALL_STATES
            .iter()
            .flat_map(|s| ALL_EVENTS.iter().map(move |e| (*s, *e)))
            .filter(|(s, e)| s.apply(*e).is_ok())
            .collect();
        assert_eq!(valid.len(), 3);
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for state in [SessionState::Finished, SessionState::Failed] {
            assert!(state.is_terminal());
            for event in ALL_EVENTS {
                assert_eq!(
                    state.apply(event),
                    Err(SessionError::InvalidTransition { from: state, event })
                );
            }
        }
    }

    #[test]
    fn test_not_started_ignores_completion() {
        assert!(SessionState::NotStarted.apply(SessionEvent::EngineSucceeded).is_err());
        assert!(SessionState::NotStarted.apply(SessionEvent::EngineFailed).is_err());
    }

    #[test]
    fn test_completion_flag_mapping() {
        let succeeded = PlaybackOutcome::from_success(true);
        let failed = PlaybackOutcome::from_success(false);
        assert_eq!(succeeded, PlaybackOutcome::Succeeded);
        assert_eq!(failed, PlaybackOutcome::Failed);
        assert_eq!(SessionEvent::from(succeeded), SessionEvent::EngineSucceeded);
        assert_eq!(SessionEvent::from(failed), SessionEvent::EngineFailed);
    }

    #[test]
    fn test_terminal_states_carry_outcome() {
        assert_eq!(SessionState::NotStarted.outcome(), None);
        assert_eq!(SessionState::Playing.outcome(), None);
        assert_eq!(SessionState::Finished.outcome(), Some(PlaybackOutcome::Succeeded));
        assert_eq!(SessionState::Failed.outcome(), Some(PlaybackOutcome::Failed));
    }

    #[test]
    fn test_audio_buffer_from_interleaved() {
        let buffer = AudioBuffer::from_interleaved(vec![0.1, 0.2, 0.3, 0.4, 0.5], 2, 48000);
        assert_eq!(buffer.frames, 2);
        assert_eq!(buffer.samples.len(), 4);

        let one_second = AudioBuffer::new(1, 44100, 44100);
        assert_eq!(one_second.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_format_description() {
        let format = AudioFormat::new(44100, 16, 2, AudioCodec::Aac);
        assert_eq!(format.format_description(), "AAC - 16-bit/44100 Hz - 2 channels");
        assert!(!format.codec.is_lossless());

        let mono = AudioFormat::new(48000, 24, 1, AudioCodec::Alac);
        assert!(mono.format_description().ends_with("1 channel"));
    }

    #[test]
    fn test_source_label() {
        let file = PlaybackSource::File(PathBuf::from("/music/take.m4a"));
        assert_eq!(file.label(), "take.m4a");

        let pcm = PlaybackSource::Pcm(AudioBuffer::new(2, 8000, 80));
        assert!(pcm.label().contains("80 frames"));
    }

    #[test]
    fn test_update_serializes_to_json() {
        let update = PlaybackUpdate {
            session: SessionId(3),
            state: SessionState::Finished,
            source: "take.m4a".to_string(),
        };
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"Finished\""));
        let back: PlaybackUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, update);
    }
}
