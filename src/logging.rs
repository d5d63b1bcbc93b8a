use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use chrono::{DateTime, Utc};

use crate::models::{PlaybackOutcome, SessionId};

pub const LOG_LEVEL_ENV: &str = "AAC_PLAYER_LOG_LEVEL";

const DEFAULT_MAX_EVENTS: usize = 1000;

/// Playback event kept in the logger history
#[derive(Debug, Clone)]
pub struct PlaybackEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: PlaybackEventType,
    pub session: Option<SessionId>,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEventType {
    SessionStarted,
    SessionFinished,
    SessionFailed,
    PlaybackStopped,
    StaleNotification,
    DuplicateNotification,
    DecodeError,
    StreamError,
    DeviceSelected,
}

impl PlaybackEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackEventType::SessionStarted => "SESSION_STARTED",
            PlaybackEventType::SessionFinished => "SESSION_FINISHED",
            PlaybackEventType::SessionFailed => "SESSION_FAILED",
            PlaybackEventType::PlaybackStopped => "PLAYBACK_STOPPED",
            PlaybackEventType::StaleNotification => "STALE_NOTIFICATION",
            PlaybackEventType::DuplicateNotification => "DUPLICATE_NOTIFICATION",
            PlaybackEventType::DecodeError => "DECODE_ERROR",
            PlaybackEventType::StreamError => "STREAM_ERROR",
            PlaybackEventType::DeviceSelected => "DEVICE_SELECTED",
        }
    }
}

/// Logger for playback sessions; shared between the screen and engine threads
#[derive(Clone)]
pub struct AudioLogger {
    events: Arc<Mutex<VecDeque<PlaybackEvent>>>,
    max_events: usize,
}

impl Default for AudioLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioLogger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_EVENTS)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events,
        }
    }

    /// Initialize env_logger with the level from `AAC_PLAYER_LOG_LEVEL`
    pub fn init() -> Result<(), Box<dyn std::error::Error>> {
        let log_level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());

        let mut builder = env_logger::Builder::new();
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}:{}] {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        });
        builder.filter_level(parse_level(&log_level));
        builder.try_init()?;

        info!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Record an event and forward it to the log facade
    pub fn log_event(&self, event_type: PlaybackEventType, session: Option<SessionId>, details: String) {
        match event_type {
            PlaybackEventType::SessionStarted
            | PlaybackEventType::SessionFinished
            | PlaybackEventType::PlaybackStopped
            | PlaybackEventType::DeviceSelected => info!("[{}] {}", event_type.as_str(), details),
            PlaybackEventType::StaleNotification => debug!("[{}] {}", event_type.as_str(), details),
            PlaybackEventType::SessionFailed | PlaybackEventType::DuplicateNotification => {
                warn!("[{}] {}", event_type.as_str(), details)
            }
            PlaybackEventType::DecodeError | PlaybackEventType::StreamError => {
                error!("[{}] {}", event_type.as_str(), details)
            }
        }

        let event = PlaybackEvent {
            timestamp: Utc::now(),
            event_type,
            session,
            details,
        };

        if let Ok(mut events) = self.events.lock() {
            events.push_back(event);
            while events.len() > self.max_events {
                events.pop_front();
            }
        }
    }

    pub fn log_session_started(&self, session: SessionId, source: &str) {
        self.log_event(
            PlaybackEventType::SessionStarted,
            Some(session),
            format!("Session {} started playing '{}'", session, source),
        );
    }

    pub fn log_session_completed(&self, session: SessionId, outcome: PlaybackOutcome) {
        let (event_type, verb) = match outcome {
            PlaybackOutcome::Succeeded => (PlaybackEventType::SessionFinished, "finished"),
            PlaybackOutcome::Failed => (PlaybackEventType::SessionFailed, "failed"),
        };
        self.log_event(event_type, Some(session), format!("Session {} {}", session, verb));
    }

    pub fn log_playback_stopped(&self, session: Option<SessionId>, reason: &str) {
        self.log_event(
            PlaybackEventType::PlaybackStopped,
            session,
            format!("Playback stopped: {}", reason),
        );
    }

    pub fn log_stale_notification(&self, session: SessionId, success: bool) {
        self.log_event(
            PlaybackEventType::StaleNotification,
            Some(session),
            format!("Ignoring completion (success: {}) for inactive session {}", success, session),
        );
    }

    pub fn log_duplicate_notification(&self, success: bool) {
        self.log_event(
            PlaybackEventType::DuplicateNotification,
            None,
            format!("Engine reported completion twice (success: {}); dropped", success),
        );
    }

    pub fn log_decode_error(&self, source: &str, error: &str) {
        self.log_event(
            PlaybackEventType::DecodeError,
            None,
            format!("Decode error for '{}': {}", source, error),
        );
    }

    pub fn log_stream_error(&self, error: &str) {
        self.log_event(PlaybackEventType::StreamError, None, format!("Stream error: {}", error));
    }

    pub fn log_device_selected(&self, device: &str) {
        self.log_event(
            PlaybackEventType::DeviceSelected,
            None,
            format!("Audio device set to '{}'", device),
        );
    }

    /// Most recent events, oldest first
    pub fn get_recent_events(&self, count: usize) -> Vec<PlaybackEvent> {
        let events = match self.events.lock() {
            Ok(events) => events,
            Err(_) => return Vec::new(),
        };
        let skip = events.len().saturating_sub(count);
        events.iter().skip(skip).cloned().collect()
    }

    pub fn count(&self, event_type: PlaybackEventType) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| e.event_type == event_type).count())
            .unwrap_or(0)
    }

    pub fn clear_events(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}
