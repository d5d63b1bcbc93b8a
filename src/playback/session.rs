use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::audio::AudioPlayer;
use crate::error::{AudioError, PlayerError, SessionError};
use crate::logging::AudioLogger;
use crate::models::{PlaybackOutcome, PlaybackSource, SessionEvent, SessionId, SessionState};
use crate::playback::{CompletionNotifier, PlaybackDelegate};

/// One playback of one source, owning its player until it ends
pub struct PlaybackSession {
    id: SessionId,
    source_label: String,
    state: SessionState,
    player: Option<Box<dyn AudioPlayer>>,
    logger: Option<AudioLogger>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl PlaybackSession {
    pub fn new(id: SessionId, player: Box<dyn AudioPlayer>) -> Self {
        Self {
            id,
            source_label: String::new(),
            state: SessionState::NotStarted,
            player: Some(player),
            logger: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_logger(mut self, logger: AudioLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn has_player(&self) -> bool {
        self.player.is_some()
    }

    /// Hand the source to the player and move to Playing.
    ///
    /// If the player rejects the source the session stays NotStarted and the
    /// delegate is never called.
    pub fn start(
        &mut self,
        source: PlaybackSource,
        delegate: Arc<dyn PlaybackDelegate>,
    ) -> Result<(), PlayerError> {
        let next = self.state.apply(SessionEvent::Start)?;
        let player = self.player.as_mut().ok_or(SessionError::PlayerReleased)?;

        let mut notifier = CompletionNotifier::new(delegate);
        if let Some(logger) = &self.logger {
            notifier = notifier.with_logger(logger.clone());
        }

        let label = source.label();
        player.play(source, notifier)?;

        self.source_label = label;
        self.state = next;
        self.started_at = Some(Utc::now());
        if let Some(logger) = &self.logger {
            logger.log_session_started(self.id, &self.source_label);
        }
        Ok(())
    }

    /// Apply the engine's completion and release the player
    pub fn complete(&mut self, success: bool) -> Result<SessionState, SessionError> {
        let outcome = PlaybackOutcome::from_success(success);
        let next = self.state.apply(SessionEvent::from(outcome))?;
        self.state = next;
        self.finished_at = Some(Utc::now());
        if let Some(logger) = &self.logger {
            logger.log_session_completed(self.id, outcome);
        }
        self.release();
        Ok(next)
    }

    /// Ask a playing engine to stop; its completion still arrives through the delegate
    pub fn stop(&mut self) -> Result<(), AudioError> {
        if self.state != SessionState::Playing {
            return Ok(());
        }
        match self.player.as_mut() {
            Some(player) => {
                player.stop()?;
                if let Some(logger) = &self.logger {
                    logger.log_playback_stopped(Some(self.id), "stop requested");
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Stop the engine if needed and drop the player handle
    pub fn release(&mut self) {
        if let Some(mut player) = self.player.take() {
            if player.is_playing() {
                if let Err(e) = player.stop() {
                    log::warn!("Failed to stop player for session {}: {}", self.id, e);
                }
            }
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AudioBuffer;
    use crate::playback::testing::ScriptedPlayer;
    use std::sync::Mutex;

    fn source() -> PlaybackSource {
        PlaybackSource::Pcm(AudioBuffer::new(2, 44100, 441))
    }

    fn recording_delegate() -> (Arc<dyn PlaybackDelegate>, Arc<Mutex<Vec<bool>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let delegate: Arc<dyn PlaybackDelegate> =
            Arc::new(move |s: bool| sink.lock().unwrap().push(s));
        (delegate, calls)
    }

    #[test]
    fn test_new_session_is_not_started() {
        let (player, control) = ScriptedPlayer::new();
        let session = PlaybackSession::new(SessionId(1), Box::new(player));

        assert_eq!(session.state(), SessionState::NotStarted);
        assert!(session.has_player());
        assert!(session.started_at().is_none());
        assert!(!control.has_notifier());
    }

    #[test]
    fn test_start_then_success_finishes() {
        let (player, control) = ScriptedPlayer::new();
        let mut session = PlaybackSession::new(SessionId(1), Box::new(player));
        let (delegate, calls) = recording_delegate();

        session.start(source(), delegate).unwrap();
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(control.plays(), 1);

        assert!(control.finish(true));
        assert_eq!(*calls.lock().unwrap(), vec![true]);
        assert_eq!(session.complete(true), Ok(SessionState::Finished));
        assert!(!session.has_player());
        assert!(session.finished_at().is_some());
    }

    #[test]
    fn test_start_then_failure_fails() {
        let (player, control) = ScriptedPlayer::new();
        let mut session = PlaybackSession::new(SessionId(2), Box::new(player));
        let (delegate, _calls) = recording_delegate();

        session.start(source(), delegate).unwrap();
        control.finish(false);
        assert_eq!(session.complete(false), Ok(SessionState::Failed));
    }

    #[test]
    fn test_second_completion_is_rejected() {
        let (player, _control) = ScriptedPlayer::new();
        let mut session = PlaybackSession::new(SessionId(3), Box::new(player));
        let (delegate, _calls) = recording_delegate();

        session.start(source(), delegate).unwrap();
        session.complete(true).unwrap();
        assert_eq!(
            session.complete(false),
            Err(SessionError::InvalidTransition {
                from: SessionState::Finished,
                event: SessionEvent::EngineFailed,
            })
        );
        assert_eq!(session.state(), SessionState::Finished);
    }

    #[test]
    fn test_completion_without_start_is_rejected() {
        let (player, _control) = ScriptedPlayer::new();
        let mut session = PlaybackSession::new(SessionId(4), Box::new(player));
        assert!(session.complete(true).is_err());
        assert_eq!(session.state(), SessionState::NotStarted);
    }

    #[test]
    fn test_rejected_source_leaves_session_not_started() {
        let (player, control) = ScriptedPlayer::rejecting();
        let mut session = PlaybackSession::new(SessionId(5), Box::new(player));
        let (delegate, calls) = recording_delegate();

        let result = session.start(source(), delegate);
        assert!(matches!(result, Err(PlayerError::Audio(AudioError::Decode(_)))));
        assert_eq!(session.state(), SessionState::NotStarted);
        assert!(!control.has_notifier());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let (player, _control) = ScriptedPlayer::new();
        let mut session = PlaybackSession::new(SessionId(6), Box::new(player));
        let (delegate, _calls) = recording_delegate();

        session.start(source(), Arc::clone(&delegate)).unwrap();
        let second = session.start(source(), delegate);
        assert!(matches!(second, Err(PlayerError::Session(SessionError::InvalidTransition { .. }))));
    }

    #[test]
    fn test_stop_reports_failure_through_delegate() {
        let (player, control) = ScriptedPlayer::new();
        let mut session = PlaybackSession::new(SessionId(7), Box::new(player));
        let (delegate, calls) = recording_delegate();

        session.start(source(), delegate).unwrap();
        session.stop().unwrap();
        assert_eq!(control.stops(), 1);
        assert_eq!(*calls.lock().unwrap(), vec![false]);
    }

    #[test]
    fn test_drop_stops_playing_engine() {
        let (player, control) = ScriptedPlayer::new();
        let mut session = PlaybackSession::new(SessionId(8), Box::new(player));
        let (delegate, _calls) = recording_delegate();

        session.start(source(), delegate).unwrap();
        drop(session);
        assert_eq!(control.stops(), 1);
    }

    #[test]
    fn test_start_after_release_fails() {
        let (player, _control) = ScriptedPlayer::new();
        let mut session = PlaybackSession::new(SessionId(9), Box::new(player));
        let (delegate, _calls) = recording_delegate();

        session.release();
        let result = session.start(source(), delegate);
        assert!(matches!(result, Err(PlayerError::Session(SessionError::PlayerReleased))));
    }

    #[test]
    fn test_logger_records_lifecycle() {
        let logger = AudioLogger::new();
        let (player, _control) = ScriptedPlayer::new();
        let mut session =
            PlaybackSession::new(SessionId(10), Box::new(player)).with_logger(logger.clone());
        let (delegate, _calls) = recording_delegate();

        session.start(source(), delegate).unwrap();
        session.complete(false).unwrap();

        let events = logger.get_recent_events(10);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].session, Some(SessionId(10)));
    }
}
