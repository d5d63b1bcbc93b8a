//! The AAC playback screen.
//!
//! The screen owns at most one [`PlaybackSession`] at a time. Engines report
//! completion on their own threads; those reports are posted through a
//! [`DispatchHandle`] and applied here, on the thread that owns the screen.
//! After [`AacScreen::dispose`] the dispatcher is gone, so any report still in
//! flight is dropped without reaching the presenter.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::audio::AudioPlayer;
use crate::error::{AudioError, PlayerError, SessionError};
use crate::logging::AudioLogger;
use crate::models::{PlaybackSource, PlaybackUpdate, SessionId, SessionState};
use crate::playback::{DispatchHandle, PlaybackDelegate, PlaybackSession, UiDispatcher};

/// Builds a fresh engine for each session
pub type PlayerFactory = Box<dyn FnMut() -> Result<Box<dyn AudioPlayer>, AudioError>>;

/// Receives every state the screen shows, on the UI thread
pub trait ScreenPresenter {
    fn present(&mut self, update: &PlaybackUpdate);
}

/// Work queued for the UI thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenEvent {
    PlaybackFinished { session: SessionId, success: bool },
    StopRequested,
}

/// Delegate given to the engine; tags the completion with its session
struct SessionDelegate {
    session: SessionId,
    handle: DispatchHandle<ScreenEvent>,
}

impl PlaybackDelegate for SessionDelegate {
    fn playback_finished(&self, success: bool) {
        let posted = self.handle.post(ScreenEvent::PlaybackFinished {
            session: self.session,
            success,
        });
        if !posted {
            debug!("Screen gone, completion of session {} discarded", self.session);
        }
    }
}

pub struct AacScreen<P: ScreenPresenter> {
    presenter: P,
    player_factory: PlayerFactory,
    dispatcher: Option<UiDispatcher<ScreenEvent>>,
    session: Option<PlaybackSession>,
    next_id: u64,
    logger: AudioLogger,
}

impl<P: ScreenPresenter> AacScreen<P> {
    pub fn new(presenter: P, player_factory: PlayerFactory, logger: AudioLogger) -> Self {
        Self {
            presenter,
            player_factory,
            dispatcher: Some(UiDispatcher::new()),
            session: None,
            next_id: 1,
            logger,
        }
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn is_disposed(&self) -> bool {
        self.dispatcher.is_none()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id())
    }

    pub fn session_state(&self) -> Option<SessionState> {
        self.session.as_ref().map(|s| s.state())
    }

    /// Handle other threads can use to post events, e.g. a stop request from
    /// a signal handler. `None` once the screen is disposed.
    pub fn dispatch_handle(&self) -> Option<DispatchHandle<ScreenEvent>> {
        self.dispatcher.as_ref().map(|d| d.handle())
    }

    /// Start a new session for `source`.
    ///
    /// When the engine rejects the source the error is returned, the new
    /// session stays NotStarted and no completion will follow.
    pub fn start_playback(&mut self, source: PlaybackSource) -> Result<SessionId, PlayerError> {
        let handle = self
            .dispatcher
            .as_ref()
            .map(|d| d.handle())
            .ok_or(SessionError::ScreenDisposed)?;
        if self.session_state() == Some(SessionState::Playing) {
            return Err(SessionError::SessionActive.into());
        }

        let player = (self.player_factory)()?;
        let id = SessionId(self.next_id);
        self.next_id += 1;

        // replacing a terminal session also drops whatever it still held
        let session = self
            .session
            .insert(PlaybackSession::new(id, player).with_logger(self.logger.clone()));

        let label = source.label();
        let delegate: Arc<dyn PlaybackDelegate> = Arc::new(SessionDelegate { session: id, handle });
        if let Err(e) = session.start(source, delegate) {
            warn!("Session {} could not start '{}': {}", id, label, e);
            session.release();
            return Err(e);
        }

        info!("Session {} playing '{}'", id, label);
        self.present_current();
        Ok(id)
    }

    /// Ask the current engine to stop. The failure completion arrives
    /// through the dispatcher like any other.
    pub fn stop_playback(&mut self) -> Result<(), PlayerError> {
        match self.session.as_mut() {
            Some(session) => Ok(session.stop()?),
            None => Ok(()),
        }
    }

    /// Apply every queued event. Returns how many were handled.
    pub fn process_events(&mut self) -> usize {
        let events = match self.dispatcher.as_mut() {
            Some(dispatcher) => dispatcher.drain(),
            None => return 0,
        };
        let count = events.len();
        for event in events {
            self.handle_event(event);
        }
        count
    }

    /// Run the UI loop until the current session reaches a terminal state.
    ///
    /// Returns `None` when there is no session or the screen is disposed.
    pub async fn wait_for_completion(&mut self) -> Option<SessionState> {
        loop {
            let state = self.session_state()?;
            if state != SessionState::Playing {
                return Some(state);
            }
            let event = self.dispatcher.as_mut()?.next().await?;
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: ScreenEvent) {
        match event {
            ScreenEvent::PlaybackFinished { session, success } => {
                self.handle_completion(session, success)
            }
            ScreenEvent::StopRequested => {
                if let Err(e) = self.stop_playback() {
                    warn!("Stop request failed: {}", e);
                }
            }
        }
    }

    fn handle_completion(&mut self, id: SessionId, success: bool) {
        let current = match self.session.as_mut() {
            Some(session) if session.id() == id && session.state() == SessionState::Playing => session,
            _ => {
                self.logger.log_stale_notification(id, success);
                return;
            }
        };

        match current.complete(success) {
            Ok(_) => self.present_current(),
            Err(e) => warn!("Completion for session {} rejected: {}", id, e),
        }
    }

    fn present_current(&mut self) {
        if let Some(session) = &self.session {
            let update = PlaybackUpdate {
                session: session.id(),
                state: session.state(),
                source: session.source_label().to_string(),
            };
            self.presenter.present(&update);
        }
    }

    /// Tear the screen down: stop and release the engine, then close the
    /// dispatcher. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.dispatcher.is_none() {
            return;
        }
        if let Some(mut session) = self.session.take() {
            if session.state() == SessionState::Playing {
                self.logger
                    .log_playback_stopped(Some(session.id()), "screen disposed");
            }
            session.release();
        }
        self.dispatcher = None;
        debug!("Screen disposed");
    }
}

impl<P: ScreenPresenter> Drop for AacScreen<P> {
    fn drop(&mut self) {
        self.dispose();
    }
}
