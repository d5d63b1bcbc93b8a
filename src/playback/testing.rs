//! Engine double whose completion is triggered by the test.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio::AudioPlayer;
use crate::error::{AudioError, DecodeError};
use crate::models::PlaybackSource;
use crate::playback::CompletionNotifier;

#[derive(Default)]
struct Shared {
    notifier: Mutex<Option<CompletionNotifier>>,
    plays: AtomicUsize,
    stops: AtomicUsize,
    released: AtomicBool,
}

/// Player that only finishes when its [`ScriptedControl`] says so
pub struct ScriptedPlayer {
    shared: Arc<Shared>,
    reject_play: bool,
}

/// Test-side handle for a [`ScriptedPlayer`]; usable from any thread
#[derive(Clone)]
pub struct ScriptedControl {
    shared: Arc<Shared>,
}

impl ScriptedPlayer {
    pub fn new() -> (Self, ScriptedControl) {
        let shared = Arc::new(Shared::default());
        let player = Self {
            shared: Arc::clone(&shared),
            reject_play: false,
        };
        (player, ScriptedControl { shared })
    }

    /// A player whose `play` fails as if the source could not be opened
    pub fn rejecting() -> (Self, ScriptedControl) {
        let (mut player, control) = Self::new();
        player.reject_play = true;
        (player, control)
    }
}

impl AudioPlayer for ScriptedPlayer {
    fn play(&mut self, _source: PlaybackSource, notifier: CompletionNotifier) -> Result<(), AudioError> {
        if self.reject_play {
            return Err(DecodeError::NoAudioTrack.into());
        }
        let mut slot = self.shared.notifier.lock().unwrap();
        if slot.as_ref().map_or(false, |n| !n.has_fired()) {
            return Err(AudioError::AlreadyPlaying);
        }
        *slot = Some(notifier);
        self.shared.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(notifier) = self.shared.notifier.lock().unwrap().as_ref() {
            if !notifier.has_fired() {
                notifier.notify(false);
            }
        }
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.shared
            .notifier
            .lock()
            .unwrap()
            .as_ref()
            .map_or(false, |n| !n.has_fired())
    }
}

impl Drop for ScriptedPlayer {
    fn drop(&mut self) {
        self.shared.released.store(true, Ordering::SeqCst);
    }
}

impl ScriptedControl {
    /// Fire the engine's completion; returns whether it was delivered
    pub fn finish(&self, success: bool) -> bool {
        match self.shared.notifier.lock().unwrap().as_ref() {
            Some(notifier) => notifier.notify(success),
            None => false,
        }
    }

    pub fn has_notifier(&self) -> bool {
        self.shared.notifier.lock().unwrap().is_some()
    }

    pub fn plays(&self) -> usize {
        self.shared.plays.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.shared.stops.load(Ordering::SeqCst)
    }

    /// Whether the player has been dropped by its owner
    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }
}
