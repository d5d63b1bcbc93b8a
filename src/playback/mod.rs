pub mod dispatch;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::logging::AudioLogger;

pub use dispatch::{DispatchHandle, UiDispatcher};
pub use session::PlaybackSession;

/// Receives the engine's terminal "playback finished" signal.
///
/// Called on a thread owned by the engine. Implementations must not block
/// and must not touch UI state directly; post to the UI context instead.
pub trait PlaybackDelegate: Send + Sync {
    fn playback_finished(&self, success: bool);
}

impl<F> PlaybackDelegate for F
where
    F: Fn(bool) + Send + Sync,
{
    fn playback_finished(&self, success: bool) {
        self(success)
    }
}

/// Exactly-once wrapper around a delegate, handed to an engine for one playback.
///
/// Clones share the same guard, so an engine may keep copies on several
/// threads and still deliver a single notification.
#[derive(Clone)]
pub struct CompletionNotifier {
    delegate: Arc<dyn PlaybackDelegate>,
    fired: Arc<AtomicBool>,
    logger: Option<AudioLogger>,
}

impl CompletionNotifier {
    pub fn new(delegate: Arc<dyn PlaybackDelegate>) -> Self {
        Self {
            delegate,
            fired: Arc::new(AtomicBool::new(false)),
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: AudioLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Forward the completion to the delegate. Returns false if a completion
    /// was already delivered, in which case nothing happens.
    pub fn notify(&self, success: bool) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            match &self.logger {
                Some(logger) => logger.log_duplicate_notification(success),
                None => log::warn!("Duplicate completion (success: {}) dropped", success),
            }
            return false;
        }
        self.delegate.playback_finished(success);
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for CompletionNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionNotifier")
            .field("fired", &self.has_fired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::PlaybackEventType;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::thread;

    fn recording_delegate() -> (Arc<dyn PlaybackDelegate>, Arc<Mutex<Vec<bool>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let delegate: Arc<dyn PlaybackDelegate> =
            Arc::new(move |success: bool| sink.lock().unwrap().push(success));
        (delegate, calls)
    }

    #[test]
    fn test_closure_is_a_delegate() {
        let (delegate, calls) = recording_delegate();
        delegate.playback_finished(true);
        assert_eq!(*calls.lock().unwrap(), vec![true]);
    }

    #[test]
    fn test_notify_delivers_once() {
        let (delegate, calls) = recording_delegate();
        let notifier = CompletionNotifier::new(delegate);

        assert!(!notifier.has_fired());
        assert!(notifier.notify(false));
        assert!(!notifier.notify(true));
        assert!(notifier.has_fired());
        assert_eq!(*calls.lock().unwrap(), vec![false]);
    }

    #[test]
    fn test_clones_share_guard_across_threads() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let notifier = CompletionNotifier::new(Arc::new(move |_success: bool| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let n = notifier.clone();
                thread::spawn(move || n.notify(i % 2 == 0))
            })
            .collect();
        let delivered = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|d| *d)
            .count();

        assert_eq!(delivered, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_is_logged() {
        let (delegate, _calls) = recording_delegate();
        let logger = AudioLogger::new();
        let notifier = CompletionNotifier::new(delegate).with_logger(logger.clone());

        notifier.notify(true);
        notifier.notify(true);
        assert_eq!(logger.count(PlaybackEventType::DuplicateNotification), 1);
    }
}
