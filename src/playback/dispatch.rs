//! Hand-off from engine threads into the single-threaded UI context.
//!
//! Engine callbacks only ever hold a [`DispatchHandle`]. The receiving side
//! lives with the screen; once it is dropped every post is silently discarded.

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// Cloneable, thread-safe sender into a [`UiDispatcher`]
#[derive(Debug)]
pub struct DispatchHandle<E> {
    sender: UnboundedSender<E>,
}

impl<E> Clone for DispatchHandle<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<E> DispatchHandle<E> {
    /// Queue an event for the UI context. Returns false when the UI side is gone.
    pub fn post(&self, event: E) -> bool {
        self.sender.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Event queue drained on the UI context
pub struct UiDispatcher<E> {
    sender: UnboundedSender<E>,
    receiver: UnboundedReceiver<E>,
}

impl<E> Default for UiDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> UiDispatcher<E> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    pub fn handle(&self) -> DispatchHandle<E> {
        DispatchHandle {
            sender: self.sender.clone(),
        }
    }

    /// Next queued event without waiting
    pub fn try_next(&mut self) -> Option<E> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait for the next event. The dispatcher keeps its own sender, so this
    /// only returns once something is posted.
    pub async fn next(&mut self) -> Option<E> {
        self.receiver.recv().await
    }

    /// Take every event queued so far
    pub fn drain(&mut self) -> Vec<E> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next() {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_post_and_drain_preserves_order() {
        let mut dispatcher = UiDispatcher::new();
        let handle = dispatcher.handle();

        assert!(handle.post(1));
        assert!(handle.post(2));
        assert!(handle.post(3));
        assert_eq!(dispatcher.drain(), vec![1, 2, 3]);
        assert_eq!(dispatcher.try_next(), None);
    }

    #[test]
    fn test_post_from_other_thread() {
        let mut dispatcher = UiDispatcher::new();
        let handle = dispatcher.handle();

        thread::spawn(move || handle.post("done")).join().unwrap();
        assert_eq!(dispatcher.try_next(), Some("done"));
    }

    #[test]
    fn test_post_after_drop_is_discarded() {
        let dispatcher: UiDispatcher<u32> = UiDispatcher::new();
        let handle = dispatcher.handle();
        drop(dispatcher);

        assert!(handle.is_closed());
        assert!(!handle.post(7));
    }

    #[test]
    fn test_next_waits_for_post() {
        let mut dispatcher = UiDispatcher::new();
        let handle = dispatcher.handle();

        thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(20));
            handle.post(42u8);
        });

        assert_eq!(tokio_test::block_on(dispatcher.next()), Some(42));
    }
}
