use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::debug;

use crate::audio::{open_source, AudioDecoder, AudioPlayer};
use crate::error::AudioError;
use crate::logging::AudioLogger;
use crate::models::PlaybackSource;
use crate::playback::CompletionNotifier;

/// Engine that renders a source without an output device.
///
/// Decodes every packet on a worker thread and reports success once the
/// stream ends. With `paced` it sleeps for each chunk's playing time, which
/// makes it behave like a real-time player.
pub struct OfflinePlayer {
    paced: bool,
    stop_flag: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    rendered_frames: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
    logger: AudioLogger,
}

impl OfflinePlayer {
    pub fn new(logger: AudioLogger) -> Self {
        Self {
            paced: false,
            stop_flag: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            rendered_frames: Arc::new(AtomicU64::new(0)),
            worker: None,
            logger,
        }
    }

    pub fn paced(logger: AudioLogger) -> Self {
        let mut player = Self::new(logger);
        player.paced = true;
        player
    }

    /// Frames decoded by the current or last playback
    pub fn rendered_frames(&self) -> u64 {
        self.rendered_frames.load(Ordering::Acquire)
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Offline render thread panicked");
            }
        }
    }

    fn start_render(
        &mut self,
        mut decoder: Box<dyn AudioDecoder>,
        label: String,
        notifier: CompletionNotifier,
    ) -> Result<(), AudioError> {
        self.stop_flag.store(false, Ordering::Release);
        self.rendered_frames.store(0, Ordering::Release);
        self.running.store(true, Ordering::Release);

        let stop_flag = Arc::clone(&self.stop_flag);
        let running = Arc::clone(&self.running);
        let rendered = Arc::clone(&self.rendered_frames);
        let logger = self.logger.clone();
        let paced = self.paced;

        let worker = thread::Builder::new()
            .name("offline-render".to_string())
            .spawn(move || {
                let success = panic::catch_unwind(AssertUnwindSafe(|| {
                    render_to_end(decoder.as_mut(), &stop_flag, &rendered, paced, &logger, &label)
                }))
                .unwrap_or_else(|_| {
                    logger.log_decode_error(&label, "render thread panicked");
                    false
                });
                debug!(
                    "Offline render of '{}' ended after {} frames (success: {})",
                    label,
                    rendered.load(Ordering::Acquire),
                    success
                );
                running.store(false, Ordering::Release);
                notifier.notify(success);
            });

        match worker {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(AudioError::InitializationFailed(format!(
                    "Failed to spawn render thread: {}",
                    e
                )))
            }
        }
    }
}

/// Pull every chunk out of `decoder`; true when the stream ended normally
fn render_to_end(
    decoder: &mut dyn AudioDecoder,
    stop_flag: &AtomicBool,
    rendered: &AtomicU64,
    paced: bool,
    logger: &AudioLogger,
    label: &str,
) -> bool {
    loop {
        if stop_flag.load(Ordering::Acquire) {
            return false;
        }
        match decoder.decode_next() {
            Ok(Some(buffer)) => {
                rendered.fetch_add(buffer.frames as u64, Ordering::AcqRel);
                if paced {
                    thread::sleep(buffer.duration());
                }
            }
            Ok(None) => return true,
            Err(e) => {
                logger.log_decode_error(label, &e.to_string());
                return false;
            }
        }
    }
}

impl AudioPlayer for OfflinePlayer {
    fn play(&mut self, source: PlaybackSource, notifier: CompletionNotifier) -> Result<(), AudioError> {
        if self.running.load(Ordering::Acquire) {
            return Err(AudioError::AlreadyPlaying);
        }
        self.join_worker();

        let label = source.label();
        let decoder = open_source(source)?;
        self.start_render(decoder, label, notifier)
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.stop_flag.store(true, Ordering::Release);
        self.join_worker();
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for OfflinePlayer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
