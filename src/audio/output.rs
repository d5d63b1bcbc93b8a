use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig};
use log::{debug, info};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::{DeviceManager, OutputFormat};
use crate::audio::{open_source, AudioDecoder, AudioPlayer, FormatAdapter, SampleBuffer};
use crate::config::PlayerConfig;
use crate::error::AudioError;
use crate::logging::AudioLogger;
use crate::models::PlaybackSource;
use crate::playback::CompletionNotifier;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Flags shared by the decoder thread, the output thread and the cpal callback
#[derive(Debug, Default)]
struct PlaybackFlags {
    stop: AtomicBool,
    decode_done: AtomicBool,
    drained: AtomicBool,
    running: AtomicBool,
    failed: AtomicBool,
    failure: Mutex<Option<String>>,
}

impl PlaybackFlags {
    fn fail(&self, reason: String) {
        if let Ok(mut failure) = self.failure.lock() {
            failure.get_or_insert(reason);
        }
        self.failed.store(true, Ordering::Release);
    }

    fn should_halt(&self) -> bool {
        self.stop.load(Ordering::Acquire) || self.failed.load(Ordering::Acquire)
    }

    fn failure(&self) -> Option<String> {
        self.failure.lock().ok().and_then(|f| f.clone())
    }

    /// Completion to report, or `None` while playback should continue.
    /// A stop or failure wins over a drained buffer.
    fn outcome(&self) -> Option<bool> {
        if self.should_halt() {
            Some(false)
        } else if self.drained.load(Ordering::Acquire) {
            Some(true)
        } else {
            None
        }
    }
}

struct ActivePlayback {
    flags: Arc<PlaybackFlags>,
    decoder_thread: Option<JoinHandle<()>>,
    output_thread: Option<JoinHandle<()>>,
}

impl ActivePlayback {
    fn join(&mut self) {
        for handle in [self.decoder_thread.take(), self.output_thread.take()].into_iter().flatten() {
            if handle.join().is_err() {
                log::error!("Playback thread panicked");
            }
        }
    }
}

/// Real-time engine: a decoder thread fills a bounded buffer that the cpal
/// output stream drains on a dedicated output thread
pub struct CpalPlayer {
    device_manager: DeviceManager,
    volume: Arc<AtomicU32>,
    buffer_ms: u32,
    logger: AudioLogger,
    active: Option<ActivePlayback>,
}

impl CpalPlayer {
    /// Open the configured output device, or the default one if it is missing
    pub fn new(config: &PlayerConfig, logger: AudioLogger) -> Result<Self, AudioError> {
        let mut device_manager = DeviceManager::new()?;
        device_manager.select_device_with_fallback(config.preferred_device.as_deref())?;
        if let Some(name) = device_manager.current_device_name() {
            logger.log_device_selected(&name);
        }

        Ok(Self {
            device_manager,
            volume: Arc::new(AtomicU32::new(config.default_volume.clamp(0.0, 1.0).to_bits())),
            buffer_ms: config.buffer_ms,
            logger,
            active: None,
        })
    }

    fn join_active(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.join();
        }
    }
}

impl AudioPlayer for CpalPlayer {
    fn play(&mut self, source: PlaybackSource, notifier: CompletionNotifier) -> Result<(), AudioError> {
        if self.is_playing() {
            return Err(AudioError::AlreadyPlaying);
        }
        self.join_active();

        let device = self
            .device_manager
            .current_device()
            .cloned()
            .ok_or_else(|| AudioError::InitializationFailed("No device selected".to_string()))?;
        let output = self.device_manager.output_format()?;
        if !matches!(output.sample_format, SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16) {
            return Err(AudioError::UnsupportedSampleFormat {
                format: format!("{:?}", output.sample_format),
            });
        }

        let label = source.label();
        let decoder = open_source(source)?;
        info!(
            "Playing '{}' ({}) at {} Hz/{} ch",
            label,
            decoder.format().format_description(),
            output.sample_rate,
            output.channels
        );

        let buffer = Arc::new(SampleBuffer::for_duration(
            self.buffer_ms,
            output.sample_rate,
            output.channels,
        ));
        let flags = Arc::new(PlaybackFlags::default());
        flags.running.store(true, Ordering::Release);

        let decoder_thread = {
            let buffer = Arc::clone(&buffer);
            let decoder_flags = Arc::clone(&flags);
            let logger = self.logger.clone();
            let label = label.clone();
            thread::Builder::new()
                .name("aac-decoder".to_string())
                .spawn(move || decode_guarded(decoder, output, &buffer, &decoder_flags, &logger, &label))
                .map_err(|e| {
                    flags_after_spawn_failure(&flags);
                    AudioError::InitializationFailed(format!("Failed to create decoder thread: {}", e))
                })?
        };

        let output_thread = {
            let output_flags = Arc::clone(&flags);
            let volume = Arc::clone(&self.volume);
            let logger = self.logger.clone();
            thread::Builder::new()
                .name("audio-output".to_string())
                .spawn(move || run_output(device, output, buffer, output_flags, volume, logger, notifier))
        };

        let output_thread = match output_thread {
            Ok(handle) => handle,
            Err(e) => {
                flags_after_spawn_failure(&flags);
                let _ = decoder_thread.join();
                return Err(AudioError::InitializationFailed(format!(
                    "Failed to create audio thread: {}",
                    e
                )));
            }
        };

        self.active = Some(ActivePlayback {
            flags,
            decoder_thread: Some(decoder_thread),
            output_thread: Some(output_thread),
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(active) = &self.active {
            active.flags.stop.store(true, Ordering::Release);
        }
        self.join_active();
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.active
            .as_ref()
            .map_or(false, |a| a.flags.running.load(Ordering::Acquire))
    }
}

impl Drop for CpalPlayer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn flags_after_spawn_failure(flags: &PlaybackFlags) {
    flags.stop.store(true, Ordering::Release);
    flags.running.store(false, Ordering::Release);
}

/// Decode, convert to the device format and push into the buffer until done
fn run_decoder(
    mut decoder: Box<dyn AudioDecoder>,
    output: OutputFormat,
    buffer: &SampleBuffer,
    flags: &PlaybackFlags,
    logger: &AudioLogger,
    label: &str,
) {
    let mut adapter = FormatAdapter::new(decoder.format().sample_rate, output.sample_rate, output.channels);

    loop {
        if flags.should_halt() {
            return;
        }
        match decoder.decode_next() {
            Ok(Some(chunk)) => {
                let samples = adapter.process(&chunk);
                let mut written = 0;
                while written < samples.len() {
                    if flags.should_halt() {
                        return;
                    }
                    let n = buffer.write(&samples[written..]);
                    written += n;
                    if n == 0 {
                        thread::sleep(POLL_INTERVAL);
                    }
                }
            }
            Ok(None) => {
                debug!("Decoder reached end of '{}'", label);
                flags.decode_done.store(true, Ordering::Release);
                return;
            }
            Err(e) => {
                logger.log_decode_error(label, &e.to_string());
                flags.fail(e.to_string());
                return;
            }
        }
    }
}

/// `run_decoder` that turns a panic into a playback failure, so the output
/// thread stops waiting for a buffer that will never drain
fn decode_guarded(
    decoder: Box<dyn AudioDecoder>,
    output: OutputFormat,
    buffer: &SampleBuffer,
    flags: &PlaybackFlags,
    logger: &AudioLogger,
    label: &str,
) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        run_decoder(decoder, output, buffer, flags, logger, label)
    }));
    if result.is_err() {
        logger.log_decode_error(label, "decoder thread panicked");
        flags.fail("decoder thread panicked".to_string());
    }
}

/// Own the cpal stream until the source drains, fails or is stopped, then
/// deliver the single completion
fn run_output(
    device: cpal::Device,
    output: OutputFormat,
    buffer: Arc<SampleBuffer>,
    flags: Arc<PlaybackFlags>,
    volume: Arc<AtomicU32>,
    logger: AudioLogger,
    notifier: CompletionNotifier,
) {
    let success = panic::catch_unwind(AssertUnwindSafe(|| {
        let stream = open_stream(&device, output, &buffer, &flags, &volume, &logger);
        drive_output(stream, &flags, &logger)
    }))
    .unwrap_or_else(|_| {
        logger.log_stream_error("audio output thread panicked");
        flags.fail("audio output thread panicked".to_string());
        false
    });

    finish_playback(&flags, &notifier, success);
}

fn open_stream(
    device: &cpal::Device,
    output: OutputFormat,
    buffer: &Arc<SampleBuffer>,
    flags: &Arc<PlaybackFlags>,
    volume: &Arc<AtomicU32>,
    logger: &AudioLogger,
) -> Result<Stream, AudioError> {
    let config = StreamConfig {
        channels: output.channels,
        sample_rate: SampleRate(output.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = match output.sample_format {
        SampleFormat::I16 => build_stream::<i16>(device, &config, buffer, flags, volume, logger),
        SampleFormat::U16 => build_stream::<u16>(device, &config, buffer, flags, volume, logger),
        _ => build_stream::<f32>(device, &config, buffer, flags, volume, logger),
    }?;
    stream
        .play()
        .map_err(|e| AudioError::StreamError(format!("Failed to start stream: {}", e)))?;
    Ok(stream)
}

/// Keep the stream alive until `flags` settle on an outcome
fn drive_output<S: StreamTrait>(
    stream: Result<S, AudioError>,
    flags: &PlaybackFlags,
    logger: &AudioLogger,
) -> bool {
    match stream {
        Ok(stream) => {
            let success = wait_for_outcome(flags);
            let _ = stream.pause();
            success
        }
        Err(e) => {
            logger.log_stream_error(&e.to_string());
            flags.fail(e.to_string());
            false
        }
    }
}

fn wait_for_outcome(flags: &PlaybackFlags) -> bool {
    loop {
        if let Some(success) = flags.outcome() {
            return success;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn finish_playback(flags: &PlaybackFlags, notifier: &CompletionNotifier, success: bool) {
    if let Some(reason) = flags.failure() {
        debug!("Playback failed: {}", reason);
    }
    flags.running.store(false, Ordering::Release);
    notifier.notify(success);
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    buffer: &Arc<SampleBuffer>,
    flags: &Arc<PlaybackFlags>,
    volume: &Arc<AtomicU32>,
    logger: &AudioLogger,
) -> Result<Stream, AudioError>
where
    T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let buffer = Arc::clone(buffer);
    let data_flags = Arc::clone(flags);
    let error_flags = Arc::clone(flags);
    let volume = Arc::clone(volume);
    let logger = logger.clone();
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if scratch.len() < data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                let read = buffer.read(&mut scratch[..data.len()]);
                let gain = f32::from_bits(volume.load(Ordering::Relaxed));

                for (i, sample) in data.iter_mut().enumerate() {
                    let value = if i < read { scratch[i] * gain } else { 0.0 };
                    *sample = cpal::Sample::from_sample(value);
                }

                if read < data.len()
                    && data_flags.decode_done.load(Ordering::Acquire)
                    && buffer.is_empty()
                {
                    data_flags.drained.store(true, Ordering::Release);
                }
            },
            move |err| {
                logger.log_stream_error(&err.to_string());
                error_flags.fail(err.to_string());
            },
            None,
        )
        .map_err(|e| AudioError::StreamError(format!("Failed to build output stream: {}", e)))
}
