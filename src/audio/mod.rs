pub mod buffer;
pub mod decoder;
pub mod device;
pub mod offline;
pub mod output;
pub mod resampler;

use std::time::Duration;

use crate::error::{AudioError, DecodeError};
use crate::models::{AudioBuffer, AudioFormat, AudioMetadata, PlaybackSource};
use crate::playback::CompletionNotifier;

pub use buffer::SampleBuffer;
pub use decoder::{AacDecoder, BufferDecoder};
pub use device::DeviceManager;
pub use offline::OfflinePlayer;
pub use output::CpalPlayer;
pub use resampler::FormatAdapter;

/// Core trait for audio decoding functionality
pub trait AudioDecoder: Send {
    /// Decode the next chunk of audio data; `Ok(None)` at end of stream
    fn decode_next(&mut self) -> Result<Option<AudioBuffer>, DecodeError>;

    /// Description of the decoded stream
    fn format(&self) -> &AudioFormat;

    fn metadata(&self) -> &AudioMetadata;

    /// Total duration, zero when the container does not say
    fn duration(&self) -> Duration;
}

/// Audio playback engine.
///
/// `play` fails synchronously when the source cannot be opened and then never
/// notifies. Once it returns `Ok`, the engine calls `notifier.notify` exactly
/// once from its own thread: `true` when the whole source was rendered,
/// `false` on a decode or stream error or when stopped before the end.
pub trait AudioPlayer: Send {
    fn play(&mut self, source: PlaybackSource, notifier: CompletionNotifier) -> Result<(), AudioError>;

    /// Stop an in-flight playback. Idempotent.
    fn stop(&mut self) -> Result<(), AudioError>;

    fn is_playing(&self) -> bool;
}

/// Open a decoder for any playback source
pub fn open_source(source: PlaybackSource) -> Result<Box<dyn AudioDecoder>, DecodeError> {
    match source {
        PlaybackSource::File(path) => Ok(Box::new(AacDecoder::open(&path)?)),
        PlaybackSource::Pcm(buffer) => Ok(Box::new(BufferDecoder::new(buffer)?)),
    }
}
