use std::fs::File;
use std::path::Path;
use std::time::Duration;

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer as SymphoniaSampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey, Value};
use symphonia::core::probe::Hint;

use crate::audio::AudioDecoder;
use crate::error::DecodeError;
use crate::models::{AudioBuffer, AudioCodec, AudioFormat, AudioMetadata};

/// Corrupt packets skipped in a row before decoding is abandoned
const MAX_DECODE_RETRIES: usize = 3;

/// Frames per chunk emitted by [`BufferDecoder`]
const PCM_CHUNK_FRAMES: usize = 1024;

/// Symphonia-backed decoder for AAC (ADTS or MP4/M4A) and the other codecs
/// the converter produces
pub struct AacDecoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    format: AudioFormat,
    metadata: AudioMetadata,
    duration: Duration,
    consecutive_errors: usize,
}

impl AacDecoder {
    /// Open `path` and prepare its first decodable audio track
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let media_source = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let mut probed = symphonia::default::get_probe()
            .format(&hint, media_source, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat {
                format: format!("probe failed: {}", e),
            })?;

        let mut metadata = AudioMetadata::new();
        if let Some(revision) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
            extract_tags(revision, &mut metadata);
        }
        if let Some(revision) = probed.format.metadata().current() {
            extract_tags(revision, &mut metadata);
        }

        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;

        let codec = codec_for(track.codec_params.codec).ok_or_else(|| DecodeError::UnsupportedFormat {
            format: symphonia::default::get_codecs()
                .get_codec(track.codec_params.codec)
                .map(|d| d.short_name.to_string())
                .unwrap_or_else(|| "unknown codec".to_string()),
        })?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::DecodeFailed(format!("Failed to create decoder: {}", e)))?;

        let params = &track.codec_params;
        let sample_rate = params.sample_rate.unwrap_or(44100);
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(2);
        let bit_depth = params
            .bits_per_sample
            .or(params.bits_per_coded_sample)
            .map(|b| b as u16)
            .unwrap_or(16);

        let duration = match (params.time_base, params.n_frames) {
            (Some(tb), Some(n)) => {
                let t = tb.calc_time(n);
                Duration::from_secs_f64(t.seconds as f64 + t.frac)
            }
            (None, Some(n)) => Duration::from_secs_f64(n as f64 / sample_rate as f64),
            _ => Duration::ZERO,
        };

        let track_id = track.id;
        let format = AudioFormat::new(sample_rate, bit_depth, channels, codec);
        debug!("Opened {}: {}", path.display(), format.format_description());

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            format,
            metadata,
            duration,
            consecutive_errors: 0,
        })
    }
}

impl AudioDecoder for AacDecoder {
    fn decode_next(&mut self) -> Result<Option<AudioBuffer>, DecodeError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(err) => {
                    return Err(DecodeError::DecodeFailed(format!("Failed to read packet: {}", err)));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    self.consecutive_errors = 0;
                    let spec = *decoded.spec();
                    let mut samples =
                        SymphoniaSampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    samples.copy_interleaved_ref(decoded);
                    return Ok(Some(AudioBuffer::from_interleaved(
                        samples.samples().to_vec(),
                        spec.channels.count() as u16,
                        spec.rate,
                    )));
                }
                Err(SymphoniaError::DecodeError(msg)) => {
                    self.consecutive_errors += 1;
                    if self.consecutive_errors > MAX_DECODE_RETRIES {
                        return Err(DecodeError::DecodeFailed(msg.to_string()));
                    }
                    warn!("Skipping corrupt packet: {}", msg);
                }
                Err(err) => {
                    return Err(DecodeError::DecodeFailed(format!("Failed to decode packet: {}", err)));
                }
            }
        }
    }

    fn format(&self) -> &AudioFormat {
        &self.format
    }

    fn metadata(&self) -> &AudioMetadata {
        &self.metadata
    }

    fn duration(&self) -> Duration {
        self.duration
    }
}

fn codec_for(codec: symphonia::core::codecs::CodecType) -> Option<AudioCodec> {
    let descriptor = symphonia::default::get_codecs().get_codec(codec)?;
    match descriptor.short_name {
        "aac" => Some(AudioCodec::Aac),
        "alac" => Some(AudioCodec::Alac),
        "mp3" => Some(AudioCodec::Mp3),
        "flac" => Some(AudioCodec::Flac),
        name if name.starts_with("pcm") => Some(AudioCodec::Pcm),
        _ => None,
    }
}

fn extract_tags(revision: &MetadataRevision, metadata: &mut AudioMetadata) {
    for tag in revision.tags() {
        let Some(key) = tag.std_key else { continue };
        match (key, &tag.value) {
            (StandardTagKey::TrackTitle, Value::String(s)) => metadata.title = Some(s.clone()),
            (StandardTagKey::Artist, Value::String(s)) => metadata.artist = Some(s.clone()),
            (StandardTagKey::Album, Value::String(s)) => metadata.album = Some(s.clone()),
            (StandardTagKey::Genre, Value::String(s)) => metadata.genre = Some(s.clone()),
            (StandardTagKey::Date, Value::String(s)) => {
                if let Some(year) = s.split('-').next().and_then(|y| y.trim().parse().ok()) {
                    metadata.year = Some(year);
                }
            }
            (StandardTagKey::Date, Value::UnsignedInt(year)) => metadata.year = Some(*year as u32),
            _ => {}
        }
    }
}

/// Decoder over audio that is already in memory
pub struct BufferDecoder {
    buffer: AudioBuffer,
    position: usize,
    format: AudioFormat,
    metadata: AudioMetadata,
}

impl BufferDecoder {
    /// Rejects buffers whose header fields disagree with their sample data
    pub fn new(buffer: AudioBuffer) -> Result<Self, DecodeError> {
        if buffer.channels == 0 || buffer.sample_rate == 0 {
            return Err(DecodeError::DecodeFailed(format!(
                "PCM buffer needs channels and a sample rate (got {} ch @ {} Hz)",
                buffer.channels, buffer.sample_rate
            )));
        }
        let expected = buffer.frames.checked_mul(buffer.channels as usize);
        if expected != Some(buffer.samples.len()) {
            return Err(DecodeError::DecodeFailed(format!(
                "PCM buffer holds {} samples but declares {} frames of {} channels",
                buffer.samples.len(),
                buffer.frames,
                buffer.channels
            )));
        }

        let format = AudioFormat::new(buffer.sample_rate, 32, buffer.channels, AudioCodec::Pcm);
        Ok(Self {
            buffer,
            position: 0,
            format,
            metadata: AudioMetadata::new(),
        })
    }
}

impl AudioDecoder for BufferDecoder {
    fn decode_next(&mut self) -> Result<Option<AudioBuffer>, DecodeError> {
        let channels = self.buffer.channels as usize;
        let total = self.buffer.samples.len();
        if self.position >= total {
            return Ok(None);
        }
        let end = (self.position + PCM_CHUNK_FRAMES * channels).min(total);
        let chunk = self.buffer.samples[self.position..end].to_vec();
        self.position = end;
        Ok(Some(AudioBuffer::from_interleaved(
            chunk,
            self.buffer.channels,
            self.buffer.sample_rate,
        )))
    }

    fn format(&self) -> &AudioFormat {
        &self.format
    }

    fn metadata(&self) -> &AudioMetadata {
        &self.metadata
    }

    fn duration(&self) -> Duration {
        self.buffer.duration()
    }
}
