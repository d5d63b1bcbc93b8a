//! Conversion of decoded audio to the output device's format.
//!
//! Channels are remapped first (mono is duplicated, extra channels are
//! averaged down to mono or dropped), then the rate is converted with
//! streaming linear interpolation that carries one frame of history across
//! calls so chunk boundaries stay continuous.

use crate::models::AudioBuffer;

#[derive(Debug, Clone)]
pub struct FormatAdapter {
    src_rate: u32,
    dst_rate: u32,
    dst_channels: usize,
    // source frames consumed per output frame
    step: f64,
    // position relative to `prev_frame`
    pos: f64,
    prev_frame: Vec<f32>,
}

impl FormatAdapter {
    pub fn new(src_rate: u32, dst_rate: u32, dst_channels: u16) -> Self {
        let mut adapter = Self {
            src_rate,
            dst_rate,
            dst_channels: dst_channels as usize,
            step: 1.0,
            pos: 0.0,
            prev_frame: Vec::new(),
        };
        adapter.update_step();
        adapter
    }

    fn update_step(&mut self) {
        self.step = if self.dst_rate == 0 {
            0.0
        } else {
            self.src_rate as f64 / self.dst_rate as f64
        };
    }

    pub fn is_passthrough(&self) -> bool {
        self.src_rate == self.dst_rate
    }

    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.prev_frame.clear();
    }

    /// Convert one decoded chunk to interleaved samples in the output format
    pub fn process(&mut self, input: &AudioBuffer) -> Vec<f32> {
        if input.sample_rate != 0 && input.sample_rate != self.src_rate {
            self.src_rate = input.sample_rate;
            self.update_step();
            self.reset();
        }

        let remapped = remap_channels(&input.samples, input.channels as usize, self.dst_channels);
        if self.is_passthrough() {
            return remapped;
        }
        self.resample(&remapped)
    }

    fn resample(&mut self, input: &[f32]) -> Vec<f32> {
        let ch = self.dst_channels;
        if ch == 0 || self.step == 0.0 {
            return Vec::new();
        }
        let in_frames = input.len() / ch;
        if in_frames == 0 {
            return Vec::new();
        }

        let mut work = Vec::with_capacity((in_frames + 1) * ch);
        if self.prev_frame.len() == ch {
            work.extend_from_slice(&self.prev_frame);
        } else {
            work.extend(std::iter::repeat(0.0).take(ch));
        }
        work.extend_from_slice(&input[..in_frames * ch]);
        let total_frames = work.len() / ch;

        let expected = (in_frames as f64 / self.step).ceil() as usize + 2;
        let mut out = Vec::with_capacity(expected * ch);

        while self.pos + 1.0 <= (total_frames - 1) as f64 {
            let i = self.pos.floor() as usize;
            let frac = (self.pos - i as f64) as f32;
            let (a, b) = (i * ch, (i + 1) * ch);
            out.extend((0..ch).map(|c| work[a + c] + (work[b + c] - work[a + c]) * frac));
            self.pos += self.step;
        }

        let last = (total_frames - 1) * ch;
        self.prev_frame.clear();
        self.prev_frame.extend_from_slice(&work[last..last + ch]);
        self.pos = (self.pos - (total_frames - 1) as f64).max(0.0);

        out
    }
}

/// Remap interleaved samples from `src` channels to `dst` channels
pub fn remap_channels(samples: &[f32], src: usize, dst: usize) -> Vec<f32> {
    if src == dst || src == 0 || dst == 0 {
        return samples.to_vec();
    }
    let frames = samples.len() / src;
    let mut out = Vec::with_capacity(frames * dst);
    for frame in samples.chunks_exact(src) {
        if src == 1 {
            out.extend(std::iter::repeat(frame[0]).take(dst));
        } else if dst == 1 {
            out.push(frame.iter().sum::<f32>() / src as f32);
        } else {
            let copied = src.min(dst);
            out.extend_from_slice(&frame[..copied]);
            out.extend(std::iter::repeat(0.0).take(dst - copied));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|n| (2.0 * std::f32::consts::PI * freq * n as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_passthrough_keeps_samples() {
        let mut adapter = FormatAdapter::new(48000, 48000, 2);
        let input = AudioBuffer::from_interleaved(vec![0.1, 0.2, 0.3, 0.4], 2, 48000);
        assert!(adapter.is_passthrough());
        assert_eq!(adapter.process(&input), vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_mono_is_duplicated() {
        assert_eq!(remap_channels(&[0.5, -0.5], 1, 2), vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn test_stereo_downmix_to_mono() {
        assert_eq!(remap_channels(&[1.0, 0.0, 0.5, 0.5], 2, 1), vec![0.5, 0.5]);
    }

    #[test]
    fn test_stereo_to_quad_pads_silence() {
        assert_eq!(remap_channels(&[0.1, 0.2], 2, 4), vec![0.1, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn test_upsample_length() {
        let mut adapter = FormatAdapter::new(44100, 48000, 1);
        let input = AudioBuffer::from_interleaved(sine(440.0, 44100, 44100), 1, 44100);
        let out = adapter.process(&input);
        let expected = 48000.0;
        assert!((out.len() as f64 - expected).abs() / expected < 0.01);
    }

    #[test]
    fn test_downsample_streaming_matches_total() {
        let mut adapter = FormatAdapter::new(48000, 24000, 2);
        let stereo: Vec<f32> = sine(100.0, 48000, 4800)
            .into_iter()
            .flat_map(|s| [s, s])
            .collect();

        let mut total = 0;
        for chunk in stereo.chunks(960) {
            let input = AudioBuffer::from_interleaved(chunk.to_vec(), 2, 48000);
            let out = adapter.process(&input);
            assert_eq!(out.len() % 2, 0);
            total += out.len() / 2;
        }
        assert!((total as i64 - 2400).abs() <= 2);
    }

    #[test]
    fn test_output_stays_in_range() {
        let mut adapter = FormatAdapter::new(22050, 48000, 2);
        let input = AudioBuffer::from_interleaved(sine(1000.0, 22050, 2205), 1, 22050);
        let out = adapter.process(&input);
        assert!(!out.is_empty());
        assert!(out.iter().all(|s| s.abs() <= 1.0 + f32::EPSILON));
    }

    #[test]
    fn test_source_rate_follows_input() {
        let mut adapter = FormatAdapter::new(48000, 48000, 1);
        let input = AudioBuffer::from_interleaved(vec![0.0; 441], 1, 44100);
        let out = adapter.process(&input);
        assert!(!adapter.is_passthrough());
        assert!(out.len() >= 470 && out.len() <= 481);
    }
}
