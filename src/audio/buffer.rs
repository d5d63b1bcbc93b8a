use std::collections::VecDeque;
use std::sync::Mutex;

/// Bounded FIFO of interleaved samples between the decoder and output threads
#[derive(Debug)]
pub struct SampleBuffer {
    samples: Mutex<VecDeque<f32>>,
    capacity: usize,
}

impl SampleBuffer {
    /// Create a buffer holding up to `capacity_frames` frames
    pub fn new(capacity_frames: usize, channels: u16) -> Self {
        let capacity = capacity_frames.max(1) * channels.max(1) as usize;
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Capacity for `duration_ms` of audio at the given format
    pub fn for_duration(duration_ms: u32, sample_rate: u32, channels: u16) -> Self {
        let frames = (sample_rate as u64 * duration_ms as u64 / 1000) as usize;
        Self::new(frames, channels)
    }

    /// Number of samples available for reading
    pub fn available_read(&self) -> usize {
        self.samples.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.available_read() == 0
    }

    /// Append as much of `data` as fits; returns the number of samples written
    pub fn write(&self, data: &[f32]) -> usize {
        let mut samples = match self.samples.lock() {
            Ok(samples) => samples,
            Err(_) => return 0,
        };
        let to_write = data.len().min(self.capacity - samples.len().min(self.capacity));
        samples.extend(&data[..to_write]);
        to_write
    }

    /// Fill `out` from the front of the buffer; returns the number of samples read
    pub fn read(&self, out: &mut [f32]) -> usize {
        let mut samples = match self.samples.lock() {
            Ok(samples) => samples,
            Err(_) => return 0,
        };
        let to_read = out.len().min(samples.len());
        for (slot, sample) in out.iter_mut().zip(samples.drain(..to_read)) {
            *slot = sample;
        }
        to_read
    }
}
