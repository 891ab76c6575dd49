//! Fixed-duration audio clip, the atomic unit of processing

use std::sync::Arc;
use std::time::Duration;

/// One fully-populated capture window
///
/// Samples are shared read-only between the voice and text branches via
/// `Arc`; cloning a clip is cheap and never copies audio data. The buffer
/// is dropped once both branches for its sequence number have finished.
#[derive(Debug, Clone)]
pub struct ClipBuffer {
    seq: u64,
    samples: Arc<[f32]>,
    sample_rate: u32,
    duration: Duration,
}

impl ClipBuffer {
    /// Wrap captured samples into a clip
    #[must_use]
    pub fn new(seq: u64, samples: Vec<f32>, sample_rate: u32, duration: Duration) -> Self {
        Self {
            seq,
            samples: samples.into(),
            sample_rate,
            duration,
        }
    }

    /// Monotonic sequence number assigned by the capture loop
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Raw mono PCM samples in [-1.0, 1.0]
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate the clip was captured at
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Configured window duration
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of samples in the clip
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the clip holds no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_samples() {
        let clip = ClipBuffer::new(3, vec![0.1, 0.2, 0.3], 16_000, Duration::from_secs(5));
        let copy = clip.clone();

        assert_eq!(copy.seq(), 3);
        assert_eq!(copy.samples(), clip.samples());
        assert!(Arc::ptr_eq(&clip.samples, &copy.samples));
    }
}
