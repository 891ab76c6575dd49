//! Continuous clip assembly from a capture source

use std::time::{Duration, Instant};

use crate::{Error, Result};

use super::capture::CaptureSource;
use super::clip::ClipBuffer;

/// A window taking longer than this multiple of the clip duration to fill
/// is treated as an under-run and discarded
const STALL_FACTOR: u32 = 2;

/// Assembles fixed-duration [`ClipBuffer`]s from a [`CaptureSource`]
///
/// The loop polls the source and accumulates samples until a full
/// duration-D window is available; `next_clip` hands the window off with a
/// monotonic sequence number and immediately begins accumulating the next
/// one. Clips of one loop instance always share the same duration and
/// sample rate.
///
/// Windows that stall mid-fill (device glitch, scheduler starvation) are
/// discarded with a warning rather than zero-padded; padding would feed the
/// classifiers fabricated silence.
pub struct CaptureLoop<S: CaptureSource> {
    source: S,
    clip_duration: Duration,
    clip_len: usize,
    poll_interval: Duration,
    pending: Vec<f32>,
    window_started: Option<Instant>,
    next_seq: u64,
    discarded: u64,
}

impl<S: CaptureSource> CaptureLoop<S> {
    /// Create a capture loop over `source` with the given window duration
    ///
    /// `poll_interval` controls how often the source is drained while a
    /// window is filling; it bounds hand-off latency, not clip size.
    #[must_use]
    pub fn new(source: S, clip_duration: Duration, poll_interval: Duration) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let clip_len =
            (f64::from(source.sample_rate()) * clip_duration.as_secs_f64()).round() as usize;

        Self {
            source,
            clip_duration,
            clip_len,
            poll_interval,
            pending: Vec::with_capacity(clip_len),
            window_started: None,
            next_seq: 0,
            discarded: 0,
        }
    }

    /// Start the underlying source
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureUnavailable`] if the source cannot start
    pub fn start(&mut self) -> Result<()> {
        self.source.start()
    }

    /// Stop the underlying source
    pub fn stop(&mut self) {
        self.source.stop();
    }

    /// Block until a full window of audio has accumulated
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureUnavailable`] if the source has failed;
    /// this is fatal and the pipeline must terminate
    pub async fn next_clip(&mut self) -> Result<ClipBuffer> {
        loop {
            let chunk = self.source.drain()?;
            if !chunk.is_empty() {
                if self.window_started.is_none() {
                    self.window_started = Some(Instant::now());
                }
                self.pending.extend_from_slice(&chunk);
            }

            if self.pending.len() >= self.clip_len {
                return Ok(self.take_window());
            }

            self.check_stall();
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Split exactly one window off the front of the pending buffer
    fn take_window(&mut self) -> ClipBuffer {
        let rest = self.pending.split_off(self.clip_len);
        let samples = std::mem::replace(&mut self.pending, rest);

        // Leftover samples already belong to the next window
        self.window_started = (!self.pending.is_empty()).then(Instant::now);

        let seq = self.next_seq;
        self.next_seq += 1;

        tracing::debug!(
            seq,
            samples = samples.len(),
            pending = self.pending.len(),
            "clip window complete"
        );

        ClipBuffer::new(seq, samples, self.source.sample_rate(), self.clip_duration)
    }

    /// Discard a window that has stalled mid-fill
    fn check_stall(&mut self) {
        let Some(started) = self.window_started else {
            return;
        };

        if started.elapsed() > self.clip_duration * STALL_FACTOR {
            let err = Error::PartialWindowDiscarded {
                seq: self.next_seq,
                reason: format!(
                    "{} of {} samples after {:?}",
                    self.pending.len(),
                    self.clip_len,
                    started.elapsed()
                ),
            };
            tracing::warn!(error = %err, "capture under-run");
            self.pending.clear();
            self.window_started = None;
            self.discarded += 1;
        }
    }

    /// Samples per clip for this loop instance
    #[must_use]
    pub const fn clip_len(&self) -> usize {
        self.clip_len
    }

    /// Sample rate shared by all clips from this loop
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    /// Number of partial windows discarded so far
    #[must_use]
    pub const fn discarded(&self) -> u64 {
        self.discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SimSource;

    fn test_loop(clip_ms: u64, chunk_ms: u64) -> CaptureLoop<SimSource> {
        let source = SimSource::new(16_000, Duration::from_millis(chunk_ms));
        CaptureLoop::new(source, Duration::from_millis(clip_ms), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_exact_window_size() {
        let mut capture = test_loop(100, 30);
        capture.start().unwrap();

        let clip = capture.next_clip().await.unwrap();
        assert_eq!(clip.seq(), 0);
        assert_eq!(clip.len(), 1600);
        assert_eq!(clip.sample_rate(), 16_000);
    }

    #[tokio::test]
    async fn test_sequence_numbers_monotonic() {
        let mut capture = test_loop(50, 20);
        capture.start().unwrap();

        for expected in 0..5 {
            let clip = capture.next_clip().await.unwrap();
            assert_eq!(clip.seq(), expected);
        }
    }

    #[tokio::test]
    async fn test_leftover_carries_into_next_window() {
        // 30ms chunks into 50ms windows: every window boundary splits a chunk
        let mut capture = test_loop(50, 30);
        capture.start().unwrap();

        let first = capture.next_clip().await.unwrap();
        let second = capture.next_clip().await.unwrap();
        assert_eq!(first.len(), 800);
        assert_eq!(second.len(), 800);
        // No samples were dropped at the boundary: waveform continues
        assert!((second.samples()[0] - expected_sample(800)).abs() < 1e-3);
    }

    /// Sample the sim tone emits at absolute index `i`
    fn expected_sample(i: usize) -> f32 {
        let step = 2.0 * std::f32::consts::PI * SimSource::FREQUENCY / 16_000.0;
        #[allow(clippy::cast_precision_loss)]
        let t = step * i as f32;
        0.3 * t.sin()
    }

    /// Source replaying a fixed script of drain results, then silence
    struct ScriptedSource {
        chunks: std::collections::VecDeque<Vec<f32>>,
    }

    impl CaptureSource for ScriptedSource {
        fn start(&mut self) -> crate::Result<()> {
            Ok(())
        }

        fn stop(&mut self) {}

        fn drain(&mut self) -> crate::Result<Vec<f32>> {
            Ok(self.chunks.pop_front().unwrap_or_default())
        }

        fn sample_rate(&self) -> u32 {
            16_000
        }
    }

    #[tokio::test]
    async fn test_under_run_discards_partial_window() {
        // 20ms clips (320 samples), stall threshold 40ms. The source
        // yields a fraction of a window, goes silent long enough to trip
        // the threshold, then recovers with a full window's worth.
        let mut chunks = std::collections::VecDeque::new();
        chunks.push_back(vec![0.5f32; 100]);
        for _ in 0..12 {
            chunks.push_back(Vec::new());
        }
        chunks.push_back(vec![0.25f32; 320]);

        let source = ScriptedSource { chunks };
        let mut capture =
            CaptureLoop::new(source, Duration::from_millis(20), Duration::from_millis(5));
        capture.start().unwrap();

        let clip = capture.next_clip().await.unwrap();

        // The stalled partial window was dropped, never zero-padded: the
        // emitted clip is exactly one window of the recovered audio
        assert_eq!(capture.discarded(), 1);
        assert_eq!(clip.len(), 320);
        assert_eq!(clip.seq(), 0);
        assert!(clip.samples().iter().all(|&s| (s - 0.25).abs() < f32::EPSILON));
    }
}
