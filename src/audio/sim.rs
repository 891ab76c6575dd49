//! Simulated capture source for headless hosts and tests

use std::time::Duration;

use crate::Result;

use super::capture::CaptureSource;

/// Steady-state synthetic source producing a fixed-frequency tone
///
/// Every `drain` call yields one chunk of samples regardless of wall-clock
/// time, so tests can run the capture loop far faster than real time. The
/// `--simulate` CLI flag uses it to exercise the full pipeline on machines
/// without audio hardware.
pub struct SimSource {
    sample_rate: u32,
    chunk_len: usize,
    frequency: f32,
    phase: f32,
    running: bool,
}

impl SimSource {
    /// Tone frequency used by the simulated source
    pub const FREQUENCY: f32 = 220.0;

    /// Create a source yielding `chunk` worth of audio per drain call
    #[must_use]
    pub fn new(sample_rate: u32, chunk: Duration) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let chunk_len = (f64::from(sample_rate) * chunk.as_secs_f64()).round() as usize;
        Self {
            sample_rate,
            chunk_len,
            frequency: Self::FREQUENCY,
            phase: 0.0,
            running: false,
        }
    }
}

impl CaptureSource for SimSource {
    fn start(&mut self) -> Result<()> {
        self.running = true;
        tracing::debug!(
            sample_rate = self.sample_rate,
            chunk_len = self.chunk_len,
            "simulated capture started"
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn drain(&mut self) -> Result<Vec<f32>> {
        if !self.running {
            return Ok(Vec::new());
        }

        #[allow(clippy::cast_precision_loss)]
        let step = 2.0 * std::f32::consts::PI * self.frequency / self.sample_rate as f32;
        let samples = (0..self.chunk_len)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = self.phase + step * i as f32;
                0.3 * t.sin()
            })
            .collect();

        #[allow(clippy::cast_precision_loss)]
        {
            self.phase = (self.phase + step * self.chunk_len as f32)
                % (2.0 * std::f32::consts::PI);
        }

        Ok(samples)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
