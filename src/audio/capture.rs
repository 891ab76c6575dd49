//! Audio capture from microphone

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use rubato::{FftFixedIn, Resampler};

use crate::{Error, Result};

/// Rubato input block size for device-rate conversion
const RESAMPLER_CHUNK: usize = 1024;

/// A source of mono PCM samples at a fixed target rate
///
/// The capture loop polls `drain` and assembles fixed-duration clips from
/// whatever has accumulated since the last call. Implementations are not
/// required to be `Send`; the loop runs on the task that owns the source
/// (cpal streams cannot cross threads).
pub trait CaptureSource {
    /// Begin producing samples
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureUnavailable`] if the source cannot be opened
    fn start(&mut self) -> Result<()>;

    /// Stop producing samples
    fn stop(&mut self);

    /// Take all samples accumulated since the last call
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureUnavailable`] if the source has failed; the
    /// pipeline treats this as fatal
    fn drain(&mut self) -> Result<Vec<f32>>;

    /// Rate of the samples returned by `drain`
    fn sample_rate(&self) -> u32;
}

/// Captures audio from the default input device
///
/// Negotiates the configured sample rate with the device; when the device
/// cannot open that rate natively, the nearest supported rate is used and
/// drained samples are resampled to the target rate.
pub struct MicSource {
    device: Device,
    config: StreamConfig,
    target_rate: u32,
    channels: u16,
    buffer: Arc<Mutex<Vec<f32>>>,
    failure: Arc<Mutex<Option<String>>>,
    resampler: Option<ChunkResampler>,
    stream: Option<Stream>,
}

impl MicSource {
    /// Open the default input device for the given target sample rate
    ///
    /// # Errors
    ///
    /// Returns error if no input device is available or it exposes no
    /// usable configuration
    pub fn new(target_rate: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::CaptureUnavailable("no input device available".to_string()))?;

        let ranges: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| Error::CaptureUnavailable(e.to_string()))?
            .collect();

        // Prefer a mono config that covers the target rate exactly
        let exact = ranges.iter().find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(target_rate)
                && c.max_sample_rate() >= SampleRate(target_rate)
        });

        let (config, device_rate) = if let Some(range) = exact {
            let cfg = range.with_sample_rate(SampleRate(target_rate)).config();
            (cfg, target_rate)
        } else {
            // Fall back to whatever the device offers; drained samples get
            // downmixed and resampled to the target rate
            let range = ranges
                .iter()
                .min_by_key(|c| c.channels())
                .ok_or_else(|| {
                    Error::CaptureUnavailable("no suitable audio config found".to_string())
                })?;
            let cfg = range.with_max_sample_rate().config();
            let rate = cfg.sample_rate.0;
            (cfg, rate)
        };

        let channels = config.channels;
        let resampler = if device_rate == target_rate {
            None
        } else {
            Some(ChunkResampler::new(device_rate, target_rate)?)
        };

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            target_rate,
            device_rate,
            channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            target_rate,
            channels,
            buffer: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(None)),
            resampler,
            stream: None,
        })
    }
}

impl CaptureSource for MicSource {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let failure = Arc::clone(&self.failure);
        let channels = usize::from(self.channels);

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        if channels == 1 {
                            buf.extend_from_slice(data);
                        } else {
                            // Downmix interleaved frames to mono
                            #[allow(clippy::cast_precision_loss)]
                            buf.extend(
                                data.chunks_exact(channels)
                                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                            );
                        }
                    }
                },
                {
                    let failure = Arc::clone(&failure);
                    move |err| {
                        tracing::error!(error = %err, "audio capture stream error");
                        if let Ok(mut f) = failure.lock() {
                            f.get_or_insert_with(|| err.to_string());
                        }
                    }
                },
                None,
            )
            .map_err(|e| Error::CaptureUnavailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::CaptureUnavailable(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    fn drain(&mut self) -> Result<Vec<f32>> {
        if let Some(reason) = self.failure.lock().ok().and_then(|mut f| f.take()) {
            return Err(Error::CaptureUnavailable(reason));
        }

        let raw = self
            .buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default();

        match &mut self.resampler {
            None => Ok(raw),
            Some(rs) => rs.push(&raw),
        }
    }

    fn sample_rate(&self) -> u32 {
        self.target_rate
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Streaming rate converter holding a partial input block between calls
struct ChunkResampler {
    inner: FftFixedIn<f32>,
    pending: Vec<f32>,
}

impl ChunkResampler {
    fn new(in_rate: u32, out_rate: u32) -> Result<Self> {
        let inner = FftFixedIn::new(in_rate as usize, out_rate as usize, RESAMPLER_CHUNK, 1, 1)
            .map_err(|e| Error::Audio(format!("resampler init: {e}")))?;
        Ok(Self {
            inner,
            pending: Vec::with_capacity(RESAMPLER_CHUNK),
        })
    }

    /// Feed device-rate samples, returning whatever full blocks convert to
    fn push(&mut self, mut src: &[f32]) -> Result<Vec<f32>> {
        let mut out = Vec::new();

        while !src.is_empty() {
            let space = RESAMPLER_CHUNK - self.pending.len();
            let take = space.min(src.len());
            self.pending.extend_from_slice(&src[..take]);
            src = &src[take..];

            if self.pending.len() == RESAMPLER_CHUNK {
                let blocks = self
                    .inner
                    .process(&[&self.pending[..]], None)
                    .map_err(|e| Error::Audio(format!("resample: {e}")))?;
                out.extend_from_slice(&blocks[0]);
                self.pending.clear();
            }
        }

        Ok(out)
    }
}

/// Convert f32 samples to WAV bytes for the HTTP classifier boundaries
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Read a mono WAV file into f32 samples at its native rate
///
/// Multi-channel files are downmixed by channel averaging.
///
/// # Errors
///
/// Returns error if the file cannot be read or decoded
pub fn wav_to_samples(path: &std::path::Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path).map_err(|e| Error::Audio(e.to_string()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels);

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(e.to_string()))?,
        hound::SampleFormat::Int => {
            let max = f32::from(i16::MAX);
            reader
                .samples::<i16>()
                .map(|s| s.map(|v| f32::from(v) / max))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(e.to_string()))?
        }
    };

    let mono = if channels <= 1 {
        interleaved
    } else {
        #[allow(clippy::cast_precision_loss)]
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok((mono, spec.sample_rate))
}
