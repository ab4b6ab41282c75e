//! WAV decoding and loudness math.
//!
//! The pipeline consumes decoded 16-bit mono PCM. Container policy for
//! uploads (mp3/wav/ogg, size caps) is enforced by the caller at the upload
//! boundary; by the time audio reaches this module it is WAV.

use crate::error::{Result, ScribeError};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

/// A fully decoded recording: 16-bit PCM, mono, at its native sample rate.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
}

/// A bounded span of decoded audio produced by the segmenter.
///
/// Immutable once created; owns its samples so the source buffer can be
/// dropped while chunks are in flight.
#[derive(Debug, Clone)]
pub struct AudioClip {
    samples: Vec<i16>,
    sample_rate: u32,
    start_ms: u32,
    end_ms: u32,
}

impl AudioBuffer {
    /// Wrap raw mono samples. Used by the segmenter and by tests.
    pub fn from_samples(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Decode a WAV file from disk.
    pub fn from_wav_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Decode WAV data from any reader. Stereo input is downmixed to mono.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader).map_err(|e| ScribeError::AudioDecode {
            message: format!("Failed to parse WAV data: {}", e),
        })?;

        let spec = wav_reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 {
            return Err(ScribeError::AudioDecode {
                message: "WAV header reports zero channels".to_string(),
            });
        }

        let raw_samples: Vec<i16> = match spec.sample_format {
            SampleFormat::Int => wav_reader
                .samples::<i16>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| ScribeError::AudioDecode {
                    message: format!("Failed to read WAV samples: {}", e),
                })?,
            SampleFormat::Float => wav_reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| ScribeError::AudioDecode {
                    message: format!("Failed to read WAV samples: {}", e),
                })?,
        };

        // Downmix interleaved channels to mono
        let samples = if channels == 1 {
            raw_samples
        } else {
            raw_samples
                .chunks_exact(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    (sum / channels as i32) as i16
                })
                .collect()
        };

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
        })
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total duration in milliseconds, rounded down.
    pub fn duration_ms(&self) -> u32 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000 / self.sample_rate as u64) as u32
    }

    /// Mean loudness of the whole buffer in dBFS.
    pub fn dbfs(&self) -> f32 {
        dbfs(&self.samples)
    }

    /// Copy the span `[start_ms, end_ms)` out as an owned clip.
    ///
    /// Bounds are clamped to the buffer; an inverted range yields an empty
    /// clip.
    pub fn slice_ms(&self, start_ms: u32, end_ms: u32) -> AudioClip {
        let start = self.sample_index(start_ms).min(self.samples.len());
        let end = self.sample_index(end_ms).min(self.samples.len());
        let samples = if start < end {
            self.samples[start..end].to_vec()
        } else {
            Vec::new()
        };
        AudioClip {
            samples,
            sample_rate: self.sample_rate,
            start_ms,
            end_ms,
        }
    }

    fn sample_index(&self, ms: u32) -> usize {
        (ms as u64 * self.sample_rate as u64 / 1000) as usize
    }
}

impl AudioClip {
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Start of the clip within the source recording, in milliseconds.
    pub fn start_ms(&self) -> u32 {
        self.start_ms
    }

    /// End of the clip within the source recording, in milliseconds.
    pub fn end_ms(&self) -> u32 {
        self.end_ms
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn wav_spec(&self) -> WavSpec {
        WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    /// Encode the clip as an in-memory WAV file.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer =
                WavWriter::new(&mut cursor, self.wav_spec()).map_err(|e| ScribeError::AudioEncode {
                    message: format!("Failed to start WAV stream: {}", e),
                })?;
            for &sample in &self.samples {
                writer
                    .write_sample(sample)
                    .map_err(|e| ScribeError::AudioEncode {
                        message: format!("Failed to write WAV sample: {}", e),
                    })?;
            }
            writer.finalize().map_err(|e| ScribeError::AudioEncode {
                message: format!("Failed to finalize WAV stream: {}", e),
            })?;
        }
        Ok(cursor.into_inner())
    }

    /// Write the clip to a WAV file on disk.
    pub fn export_wav(&self, path: &Path) -> Result<()> {
        let mut writer =
            WavWriter::create(path, self.wav_spec()).map_err(|e| ScribeError::AudioEncode {
                message: format!("Failed to create {}: {}", path.display(), e),
            })?;
        for &sample in &self.samples {
            writer
                .write_sample(sample)
                .map_err(|e| ScribeError::AudioEncode {
                    message: format!("Failed to write {}: {}", path.display(), e),
                })?;
        }
        writer.finalize().map_err(|e| ScribeError::AudioEncode {
            message: format!("Failed to finalize {}: {}", path.display(), e),
        })
    }
}

/// Root-mean-square level of the samples, normalized to 0.0..=1.0.
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let mean = sum_sq / samples.len() as f64;
    (mean.sqrt() / i16::MAX as f64) as f32
}

/// Loudness in dB relative to full scale. Digital silence is `-inf`.
pub fn dbfs(samples: &[i16]) -> f32 {
    let level = rms(samples);
    if level <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * level.log10()
    }
}
