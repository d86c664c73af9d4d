//! Lip Sync
//!
//! Tracks the loudness of the voice clip attached to the playing motion. The
//! clip is decoded from WAV once; every frame the envelope advances by the
//! frame delta and reports the RMS of the samples it passed over.

use std::io::Cursor;

use crate::errors::{PuppetError, Result};

/// Decoded PCM voice data, normalised to `[-1, 1]`.
#[derive(Debug, Clone, Default)]
pub struct VoiceClip {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl VoiceClip {
    /// Decodes a RIFF/WAVE byte buffer.
    pub fn from_wav(bytes: &[u8]) -> Result<Self> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(PuppetError::VoiceDecodeError(
                "WAV header declares zero channels or sample rate".to_string(),
            ));
        }

        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        Ok(Self::from_samples(samples, spec.channels, spec.sample_rate))
    }

    /// Wraps interleaved samples.
    #[must_use]
    pub fn from_samples(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate,
        }
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Streaming RMS tracker over a [`VoiceClip`].
#[derive(Debug, Clone, Default)]
pub struct VoiceEnvelope {
    clip: Option<VoiceClip>,
    /// Position in frames.
    offset: usize,
    rms: f32,
}

impl VoiceEnvelope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `clip` from its first frame.
    pub fn start(&mut self, clip: VoiceClip) {
        self.clip = Some(clip);
        self.offset = 0;
        self.rms = 0.0;
    }

    pub fn stop(&mut self) {
        self.clip = None;
        self.offset = 0;
        self.rms = 0.0;
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.clip
            .as_ref()
            .is_some_and(|clip| self.offset < clip.frame_count())
    }

    /// Current envelope value in `[0, 1]`.
    #[must_use]
    pub fn rms(&self) -> f32 {
        self.rms
    }

    /// Advances by `dt` seconds. Returns `false` once the clip is exhausted.
    pub fn update(&mut self, dt: f32) -> bool {
        let Some(clip) = self.clip.as_ref() else {
            self.rms = 0.0;
            return false;
        };

        let total = clip.frame_count();
        if self.offset >= total {
            self.rms = 0.0;
            return false;
        }

        let advance = (dt.max(0.0) * clip.sample_rate as f32) as usize;
        let goal = (self.offset + advance).min(total);
        if goal == self.offset {
            return true;
        }

        let channels = usize::from(clip.channels);
        let window = &clip.samples[self.offset * channels..goal * channels];
        let sum: f32 = window.iter().map(|s| s * s).sum();
        self.rms = (sum / window.len() as f32).sqrt().min(1.0);
        self.offset = goal;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_tracks_constant_signal() {
        let clip = VoiceClip::from_samples(vec![0.5; 1000], 1, 1000);
        let mut envelope = VoiceEnvelope::new();
        envelope.start(clip);
        assert!(envelope.update(0.1));
        assert!((envelope.rms() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn envelope_goes_silent_after_clip_ends() {
        let clip = VoiceClip::from_samples(vec![1.0; 100], 1, 1000);
        let mut envelope = VoiceEnvelope::new();
        envelope.start(clip);
        envelope.update(0.5);
        assert!(!envelope.is_playing());
        assert!(!envelope.update(0.1));
        assert!(envelope.rms().abs() < 1e-6);
    }

    #[test]
    fn decodes_int_wav() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..800 {
                writer.write_sample(i16::MAX / 2).unwrap();
                writer.write_sample(-(i16::MAX / 2)).unwrap();
            }
            writer.finalize().unwrap();
        }

        let clip = VoiceClip::from_wav(cursor.get_ref()).unwrap();
        assert_eq!(clip.frame_count(), 800);
        assert_eq!(clip.sample_rate(), 8000);

        let mut envelope = VoiceEnvelope::new();
        envelope.start(clip);
        envelope.update(0.05);
        assert!((envelope.rms() - 0.5).abs() < 0.01);
    }

    #[test]
    fn rejects_garbage() {
        assert!(VoiceClip::from_wav(b"definitely not a wav file").is_err());
    }
}
