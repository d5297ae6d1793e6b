//! Audio containers returned by the adapters.
//!
//! Local models produce a [`Waveform`], the cloud API produces
//! [`EncodedAudio`], and the toolkit writes a file. [`SpeechAudio`] is only
//! a convenience for callers that want to persist any of the three.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::TtsError;

// ============================================================================
// Audio Format
// ============================================================================

/// Container format of encoded audio bytes.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AudioFormat {
    /// WAV format (uncompressed)
    Wav,
    /// MP3 format (the ElevenLabs default)
    #[default]
    Mp3,
    /// Raw PCM audio data
    Pcm,
    /// Ogg Vorbis format
    Ogg,
}

impl AudioFormat {
    /// Returns the file extension for this audio format.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Pcm => "raw",
            AudioFormat::Ogg => "ogg",
        }
    }

    /// Returns the MIME type for this audio format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Pcm => "audio/pcm",
            AudioFormat::Ogg => "audio/ogg",
        }
    }

    /// Sniff the format from the leading bytes.
    ///
    /// Returns `None` when the bytes carry no recognizable signature.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        let kind = infer::get(bytes)?;
        match kind.mime_type() {
            "audio/mpeg" => Some(AudioFormat::Mp3),
            "audio/x-wav" | "audio/wav" => Some(AudioFormat::Wav),
            "audio/ogg" => Some(AudioFormat::Ogg),
            _ => None,
        }
    }
}

// ============================================================================
// Waveform
// ============================================================================

/// Mono floating-point samples produced by a local model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Waveform {
    /// Samples in the range `-1.0..=1.0`.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds (zero when the sample rate is unknown).
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Read a WAV file, mixing multi-channel audio down to mono.
    ///
    /// ## Errors
    ///
    /// Returns `TtsError::AudioDecodeFailed` if the file is missing or is not
    /// a readable WAV file.
    pub fn from_wav_file(path: &Path) -> Result<Self, TtsError> {
        let decode_err = |e: hound::Error| TtsError::AudioDecodeFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut reader = hound::WavReader::open(path).map_err(decode_err)?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(decode_err)?,
            hound::SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(decode_err)?
            }
        };

        let channels = usize::from(spec.channels.max(1));
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        };

        Ok(Self::new(samples, spec.sample_rate))
    }

    /// Write the samples as a 16-bit mono WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), TtsError> {
        let encode_err = |e: hound::Error| TtsError::AudioDecodeFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path, spec).map_err(encode_err)?;
        for &sample in &self.samples {
            let scaled = (sample * 32767.0).clamp(-32767.0, 32767.0) as i16;
            writer.write_sample(scaled).map_err(encode_err)?;
        }
        writer.finalize().map_err(encode_err)?;
        Ok(())
    }
}

// ============================================================================
// Encoded Audio
// ============================================================================

/// Raw audio bytes as returned by a remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

impl EncodedAudio {
    /// Wrap bytes, detecting the container format (MP3 when unrecognized).
    pub fn new(bytes: Vec<u8>) -> Self {
        let format = AudioFormat::detect(&bytes).unwrap_or_default();
        Self { bytes, format }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ============================================================================
// Speech Audio
// ============================================================================

/// Any adapter output, for callers that only need to persist it.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechAudio {
    Waveform(Waveform),
    Encoded(EncodedAudio),
    File(PathBuf),
}

impl SpeechAudio {
    /// The natural file extension of this output.
    pub fn extension(&self) -> &str {
        match self {
            SpeechAudio::Waveform(_) => "wav",
            SpeechAudio::Encoded(audio) => audio.format.extension(),
            SpeechAudio::File(path) => path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("wav"),
        }
    }

    /// Persist the audio at `dest`, returning the path written.
    ///
    /// If `dest` has no extension, the natural one is appended.
    pub fn save(&self, dest: &Path) -> Result<PathBuf, TtsError> {
        let dest = if dest.extension().is_none() {
            dest.with_extension(self.extension())
        } else {
            dest.to_path_buf()
        };

        match self {
            SpeechAudio::Waveform(waveform) => waveform.write_wav(&dest)?,
            SpeechAudio::Encoded(audio) => fs::write(&dest, &audio.bytes)?,
            SpeechAudio::File(path) => {
                if path != &dest {
                    fs::copy(path, &dest)?;
                }
            }
        }

        Ok(dest)
    }
}

impl From<Waveform> for SpeechAudio {
    fn from(w: Waveform) -> Self {
        SpeechAudio::Waveform(w)
    }
}

impl From<EncodedAudio> for SpeechAudio {
    fn from(a: EncodedAudio) -> Self {
        SpeechAudio::Encoded(a)
    }
}

impl From<PathBuf> for SpeechAudio {
    fn from(p: PathBuf) -> Self {
        SpeechAudio::File(p)
    }
}
