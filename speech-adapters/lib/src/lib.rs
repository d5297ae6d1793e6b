//! Speech Adapters
//!
//! Thin adapters that put four text-to-speech backends behind one
//! `generate_speech(text)` operation.
//!
//! ## Backends
//!
//! - [`MultiSpeakerAdapter`]: Suno Bark, a random English speaker preset per call
//! - [`VocoderAdapter`]: MMS VITS, deterministic single voice
//! - [`CloudVoiceAdapter`]: ElevenLabs, a random catalog voice per call
//! - [`ToolkitAdapter`]: MeloTTS, fixed EN-US voice, writes a WAV file
//!
//! Local models run in a host program (see [`runtime`]) on an explicitly
//! selected [`Device`]. The MeloTTS checkout is provisioned by a separate
//! [`bootstrap`] step rather than on construction.
//!
//! ## Quick Start
//!
//! ```ignore
//! use speech_adapters::{AdapterConfig, SpeechBackend, VocoderAdapter};
//!
//! let config = AdapterConfig::load(None)?;
//! let adapter = VocoderAdapter::load(&config.mms).await?;
//! let waveform = adapter.generate_speech("hello world").await?;
//! waveform.write_wav("hello.wav".as_ref())?;
//! ```
//!
//! ## Module Structure
//!
//! - [`traits`] - `SpeechBackend` and the `SpeechModel` seam
//! - [`providers`] - the four adapters
//! - [`audio`] - waveform and encoded audio types
//! - [`config`] - TOML configuration
//! - [`errors`] - the `TtsError` type

pub mod audio;
pub mod bootstrap;
pub mod config;
pub mod device;
pub mod errors;
pub mod hub;
pub mod providers;
pub mod runtime;
pub mod traits;

pub use audio::{AudioFormat, EncodedAudio, SpeechAudio, Waveform};
pub use bootstrap::{GitProvisioner, ProvisionOutcome, Provisioner, ensure_toolkit};
pub use config::AdapterConfig;
pub use device::Device;
pub use errors::TtsError;
pub use providers::cloud::{CloudVoiceAdapter, ElevenLabsClient, Voice, VoiceApi};
pub use providers::local::{MultiSpeakerAdapter, SPEAKER_PRESETS, VocoderAdapter};
pub use providers::toolkit::ToolkitAdapter;
pub use runtime::{WorkerCommand, WorkerModel};
pub use traits::{GenerationRequest, SpeechBackend, SpeechModel};
