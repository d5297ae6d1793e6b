//! Cloud-based speech adapters.
//!
//! These adapters use HTTP APIs for TTS generation.

mod elevenlabs;

pub use elevenlabs::{CloudVoiceAdapter, ElevenLabsClient, Voice, VoiceApi};
