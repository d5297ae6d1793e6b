//! Adapters for pretrained models run on this host.
//!
//! Both adapters resolve their model files once, pick a device once, and
//! then forward text to a [`SpeechModel`](crate::traits::SpeechModel).

mod bark;
mod mms;

pub use bark::{MultiSpeakerAdapter, SPEAKER_PRESETS};
pub use mms::VocoderAdapter;
