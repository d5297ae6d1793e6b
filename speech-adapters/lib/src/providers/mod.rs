//! Speech adapter implementations.
//!
//! - [`local`] - pretrained models executed on this host
//! - [`cloud`] - remote TTS APIs
//! - [`toolkit`] - an external TTS toolkit checked out next to the process

pub mod cloud;
pub mod local;
pub mod toolkit;
