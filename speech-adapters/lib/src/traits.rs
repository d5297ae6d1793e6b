//! Traits for the speech adapter layer.
//!
//! [`SpeechBackend`] is the uniform call shape every adapter exposes.
//! [`SpeechModel`] is the seam between the local adapters and whatever
//! actually runs the pretrained model.

use std::future::Future;

use crate::audio::Waveform;
use crate::errors::TtsError;

/// The uniform `generate_speech(text) -> audio` capability.
///
/// Each adapter returns its backend's native output type. Failures are
/// always reported through `Err`; callers that prefer to log and carry on
/// use [`SpeechBackend::generate_speech_or_log`].
///
/// Implementations write plain `async fn`; the returned futures must be `Send`
/// so adapters can be driven from multi-threaded runtimes.
///
/// ## Examples
///
/// ```ignore
/// use speech_adapters::{SpeechBackend, VocoderAdapter};
///
/// let adapter = VocoderAdapter::load(&Default::default()).await?;
/// let waveform = adapter.generate_speech("hello world").await?;
/// ```
pub trait SpeechBackend: Send + Sync {
    /// The audio representation this backend produces.
    type Audio: Send;

    /// Short backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Synthesize `text`.
    ///
    /// ## Errors
    ///
    /// Returns `TtsError` if inference or the remote call fails.
    fn generate_speech(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Self::Audio, TtsError>> + Send;

    /// Synthesize `text`, logging any failure and returning `None` instead.
    fn generate_speech_or_log(
        &self,
        text: &str,
    ) -> impl Future<Output = Option<Self::Audio>> + Send {
        async move {
            match self.generate_speech(text).await {
                Ok(audio) => Some(audio),
                Err(error) => {
                    tracing::error!(
                        backend = self.name(),
                        error = %error,
                        "Speech generation failed"
                    );
                    None
                }
            }
        }
    }
}

/// One inference call against a loaded local model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest<'a> {
    /// The text to synthesize.
    pub text: &'a str,
    /// Speaker / voice preset, for models that accept one.
    pub voice_preset: Option<&'a str>,
}

impl<'a> GenerationRequest<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            voice_preset: None,
        }
    }

    #[must_use]
    pub fn with_voice_preset(mut self, preset: &'a str) -> Self {
        self.voice_preset = Some(preset);
        self
    }
}

/// A loaded pretrained model that turns text into a waveform.
///
/// The model is bound to its device when it is loaded; a request never
/// changes it.
pub trait SpeechModel: Send + Sync {
    fn generate(
        &self,
        request: &GenerationRequest<'_>,
    ) -> impl Future<Output = Result<Waveform, TtsError>> + Send;
}

// ============================================================================
// Tests
// ============================================================================
