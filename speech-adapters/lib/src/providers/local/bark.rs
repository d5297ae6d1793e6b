//! Multi-speaker generative backend (Suno Bark).

use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::audio::Waveform;
use crate::config::BarkConfig;
use crate::device::Device;
use crate::errors::TtsError;
use crate::hub::resolve_artifacts;
use crate::runtime::WorkerModel;
use crate::traits::{GenerationRequest, SpeechBackend, SpeechModel};

/// The English speaker presets one call is drawn from.
pub const SPEAKER_PRESETS: [&str; 10] = [
    "v2/en_speaker_0",
    "v2/en_speaker_1",
    "v2/en_speaker_2",
    "v2/en_speaker_3",
    "v2/en_speaker_4",
    "v2/en_speaker_5",
    "v2/en_speaker_6",
    "v2/en_speaker_7",
    "v2/en_speaker_8",
    "v2/en_speaker_9",
];

/// Adapter for a multi-speaker generative model.
///
/// Every call picks one of [`SPEAKER_PRESETS`] uniformly at random, so the
/// same text can come back in a different voice each time.
///
/// ## Examples
///
/// ```ignore
/// use speech_adapters::{MultiSpeakerAdapter, SpeechBackend};
/// use speech_adapters::config::BarkConfig;
///
/// let adapter = MultiSpeakerAdapter::load(&BarkConfig::default()).await?;
/// let waveform = adapter.generate_speech("Hello there").await?;
/// ```
#[derive(Debug)]
pub struct MultiSpeakerAdapter<M = WorkerModel> {
    model: M,
}

impl MultiSpeakerAdapter<WorkerModel> {
    /// Provider name constant for logs and errors.
    const PROVIDER_NAME: &'static str = "bark";

    /// Resolve the model files and select a device.
    ///
    /// ## Errors
    ///
    /// Returns `TtsError::ModelLoadFailed` if the model cannot be resolved or
    /// its runtime check fails.
    pub async fn load(config: &BarkConfig) -> Result<Self, TtsError> {
        let artifacts = resolve_artifacts(&config.model, &config.files).await?;
        let device = Device::resolve(config.device, config.gpu).await;
        let model = WorkerModel::new(
            Self::PROVIDER_NAME,
            artifacts.dir,
            device,
            config.worker.clone(),
        );
        if let Some(command) = &config.runtime_check {
            model.check(&config.model, command).await?;
        }

        info!(
            provider = Self::PROVIDER_NAME,
            model = %config.model,
            device = %device,
            "Loaded multi-speaker model"
        );

        Ok(Self::with_model(model))
    }
}

impl<M: SpeechModel> MultiSpeakerAdapter<M> {
    /// Wrap an already loaded model.
    pub fn with_model(model: M) -> Self {
        Self { model }
    }

    /// The fixed speaker set.
    pub fn speakers(&self) -> &'static [&'static str] {
        &SPEAKER_PRESETS
    }

    /// Synthesize `text` and also report which speaker was used.
    pub async fn generate_with_speaker(
        &self,
        text: &str,
    ) -> Result<(&'static str, Waveform), TtsError> {
        let speaker = pick_speaker();
        debug!(speaker, text_len = text.len(), "Generating multi-speaker audio");

        let request = GenerationRequest::new(text).with_voice_preset(speaker);
        let waveform = self.model.generate(&request).await?;
        Ok((speaker, waveform))
    }
}

impl<M: SpeechModel> SpeechBackend for MultiSpeakerAdapter<M> {
    type Audio = Waveform;

    fn name(&self) -> &'static str {
        "bark"
    }

    async fn generate_speech(&self, text: &str) -> Result<Waveform, TtsError> {
        self.generate_with_speaker(text)
            .await
            .map(|(_, waveform)| waveform)
    }
}

/// Uniformly random preset. The RNG is dropped before any await point.
fn pick_speaker() -> &'static str {
    let mut rng = rand::thread_rng();
    SPEAKER_PRESETS
        .choose(&mut rng)
        .copied()
        .unwrap_or(SPEAKER_PRESETS[0])
}
