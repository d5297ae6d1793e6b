//! Single-language vocoder backend (MMS VITS).

use tracing::{debug, info};

use crate::audio::Waveform;
use crate::config::VocoderConfig;
use crate::device::Device;
use crate::errors::TtsError;
use crate::hub::resolve_artifacts;
use crate::runtime::WorkerModel;
use crate::traits::{GenerationRequest, SpeechBackend, SpeechModel};

/// Adapter for a single-language tokenizer + vocoder model.
///
/// There is no speaker choice and no randomness on this path: the same
/// text always produces the same waveform.
#[derive(Debug)]
pub struct VocoderAdapter<M = WorkerModel> {
    model: M,
}

impl VocoderAdapter<WorkerModel> {
    const PROVIDER_NAME: &'static str = "mms";

    /// Resolve the model files and select a device.
    pub async fn load(config: &VocoderConfig) -> Result<Self, TtsError> {
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
            "Loaded vocoder model"
        );

        Ok(Self::with_model(model))
    }
}

impl<M: SpeechModel> VocoderAdapter<M> {
    pub fn with_model(model: M) -> Self {
        Self { model }
    }
}

impl<M: SpeechModel> SpeechBackend for VocoderAdapter<M> {
    type Audio = Waveform;

    fn name(&self) -> &'static str {
        "mms"
    }

    async fn generate_speech(&self, text: &str) -> Result<Waveform, TtsError> {
        debug!(text_len = text.len(), "Generating vocoder audio");
        self.model.generate(&GenerationRequest::new(text)).await
    }
}
