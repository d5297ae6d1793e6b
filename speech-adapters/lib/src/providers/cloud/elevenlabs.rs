//! ElevenLabs cloud TTS adapter.
//!
//! The voice catalog is fetched once when the adapter is constructed; every
//! call then picks one of those voices at random and asks the API to speak
//! the text with it.
//!
//! ## Environment Variables
//!
//! When no key is configured explicitly, the API key is read from:
//! - `ELEVENLABS_API_KEY`
//! - `ELEVEN_LABS_API_KEY`
//!
//! ## Examples
//!
//! ```ignore
//! use speech_adapters::{CloudVoiceAdapter, SpeechBackend};
//! use speech_adapters::config::ElevenLabsConfig;
//!
//! let adapter = CloudVoiceAdapter::connect(&ElevenLabsConfig::default()).await?;
//! let audio = adapter.generate_speech("Hello, world!").await?;
//! ```

use std::collections::BTreeMap;
use std::future::Future;

use rand::seq::SliceRandom;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audio::EncodedAudio;
use crate::config::{ELEVENLABS_BASE_URL, ELEVENLABS_MODEL_ID, ElevenLabsConfig};
use crate::errors::TtsError;
use crate::traits::SpeechBackend;

const PROVIDER_NAME: &str = "elevenlabs";

/// Header carrying the ElevenLabs API key.
const API_KEY_HEADER: &str = "xi-api-key";

// ============================================================================
// Wire types
// ============================================================================

/// A voice from the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Identifier used when requesting speech.
    pub voice_id: String,
    /// Display name.
    pub name: String,
    /// Catalog category (`premade`, `cloned`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Free-form labels such as `gender` or `accent`.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Voice {
    pub fn new(voice_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            voice_id: voice_id.into(),
            name: name.into(),
            category: None,
            labels: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListVoicesResponse {
    voices: Vec<Voice>,
}

#[derive(Debug, Serialize)]
struct CreateSpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
}

// ============================================================================
// Remote API seam
// ============================================================================

/// The two remote operations the cloud adapter needs.
pub trait VoiceApi: Send + Sync {
    /// Fetch the voice catalog.
    fn list_voices(&self) -> impl Future<Output = Result<Vec<Voice>, TtsError>> + Send;

    /// Speak `text` with the voice `voice_id`, returning encoded audio bytes.
    fn synthesize(
        &self,
        voice_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<Vec<u8>, TtsError>> + Send;
}

/// HTTP client for the ElevenLabs API.
pub struct ElevenLabsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model_id: String,
}

impl std::fmt::Debug for ElevenLabsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsClient")
            .field("base_url", &self.base_url)
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

impl ElevenLabsClient {
    /// Create a client for the public API.
    ///
    /// ## Errors
    ///
    /// Returns `TtsError::MissingApiKey` if `api_key` is blank.
    pub fn new(api_key: impl Into<String>) -> Result<Self, TtsError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TtsError::MissingApiKey {
                provider: PROVIDER_NAME.into(),
            });
        }

        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: ELEVENLABS_BASE_URL.into(),
            model_id: ELEVENLABS_MODEL_ID.into(),
        })
    }

    /// Create a client from configuration, falling back to the environment for the key.
    pub fn from_config(config: &ElevenLabsConfig) -> Result<Self, TtsError> {
        let api_key = config
            .resolved_api_key()
            .ok_or_else(|| TtsError::MissingApiKey {
                provider: PROVIDER_NAME.into(),
            })?;

        Ok(Self::new(api_key)?
            .with_base_url(&config.base_url)
            .with_model(&config.model_id))
    }

    /// Point the client at a different server. Useful for testing with mock servers.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the synthesis model id.
    #[must_use]
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Turn a non-success response into `TtsError::ApiError`.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TtsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(TtsError::ApiError {
            provider: PROVIDER_NAME.into(),
            status: status.as_u16(),
            message,
        })
    }
}

fn http_error(e: reqwest::Error) -> TtsError {
    TtsError::HttpError {
        provider: PROVIDER_NAME.into(),
        message: e.to_string(),
    }
}

impl VoiceApi for ElevenLabsClient {
    async fn list_voices(&self) -> Result<Vec<Voice>, TtsError> {
        let response = self
            .http
            .get(format!("{}/v1/voices", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(http_error)?;

        let body: ListVoicesResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(http_error)?;

        Ok(body.voices)
    }

    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>, TtsError> {
        debug!(
            voice_id = %voice_id,
            text_len = text.len(),
            model = %self.model_id,
            "Sending ElevenLabs TTS request"
        );

        let response = self
            .http
            .post(format!("{}/v1/text-to-speech/{}", self.base_url, voice_id))
            .header(API_KEY_HEADER, &self.api_key)
            .header(ACCEPT, "audio/mpeg")
            .json(&CreateSpeechBody {
                text,
                model_id: &self.model_id,
            })
            .send()
            .await
            .map_err(http_error)?;

        let audio_bytes = Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(http_error)?;

        debug!(audio_size = audio_bytes.len(), "Received ElevenLabs audio response");
        Ok(audio_bytes.to_vec())
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Adapter for a cloud TTS API with a random voice per call.
///
/// Construction fails if the catalog is empty, so every selection is
/// drawn from a non-empty, construction-time list.
#[derive(Debug)]
pub struct CloudVoiceAdapter<C = ElevenLabsClient> {
    client: C,
    voices: Vec<Voice>,
}

impl CloudVoiceAdapter<ElevenLabsClient> {
    /// Build the HTTP client from configuration and fetch the catalog.
    pub async fn connect(config: &ElevenLabsConfig) -> Result<Self, TtsError> {
        Self::with_client(ElevenLabsClient::from_config(config)?).await
    }
}

impl<C: VoiceApi> CloudVoiceAdapter<C> {
    /// Fetch the voice catalog through `client`.
    ///
    /// ## Errors
    ///
    /// Propagates catalog fetch failures; returns
    /// `TtsError::NoVoicesAvailable` for an empty catalog.
    pub async fn with_client(client: C) -> Result<Self, TtsError> {
        let voices = client.list_voices().await?;
        if voices.is_empty() {
            return Err(TtsError::NoVoicesAvailable {
                provider: PROVIDER_NAME.into(),
            });
        }

        info!(provider = PROVIDER_NAME, voices = voices.len(), "Fetched voice catalog");
        Ok(Self { client, voices })
    }

    /// The catalog fetched at construction.
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    fn pick_voice(&self) -> Result<&Voice, TtsError> {
        let mut rng = rand::thread_rng();
        self.voices
            .choose(&mut rng)
            .ok_or_else(|| TtsError::NoVoicesAvailable {
                provider: PROVIDER_NAME.into(),
            })
    }

    /// Synthesize `text` and also report which voice was used.
    pub async fn generate_with_voice(&self, text: &str) -> Result<(&Voice, EncodedAudio), TtsError> {
        let voice = self.pick_voice()?;
        let bytes = self.client.synthesize(&voice.voice_id, text).await?;
        Ok((voice, EncodedAudio::new(bytes)))
    }
}

impl<C: VoiceApi> SpeechBackend for CloudVoiceAdapter<C> {
    type Audio = EncodedAudio;

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn generate_speech(&self, text: &str) -> Result<EncodedAudio, TtsError> {
        self.generate_with_voice(text).await.map(|(_, audio)| audio)
    }
}

// ============================================================================
// Tests
// ============================================================================
