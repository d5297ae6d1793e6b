//! Adapter configuration.
//!
//! Every section is optional; missing values fall back to the defaults of
//! the corresponding backend. The file format is TOML:
//!
//! ```toml
//! [bark]
//! model = "suno/bark"
//! gpu = 0
//! # device = "cuda:1"   # skips accelerator detection
//!
//! [mms]
//! model = "facebook/mms-tts-eng"
//!
//! [elevenlabs]
//! api_key = "..."
//!
//! [melo]
//! toolkit_dir = "MeloTTS"
//! ```
//!
//! ## Lookup Order
//!
//! 1. an explicit path passed to [`AdapterConfig::load`]
//! 2. the file named by `SPEECH_ADAPTERS_CONFIG`
//! 3. `<config dir>/speech-adapters/config.toml`, if it exists
//! 4. built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::errors::TtsError;
use crate::providers::local::SPEAKER_PRESETS;
use crate::runtime::WorkerCommand;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "SPEECH_ADAPTERS_CONFIG";

/// Environment variables checked for the ElevenLabs API key, in order.
pub const ELEVENLABS_KEY_ENV: [&str; 2] = ["ELEVENLABS_API_KEY", "ELEVEN_LABS_API_KEY"];

/// Default ElevenLabs API endpoint.
pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// Default ElevenLabs model for multilingual support.
pub const ELEVENLABS_MODEL_ID: &str = "eleven_multilingual_v2";

/// Upstream MeloTTS repository.
pub const MELO_REPOSITORY: &str = "https://github.com/myshell-ai/MeloTTS.git";

/// Top-level configuration for all adapters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub bark: BarkConfig,
    pub mms: VocoderConfig,
    pub elevenlabs: ElevenLabsConfig,
    pub melo: MeloConfig,
}

impl AdapterConfig {
    /// Load configuration following the lookup order described above.
    ///
    /// ## Errors
    ///
    /// Returns `TtsError::Config` if a named file is unreadable or invalid.
    /// A missing file at the default location is not an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, TtsError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }

        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, TtsError> {
        let contents = std::fs::read_to_string(path).map_err(|e| TtsError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let config = Self::from_toml(&contents).map_err(|message| TtsError::Config {
            path: path.to_path_buf(),
            message,
        })?;

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    /// `<config dir>/speech-adapters/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("speech-adapters").join("config.toml"))
    }
}

// ============================================================================
// Local model sections
// ============================================================================

/// Multi-speaker generative model (Bark).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarkConfig {
    /// Hub id or local directory.
    pub model: String,
    /// Preferred accelerator ordinal.
    pub gpu: u32,
    /// Explicit device (`cpu` / `cuda:N`); overrides `gpu` and skips detection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    /// Files that must be present in the model directory.
    pub files: Vec<String>,
    /// Inference program template.
    pub worker: WorkerCommand,
    /// Runtime check run once at load; failure fails construction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_check: Option<WorkerCommand>,
}

impl Default for BarkConfig {
    fn default() -> Self {
        let mut files: Vec<String> = [
            "config.json",
            "generation_config.json",
            "pytorch_model.bin",
            "speaker_embeddings_path.json",
            "special_tokens_map.json",
            "tokenizer_config.json",
            "vocab.txt",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        for preset in SPEAKER_PRESETS {
            for prompt in ["semantic", "coarse", "fine"] {
                files.push(format!("speaker_embeddings/{preset}_{prompt}_prompt.npy"));
            }
        }

        Self {
            model: "suno/bark".into(),
            gpu: 0,
            device: None,
            files,
            worker: WorkerCommand::bark(),
            runtime_check: Some(WorkerCommand::bark_check()),
        }
    }
}

/// Single-language vocoder model (MMS VITS).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocoderConfig {
    pub model: String,
    pub gpu: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    pub files: Vec<String>,
    pub worker: WorkerCommand,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_check: Option<WorkerCommand>,
}

impl Default for VocoderConfig {
    fn default() -> Self {
        Self {
            model: "facebook/mms-tts-eng".into(),
            gpu: 0,
            device: None,
            files: [
                "config.json",
                "model.safetensors",
                "special_tokens_map.json",
                "tokenizer_config.json",
                "vocab.json",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            worker: WorkerCommand::vits(),
            runtime_check: Some(WorkerCommand::vits_check()),
        }
    }
}

// ============================================================================
// Cloud section
// ============================================================================

/// ElevenLabs cloud API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevenLabsConfig {
    /// API key; falls back to the environment when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model_id: String,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: ELEVENLABS_BASE_URL.into(),
            model_id: ELEVENLABS_MODEL_ID.into(),
        }
    }
}

impl ElevenLabsConfig {
    /// The configured key, else `ELEVENLABS_API_KEY`, else `ELEVEN_LABS_API_KEY`.
    ///
    /// Blank values are ignored.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                ELEVENLABS_KEY_ENV
                    .iter()
                    .filter_map(|name| std::env::var(name).ok())
                    .find(|key| !key.trim().is_empty())
            })
    }
}

// ============================================================================
// Toolkit section
// ============================================================================

/// MeloTTS community toolkit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeloConfig {
    pub gpu: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    /// Checkout location; relative paths resolve against the working directory.
    pub toolkit_dir: PathBuf,
    /// Repository cloned by the setup step.
    pub repository: String,
    /// Where generated files are written (system temp dir when unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Synthesis program template; runs inside `toolkit_dir`.
    pub worker: WorkerCommand,
    /// Language-data download run once after cloning.
    pub language_data: WorkerCommand,
}

impl Default for MeloConfig {
    fn default() -> Self {
        Self {
            gpu: 0,
            device: None,
            toolkit_dir: PathBuf::from("MeloTTS"),
            repository: MELO_REPOSITORY.into(),
            output_dir: None,
            worker: WorkerCommand::melo(),
            language_data: WorkerCommand::new("python3").with_args(["-m", "unidic", "download"]),
        }
    }
}

impl MeloConfig {
    /// Directory generated audio files are written to.
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("speech-adapters"))
    }
}
