//! MeloTTS toolkit adapter.
//!
//! Speaks with the fixed English (US) voice and writes the result to a WAV
//! file in the configured output directory. The toolkit checkout must
//! already exist; see [`ToolkitAdapter::bootstrap`] for provisioning.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::bootstrap::{Provisioner, ensure_toolkit};
use crate::config::MeloConfig;
use crate::device::Device;
use crate::errors::TtsError;
use crate::runtime::{Invocation, WorkerCommand, run_worker};
use crate::traits::SpeechBackend;

const PROVIDER_NAME: &str = "melo";

/// Adapter for the MeloTTS toolkit.
///
/// ## Examples
///
/// ```ignore
/// use speech_adapters::{GitProvisioner, SpeechBackend, ToolkitAdapter};
/// use speech_adapters::config::MeloConfig;
///
/// let config = MeloConfig::default();
/// let provisioner = GitProvisioner::new(config.language_data.clone());
/// let adapter = ToolkitAdapter::bootstrap(&config, &provisioner).await?;
/// let path = adapter.generate_speech("Hello there").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ToolkitAdapter {
    toolkit_dir: PathBuf,
    output_dir: PathBuf,
    device: Device,
    worker: WorkerCommand,
}

impl ToolkitAdapter {
    /// Use an existing toolkit checkout.
    ///
    /// ## Errors
    ///
    /// Returns `TtsError::ToolkitMissing` if the toolkit directory does not exist.
    pub async fn new(config: &MeloConfig) -> Result<Self, TtsError> {
        if !config.toolkit_dir.is_dir() {
            return Err(TtsError::ToolkitMissing {
                path: config.toolkit_dir.clone(),
            });
        }

        let device = Device::resolve(config.device, config.gpu).await;
        let mut worker = config.worker.clone();
        if worker.working_dir.is_none() {
            worker.working_dir = Some(config.toolkit_dir.clone());
        }

        info!(
            provider = PROVIDER_NAME,
            toolkit = %config.toolkit_dir.display(),
            device = %device,
            "Using toolkit checkout"
        );

        Ok(Self {
            toolkit_dir: config.toolkit_dir.clone(),
            output_dir: config.resolved_output_dir(),
            device,
            worker,
        })
    }

    /// Provision the toolkit if it is missing, then construct the adapter.
    pub async fn bootstrap<P: Provisioner>(
        config: &MeloConfig,
        provisioner: &P,
    ) -> Result<Self, TtsError> {
        ensure_toolkit(&config.toolkit_dir, &config.repository, provisioner).await?;
        Self::new(config).await
    }

    pub fn toolkit_dir(&self) -> &Path {
        &self.toolkit_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Reserve a uniquely named `.wav` file in the output directory.
    async fn reserve_output(&self) -> Result<PathBuf, TtsError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        tempfile::Builder::new()
            .prefix("melo-")
            .suffix(".wav")
            .tempfile_in(&self.output_dir)
            .map_err(|e| TtsError::TempFileError { source: e })?
            .into_temp_path()
            .keep()
            .map_err(|e| TtsError::TempFileError { source: e.error })
    }

    async fn synthesize_into(&self, text: &str, output: &Path) -> Result<(), TtsError> {
        let scratch = tempfile::tempdir().map_err(|e| TtsError::TempFileError { source: e })?;
        let text_file = scratch.path().join("input.txt");
        tokio::fs::write(&text_file, text).await?;

        let invocation = Invocation {
            model_dir: &self.toolkit_dir,
            device: self.device,
            text,
            text_file: &text_file,
            output,
            voice_preset: None,
        };
        run_worker(PROVIDER_NAME, &self.worker, &invocation).await?;

        let written = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(TtsError::AudioDecodeFailed {
                path: output.to_path_buf(),
                message: "toolkit produced no audio".into(),
            });
        }

        debug!(path = %output.display(), audio_size = written, "Toolkit wrote audio file");
        Ok(())
    }
}

impl SpeechBackend for ToolkitAdapter {
    type Audio = PathBuf;

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn generate_speech(&self, text: &str) -> Result<PathBuf, TtsError> {
        let output = self.reserve_output().await?;

        if let Err(e) = self.synthesize_into(text, &output).await {
            if let Err(cleanup) = tokio::fs::remove_file(&output).await {
                warn!(path = %output.display(), error = %cleanup, "Failed to remove partial output");
            }
            return Err(e);
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(root: &Path, worker: WorkerCommand) -> MeloConfig {
        let toolkit_dir = root.join("MeloTTS");
        std::fs::create_dir_all(&toolkit_dir).unwrap();
        MeloConfig {
            toolkit_dir,
            device: Some(Device::Cpu),
            output_dir: Some(root.join("out")),
            worker,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_toolkit_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let config = MeloConfig {
            toolkit_dir: root.path().join("absent"),
            ..Default::default()
        };

        let err = ToolkitAdapter::new(&config).await.unwrap_err();
        match err {
            TtsError::ToolkitMissing { path } => assert!(path.ends_with("absent")),
            other => panic!("expected ToolkitMissing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn worker_defaults_to_toolkit_working_dir() {
        let root = tempfile::tempdir().unwrap();
        let config = config_in(root.path(), WorkerCommand::melo());

        let adapter = ToolkitAdapter::new(&config).await.unwrap();
        assert_eq!(adapter.worker.working_dir.as_deref(), Some(adapter.toolkit_dir()));
        assert_eq!(adapter.output_dir(), root.path().join("out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn writes_wav_file_from_inside_toolkit() {
        let root = tempfile::tempdir().unwrap();
        // writes the working directory and the text into the output file
        let worker = WorkerCommand::new("sh").with_args([
            "-c",
            "pwd > \"$2\"; printf '%s' \"$1\" >> \"$2\"",
            "sh",
            "{text}",
            "{output}",
        ]);
        let config = config_in(root.path(), worker);
        let adapter = ToolkitAdapter::new(&config).await.unwrap();

        let path = adapter.generate_speech("hello world").await.unwrap();

        assert!(path.starts_with(root.path().join("out")));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("melo-") && name.ends_with(".wav"));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("MeloTTS"));
        assert!(contents.ends_with("hello world"));
    }

    #[test]
    fn default_worker_runs_the_checkout_through_python() {
        let worker = MeloConfig::default().worker;
        assert_eq!(worker.program, "python3");
        assert!(worker.args.iter().any(|arg| arg == "{model_dir}"));
        assert!(worker.args[1].contains("sys.path.insert(0, toolkit_dir)"));
    }

    /// A minimal `melo.api` stand-in that records its inputs instead of synthesizing.
    const STAND_IN_API: &str = r#"
class _Data:
    spk2id = {"EN-US": 1, "EN-BR": 2}

class _Hps:
    data = _Data()

class TTS:
    def __init__(self, language, device):
        self.language = language
        self.device = device
        self.hps = _Hps()

    def tts_to_file(self, text, speaker_id, output_path):
        with open(output_path, "w", encoding="utf-8") as f:
            f.write(f"{self.language}|{self.device}|{speaker_id}|{text}")
"#;

    #[tokio::test]
    async fn default_worker_imports_from_the_checkout() {
        if which::which("python3").is_err() {
            eprintln!("python3 not available; skipping");
            return;
        }

        let root = tempfile::tempdir().unwrap();
        let config = config_in(root.path(), WorkerCommand::melo());
        let package = config.toolkit_dir.join("melo");
        std::fs::create_dir_all(&package).unwrap();
        std::fs::write(package.join("__init__.py"), "").unwrap();
        std::fs::write(package.join("api.py"), STAND_IN_API).unwrap();

        let adapter = ToolkitAdapter::new(&config).await.unwrap();
        let path = adapter.generate_speech("hello world").await.unwrap();

        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written, "EN|cpu|1|hello world");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn each_call_gets_its_own_file() {
        let root = tempfile::tempdir().unwrap();
        let worker = WorkerCommand::new("sh").with_args(["-c", "echo audio > \"$1\"", "sh", "{output}"]);
        let adapter = ToolkitAdapter::new(&config_in(root.path(), worker)).await.unwrap();

        let first = adapter.generate_speech("one").await.unwrap();
        let second = adapter.generate_speech("two").await.unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_removes_reserved_file() {
        let root = tempfile::tempdir().unwrap();
        let worker = WorkerCommand::new("sh").with_args(["-c", "echo 'model not found' >&2; exit 3"]);
        let adapter = ToolkitAdapter::new(&config_in(root.path(), worker)).await.unwrap();

        let err = adapter.generate_speech("hi").await.unwrap_err();
        assert!(matches!(err, TtsError::ProcessFailed { .. }));
        assert!(adapter.generate_speech_or_log("hi").await.is_none());

        let leftovers = std::fs::read_dir(root.path().join("out")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_worker_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let config = config_in(root.path(), WorkerCommand::new("true"));
        let adapter = ToolkitAdapter::new(&config).await.unwrap();

        let err = adapter.generate_speech("hi").await.unwrap_err();
        assert!(matches!(err, TtsError::AudioDecodeFailed { .. }));
    }

    #[tokio::test]
    async fn bootstrap_provisions_then_constructs() {
        struct MkdirProvisioner;

        impl Provisioner for MkdirProvisioner {
            async fn clone_repository(&self, _url: &str, dest: &Path) -> Result<(), TtsError> {
                std::fs::create_dir_all(dest)?;
                Ok(())
            }

            async fn install_language_data(&self, _dir: &Path) -> Result<(), TtsError> {
                Ok(())
            }
        }

        let root = tempfile::tempdir().unwrap();
        let config = MeloConfig {
            toolkit_dir: root.path().join("MeloTTS"),
            ..Default::default()
        };
        assert!(ToolkitAdapter::new(&config).await.is_err());

        let adapter = ToolkitAdapter::bootstrap(&config, &MkdirProvisioner).await.unwrap();
        assert_eq!(adapter.toolkit_dir(), config.toolkit_dir);
    }
}
