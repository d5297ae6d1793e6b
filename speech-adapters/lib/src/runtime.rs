//! Subprocess inference runner for local models.
//!
//! Local models are executed by a host program (one of the Python runner
//! scripts shipped with the crate, or any configured command). A
//! [`WorkerCommand`] is a template for that program's command line;
//! [`WorkerModel`] renders it per request, runs it in a scratch directory
//! and reads the WAV file it produced.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::Waveform;
use crate::device::Device;
use crate::errors::TtsError;
use crate::traits::{GenerationRequest, SpeechModel};

/// Runner script for multi-speaker Bark checkpoints.
pub const BARK_RUNNER: &str = include_str!("../runners/bark.py");

/// Runner script for VITS checkpoints.
pub const VITS_RUNNER: &str = include_str!("../runners/vits.py");

/// Runner script for a MeloTTS checkout (English US speaker).
pub const MELO_RUNNER: &str = include_str!("../runners/melo.py");

/// A command-line template for an inference program.
///
/// Every argument may contain placeholders which are substituted per call:
///
/// | Placeholder | Value |
/// |---|---|
/// | `{model_dir}` | directory holding the model files |
/// | `{device}` | `cpu` or `cuda:N` |
/// | `{provider}` | `cpu` or `cuda` |
/// | `{gpu}` | accelerator ordinal (`0` on CPU) |
/// | `{text}` | the input text |
/// | `{text_file}` | file containing the input text |
/// | `{output}` | WAV file the program must write |
/// | `{output_dir}` / `{output_name}` | the same path, split |
/// | `{voice_preset}` | the requested preset |
///
/// An argument mentioning `{voice_preset}` is omitted entirely when the
/// request has no preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCommand {
    /// Program to execute (looked up on `PATH`).
    pub program: String,
    /// Argument templates.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for the program.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Default command for Bark checkpoints.
    pub fn bark() -> Self {
        Self::new("python3").with_args([
            "-c",
            BARK_RUNNER,
            "{model_dir}",
            "{device}",
            "{text_file}",
            "{output}",
            "{voice_preset}",
        ])
    }

    /// Default command for VITS checkpoints.
    pub fn vits() -> Self {
        Self::new("python3").with_args([
            "-c",
            VITS_RUNNER,
            "{model_dir}",
            "{device}",
            "{text_file}",
            "{output}",
        ])
    }

    /// Import check for the Bark runner's Python stack.
    pub fn bark_check() -> Self {
        Self::new("python3").with_args(["-c", "import numpy, torch; from transformers import BarkModel"])
    }

    /// Import check for the VITS runner's Python stack.
    pub fn vits_check() -> Self {
        Self::new("python3").with_args(["-c", "import numpy, torch; from transformers import VitsModel"])
    }

    /// Default command for a MeloTTS checkout; `{model_dir}` is the checkout.
    pub fn melo() -> Self {
        Self::new("python3").with_args([
            "-c",
            MELO_RUNNER,
            "{model_dir}",
            "{device}",
            "{text_file}",
            "{output}",
        ])
    }

    /// Substitute placeholders, dropping preset arguments when there is no preset.
    pub fn render_args(&self, invocation: &Invocation<'_>) -> Vec<String> {
        self.args
            .iter()
            .filter_map(|arg| invocation.render(arg))
            .collect()
    }
}

/// Values substituted into a [`WorkerCommand`] for one call.
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub model_dir: &'a Path,
    pub device: Device,
    pub text: &'a str,
    pub text_file: &'a Path,
    pub output: &'a Path,
    pub voice_preset: Option<&'a str>,
}

impl Invocation<'_> {
    fn render(&self, template: &str) -> Option<String> {
        if template.contains("{voice_preset}") && self.voice_preset.is_none() {
            return None;
        }

        let output_dir = self
            .output
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let output_name = self
            .output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Some(
            template
                .replace("{model_dir}", &self.model_dir.display().to_string())
                .replace("{device}", &self.device.to_string())
                .replace("{provider}", self.device.provider_name())
                .replace("{gpu}", &self.device.ordinal().unwrap_or(0).to_string())
                .replace("{text_file}", &self.text_file.display().to_string())
                .replace("{output_dir}", &output_dir)
                .replace("{output_name}", &output_name)
                .replace("{output}", &self.output.display().to_string())
                .replace("{voice_preset}", self.voice_preset.unwrap_or_default())
                // text last so user text is never re-scanned for placeholders
                .replace("{text}", self.text),
        )
    }
}

/// Run `command` for one invocation and wait for it to exit successfully.
///
/// ## Errors
///
/// `ProcessSpawnFailed` if the program cannot be started, `ProcessFailed`
/// if it exits unsuccessfully (stderr, or stdout when stderr is empty).
pub async fn run_worker(
    provider: &str,
    command: &WorkerCommand,
    invocation: &Invocation<'_>,
) -> Result<(), TtsError> {
    let args = command.render_args(invocation);

    let mut cmd = tokio::process::Command::new(&command.program);
    cmd.args(&args);
    if let Some(dir) = &command.working_dir {
        cmd.current_dir(dir);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    debug!(
        provider,
        program = %command.program,
        device = %invocation.device,
        voice_preset = ?invocation.voice_preset,
        text_len = invocation.text.len(),
        "Running inference worker"
    );

    let output = cmd.output().await.map_err(|e| TtsError::ProcessSpawnFailed {
        provider: provider.into(),
        source: e,
    })?;

    if !output.status.success() {
        let error_output = if output.stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).to_string()
        } else {
            String::from_utf8_lossy(&output.stderr).to_string()
        };
        return Err(TtsError::ProcessFailed {
            provider: provider.into(),
            stderr: error_output.trim().to_string(),
        });
    }

    Ok(())
}

/// A local model executed by a [`WorkerCommand`].
#[derive(Debug, Clone)]
pub struct WorkerModel {
    provider: &'static str,
    model_dir: PathBuf,
    device: Device,
    command: WorkerCommand,
}

impl WorkerModel {
    pub fn new(
        provider: &'static str,
        model_dir: impl Into<PathBuf>,
        device: Device,
        command: WorkerCommand,
    ) -> Self {
        Self {
            provider,
            model_dir: model_dir.into(),
            device,
            command,
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Run `command` once against this model's directory and device.
    ///
    /// ## Errors
    ///
    /// Returns `TtsError::ModelLoadFailed` for `model` if the command cannot
    /// be started or exits unsuccessfully.
    pub async fn check(&self, model: &str, command: &WorkerCommand) -> Result<(), TtsError> {
        let invocation = Invocation {
            model_dir: &self.model_dir,
            device: self.device,
            text: "",
            text_file: &self.model_dir,
            output: &self.model_dir,
            voice_preset: None,
        };

        run_worker(self.provider, command, &invocation)
            .await
            .map_err(|e| TtsError::ModelLoadFailed {
                model: model.to_string(),
                message: format!("runtime check failed: {e}"),
            })?;

        debug!(provider = self.provider, program = %command.program, "Runtime check passed");
        Ok(())
    }
}

impl SpeechModel for WorkerModel {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Waveform, TtsError> {
        // Fresh scratch directory per call; some CLIs refuse pre-existing output files.
        let temp_dir = tempfile::tempdir().map_err(|e| TtsError::TempFileError { source: e })?;

        let text_file = temp_dir.path().join("input.txt");
        tokio::fs::write(&text_file, request.text).await?;
        let output = temp_dir.path().join("output.wav");

        let invocation = Invocation {
            model_dir: &self.model_dir,
            device: self.device,
            text: request.text,
            text_file: &text_file,
            output: &output,
            voice_preset: request.voice_preset,
        };
        run_worker(self.provider, &self.command, &invocation).await?;

        let waveform = Waveform::from_wav_file(&output)?;
        debug!(
            provider = self.provider,
            samples = waveform.len(),
            sample_rate = waveform.sample_rate,
            "Worker produced waveform"
        );
        Ok(waveform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation<'a>(output: &'a Path, preset: Option<&'a str>) -> Invocation<'a> {
        Invocation {
            model_dir: Path::new("/models/bark"),
            device: Device::Cuda(1),
            text: "say {device} literally",
            text_file: Path::new("/tmp/in.txt"),
            output,
            voice_preset: preset,
        }
    }

    #[test]
    fn render_substitutes_every_placeholder() {
        let command = WorkerCommand::new("runner").with_args([
            "{model_dir}",
            "--device={device}",
            "--provider={provider}",
            "--gpu={gpu}",
            "{text_file}",
            "{output_dir}/{output_name}",
            "--preset={voice_preset}",
        ]);
        let args = command.render_args(&invocation(Path::new("/tmp/x/out.wav"), Some("v2/en_speaker_4")));
        assert_eq!(
            args,
            vec![
                "/models/bark",
                "--device=cuda:1",
                "--provider=cuda",
                "--gpu=1",
                "/tmp/in.txt",
                "/tmp/x/out.wav",
                "--preset=v2/en_speaker_4",
            ]
        );
    }

    #[test]
    fn preset_argument_dropped_without_preset() {
        let args = WorkerCommand::bark().render_args(&invocation(Path::new("/o.wav"), None));
        assert!(!args.iter().any(|a| a.contains("speaker")));
        assert_eq!(args.last().map(String::as_str), Some("/o.wav"));
    }

    #[test]
    fn text_is_not_rescanned_for_placeholders() {
        let command = WorkerCommand::new("melo").with_args(["{text}"]);
        let args = command.render_args(&invocation(Path::new("/o.wav"), None));
        assert_eq!(args, vec!["say {device} literally"]);
    }

    #[test]
    fn default_commands_embed_runner_scripts() {
        assert!(WorkerCommand::bark().args[1].contains("BarkModel"));
        assert!(WorkerCommand::vits().args[1].contains("VitsModel"));
        assert!(WorkerCommand::melo().args[1].contains("melo.api"));
        assert!(WorkerCommand::melo().args[1].contains("EN-US"));
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        fn fixture_wav(dir: &Path) -> PathBuf {
            let path = dir.join("fixture.wav");
            Waveform::new((0..160).map(|i| (i as f32 / 160.0) - 0.5).collect(), 16_000)
                .write_wav(&path)
                .unwrap();
            path
        }

        #[tokio::test]
        async fn worker_model_reads_generated_wav() {
            let dir = tempfile::tempdir().unwrap();
            let fixture = fixture_wav(dir.path());
            let command = WorkerCommand::new("cp").with_args([fixture.to_str().unwrap(), "{output}"]);
            let model = WorkerModel::new("test", dir.path(), Device::Cpu, command);

            let waveform = model.generate(&GenerationRequest::new("hello")).await.unwrap();
            assert_eq!(waveform.len(), 160);
            assert_eq!(waveform.sample_rate, 16_000);
        }

        #[tokio::test]
        async fn worker_receives_text_file_and_device() {
            let dir = tempfile::tempdir().unwrap();
            let fixture = fixture_wav(dir.path());
            let record = dir.path().join("record.txt");
            let script = format!(
                "cat \"$1\" > {rec}; printf ' %s' \"$2\" >> {rec}; cp {fix} \"$3\"",
                rec = record.display(),
                fix = fixture.display()
            );
            let command = WorkerCommand::new("sh").with_args([
                "-c",
                script.as_str(),
                "worker",
                "{text_file}",
                "{device}",
                "{output}",
            ]);
            let model = WorkerModel::new("test", dir.path(), Device::Cuda(0), command);

            model.generate(&GenerationRequest::new("hello world")).await.unwrap();
            let recorded = std::fs::read_to_string(&record).unwrap();
            assert_eq!(recorded, "hello world cuda:0");
        }

        #[tokio::test]
        async fn check_passes_for_working_runtime() {
            let model = WorkerModel::new("test", "/tmp", Device::Cpu, WorkerCommand::new("true"));
            model.check("local", &WorkerCommand::new("true")).await.unwrap();
        }

        #[tokio::test]
        async fn check_failure_is_a_load_error() {
            let model = WorkerModel::new("test", "/tmp", Device::Cpu, WorkerCommand::new("true"));
            let command = WorkerCommand::new("sh")
                .with_args(["-c", "echo \"No module named 'transformers'\" >&2; exit 1"]);

            let err = model.check("suno/bark", &command).await.unwrap_err();
            match err {
                TtsError::ModelLoadFailed { model, message } => {
                    assert_eq!(model, "suno/bark");
                    assert!(message.contains("transformers"));
                }
                other => panic!("expected ModelLoadFailed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn check_with_missing_interpreter_is_a_load_error() {
            let model = WorkerModel::new("test", "/tmp", Device::Cpu, WorkerCommand::new("true"));
            let command = WorkerCommand::new("definitely-not-an-interpreter-7f3a");

            let err = model.check("m", &command).await.unwrap_err();
            assert!(matches!(err, TtsError::ModelLoadFailed { .. }));
        }

        #[tokio::test]
        async fn failing_worker_reports_stderr() {
            let command = WorkerCommand::new("sh").with_args(["-c", "echo boom >&2; exit 3"]);
            let model = WorkerModel::new("test", "/tmp", Device::Cpu, command);

            let err = model.generate(&GenerationRequest::new("x")).await.unwrap_err();
            match err {
                TtsError::ProcessFailed { provider, stderr } => {
                    assert_eq!(provider, "test");
                    assert_eq!(stderr, "boom");
                }
                other => panic!("expected ProcessFailed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn failing_worker_falls_back_to_stdout() {
            let command = WorkerCommand::new("sh").with_args(["-c", "echo model missing; exit 1"]);
            let model = WorkerModel::new("test", "/tmp", Device::Cpu, command);

            let err = model.generate(&GenerationRequest::new("x")).await.unwrap_err();
            assert!(err.to_string().contains("model missing"));
        }

        #[tokio::test]
        async fn missing_program_is_spawn_error() {
            let command = WorkerCommand::new("definitely-not-a-real-tts-runner");
            let model = WorkerModel::new("test", "/tmp", Device::Cpu, command);

            let err = model.generate(&GenerationRequest::new("x")).await.unwrap_err();
            assert!(matches!(err, TtsError::ProcessSpawnFailed { .. }));
        }

        #[tokio::test]
        async fn worker_without_output_is_decode_error() {
            let command = WorkerCommand::new("true");
            let model = WorkerModel::new("test", "/tmp", Device::Cpu, command);

            let err = model.generate(&GenerationRequest::new("x")).await.unwrap_err();
            assert!(matches!(err, TtsError::AudioDecodeFailed { .. }));
        }
    }
}
