use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use speech_adapters::{
    AdapterConfig, CloudVoiceAdapter, GitProvisioner, MultiSpeakerAdapter, ProvisionOutcome,
    SpeechAudio, SpeechBackend, ToolkitAdapter, TtsError, VocoderAdapter, ensure_toolkit,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Maximum number of bytes read from stdin.
const STDIN_LIMIT: u64 = 10_000;

/// Generate speech with one of several TTS backends
#[derive(Parser)]
#[command(name = "speech-adapters")]
#[command(about = "Generate speech with one of several TTS backends", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (defaults to $SPEECH_ADAPTERS_CONFIG or the user config dir)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize text and write the audio to a file
    Speak {
        /// Backend to use
        #[arg(value_enum)]
        backend: Backend,

        /// Text to speak (reads from stdin if not provided)
        text: Vec<String>,

        /// Output file; the natural extension is added when missing
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List the voices of the cloud backend
    Voices,

    /// Clone the MeloTTS toolkit and download its language data
    Setup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Suno Bark, random English speaker
    Bark,
    /// MMS VITS, deterministic English voice
    Mms,
    /// ElevenLabs API, random catalog voice
    Elevenlabs,
    /// MeloTTS toolkit, EN-US voice
    Melo,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Tts(#[from] TtsError),

    #[error("failed to read stdin: {0}")]
    Stdin(#[source] io::Error),

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("no input provided (usage: speech-adapters speak <backend> <text> or pipe text on stdin)")]
    EmptyInput,
}

fn init_tracing(verbose: u8) {
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,speech_adapters=info".to_string(),
            2 => "info,speech_adapters=debug".to_string(),
            _ => "debug,speech_adapters=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(verbose >= 2)
                .with_file(verbose >= 3)
                .with_line_number(verbose >= 3)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

/// Joins multiple arguments into a single string with spaces.
fn join_args(args: Vec<String>) -> String {
    args.join(" ")
}

/// Reads at most [`STDIN_LIMIT`] bytes, dropping a character split by the cut.
fn read_text(reader: impl Read) -> Result<String, CliError> {
    let mut buffer = Vec::new();
    reader
        .take(STDIN_LIMIT)
        .read_to_end(&mut buffer)
        .map_err(CliError::Stdin)?;

    let valid = match std::str::from_utf8(&buffer) {
        Ok(text) => text,
        // a multi-byte character cut by the limit is dropped
        Err(e) if e.error_len().is_none() => {
            std::str::from_utf8(&buffer[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(e) => {
            return Err(CliError::Stdin(io::Error::new(io::ErrorKind::InvalidData, e)));
        }
    };

    let text = valid.trim().to_string();
    if text.is_empty() {
        return Err(CliError::EmptyInput);
    }
    Ok(text)
}

async fn speak(
    config: &AdapterConfig,
    backend: Backend,
    text: &str,
    output: Option<&Path>,
) -> Result<PathBuf, CliError> {
    let audio: SpeechAudio = match backend {
        Backend::Bark => {
            let adapter = MultiSpeakerAdapter::load(&config.bark).await?;
            let (speaker, waveform) = adapter.generate_with_speaker(text).await?;
            tracing::info!(speaker, "Generated speech");
            waveform.into()
        }
        Backend::Mms => VocoderAdapter::load(&config.mms)
            .await?
            .generate_speech(text)
            .await?
            .into(),
        Backend::Elevenlabs => {
            let adapter = CloudVoiceAdapter::connect(&config.elevenlabs).await?;
            let (voice, audio) = adapter.generate_with_voice(text).await?;
            tracing::info!(voice_id = %voice.voice_id, voice = %voice.name, "Generated speech");
            audio.into()
        }
        Backend::Melo => {
            let generated = ToolkitAdapter::new(&config.melo)
                .await?
                .generate_speech(text)
                .await?;
            return match output {
                // already on disk
                None => Ok(generated),
                Some(dest) => move_file(&generated, dest),
            };
        }
    };

    let dest = output.unwrap_or_else(|| Path::new("speech"));
    Ok(audio.save(dest)?)
}

/// Move a generated file to `dest`, adding its extension when `dest` has none.
///
/// Falls back to copy-and-delete when a rename is not possible (e.g. across
/// filesystems).
fn move_file(source: &Path, dest: &Path) -> Result<PathBuf, CliError> {
    let dest = if dest.extension().is_none() {
        dest.with_extension(SpeechAudio::File(source.to_path_buf()).extension())
    } else {
        dest.to_path_buf()
    };

    if std::fs::rename(source, &dest).is_err() {
        SpeechAudio::File(source.to_path_buf()).save(&dest)?;
        std::fs::remove_file(source).map_err(CliError::Io)?;
    }
    Ok(dest)
}

async fn list_voices(config: &AdapterConfig) -> Result<(), CliError> {
    let adapter = CloudVoiceAdapter::connect(&config.elevenlabs).await?;
    for voice in adapter.voices() {
        println!(
            "{}\t{}\t{}",
            voice.voice_id,
            voice.name,
            voice.category.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn setup(config: &AdapterConfig) -> Result<(), CliError> {
    let melo = &config.melo;
    let provisioner = GitProvisioner::new(melo.language_data.clone());

    match ensure_toolkit(&melo.toolkit_dir, &melo.repository, &provisioner).await? {
        ProvisionOutcome::AlreadyPresent => {
            println!("{} already present", melo.toolkit_dir.display());
        }
        ProvisionOutcome::Provisioned => {
            println!("provisioned {}", melo.toolkit_dir.display());
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = AdapterConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Speak {
            backend,
            text,
            output,
        } => {
            let text = if text.is_empty() {
                read_text(io::stdin())?
            } else {
                join_args(text)
            };
            let path = speak(&config, backend, &text, output.as_deref()).await?;
            println!("{}", path.display());
        }
        Command::Voices => list_voices(&config).await?,
        Command::Setup => setup(&config).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
