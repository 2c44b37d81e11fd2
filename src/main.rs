use anyhow::{Context, Result};
use chunkscribe::audio::AudioBuffer;
use chunkscribe::audio::wav::{decode_wav_file, decode_wav_stdin};
use chunkscribe::cli::{Cli, Commands};
use chunkscribe::config::Config;
use chunkscribe::{ScribeError, TranscriptionOrchestrator, dedupe};
use clap::Parser;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;

/// Transcription overrides taken from the command line.
#[derive(Debug, Default)]
struct Overrides {
    timeout: Option<Duration>,
    workers: Option<usize>,
    chunk_ms: Option<u32>,
    overlap_ms: Option<u32>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("Warning: {:#}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Transcribe {
            input,
            language,
            json,
            timeout,
            workers,
            chunk_ms,
            overlap_ms,
        } => {
            let overrides = Overrides {
                timeout,
                workers,
                chunk_ms,
                overlap_ms,
            };
            let config = load_config(cli.config.as_deref(), &overrides)?;
            transcribe(&config, &input, language.as_deref(), json).await
        }
        Commands::Backends => {
            let config = load_config(cli.config.as_deref(), &Overrides::default())?;
            list_backends(&config)
        }
        Commands::Dedupe { text } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("failed to read text from stdin")?;
                    buf
                }
            };
            println!("{}", dedupe(&text));
            Ok(())
        }
        Commands::Config => {
            let config = load_config(cli.config.as_deref(), &Overrides::default())?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Install a stderr fmt layer. RUST_LOG wins over `-v`.
fn init_tracing(verbose: u8) -> Result<()> {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let subscriber = tracing_subscriber::Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false),
    );

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")
}

fn load_config(custom_path: Option<&Path>, overrides: &Overrides) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => Config::default(),
        },
    };

    let mut config = config.with_env_overrides();
    if let Some(timeout) = overrides.timeout {
        config.transcription.chunk_timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
    }
    if let Some(workers) = overrides.workers {
        config.transcription.workers = Some(workers);
    }
    if let Some(chunk_ms) = overrides.chunk_ms {
        config.transcription.chunk_ms = chunk_ms;
    }
    if let Some(overlap_ms) = overrides.overlap_ms {
        config.transcription.overlap_ms = overlap_ms;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn read_audio(input: &str) -> Result<AudioBuffer> {
    if input == "-" {
        decode_wav_stdin().context("failed to read WAV from stdin")
    } else {
        let path = PathBuf::from(input);
        decode_wav_file(&path).with_context(|| format!("failed to read {}", path.display()))
    }
}

async fn transcribe(config: &Config, input: &str, language: Option<&str>, json: bool) -> Result<()> {
    let audio = read_audio(input)?;
    let orchestrator = TranscriptionOrchestrator::from_config(config);

    let output = orchestrator
        .transcribe(audio, language.unwrap_or(""))
        .await
        .context("transcription failed")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("failed to encode result")?
        );
    } else {
        for failure in &output.failures {
            tracing::info!(%failure, "Chunk fell through");
        }
        println!("{}", output.text);
    }
    Ok(())
}

fn list_backends(config: &Config) -> Result<()> {
    let orchestrator = TranscriptionOrchestrator::from_config(config);
    let descriptors = orchestrator.registry().descriptors();

    if descriptors.is_empty() {
        println!("No recognition backends registered");
        return Ok(());
    }

    println!("Recognition backends (priority order):");
    for descriptor in descriptors {
        let state = if descriptor.available {
            "enabled"
        } else {
            "disabled"
        };
        println!("  {:<16} {}", descriptor.kind, state);
    }
    Ok(())
}

/// 2 for request-level failures the caller can fix, 1 for everything else.
fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<ScribeError>() {
        Some(
            ScribeError::AudioPrecondition { .. }
            | ScribeError::AudioDecode { .. }
            | ScribeError::BackendUnavailable { .. }
            | ScribeError::ConfigInvalidValue { .. },
        ) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}
