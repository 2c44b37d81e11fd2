//! Command-line interface for chunkscribe
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Chunked speech-to-text with backend fallback
#[derive(Parser, Debug)]
#[command(
    name = "chunkscribe",
    version,
    about = "Chunked speech-to-text with backend fallback"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose logging (-v: info, -vv: debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe a WAV file (or stdin with "-")
    Transcribe {
        /// WAV file to transcribe, or "-" to read stdin
        #[arg(value_name = "FILE")]
        input: String,

        /// Language hint (e.g., en, pt-BR, auto). Default: config value
        #[arg(long, short = 'l', value_name = "LANG")]
        language: Option<String>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        /// Per-chunk recognition timeout (e.g., 30s, 2m)
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        timeout: Option<Duration>,

        /// Concurrent chunk workers (default: available parallelism)
        #[arg(long, short = 'w', value_name = "N")]
        workers: Option<usize>,

        /// Chunk length in milliseconds
        #[arg(long, value_name = "MS")]
        chunk_ms: Option<u32>,

        /// Overlap between consecutive chunks in milliseconds
        #[arg(long, value_name = "MS")]
        overlap_ms: Option<u32>,
    },

    /// List recognition backends in priority order
    Backends,

    /// Collapse repeated words and phrases in text (argument or stdin)
    Dedupe {
        /// Text to deduplicate; reads stdin when omitted
        text: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    let duration = humantime::parse_duration(s).map_err(|e| e.to_string())?;
    if duration.is_zero() {
        return Err("timeout must be greater than zero".to_string());
    }
    Ok(duration)
}
