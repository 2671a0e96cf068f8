//! CLI module for Saum.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Saum - Chunked long-form transcription
///
/// Transcribes audio/video of any length by splitting it into overlapping
/// chunks, transcribing each through a configurable backend, and stitching
/// the results back into one time-aligned transcript. The name "Saum" comes
/// from the Norwegian word for "seam."
#[derive(Parser, Debug)]
#[command(name = "saum")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe an audio/video file or URL
    Transcribe {
        /// Local file path or direct media URL
        input: String,

        /// Transcription provider (whisper, gpt4o, deepgram)
        #[arg(short, long)]
        provider: Option<String>,

        /// Target language hint (ISO 639-1, e.g. "en", "no")
        #[arg(short, long)]
        language: Option<String>,

        /// Write the transcript to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,

        /// Split into chunks even below the duration threshold
        #[arg(long)]
        chunk: bool,

        /// Skip the audio optimization pre-step
        #[arg(long)]
        no_optimize: bool,

        /// Run the correction pass over the stitched transcript
        #[arg(long)]
        correct: bool,

        /// Extract keyterms from the audio as accuracy hints
        #[arg(long)]
        keyterms: bool,

        /// Vocabulary/context hint passed to the backend (names, jargon)
        #[arg(long)]
        customization: Option<String>,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Run the transcription service (webhook receiver + HTTP API)
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Bind port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init,
}
