//! Error types for Saum.

use thiserror::Error;

/// Library-level error type for Saum operations.
#[derive(Error, Debug)]
pub enum SaumError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Unsupported media type '{mime_type}' for backend {backend}")]
    UnsupportedMediaType { backend: String, mime_type: String },

    #[error("Input of {size} bytes exceeds the {limit} byte limit of backend {backend}")]
    InputTooLarge {
        backend: String,
        size: u64,
        limit: u64,
    },

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Chunk {index} ({start:.0}s-{end:.0}s) failed: {message}")]
    ChunkTranscription {
        index: usize,
        start: f64,
        end: f64,
        message: String,
    },

    #[error("Transcription job {job_id} did not complete after {attempts} polls ({waited_seconds:.0}s)")]
    PollTimeout {
        job_id: String,
        attempts: u32,
        waited_seconds: f64,
    },

    #[error("Correction failed: {0}")]
    Correction(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Saum operations.
pub type Result<T> = std::result::Result<T, SaumError>;
