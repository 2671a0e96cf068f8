//! Shared OpenAI client construction.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Overall request timeout. Whisper calls on 10-minute chunks can be slow,
/// but a hung call must not stall the whole executor pool.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Connection timeout, kept short so a dead network fails fast.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Create an OpenAI client shared by the transcription, keyterm, and
/// correction adapters. The API key is read from `OPENAI_API_KEY`.
pub fn create_client() -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .expect("Failed to create HTTP client");

    Client::with_config(OpenAIConfig::default()).with_http_client(http_client)
}

/// Check if the OpenAI API key is configured.
pub fn is_api_key_configured() -> bool {
    std::env::var("OPENAI_API_KEY").is_ok_and(|key| !key.is_empty())
}
