//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available before
//! starting operations that would otherwise fail midway.

use crate::backend::BackendKind;
use crate::config::Settings;
use crate::error::{Result, SaumError};
use std::process::Command;

/// Run pre-flight checks for a transcription run with these settings.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(settings: &Settings) -> Result<()> {
    check_tool("ffmpeg")?;
    check_tool("ffprobe")?;

    // Keyterm extraction and correction go through OpenAI regardless of the
    // transcription provider.
    let needs_openai = matches!(
        settings.transcription.provider,
        BackendKind::Whisper | BackendKind::Gpt4o
    ) || settings.transcription.keyterms
        || settings.correction.enabled;

    if needs_openai && !crate::openai::is_api_key_configured() {
        return Err(SaumError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        ));
    }

    if settings.transcription.provider == BackendKind::Deepgram {
        check_env_key("DEEPGRAM_API_KEY")?;
    }

    Ok(())
}

/// Check that an API key environment variable is set and non-empty.
fn check_env_key(name: &str) -> Result<()> {
    match std::env::var(name) {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(SaumError::Config(format!(
            "{name} is empty. Set it with: export {name}='...'"
        ))),
        Err(_) => Err(SaumError::Config(format!(
            "{name} not set. Set it with: export {name}='...'"
        ))),
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    let result = Command::new(name)
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status();

    match result {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => Err(SaumError::ToolFailed(format!(
            "{name} is installed but returned an error"
        ))),
        Err(_) => Err(SaumError::ToolNotFound(name.to_string())),
    }
}
