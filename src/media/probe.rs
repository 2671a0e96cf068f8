//! Duration probing via ffprobe.

use crate::error::{Result, SaumError};
use std::path::Path;
use tokio::process::Command;

/// Queries the duration of a media file in seconds using ffprobe.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let result = Command::new("ffprobe")
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SaumError::ToolNotFound("ffprobe".into()));
        }
        Err(e) => {
            return Err(SaumError::ToolFailed(format!("ffprobe failed: {e}")));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SaumError::ToolFailed(format!(
            "ffprobe returned error for {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|_| SaumError::ToolFailed("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| SaumError::ToolFailed("Could not determine audio duration".into()))
}
