//! Audio optimization: normalize the input before any transcription call.

use crate::config::OptimizationSettings;
use crate::error::{Result, SaumError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Applies the optimization filter chain to `source`, producing a new file in
/// `output_dir`: optional FFT denoise, loudness normalization to the
/// configured LUFS target, optional trailing-silence trim, and a mono downmix
/// at the canonical sample rate.
///
/// Callers must treat failure as a recoverable degradation: the pipeline logs
/// it and continues with the unoptimized input.
#[instrument(skip_all, fields(source = %source.display()))]
pub async fn optimize(
    source: &Path,
    output_dir: &Path,
    settings: &OptimizationSettings,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let base_name = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");
    let dest = output_dir.join(format!("{}_optimized.mp3", base_name));

    let mut filters: Vec<String> = Vec::new();
    if settings.denoise {
        filters.push("highpass=f=80".to_string());
        filters.push("afftdn=nf=-25".to_string());
    }
    filters.push(format!(
        "loudnorm=I={}:TP=-1.5:LRA=11",
        settings.loudness_target_lufs
    ));
    if settings.trim_silence {
        filters.push(
            "silenceremove=stop_periods=1:stop_duration=2:stop_threshold=-50dB".to_string(),
        );
    }

    debug!("Optimizing with filter chain: {}", filters.join(","));

    let result = Command::new("ffmpeg")
        .arg("-i").arg(source)
        .arg("-vn")
        .arg("-af").arg(filters.join(","))
        .arg("-ar").arg(settings.sample_rate.to_string())
        .arg("-ac").arg("1")
        .arg("-codec:a").arg("libmp3lame")
        .arg("-qscale:a").arg("2")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(&dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() && dest.exists() => Ok(dest),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(SaumError::ToolFailed(format!(
                "Audio optimization failed: {}",
                err.trim()
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SaumError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(SaumError::ToolFailed(format!("ffmpeg error: {e}"))),
    }
}
