//! Audio splitting: materializes planned chunk windows as standalone files.

use super::AudioArtifact;
use crate::error::{Result, SaumError};
use crate::plan::ChunkSpec;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Extracts every planned window of `source` into `output_dir`.
///
/// Extraction is a lossless stream copy (no re-encode), so chunk files keep
/// the source container and codec. If any single extraction fails, the
/// artifacts already created by this call are deleted before the error
/// propagates, so a failed run leaves no orphaned chunk files behind.
#[instrument(skip_all, fields(source = %source.display(), chunks = specs.len()))]
pub async fn split(
    source: &Path,
    specs: &[ChunkSpec],
    output_dir: &Path,
) -> Result<Vec<AudioArtifact>> {
    std::fs::create_dir_all(output_dir)?;

    let base_name = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");
    let extension = source
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("mp3");

    let mut artifacts: Vec<AudioArtifact> = Vec::with_capacity(specs.len());

    for spec in specs {
        let chunk_path = output_dir.join(format!("{}_{:04}.{}", base_name, spec.index, extension));

        if let Err(e) = extract_window(source, &chunk_path, spec.start, spec.duration()).await {
            for artifact in &artifacts {
                if let Err(cleanup_err) = artifact.remove() {
                    warn!(
                        "Failed to remove partial chunk {}: {}",
                        artifact.path.display(),
                        cleanup_err
                    );
                }
            }
            return Err(e);
        }

        debug!(
            "Created chunk {} covering {:.1}s-{:.1}s",
            spec.index, spec.start, spec.end
        );
        artifacts.push(AudioArtifact {
            spec: spec.clone(),
            path: chunk_path,
        });
    }

    info!("Created {} audio chunks", artifacts.len());
    Ok(artifacts)
}

/// Extracts a single time window with a stream copy.
async fn extract_window(source: &Path, dest: &Path, start: f64, length: f64) -> Result<()> {
    let result = Command::new("ffmpeg")
        .arg("-ss").arg(format!("{:.3}", start))
        .arg("-i").arg(source)
        .arg("-t").arg(format!("{:.3}", length))
        .arg("-c").arg("copy")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() && dest.exists() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(SaumError::ToolFailed(format!(
                "Chunk extraction at {:.1}s failed: {}",
                start,
                err.trim()
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SaumError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(SaumError::ToolFailed(format!("ffmpeg error: {e}"))),
    }
}
