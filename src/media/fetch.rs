//! Remote source fetching.

use crate::error::{Result, SaumError};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use url::Url;

/// Downloads a remote media file into `output_dir` and returns its path.
///
/// The file name is taken from the final URL path segment when it looks like a
/// media file, otherwise a generated name is used.
#[instrument(skip(output_dir))]
pub async fn fetch_remote(url: &str, output_dir: &Path) -> Result<PathBuf> {
    let parsed = Url::parse(url)
        .map_err(|e| SaumError::InvalidInput(format!("Invalid source URL '{}': {}", url, e)))?;

    let file_name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty() && name.contains('.'))
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("{}.bin", uuid::Uuid::new_v4()));

    std::fs::create_dir_all(output_dir)?;
    let target = output_dir.join(file_name);

    info!("Fetching source media from {}", url);

    let response = reqwest::get(parsed).await?.error_for_status()?;
    let bytes = response.bytes().await?;

    if bytes.is_empty() {
        return Err(SaumError::InvalidInput(format!(
            "Remote source {} returned an empty body",
            url
        )));
    }

    tokio::fs::write(&target, &bytes).await?;
    info!("Fetched {} bytes to {}", bytes.len(), target.display());

    Ok(target)
}
