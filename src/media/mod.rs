//! Media probing, splitting, and optimization.
//!
//! All heavy lifting is delegated to ffmpeg/ffprobe as external processes; a
//! missing binary is surfaced as [`crate::error::SaumError::ToolNotFound`]
//! with install guidance rather than a generic failure.

mod fetch;
mod optimize;
mod probe;
mod split;

pub use fetch::fetch_remote;
pub use optimize::optimize;
pub use probe::probe_duration;
pub use split::split;

use crate::plan::ChunkSpec;
use std::path::PathBuf;

/// A planned chunk window materialized as a standalone audio file.
///
/// The file lives in the run's workspace and is owned by the run that created
/// it; the workspace removes it when the run exits.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    /// The window this artifact covers.
    pub spec: ChunkSpec,
    /// Path to the extracted audio file.
    pub path: PathBuf,
}

impl AudioArtifact {
    /// Delete the underlying file. Used when a later extraction in the same
    /// split call fails and already-created artifacts must not be orphaned.
    pub fn remove(&self) -> std::io::Result<()> {
        std::fs::remove_file(&self.path)
    }
}

/// Best-effort MIME type for an audio/video file path.
pub fn mime_for_path(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("opus") => "audio/opus",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("webm") => "video/webm",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a.mp3")), "audio/mpeg");
        assert_eq!(mime_for_path(Path::new("a.MP3")), "audio/mpeg");
        assert_eq!(mime_for_path(Path::new("clip.mp4")), "video/mp4");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }
}
