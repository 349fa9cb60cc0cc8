//! ffmpeg binary discovery.
//!
//! Resolution order: an explicit `ffmpeg_path`, then `binary_folder`, then
//! `PATH` via [`which::which`]. Configured locations that do not exist fall
//! back to `PATH`, mirroring how tool overrides behave elsewhere.

use std::path::PathBuf;

use ffpipe_core::{Error, FfOptions, Result};

/// Name of the ffmpeg executable on this platform.
#[cfg(windows)]
const FFMPEG_BINARY: &str = "ffmpeg.exe";
#[cfg(not(windows))]
const FFMPEG_BINARY: &str = "ffmpeg";

/// Locate the ffmpeg executable described by `options`.
///
/// # Errors
///
/// Returns [`Error::Tool`] if no configured location exists and ffmpeg is
/// not on `PATH`.
pub fn resolve_ffmpeg(options: &FfOptions) -> Result<PathBuf> {
    if let Some(path) = &options.ffmpeg_path {
        if path.exists() {
            return Ok(path.clone());
        }
        tracing::warn!(
            "Configured ffmpeg_path {} does not exist; searching PATH",
            path.display()
        );
    }

    if let Some(folder) = &options.binary_folder {
        let candidate = folder.join(FFMPEG_BINARY);
        if candidate.exists() {
            return Ok(candidate);
        }
        tracing::warn!(
            "No {FFMPEG_BINARY} in binary_folder {}; searching PATH",
            folder.display()
        );
    }

    which::which("ffmpeg").map_err(|_| {
        Error::tool("ffmpeg", "ffmpeg not found; is it installed and in PATH?")
    })
}
