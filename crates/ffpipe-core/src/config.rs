//! Run configuration.
//!
//! [`FfOptions`] carries everything a run needs to know about its
//! environment: where ffmpeg lives, where temporary files go, the default log
//! level, and how long to wait before killing a stuck process. Every field
//! defaults sensibly so an empty `{}` document is valid.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::Error;

/// Default grace period granted to ffmpeg after a data-transfer fault.
pub const DEFAULT_FAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// ffmpeg `-v` log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Quiet,
    Panic,
    Fatal,
    Error,
    Warning,
    Info,
    Verbose,
    Debug,
    Trace,
}

impl LogLevel {
    /// The value ffmpeg expects after `-v`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Panic => "panic",
            LogLevel::Fatal => "fatal",
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options governing how ffmpeg is located and driven.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FfOptions {
    /// Explicit path to the ffmpeg executable. Takes precedence over
    /// `binary_folder` and `PATH` lookup.
    pub ffmpeg_path: Option<PathBuf>,
    /// Folder containing the ffmpeg executable.
    pub binary_folder: Option<PathBuf>,
    /// Folder for temporary files such as concat manifests.
    pub temporary_files_folder: PathBuf,
    /// Working directory of the spawned process.
    pub working_directory: Option<PathBuf>,
    /// Log level appended as `-v <level>` unless a run overrides it.
    pub log_level: Option<LogLevel>,
    /// How long ffmpeg may keep running after a pipe transfer faulted.
    #[serde(with = "duration_secs")]
    pub fault_grace_period: Duration,
}

impl Default for FfOptions {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            binary_folder: None,
            temporary_files_folder: std::env::temp_dir(),
            working_directory: None,
            log_level: None,
            fault_grace_period: DEFAULT_FAULT_GRACE_PERIOD,
        }
    }
}

impl FfOptions {
    /// Deserialize options from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("options parse error: {e}")))
    }

    /// Load options from a file path, falling back to defaults if the path
    /// is `None`, missing, or unparsable.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse options file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No options file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read options file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(path) = &self.ffmpeg_path {
            if !path.exists() {
                warnings.push(format!("ffmpeg_path {} does not exist", path.display()));
            }
        }
        if let Some(folder) = &self.binary_folder {
            if !folder.is_dir() {
                warnings.push(format!("binary_folder {} is not a directory", folder.display()));
            }
        }
        if !self.temporary_files_folder.is_dir() {
            warnings.push(format!(
                "temporary_files_folder {} is not a directory",
                self.temporary_files_folder.display()
            ));
        }
        if let Some(dir) = &self.working_directory {
            if !dir.is_dir() {
                warnings.push(format!("working_directory {} is not a directory", dir.display()));
            }
        }

        warnings
    }
}

/// Serde helpers to (de)serialize `Duration` as whole seconds.
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
