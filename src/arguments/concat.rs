//! Concat demuxer input backed by a temporary manifest file.

use std::path::{Path, PathBuf};

use ffpipe_core::{FfOptions, Result};

use super::Argument;

/// Escape a path for a concat manifest line.
///
/// The manifest is parsed with shell-like quoting, so a single quote closes
/// the quoted string, is emitted escaped, and reopens it: `'` → `'\''`.
pub fn escape_concat_path(path: &str) -> String {
    path.replace('\'', r"'\''")
}

/// Joins several inputs through ffmpeg's concat demuxer.
///
/// [`pre`](Argument::pre) writes a manifest with one `file '<path>'` line per
/// source; [`post`](Argument::post) deletes it.
#[derive(Debug, Clone)]
pub struct ConcatInput {
    lines: Vec<String>,
    file_name: String,
    /// Folder fixed by [`in_dir`](Self::in_dir); otherwise taken from the
    /// running processor's options.
    dir: Option<PathBuf>,
    manifest: PathBuf,
}

impl ConcatInput {
    /// Concatenate `sources`, writing the manifest to the running processor's
    /// [`FfOptions::temporary_files_folder`].
    pub fn new<I, P>(sources: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let lines = sources
            .into_iter()
            .map(|source| {
                format!(
                    "file '{}'",
                    escape_concat_path(&source.as_ref().to_string_lossy())
                )
            })
            .collect();
        let file_name = format!("concat_{}.txt", uuid::Uuid::new_v4());
        let manifest = std::env::temp_dir().join(&file_name);
        Self {
            lines,
            file_name,
            dir: None,
            manifest,
        }
    }

    /// Concatenate `sources`, always writing the manifest into `dir`.
    pub fn in_dir<I, P>(sources: I, dir: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut concat = Self::new(sources);
        concat.dir = Some(dir.as_ref().to_path_buf());
        concat.manifest = dir.as_ref().join(&concat.file_name);
        concat
    }

    /// Manifest lines, as written by [`pre`](Argument::pre).
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Where the manifest goes. Until `pre` has run this assumes the default
    /// temporary folder.
    pub fn manifest_path(&self) -> &Path {
        &self.manifest
    }
}

impl Argument for ConcatInput {
    fn text(&self) -> String {
        format!("-f concat -safe 0 -i \"{}\"", self.manifest.display())
    }

    fn pre(&mut self, options: &FfOptions) -> Result<()> {
        let dir = self.dir.as_ref().unwrap_or(&options.temporary_files_folder);
        self.manifest = dir.join(&self.file_name);

        let mut contents = self.lines.join("\n");
        contents.push('\n');
        std::fs::write(&self.manifest, contents)?;
        tracing::debug!("Wrote concat manifest {}", self.manifest.display());
        Ok(())
    }

    fn post(&mut self) {
        match std::fs::remove_file(&self.manifest) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove concat manifest {}: {e}",
                self.manifest.display()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_single_quotes() {
        assert_eq!(
            escape_concat_path("it's a test'.mp4"),
            r"it'\''s a test'\''.mp4"
        );
    }

    #[test]
    fn manifest_line_for_quoted_path() {
        let concat = ConcatInput::new(["it's a test'.mp4"]);
        assert_eq!(concat.lines(), &[r"file 'it'\''s a test'\''.mp4'".to_string()]);
    }

    #[test]
    fn pre_writes_and_post_deletes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut concat = ConcatInput::in_dir(["/media/a.png", "/media/b.png"], dir.path());
        let manifest = concat.manifest_path().to_path_buf();

        assert!(manifest.starts_with(dir.path()));
        let name = manifest.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("concat_") && name.ends_with(".txt"));
        assert_eq!(
            concat.text(),
            format!("-f concat -safe 0 -i \"{}\"", manifest.display())
        );

        concat.pre(&FfOptions::default()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&manifest).unwrap(),
            "file '/media/a.png'\nfile '/media/b.png'\n"
        );

        concat.post();
        assert!(!manifest.exists());
        // A second teardown is harmless.
        concat.post();
    }

    #[test]
    fn manifest_goes_to_configured_temporary_folder() {
        let dir = tempfile::tempdir().unwrap();
        let options = FfOptions {
            temporary_files_folder: dir.path().to_path_buf(),
            ..FfOptions::default()
        };
        let mut concat = ConcatInput::new(["/media/a.png"]);
        concat.pre(&options).unwrap();

        let manifest = concat.manifest_path().to_path_buf();
        assert!(manifest.starts_with(dir.path()));
        assert!(manifest.exists());
        assert!(concat.text().contains(&*manifest.to_string_lossy()));
        concat.post();
        assert!(!manifest.exists());
    }

    #[test]
    fn explicit_folder_wins_over_options() {
        let fixed = tempfile::tempdir().unwrap();
        let configured = tempfile::tempdir().unwrap();
        let options = FfOptions {
            temporary_files_folder: configured.path().to_path_buf(),
            ..FfOptions::default()
        };
        let mut concat = ConcatInput::in_dir(["/media/a.png"], fixed.path());
        concat.pre(&options).unwrap();
        assert!(concat.manifest_path().starts_with(fixed.path()));
        concat.post();
    }

    #[test]
    fn post_without_pre_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let mut concat = ConcatInput::in_dir(["/media/a.png"], dir.path());
        concat.post();
    }

    #[test]
    fn manifest_names_are_unique() {
        let a = ConcatInput::new(["/a.png"]);
        let b = ConcatInput::new(["/a.png"]);
        assert_ne!(a.manifest_path(), b.manifest_path());
    }
}
