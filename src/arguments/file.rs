//! Plain file inputs and outputs.

use std::path::{Path, PathBuf};

use ffpipe_core::{Error, FfOptions, Result};

use super::Argument;

/// An input file, rendered as `-i "<path>"`.
#[derive(Debug, Clone)]
pub struct InputFile {
    path: PathBuf,
    verify_exists: bool,
}

impl InputFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            verify_exists: true,
        }
    }

    /// Builder: skip the existence check, for URLs and protocol inputs.
    pub fn verify_exists(mut self, verify: bool) -> Self {
        self.verify_exists = verify;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Argument for InputFile {
    fn text(&self) -> String {
        format!("-i \"{}\"", self.path.display())
    }

    fn pre(&mut self, _options: &FfOptions) -> Result<()> {
        if self.verify_exists && !self.path.exists() {
            return Err(Error::file(&self.path, "input file not found"));
        }
        Ok(())
    }
}

/// An output file, rendered as `"<path>"` followed by `-y` when overwriting.
#[derive(Debug, Clone)]
pub struct OutputFile {
    path: PathBuf,
    overwrite: bool,
}

impl OutputFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            overwrite: false,
        }
    }

    /// Builder: replace an existing file instead of failing.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Argument for OutputFile {
    fn text(&self) -> String {
        if self.overwrite {
            format!("\"{}\" -y", self.path.display())
        } else {
            format!("\"{}\"", self.path.display())
        }
    }

    fn pre(&mut self, _options: &FfOptions) -> Result<()> {
        if !self.overwrite && self.path.exists() {
            return Err(Error::file(
                &self.path,
                "output file already exists and overwrite is disabled",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_renders_quoted_path() {
        let input = InputFile::new("/media/my movie.mkv");
        assert_eq!(input.text(), "-i \"/media/my movie.mkv\"");
    }

    #[test]
    fn missing_input_fails_pre() {
        let mut input = InputFile::new("/nonexistent/input.mkv");
        let err = input.pre(&FfOptions::default()).unwrap_err();
        assert!(matches!(err, Error::File { .. }));

        let mut url = InputFile::new("rtmp://example.invalid/live").verify_exists(false);
        url.pre(&FfOptions::default()).unwrap();
    }

    #[test]
    fn existing_input_passes_pre() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        InputFile::new(tmp.path()).pre(&FfOptions::default()).unwrap();
    }

    #[test]
    fn output_rendering() {
        assert_eq!(OutputFile::new("/tmp/a.mp4").text(), "\"/tmp/a.mp4\"");
        assert_eq!(
            OutputFile::new("/tmp/a.mp4").overwrite(true).text(),
            "\"/tmp/a.mp4\" -y"
        );
    }

    #[test]
    fn existing_output_requires_overwrite() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let err = OutputFile::new(tmp.path()).pre(&FfOptions::default()).unwrap_err();
        assert!(matches!(err, Error::File { .. }));
        OutputFile::new(tmp.path()).overwrite(true).pre(&FfOptions::default()).unwrap();
    }
}
