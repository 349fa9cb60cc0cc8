//! Pipe naming. The only place that knows how pipe paths differ per platform.

use std::path::PathBuf;

/// Prefix shared by every pipe name, so stray sockets are recognisable.
const PIPE_PREFIX: &str = "ffpipe_";

/// Generate a pipe name unique to one channel, e.g. `ffpipe_3f2a9c1e`.
pub fn unique_pipe_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{PIPE_PREFIX}{}", &id[..8])
}

/// Filesystem location of the endpoint for `pipe_name`.
///
/// A named pipe under `\\.\pipe\` on Windows; a Unix domain socket under the
/// temporary directory elsewhere.
#[cfg(windows)]
pub fn endpoint_path(pipe_name: &str) -> PathBuf {
    PathBuf::from(format!(r"\\.\pipe\{pipe_name}"))
}

#[cfg(not(windows))]
pub fn endpoint_path(pipe_name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{pipe_name}.sock"))
}

/// The path ffmpeg is given on its command line for `pipe_name`.
///
/// On Unix this carries the `unix:` protocol prefix so ffmpeg connects to the
/// socket instead of treating it as a file.
#[cfg(windows)]
pub fn pipe_path(pipe_name: &str) -> String {
    endpoint_path(pipe_name).to_string_lossy().into_owned()
}

#[cfg(not(windows))]
pub fn pipe_path(pipe_name: &str) -> String {
    format!("unix:{}", endpoint_path(pipe_name).display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_prefixed_and_unique() {
        let a = unique_pipe_name();
        let b = unique_pipe_name();
        assert!(a.starts_with(PIPE_PREFIX));
        assert_eq!(a.len(), PIPE_PREFIX.len() + 8);
        assert_ne!(a, b);
    }

    #[cfg(unix)]
    #[test]
    fn unix_path_is_socket_in_temp_dir() {
        let endpoint = endpoint_path("ffpipe_0011aabb");
        assert_eq!(endpoint, std::env::temp_dir().join("ffpipe_0011aabb.sock"));
        assert_eq!(
            pipe_path("ffpipe_0011aabb"),
            format!("unix:{}", endpoint.display())
        );
    }

    #[cfg(windows)]
    #[test]
    fn windows_path_is_in_pipe_namespace() {
        assert_eq!(pipe_path("ffpipe_0011aabb"), r"\\.\pipe\ffpipe_0011aabb");
    }
}
