use std::path::{Path, PathBuf};

/// Absolutize a path, expanding a leading `~` to the home directory.
/// Relative paths are resolved against the current working directory.
pub fn expand_path(path: &Path) -> PathBuf {
    let expanded = path
        .strip_prefix("~")
        .ok()
        .and_then(|rest| dirs::home_dir().map(|home| home.join(rest)))
        .unwrap_or_else(|| path.to_path_buf());

    if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    }
}

/// Absolute `file://` URI for a path, with the same expansion rules as
/// [`expand_path`].
///
/// The path is not percent-encoded, so spaces and other reserved
/// characters pass through verbatim. Notification servers accept these
/// URIs in practice.
pub fn file_uri(path: &Path) -> String {
    format!("file://{}", expand_path(path).display())
}
