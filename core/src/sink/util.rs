//! Entry-name hygiene shared by the sink variants.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Image file extensions a sink will enumerate (lowercase, without the dot).
pub(crate) const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp"];

pub(crate) fn is_hidden(path: &Path) -> bool {
    path.file_name().and_then(OsStr::to_str).map(|name| name.starts_with('.')).unwrap_or(false)
}

pub(crate) fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| {
            let lower = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// Normalize an internal container path to a safe relative form.
///
/// Drops `.` components and trailing separators; returns `None` for paths
/// that could escape an extraction root (absolute paths, drive prefixes,
/// `..` components) or that normalize to nothing.
pub(crate) fn sanitize_entry_path(path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) | Component::RootDir => return None,
        }
    }

    if clean.as_os_str().is_empty() { None } else { Some(clean) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_names_are_detected() {
        assert!(is_hidden(Path::new(".thumb.png")));
        assert!(is_hidden(Path::new("pages/.cover.jpg")));
        assert!(!is_hidden(Path::new("pages/cover.jpg")));
    }

    #[test]
    fn image_extensions_ignore_case() {
        assert!(is_supported_image(Path::new("page.PNG")));
        assert!(is_supported_image(Path::new("page.JpEg")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("noext")));
    }

    #[test]
    fn sanitize_rejects_escaping_paths() {
        assert_eq!(sanitize_entry_path(Path::new("../evil.png")), None);
        assert_eq!(sanitize_entry_path(Path::new("/etc/passwd")), None);
        assert_eq!(sanitize_entry_path(Path::new("a/../../b.png")), None);
        assert_eq!(sanitize_entry_path(Path::new("")), None);
    }

    #[test]
    fn sanitize_normalizes_benign_paths() {
        assert_eq!(
            sanitize_entry_path(Path::new("./pages/001.png")),
            Some(PathBuf::from("pages/001.png"))
        );
        assert_eq!(sanitize_entry_path(Path::new("pages/")), Some(PathBuf::from("pages")));
    }
}
