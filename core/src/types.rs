//! Shared value types exchanged between the container sinks and their callers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One image found inside a container during scanning.
///
/// The ordered entry sequence is fixed once `open` succeeds; only `sort`
/// renumbers it. Entries describe regular files exclusively — directories,
/// symlinks and other special entries are dropped at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    /// Position of this entry in the current page order.
    pub logical_index: u32,
    /// Path of the entry inside its container, sanitized and relative.
    pub internal_path: PathBuf,
    /// Uncompressed size as reported by the container, 0 if unknown.
    pub size_bytes: u64,
}

/// Lifecycle of a sink between `open` and `close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenState {
    Closed,
    Open,
    Error,
}

/// Direction for sibling-container navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingDirection {
    Next,
    Previous,
}

/// Byte budget for the decoded-frame cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheBudget {
    pub bytes_max: usize,
}

impl Default for CacheBudget {
    fn default() -> Self {
        Self { bytes_max: 512 * 1024 * 1024 }
    }
}

/// How many pages ahead of the current one to extract proactively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadPolicy {
    pub ahead: u32,
}

impl Default for PreloadPolicy {
    fn default() -> Self {
        Self { ahead: 2 }
    }
}

/// Resampling kernel used when scaling thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThumbnailFilter {
    Nearest,
    Bilinear,
    CatmullRom,
    Lanczos3,
}

/// Requested geometry for generated thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSpec {
    /// Upper bound, in pixels, for the longer thumbnail edge.
    pub longest_edge: u32,
    pub filter: ThumbnailFilter,
}

impl Default for ThumbnailSpec {
    fn default() -> Self {
        Self { longest_edge: 160, filter: ThumbnailFilter::Lanczos3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_holds_sanitized_relative_path() {
        let entry = ContainerEntry {
            logical_index: 3,
            internal_path: PathBuf::from("pages/004.png"),
            size_bytes: 1024,
        };
        assert!(entry.internal_path.is_relative());
        assert_eq!(entry.logical_index, 3);
    }

    #[test]
    fn defaults_are_sensible() {
        assert!(CacheBudget::default().bytes_max > 0);
        assert!(PreloadPolicy::default().ahead > 0);
        let spec = ThumbnailSpec::default();
        assert!(spec.longest_edge >= 64);
        assert_eq!(spec.filter, ThumbnailFilter::Lanczos3);
    }
}
