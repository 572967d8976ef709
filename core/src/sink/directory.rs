//! Directory-backed sink reading page files straight from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SinkError;
use crate::types::ContainerEntry;

use super::container::{Container, ContainerSink};
use super::extract::ScratchDir;
use super::util;

/// Handle to a plain directory of page images. No recursion: only the
/// directory's own regular files become pages.
#[derive(Debug, Clone)]
pub(crate) struct DirectoryContainer {
    root: PathBuf,
}

/// Sink over a filesystem directory.
pub(crate) type DirectorySink = ContainerSink<DirectoryContainer>;

impl Container for DirectoryContainer {
    const SIBLING_NAVIGATION: bool = false;

    fn probe(path: &Path) -> Result<Self, SinkError> {
        let meta = fs::metadata(path).map_err(|err| SinkError::from_io(&err))?;
        if !meta.is_dir() {
            return Err(SinkError::UnsupportedFormat);
        }
        Ok(Self { root: path.to_path_buf() })
    }

    fn scan(
        &self,
        _progress: &mut dyn FnMut(usize, usize),
    ) -> Result<Vec<(PathBuf, u64)>, SinkError> {
        let reader = fs::read_dir(&self.root).map_err(|err| SinkError::from_io(&err))?;
        let mut raw = Vec::new();

        for entry in reader {
            let entry = entry.map_err(|err| SinkError::from_io(&err))?;
            let file_type = entry.file_type().map_err(|err| SinkError::from_io(&err))?;
            if !file_type.is_file() {
                continue;
            }

            let path = entry.path();
            if util::is_hidden(&path) || !util::is_supported_image(&path) {
                continue;
            }

            let size = entry.metadata().map(|meta| meta.len()).unwrap_or(0);
            let rel = path.strip_prefix(&self.root).unwrap_or_else(|_| path.as_path());
            raw.push((rel.to_path_buf(), size));
        }

        Ok(raw)
    }

    /// No extraction step: the page bytes come straight from the filesystem.
    fn read_entry(
        &self,
        entry: &ContainerEntry,
        _scratch: &ScratchDir,
    ) -> Result<Vec<u8>, SinkError> {
        fs::read(self.root.join(&entry.internal_path))
            .map_err(|err| SinkError::LoadError(err.to_string()))
    }

    fn display_name(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }
}
