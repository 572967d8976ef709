//! Archive-backed sink: zip/cbz and tar-family containers.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::debug;
use zip::read::ZipArchive;

use crate::error::SinkError;
use crate::order::EntryOrdering;
use crate::types::{ContainerEntry, SiblingDirection};

use super::container::{Container, ContainerSink};
use super::extract::ScratchDir;
use super::util;

/// Scan progress is reported every this many central-directory entries.
const PROGRESS_STRIDE: usize = 16;

/// Formats the archive sink can stream. Rar-family names are recognized but
/// unsupported and never reach this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
}

/// Identify the archive format by file name, without touching the content.
pub(crate) fn detect_by_name(path: &Path) -> Option<ArchiveFormat> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        return Some(ArchiveFormat::TarGz);
    }
    match name.rsplit('.').next()? {
        "zip" | "cbz" => Some(ArchiveFormat::Zip),
        "tar" | "cbt" => Some(ArchiveFormat::Tar),
        _ => None,
    }
}

/// Identify the archive format by extension, falling back to magic bytes.
pub(crate) fn detect_format(path: &Path) -> Option<ArchiveFormat> {
    detect_by_name(path).or_else(|| sniff_format(path))
}

fn sniff_format(path: &Path) -> Option<ArchiveFormat> {
    let mut file = File::open(path).ok()?;
    let mut header = [0u8; 512];
    let read = file.read(&mut header).ok()?;
    let header = &header[..read];

    if header.starts_with(b"PK\x03\x04") {
        return Some(ArchiveFormat::Zip);
    }
    if header.starts_with(&[0x1f, 0x8b]) {
        return Some(ArchiveFormat::TarGz);
    }
    // The ustar tag sits at offset 257 of the first tar header block.
    if header.len() >= 262 && &header[257..262] == b"ustar" {
        return Some(ArchiveFormat::Tar);
    }
    None
}

/// Handle to one archive file; reopened for every scan and extraction since
/// compressed streams offer no reusable random-access positions.
#[derive(Debug, Clone)]
pub(crate) struct ArchiveContainer {
    path: PathBuf,
    format: ArchiveFormat,
}

/// Sink over compressed archive containers.
pub(crate) type ArchiveSink = ContainerSink<ArchiveContainer>;

impl Container for ArchiveContainer {
    const SIBLING_NAVIGATION: bool = true;

    fn probe(path: &Path) -> Result<Self, SinkError> {
        let meta = fs::metadata(path).map_err(|err| SinkError::from_io(&err))?;
        if !meta.is_file() {
            return Err(SinkError::UnsupportedFormat);
        }
        let format = detect_format(path).ok_or(SinkError::UnsupportedFormat)?;
        Ok(Self { path: path.to_path_buf(), format })
    }

    fn scan(
        &self,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<Vec<(PathBuf, u64)>, SinkError> {
        match self.format {
            ArchiveFormat::Zip => self.scan_zip(progress),
            ArchiveFormat::Tar => scan_tar(self.open_file()?),
            ArchiveFormat::TarGz => scan_tar(GzDecoder::new(self.open_file()?)),
        }
    }

    fn read_entry(
        &self,
        entry: &ContainerEntry,
        scratch: &ScratchDir,
    ) -> Result<Vec<u8>, SinkError> {
        match self.format {
            ArchiveFormat::Zip => self.extract_zip(entry, scratch),
            ArchiveFormat::Tar => self.extract_tar(self.open_file()?, entry, scratch),
            ArchiveFormat::TarGz => {
                self.extract_tar(GzDecoder::new(self.open_file()?), entry, scratch)
            }
        }
    }

    fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// The neighbouring archive file in the same directory, natural order.
    fn sibling(&self, direction: SiblingDirection) -> Option<PathBuf> {
        let parent = self.path.parent()?;
        let mut candidates: Vec<PathBuf> = fs::read_dir(parent)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|ty| ty.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| detect_by_name(path).is_some())
            .collect();
        candidates.sort_by(|a, b| EntryOrdering::Natural.compare(a, b));

        let position = candidates.iter().position(|candidate| candidate == &self.path)?;
        match direction {
            SiblingDirection::Next => candidates.get(position + 1).cloned(),
            SiblingDirection::Previous => {
                position.checked_sub(1).and_then(|index| candidates.get(index).cloned())
            }
        }
    }
}

impl ArchiveContainer {
    fn open_file(&self) -> Result<File, SinkError> {
        File::open(&self.path).map_err(|err| SinkError::from_io(&err))
    }

    fn scan_zip(
        &self,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<Vec<(PathBuf, u64)>, SinkError> {
        let mut archive = ZipArchive::new(self.open_file()?).map_err(map_zip_error)?;
        let total = archive.len();
        let mut raw = Vec::new();

        for index in 0..total {
            let file = archive.by_index(index).map_err(map_zip_error)?;
            if (index + 1) % PROGRESS_STRIDE == 0 {
                progress(index + 1, total);
            }
            if file.is_dir() {
                continue;
            }

            let Some(enclosed) = file.enclosed_name() else {
                debug!(target: "sink::archive", name = file.name(), "skipping unsafe entry path");
                continue;
            };
            let Some(internal) = util::sanitize_entry_path(enclosed) else {
                continue;
            };
            if util::is_hidden(&internal) || !util::is_supported_image(&internal) {
                continue;
            }

            raw.push((internal, file.size()));
        }

        Ok(raw)
    }

    /// Sequential re-scan: walk the stream from the start until the recorded
    /// internal path reappears, then extract just that entry.
    fn extract_zip(
        &self,
        entry: &ContainerEntry,
        scratch: &ScratchDir,
    ) -> Result<Vec<u8>, SinkError> {
        let mut archive = ZipArchive::new(self.open_file()?).map_err(map_zip_error)?;
        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(map_zip_error)?;
            if file.is_dir() {
                continue;
            }
            let matches = file
                .enclosed_name()
                .and_then(|name| util::sanitize_entry_path(name))
                .map(|internal| internal == entry.internal_path)
                .unwrap_or(false);
            if !matches {
                continue;
            }

            let dest = scratch.entry_path(&self.path, &entry.internal_path);
            let expected = file.size();
            return scratch.materialize(&dest, &mut file, Some(expected));
        }

        Err(SinkError::OtherIo(format!(
            "entry {:?} missing from {}",
            entry.internal_path,
            self.path.display()
        )))
    }

    fn extract_tar<R: Read>(
        &self,
        reader: R,
        entry: &ContainerEntry,
        scratch: &ScratchDir,
    ) -> Result<Vec<u8>, SinkError> {
        let mut archive = tar::Archive::new(BufReader::new(reader));
        let items = archive.entries().map_err(|err| SinkError::from_io(&err))?;
        for item in items {
            let mut item = item.map_err(|err| SinkError::from_io(&err))?;
            if !item.header().entry_type().is_file() {
                continue;
            }
            let matches = item
                .path()
                .ok()
                .and_then(|path| util::sanitize_entry_path(&path))
                .map(|internal| internal == entry.internal_path)
                .unwrap_or(false);
            if !matches {
                continue;
            }

            let dest = scratch.entry_path(&self.path, &entry.internal_path);
            let expected = item.size();
            return scratch.materialize(&dest, &mut item, Some(expected));
        }

        Err(SinkError::OtherIo(format!(
            "entry {:?} missing from {}",
            entry.internal_path,
            self.path.display()
        )))
    }
}

fn scan_tar<R: Read>(reader: R) -> Result<Vec<(PathBuf, u64)>, SinkError> {
    let mut archive = tar::Archive::new(BufReader::new(reader));
    let mut raw = Vec::new();

    let items = archive.entries().map_err(|err| SinkError::from_io(&err))?;
    for item in items {
        let item = item.map_err(|err| SinkError::from_io(&err))?;
        // Symlinks, directories and special entries never become pages.
        if !item.header().entry_type().is_file() {
            continue;
        }
        let path = match item.path() {
            Ok(path) => path.into_owned(),
            Err(_) => continue,
        };
        let Some(internal) = util::sanitize_entry_path(&path) else {
            continue;
        };
        if util::is_hidden(&internal) || !util::is_supported_image(&internal) {
            continue;
        }
        raw.push((internal, item.size()));
    }

    Ok(raw)
}

fn map_zip_error(err: zip::result::ZipError) -> SinkError {
    use zip::result::ZipError;
    match err {
        ZipError::Io(io_err) => SinkError::from_io(&io_err),
        ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_) => {
            SinkError::UnsupportedFormat
        }
        ZipError::FileNotFound => SinkError::OtherIo("entry missing from archive".into()),
    }
}
