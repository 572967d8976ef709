//! Transient extraction area for archive-backed sinks.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tempfile::TempDir;
use tracing::debug;

use crate::error::SinkError;

/// Per-process counter appended to extraction file names so concurrent
/// extractions of the same entry never collide.
static EXTRACTION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Scratch directory owned by one open sink.
///
/// Lives under the system temp root and disappears with the last reference,
/// so an extraction racing a `close` still finishes into a live directory.
#[derive(Debug)]
pub(crate) struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn new() -> Result<Self, SinkError> {
        let dir = tempfile::Builder::new()
            .prefix("comic-sink-")
            .tempdir()
            .map_err(|err| SinkError::OtherIo(err.to_string()))?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Destination file for one entry: a digest of the container path and
    /// internal path plus the process-wide sequence number.
    pub fn entry_path(&self, container: &Path, internal: &Path) -> PathBuf {
        let mut hasher = blake3::Hasher::new();
        hasher.update(container.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(internal.to_string_lossy().as_bytes());
        let hex = hasher.finalize().to_hex();
        let seq = EXTRACTION_SEQ.fetch_add(1, Ordering::Relaxed);
        self.dir.path().join(format!("{}-{seq}.bin", &hex.as_str()[..32]))
    }

    /// Copy one entry's data into `dest`, read the bytes back, and remove the
    /// transient file.
    ///
    /// Refuses any destination outside the scratch root. A short or long copy
    /// against `expected_size` is a load failure.
    pub fn materialize(
        &self,
        dest: &Path,
        reader: &mut dyn Read,
        expected_size: Option<u64>,
    ) -> Result<Vec<u8>, SinkError> {
        if dest.parent() != Some(self.root()) {
            return Err(SinkError::LoadError(format!(
                "refusing to extract outside scratch root: {}",
                dest.display()
            )));
        }

        let mut file =
            File::create(dest).map_err(|err| SinkError::LoadError(err.to_string()))?;
        let written = match io::copy(reader, &mut file) {
            Ok(written) => written,
            Err(err) => {
                drop(file);
                let _ = fs::remove_file(dest);
                return Err(SinkError::LoadError(err.to_string()));
            }
        };
        drop(file);

        if let Some(expected) = expected_size {
            if written != expected {
                let _ = fs::remove_file(dest);
                return Err(SinkError::LoadError(format!(
                    "entry size mismatch: expected {expected} bytes, extracted {written}"
                )));
            }
        }

        let bytes = fs::read(dest).map_err(|err| SinkError::LoadError(err.to_string()))?;
        if let Err(err) = fs::remove_file(dest) {
            debug!(target: "sink::extract", path = %dest.display(), %err, "leaking transient file");
        }
        Ok(bytes)
    }
}
