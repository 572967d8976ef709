//! Typed failure taxonomy reported across the sink boundary.

use std::io;

use thiserror::Error;

/// Errors surfaced by sinks, the factory, and per-page retrieval.
///
/// Scan-time variants (`NotFound`, `AccessDenied`, `UnsupportedFormat`,
/// `Empty`, `OtherIo`) abort the whole `open`. `OutOfRange` and `LoadError`
/// are per-page and leave the sink and other cached pages intact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("container not found")]
    NotFound,
    #[error("access to container denied")]
    AccessDenied,
    #[error("unsupported container format")]
    UnsupportedFormat,
    #[error("container holds no images")]
    Empty,
    #[error("page {0} is out of range")]
    OutOfRange(usize),
    #[error("failed to load page: {0}")]
    LoadError(String),
    #[error("archive extractor exited: {0}")]
    ExtractorExited(String),
    #[error("container i/o error: {0}")]
    OtherIo(String),
}

impl SinkError {
    /// Classify an I/O error from opening or reading a container.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SinkError::NotFound,
            io::ErrorKind::PermissionDenied => SinkError::AccessDenied,
            _ => SinkError::OtherIo(err.to_string()),
        }
    }
}
