//! Page-indexed image retrieval over heterogeneous comic containers.

mod archive;
mod container;
mod directory;
mod extract;
mod factory;
mod preload;
mod util;

pub use factory::SinkFactory;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Receiver;

use crate::codec::DecodedImage;
use crate::error::SinkError;
use crate::order::EntryOrdering;
use crate::thumb::ThumbnailReceiver;
use crate::types::{OpenState, SiblingDirection};

/// Events delivered while a container is being opened.
///
/// The stream carries zero or more advisory `Progress` updates and ends with
/// exactly one `Ready` or `Error`. Scanning runs on a background thread, so
/// `open` returns immediately and navigation proceeds only once `Ready`
/// arrives.
#[derive(Debug, Clone)]
pub enum OpenEvent {
    Progress { current: usize, total: usize },
    Ready { name: String },
    Error(SinkError),
}

/// Uniform page-image access over one open container.
///
/// Implemented by the directory- and archive-backed variants; callers obtain
/// instances from [`SinkFactory`] and only ever use this contract —
/// variant-specific behaviour is expressed through capability flags, never
/// through downcasting.
pub trait Sink: Send + Sync + std::fmt::Debug {
    /// Scan `path` in the background. See [`OpenEvent`] for the protocol.
    /// On failure the sink ends up in [`OpenState::Error`] with no entries.
    fn open(&self, path: &Path) -> Receiver<OpenEvent>;

    /// Number of pages; 0 unless the sink is open.
    fn num_of_images(&self) -> usize;

    /// Return the decoded image for `page`, consulting the frame cache
    /// before extracting. As a side effect, schedules background extraction
    /// of up to `preload` following pages that are not yet cached.
    fn image(&self, page: usize, preload: usize) -> Result<Arc<DecodedImage>, SinkError>;

    /// Queue thumbnail production for pages `start .. start + count`,
    /// delivered asynchronously to the registered receiver. A close or
    /// re-open cancels the remainder of the batch silently.
    fn request_thumbnails(&self, start: usize, count: usize);

    fn register_thumbnail_receiver(&self, receiver: Arc<dyn ThumbnailReceiver>);

    /// Re-derive the page order with `ordering` without rescanning the
    /// backing medium. Cached frames for the old numbering are dropped.
    fn sort(&self, ordering: EntryOrdering);

    /// Release the container handle and transient extraction space and
    /// discard in-flight background work. Idempotent.
    fn close(&self);

    fn open_state(&self) -> OpenState;

    /// Whether this variant can navigate to neighbouring containers.
    fn supports_sibling_navigation(&self) -> bool;

    /// The neighbouring container in natural order, for variants that
    /// support sibling navigation while open.
    fn sibling_container(&self, direction: SiblingDirection) -> Option<PathBuf>;
}
