//! Background worker turning page frames into small previews.

use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use tracing::debug;

use crate::cache::ComicFrameList;
use crate::codec::DecodedImage;
use crate::error::SinkError;
use crate::types::ThumbnailSpec;

use super::scale::scale_to_fit;

/// A scaled-down preview of one page, owned by the receiver after delivery.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub page: usize,
    pub image: DecodedImage,
}

/// Capability registered by the view that consumes thumbnails.
///
/// Deliveries are asynchronous; the receiver must tolerate partial batches,
/// since an in-flight batch is cancelled silently when its container closes.
pub trait ThumbnailReceiver: Send + Sync {
    fn deliver(&self, thumbnail: Thumbnail);
}

/// Cache-aware page access handed to background workers by a sink.
pub(crate) trait PageSource: Send + Sync {
    /// Current open-generation; bumped by open/close/sort to fence stale work.
    fn generation(&self) -> u64;
    fn page_count(&self) -> usize;
    fn load_page(&self, page: usize) -> Result<ComicFrameList, SinkError>;
}

struct ThumbnailJob {
    start: usize,
    count: usize,
    generation: u64,
    source: Arc<dyn PageSource>,
    receiver: Arc<dyn ThumbnailReceiver>,
}

/// Owns the worker thread that produces thumbnails for one sink.
///
/// Requests return immediately; the worker walks each batch in increasing
/// page order and drops the remainder as soon as the sink's generation moves
/// past the one the batch was requested under.
pub(crate) struct ThumbnailLoader {
    tx: Sender<ThumbnailJob>,
}

impl ThumbnailLoader {
    pub fn spawn(spec: ThumbnailSpec) -> Result<Self, SinkError> {
        let (tx, rx) = channel();
        thread::Builder::new()
            .name("sink-thumbnails".into())
            .spawn(move || worker(rx, spec))
            .map_err(|err| SinkError::OtherIo(err.to_string()))?;
        Ok(Self { tx })
    }

    pub fn request(
        &self,
        source: Arc<dyn PageSource>,
        receiver: Arc<dyn ThumbnailReceiver>,
        start: usize,
        count: usize,
    ) {
        let generation = source.generation();
        let job = ThumbnailJob { start, count, generation, source, receiver };
        // A disconnected worker only happens during teardown; the batch is
        // best-effort anyway.
        let _ = self.tx.send(job);
    }
}

impl fmt::Debug for ThumbnailLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailLoader").finish_non_exhaustive()
    }
}

fn worker(rx: Receiver<ThumbnailJob>, spec: ThumbnailSpec) {
    while let Ok(job) = rx.recv() {
        let end = job.start.saturating_add(job.count);
        for page in job.start..end {
            if job.source.generation() != job.generation {
                debug!(target: "thumb", page, "batch cancelled by container change");
                break;
            }
            if page >= job.source.page_count() {
                break;
            }

            let frames = match job.source.load_page(page) {
                Ok(frames) => frames,
                Err(err) => {
                    debug!(target: "thumb", page, %err, "skipping thumbnail");
                    continue;
                }
            };

            let image = match scale_to_fit(frames.primary(), &spec) {
                Ok(image) => image,
                Err(err) => {
                    debug!(target: "thumb", page, %err, "thumbnail scaling failed");
                    continue;
                }
            };

            // Re-check right before delivery so a close that raced the decode
            // still suppresses the result.
            if job.source.generation() != job.generation {
                break;
            }
            job.receiver.deliver(Thumbnail { page, image });
        }
    }
}
