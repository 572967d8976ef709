//! Shared machinery behind both sink variants: background scanning,
//! cache-aware page production, preload scheduling and thumbnail dispatch.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{ComicFrameList, FrameCache};
use crate::codec::{self, DecodedImage};
use crate::error::SinkError;
use crate::order::EntryOrdering;
use crate::stats::StatsCollector;
use crate::thumb::ThumbnailReceiver;
use crate::thumb::loader::{PageSource, ThumbnailLoader};
use crate::types::{ContainerEntry, OpenState, SiblingDirection, ThumbnailSpec};

use super::extract::ScratchDir;
use super::preload::PreloadQueue;
use super::{OpenEvent, Sink};

/// Format-specific access to one container, the seam between the generic
/// sink engine and the directory/archive backends.
///
/// Implementations are cheap to clone: slow work happens in `scan` and
/// `read_entry`, which are always called off the state lock.
pub(crate) trait Container: Clone + Send + Sync + fmt::Debug + 'static {
    const SIBLING_NAVIGATION: bool;

    /// Validate `path` and build an unscanned container handle.
    fn probe(path: &Path) -> Result<Self, SinkError>;

    /// Walk the container once, returning raw `(internal path, size)` pairs
    /// for every regular image entry. Ordering is up to the engine.
    fn scan(&self, progress: &mut dyn FnMut(usize, usize))
    -> Result<Vec<(PathBuf, u64)>, SinkError>;

    /// Retrieve one entry's bytes, materializing through `scratch` when the
    /// format requires extraction.
    fn read_entry(&self, entry: &ContainerEntry, scratch: &ScratchDir)
    -> Result<Vec<u8>, SinkError>;

    fn display_name(&self) -> String;

    fn sibling(&self, _direction: SiblingDirection) -> Option<PathBuf> {
        None
    }
}

#[derive(Debug)]
struct SinkState<C> {
    open_state: OpenState,
    container: Option<C>,
    scratch: Option<Arc<ScratchDir>>,
    entries: Vec<ContainerEntry>,
}

pub(crate) struct SinkShared<C> {
    cache: Arc<FrameCache>,
    stats: Arc<StatsCollector>,
    /// Bumped by open, close and sort; fences every piece of background work.
    generation: AtomicU64,
    state: Mutex<SinkState<C>>,
    queue: Mutex<PreloadQueue>,
    receiver: Mutex<Option<Arc<dyn ThumbnailReceiver>>>,
}

impl<C: Container> SinkShared<C> {
    /// Produce the frames for one page: cache hit, or extract + decode +
    /// cache. Decoding is attempted exactly once per call; failures are never
    /// cached, so the caller may retry.
    fn produce_page(&self, page: usize) -> Result<ComicFrameList, SinkError> {
        if let Some(frames) = self.cache.get(page) {
            self.stats.record_cache_lookup(true);
            return Ok(frames);
        }
        self.stats.record_cache_lookup(false);

        let generation = self.generation.load(Ordering::Acquire);
        let (container, entry, scratch) = {
            let state = self.state.lock();
            if state.open_state != OpenState::Open {
                return Err(SinkError::OutOfRange(page));
            }
            let entry = state.entries.get(page).cloned().ok_or(SinkError::OutOfRange(page))?;
            let (Some(container), Some(scratch)) = (&state.container, &state.scratch) else {
                return Err(SinkError::OutOfRange(page));
            };
            (container.clone(), entry, Arc::clone(scratch))
        };

        let fetch_started = Instant::now();
        let bytes = container.read_entry(&entry, &scratch)?;
        self.stats.record_extract(fetch_started.elapsed());

        let decode_started = Instant::now();
        let decoded = codec::decode_frame(&entry.internal_path, &bytes)
            .map_err(|err| SinkError::LoadError(err.to_string()))?;
        self.stats.record_decode(decode_started.elapsed());

        let frames = ComicFrameList::single(page, Arc::new(decoded));
        if self.generation.load(Ordering::Acquire) == generation {
            self.cache.insert(frames.clone());
            self.stats.update_cache_usage(
                self.cache.bytes_used() as u64,
                self.cache.budget().bytes_max as u64,
            );
        }
        Ok(frames)
    }

    /// Rebuild the preload window after serving `current`.
    fn plan_preload(&self, current: usize, ahead: usize) {
        let generation = self.generation.load(Ordering::Acquire);
        let total = {
            let state = self.state.lock();
            if state.open_state != OpenState::Open {
                return;
            }
            state.entries.len()
        };

        let mut queue = self.queue.lock();
        queue.plan_window(generation, current, ahead, total, |page| self.cache.has(page));
        self.stats.update_preload_pending(queue.len());
    }
}

impl<C: Container> PageSource for SinkShared<C> {
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn page_count(&self) -> usize {
        let state = self.state.lock();
        if state.open_state == OpenState::Open { state.entries.len() } else { 0 }
    }

    fn load_page(&self, page: usize) -> Result<ComicFrameList, SinkError> {
        self.produce_page(page)
    }
}

/// Generic sink implementation parameterized by a container backend.
pub(crate) struct ContainerSink<C: Container> {
    shared: Arc<SinkShared<C>>,
    preload_tx: Sender<()>,
    thumbnails: ThumbnailLoader,
}

impl<C: Container> ContainerSink<C> {
    pub(crate) fn new(
        cache: Arc<FrameCache>,
        stats: Arc<StatsCollector>,
        thumbnail_spec: ThumbnailSpec,
    ) -> Result<Self, SinkError> {
        let shared = Arc::new(SinkShared {
            cache,
            stats,
            generation: AtomicU64::new(0),
            state: Mutex::new(SinkState {
                open_state: OpenState::Closed,
                container: None,
                scratch: None,
                entries: Vec::new(),
            }),
            queue: Mutex::new(PreloadQueue::default()),
            receiver: Mutex::new(None),
        });

        let (preload_tx, preload_rx) = channel();
        let worker_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name("sink-preload".into())
            .spawn(move || preload_worker(worker_shared, preload_rx))
            .map_err(|err| SinkError::OtherIo(err.to_string()))?;

        let thumbnails = ThumbnailLoader::spawn(thumbnail_spec)?;

        Ok(Self { shared, preload_tx, thumbnails })
    }
}

impl<C: Container> Sink for ContainerSink<C> {
    fn open(&self, path: &Path) -> Receiver<OpenEvent> {
        let (tx, rx) = channel();
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        {
            let mut state = self.shared.state.lock();
            state.open_state = OpenState::Closed;
            state.container = None;
            state.scratch = None;
            state.entries.clear();
        }
        self.shared.queue.lock().clear();

        let shared = Arc::clone(&self.shared);
        let target = path.to_path_buf();
        let scan_tx = tx.clone();
        let spawned = thread::Builder::new()
            .name("sink-open".into())
            .spawn(move || scan_worker(shared, target, generation, scan_tx));
        if let Err(err) = spawned {
            let _ = tx.send(OpenEvent::Error(SinkError::OtherIo(err.to_string())));
        }
        rx
    }

    fn num_of_images(&self) -> usize {
        let state = self.shared.state.lock();
        if state.open_state == OpenState::Open { state.entries.len() } else { 0 }
    }

    fn image(&self, page: usize, preload: usize) -> Result<Arc<DecodedImage>, SinkError> {
        let frames = self.shared.produce_page(page)?;
        if preload > 0 {
            self.shared.plan_preload(page, preload);
            let _ = self.preload_tx.send(());
        }
        Ok(Arc::clone(frames.primary()))
    }

    fn request_thumbnails(&self, start: usize, count: usize) {
        let receiver = self.shared.receiver.lock().clone();
        let Some(receiver) = receiver else {
            debug!(target: "sink", "thumbnail request without a registered receiver");
            return;
        };
        let source = Arc::clone(&self.shared) as Arc<dyn PageSource>;
        self.thumbnails.request(source, receiver, start, count);
    }

    fn register_thumbnail_receiver(&self, receiver: Arc<dyn ThumbnailReceiver>) {
        *self.shared.receiver.lock() = Some(receiver);
    }

    fn sort(&self, ordering: EntryOrdering) {
        {
            let mut state = self.shared.state.lock();
            if state.open_state != OpenState::Open {
                return;
            }
            state.entries.sort_by(|a, b| ordering.compare(&a.internal_path, &b.internal_path));
            for (index, entry) in state.entries.iter_mut().enumerate() {
                entry.logical_index = index as u32;
            }
        }

        // Renumbering orphans every cached page and any planned window.
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        self.shared.cache.clear();
        self.shared.queue.lock().clear();
        self.shared.stats.update_preload_pending(0);
    }

    fn close(&self) {
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        {
            let mut state = self.shared.state.lock();
            state.open_state = OpenState::Closed;
            state.container = None;
            state.scratch = None;
            state.entries.clear();
        }
        self.shared.queue.lock().clear();
        self.shared.stats.update_preload_pending(0);
        debug!(target: "sink", "sink closed");
    }

    fn open_state(&self) -> OpenState {
        self.shared.state.lock().open_state
    }

    fn supports_sibling_navigation(&self) -> bool {
        C::SIBLING_NAVIGATION
    }

    fn sibling_container(&self, direction: SiblingDirection) -> Option<PathBuf> {
        if !C::SIBLING_NAVIGATION {
            return None;
        }
        let container = {
            let state = self.shared.state.lock();
            if state.open_state != OpenState::Open {
                return None;
            }
            state.container.clone()
        };
        container.and_then(|container| container.sibling(direction))
    }
}

impl<C: Container> fmt::Debug for ContainerSink<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ContainerSink")
            .field("open_state", &state.open_state)
            .field("entries", &state.entries.len())
            .finish_non_exhaustive()
    }
}

/// Sort the raw scan output into the canonical page order.
fn finish_entries(raw: Vec<(PathBuf, u64)>) -> Result<Vec<ContainerEntry>, SinkError> {
    if raw.is_empty() {
        return Err(SinkError::Empty);
    }

    let mut raw = raw;
    raw.sort_by(|a, b| EntryOrdering::Natural.compare(&a.0, &b.0));
    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(index, (internal_path, size_bytes))| ContainerEntry {
            logical_index: index as u32,
            internal_path,
            size_bytes,
        })
        .collect())
}

fn scan_worker<C: Container>(
    shared: Arc<SinkShared<C>>,
    path: PathBuf,
    generation: u64,
    tx: Sender<OpenEvent>,
) {
    let started = Instant::now();
    let outcome = (|| {
        let container = C::probe(&path)?;
        let raw = container.scan(&mut |current, total| {
            let _ = tx.send(OpenEvent::Progress { current, total });
        })?;
        let entries = finish_entries(raw)?;
        Ok((container, entries))
    })();

    match outcome {
        Ok((container, entries)) => {
            let scratch = match ScratchDir::new() {
                Ok(scratch) => Arc::new(scratch),
                Err(err) => {
                    fail_scan(&shared, generation, &tx, err);
                    return;
                }
            };

            let name = container.display_name();
            let pages = entries.len();
            {
                let mut state = shared.state.lock();
                if shared.generation.load(Ordering::Acquire) != generation {
                    debug!(target: "sink", path = %path.display(), "discarding superseded scan");
                    return;
                }
                state.container = Some(container);
                state.scratch = Some(scratch);
                state.entries = entries;
                state.open_state = OpenState::Open;
            }

            shared.stats.record_scan(started.elapsed());
            info!(target: "sink", path = %path.display(), pages, "container opened");
            let _ = tx.send(OpenEvent::Ready { name });
        }
        Err(err) => fail_scan(&shared, generation, &tx, err),
    }
}

fn fail_scan<C: Container>(
    shared: &SinkShared<C>,
    generation: u64,
    tx: &Sender<OpenEvent>,
    err: SinkError,
) {
    {
        let mut state = shared.state.lock();
        if shared.generation.load(Ordering::Acquire) != generation {
            return;
        }
        state.open_state = OpenState::Error;
        state.entries.clear();
    }
    warn!(target: "sink", %err, "container open failed");
    let _ = tx.send(OpenEvent::Error(err));
}

fn preload_worker<C: Container>(shared: Arc<SinkShared<C>>, rx: Receiver<()>) {
    while rx.recv().is_ok() {
        loop {
            let task = { shared.queue.lock().next_task() };
            let Some(task) = task else { break };

            if shared.generation.load(Ordering::Acquire) != task.generation {
                let mut queue = shared.queue.lock();
                queue.clear();
                shared.stats.update_preload_pending(0);
                break;
            }

            if let Err(err) = shared.produce_page(task.page) {
                debug!(target: "sink", page = task.page, %err, "preload skipped");
            }
            let pending = {
                let mut queue = shared.queue.lock();
                queue.complete(task.page);
                queue.len()
            };
            shared.stats.update_preload_pending(pending);
        }
    }
}
