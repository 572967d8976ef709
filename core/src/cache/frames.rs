//! Process-wide cache of page number → decoded frame list.

use std::sync::Arc;

use hashlink::LruCache;
use parking_lot::Mutex;

use crate::codec::DecodedImage;
use crate::types::CacheBudget;

/// Ordered frames making up one logical page.
///
/// Most pages decode to a single frame; a double-page spread split across
/// files yields several. Insertion order is reading order. The list cannot
/// be constructed empty.
#[derive(Debug, Clone)]
pub struct ComicFrameList {
    page: usize,
    frames: Vec<Arc<DecodedImage>>,
}

impl ComicFrameList {
    /// Start a list with its first (primary) frame.
    pub fn single(page: usize, frame: Arc<DecodedImage>) -> Self {
        Self { page, frames: vec![frame] }
    }

    /// Append a further frame in reading order.
    pub fn push(&mut self, frame: Arc<DecodedImage>) {
        self.frames.push(frame);
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn frames(&self) -> &[Arc<DecodedImage>] {
        &self.frames
    }

    /// The first frame in reading order.
    pub fn primary(&self) -> &Arc<DecodedImage> {
        &self.frames[0]
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    fn cost(&self) -> usize {
        self.frames.iter().map(|frame| frame.pixels().len()).sum()
    }
}

#[derive(Debug)]
struct FrameCacheInner {
    entries: LruCache<usize, ComicFrameList>,
    budget: CacheBudget,
    bytes_used: usize,
}

impl FrameCacheInner {
    fn evict_if_needed(&mut self) {
        while self.bytes_used > self.budget.bytes_max {
            if let Some((_page, oldest)) = self.entries.remove_lru() {
                self.bytes_used = self.bytes_used.saturating_sub(oldest.cost());
            } else {
                break;
            }
        }
    }
}

/// Shared cache of decoded pages, evicting least-recently-used entries
/// beyond a byte budget.
///
/// Page numbers are only unique within one open container; callers switching
/// containers must [`clear`](FrameCache::clear) the cache themselves, since
/// the cache outlives any single sink.
#[derive(Debug)]
pub struct FrameCache {
    inner: Mutex<FrameCacheInner>,
}

impl FrameCache {
    pub fn new(budget: CacheBudget) -> Self {
        Self {
            inner: Mutex::new(FrameCacheInner {
                entries: LruCache::new_unbounded(),
                budget,
                bytes_used: 0,
            }),
        }
    }

    /// Insert or replace the frames for the page carried by the list itself.
    /// Last writer wins. A list larger than the whole budget is not stored.
    pub fn insert(&self, frames: ComicFrameList) {
        let cost = frames.cost();
        let mut inner = self.inner.lock();
        if cost > inner.budget.bytes_max {
            return;
        }

        if let Some(existing) = inner.entries.remove(&frames.page()) {
            inner.bytes_used = inner.bytes_used.saturating_sub(existing.cost());
        }

        inner.bytes_used += cost;
        inner.entries.insert(frames.page(), frames);
        inner.evict_if_needed();
    }

    pub fn has(&self, page: usize) -> bool {
        self.inner.lock().entries.contains_key(&page)
    }

    /// Retrieve the frames for a page, refreshing its recency. Frame pixel
    /// buffers are shared, so the returned clone is cheap.
    pub fn get(&self, page: usize) -> Option<ComicFrameList> {
        self.inner.lock().entries.get(&page).cloned()
    }

    /// Drop every entry. Must be called when the governing container changes.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.bytes_used = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn bytes_used(&self) -> usize {
        self.inner.lock().bytes_used
    }

    pub fn budget(&self) -> CacheBudget {
        self.inner.lock().budget
    }
}
