//! Planning which pages to extract ahead of the reader.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// One scheduled background extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PreloadTask {
    pub page: usize,
    pub distance: usize,
    /// Sink generation the window was planned under; a mismatch at execution
    /// time means the container changed and the task must be dropped.
    pub generation: u64,
}

#[derive(Debug)]
struct QueueEntry {
    task: PreloadTask,
    sequence: u64,
}

impl Eq for QueueEntry {}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: nearer pages first, earlier requests break ties.
        other
            .task
            .distance
            .cmp(&self.task.distance)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Forward-window preload queue with per-page deduplication.
///
/// `plan_window` rebuilds the pending set around the page just served;
/// pages currently being worked on stay in `active` so replanning cannot
/// schedule them twice.
#[derive(Debug, Default)]
pub(crate) struct PreloadQueue {
    pending: BinaryHeap<QueueEntry>,
    queued: HashSet<usize>,
    active: HashSet<usize>,
    sequence: u64,
}

impl PreloadQueue {
    pub fn plan_window(
        &mut self,
        generation: u64,
        current: usize,
        ahead: usize,
        total: usize,
        skip: impl Fn(usize) -> bool,
    ) {
        self.pending.clear();
        self.queued.clear();

        if total == 0 || ahead == 0 {
            return;
        }

        let last = total - 1;
        let end = current.saturating_add(ahead).min(last);
        let mut page = current;
        while page < end {
            page += 1;
            if skip(page) || self.active.contains(&page) {
                continue;
            }
            if !self.queued.insert(page) {
                continue;
            }
            self.sequence = self.sequence.wrapping_add(1);
            self.pending.push(QueueEntry {
                task: PreloadTask { page, distance: page - current, generation },
                sequence: self.sequence,
            });
        }
    }

    /// Pop the nearest pending page and mark it active.
    pub fn next_task(&mut self) -> Option<PreloadTask> {
        while let Some(entry) = self.pending.pop() {
            if self.queued.remove(&entry.task.page) {
                self.active.insert(entry.task.page);
                return Some(entry.task);
            }
        }
        None
    }

    /// Release a page after its extraction finished or failed.
    pub fn complete(&mut self, page: usize) {
        self.active.remove(&page);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.queued.clear();
        self.active.clear();
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}
