//! Runtime counters for container access: scan, extraction and decode
//! latency plus frame-cache effectiveness.
//!
//! A single collector is shared between the factory and every sink it
//! creates; snapshots are serializable for whatever HUD or diagnostics
//! surface the embedding shell provides.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::warn;

const DEFAULT_SAMPLE_CAPACITY: usize = 240;

#[derive(Debug, Default)]
struct SampleWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SampleWindow {
    fn new(capacity: usize) -> Self {
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    fn push(&mut self, value: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    fn percentile(&self, percentile: f32) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f32> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let rank = percentile.clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
        let index = rank.round() as usize;
        sorted.get(index).copied().unwrap_or(0.0)
    }
}

#[derive(Debug)]
struct StatsInner {
    started_at: Instant,
    scan_times_ms: SampleWindow,
    extract_times_ms: SampleWindow,
    decode_times_ms: SampleWindow,
    cache_requests: u64,
    cache_hits: u64,
    cache_bytes_used: u64,
    cache_bytes_capacity: u64,
    preload_pending: usize,
}

impl Default for StatsInner {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            scan_times_ms: SampleWindow::new(DEFAULT_SAMPLE_CAPACITY),
            extract_times_ms: SampleWindow::new(DEFAULT_SAMPLE_CAPACITY),
            decode_times_ms: SampleWindow::new(DEFAULT_SAMPLE_CAPACITY),
            cache_requests: 0,
            cache_hits: 0,
            cache_bytes_used: 0,
            cache_bytes_capacity: 0,
            preload_pending: 0,
        }
    }
}

/// Thread-safe counter collection shared by the sinks.
#[derive(Debug, Default)]
pub struct StatsCollector {
    inner: parking_lot::Mutex<StatsInner>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the duration of one full container scan.
    pub fn record_scan(&self, duration: Duration) {
        self.inner.lock().scan_times_ms.push(to_ms(duration));
    }

    /// Record the time spent retrieving one entry's bytes from a container.
    pub fn record_extract(&self, duration: Duration) {
        self.inner.lock().extract_times_ms.push(to_ms(duration));
    }

    /// Record the time spent decoding one frame.
    pub fn record_decode(&self, duration: Duration) {
        self.inner.lock().decode_times_ms.push(to_ms(duration));
    }

    /// Record whether a frame-cache lookup produced a hit.
    pub fn record_cache_lookup(&self, hit: bool) {
        let mut guard = self.inner.lock();
        guard.cache_requests = guard.cache_requests.saturating_add(1);
        if hit {
            guard.cache_hits = guard.cache_hits.saturating_add(1);
        }
    }

    pub fn update_cache_usage(&self, used_bytes: u64, capacity_bytes: u64) {
        let mut guard = self.inner.lock();
        guard.cache_bytes_used = used_bytes;
        guard.cache_bytes_capacity = capacity_bytes;
    }

    pub fn update_preload_pending(&self, pending: usize) {
        self.inner.lock().preload_pending = pending;
    }

    /// Snapshot the current metrics for presentation.
    pub fn snapshot(&self) -> PerfSnapshot {
        let guard = self.inner.lock();

        let cache_requests = guard.cache_requests.max(1);
        let cache_hit_ratio = guard.cache_hits as f32 / cache_requests as f32;

        PerfSnapshot {
            timestamp_ms: now_ms(),
            uptime_ms: guard.started_at.elapsed().as_millis() as u64,
            scan_time_ms_p50: guard.scan_times_ms.percentile(0.50),
            extract_time_ms_p50: guard.extract_times_ms.percentile(0.50),
            extract_time_ms_p95: guard.extract_times_ms.percentile(0.95),
            decode_time_ms_p50: guard.decode_times_ms.percentile(0.50),
            decode_time_ms_p95: guard.decode_times_ms.percentile(0.95),
            cache_hit_ratio,
            cache_requests: guard.cache_requests,
            cache_bytes_used: guard.cache_bytes_used,
            cache_bytes_capacity: guard.cache_bytes_capacity,
            preload_pending: guard.preload_pending,
        }
    }
}

fn to_ms(duration: Duration) -> f32 {
    duration.as_secs_f64() as f32 * 1_000.0
}

fn now_ms() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(delta) => delta.as_millis() as u64,
        Err(err) => {
            warn!("system clock error: {err}");
            0
        }
    }
}

/// Immutable snapshot handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct PerfSnapshot {
    pub timestamp_ms: u64,
    pub uptime_ms: u64,
    pub scan_time_ms_p50: f32,
    pub extract_time_ms_p50: f32,
    pub extract_time_ms_p95: f32,
    pub decode_time_ms_p50: f32,
    pub decode_time_ms_p95: f32,
    pub cache_hit_ratio: f32,
    pub cache_requests: u64,
    pub cache_bytes_used: u64,
    pub cache_bytes_capacity: u64,
    pub preload_pending: usize,
}
