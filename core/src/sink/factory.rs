//! Dispatching a caller-supplied path to the right sink variant.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::cache::FrameCache;
use crate::config::ReaderConfig;
use crate::error::SinkError;
use crate::stats::StatsCollector;

use super::Sink;
use super::archive::{self, ArchiveSink};
use super::container::ContainerSink;
use super::directory::DirectorySink;

/// Builds unopened sinks for caller-supplied paths.
///
/// The frame cache and stats collector are injected once at construction and
/// shared by every sink the factory creates, so all UI components observe the
/// same cache instance.
#[derive(Debug)]
pub struct SinkFactory {
    cache: Arc<FrameCache>,
    stats: Arc<StatsCollector>,
    config: ReaderConfig,
}

impl SinkFactory {
    pub fn new(cache: Arc<FrameCache>, config: ReaderConfig) -> Self {
        Self { cache, stats: Arc::new(StatsCollector::new()), config }
    }

    /// Share an externally owned stats collector instead of the private one.
    pub fn with_stats(mut self, stats: Arc<StatsCollector>) -> Self {
        self.stats = stats;
        self
    }

    pub fn cache(&self) -> &Arc<FrameCache> {
        &self.cache
    }

    pub fn stats(&self) -> &Arc<StatsCollector> {
        &self.stats
    }

    /// Inspect `path` and instantiate the matching sink variant, unopened.
    ///
    /// Directories become directory sinks; regular files recognized as
    /// archives by name or magic bytes become archive sinks. Anything else is
    /// `UnsupportedFormat`; a path that does not exist is `NotFound`.
    pub fn create(&self, path: &Path) -> Result<Box<dyn Sink>, SinkError> {
        let meta = fs::metadata(path).map_err(|err| SinkError::from_io(&err))?;

        if meta.is_dir() {
            debug!(target: "sink::factory", path = %path.display(), "directory sink");
            let sink: DirectorySink = ContainerSink::new(
                Arc::clone(&self.cache),
                Arc::clone(&self.stats),
                self.config.thumbnail,
            )?;
            return Ok(Box::new(sink));
        }

        if meta.is_file() && archive::detect_format(path).is_some() {
            debug!(target: "sink::factory", path = %path.display(), "archive sink");
            let sink: ArchiveSink = ContainerSink::new(
                Arc::clone(&self.cache),
                Arc::clone(&self.stats),
                self.config.thumbnail,
            )?;
            return Ok(Box::new(sink));
        }

        Err(SinkError::UnsupportedFormat)
    }
}
