//! Runtime configuration for the container access core.
//!
//! The embedding shell owns persistence; this crate only defines the typed
//! shape, serde derives, and defaults. Unknown or missing fields fall back to
//! defaults so older settings files keep loading.

use serde::{Deserialize, Serialize};

use crate::types::{CacheBudget, PreloadPolicy, ThumbnailSpec};

/// Tunables injected at startup into the [`SinkFactory`](crate::SinkFactory)
/// and the frame cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReaderConfig {
    pub cache: CacheBudget,
    pub preload: PreloadPolicy,
    pub thumbnail: ThumbnailSpec,
}
