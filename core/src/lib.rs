//! Container access core for a comic reader: enumerate, order and retrieve
//! page images out of directories and compressed archives, with frame
//! caching, preloading and asynchronous thumbnail delivery.

#![deny(missing_debug_implementations)]

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod log;
pub mod order;
pub mod sink;
pub mod stats;
pub mod thumb;
pub mod types;

/// Result alias for internal fallible paths; the sink boundary uses the
/// typed [`SinkError`] instead.
pub type Result<T> = std::result::Result<T, anyhow::Error>;

pub use cache::{ComicFrameList, FrameCache};
pub use codec::DecodedImage;
pub use config::ReaderConfig;
pub use error::SinkError;
pub use order::EntryOrdering;
pub use sink::{OpenEvent, Sink, SinkFactory};
pub use thumb::{Thumbnail, ThumbnailReceiver};
pub use types::{
    CacheBudget, ContainerEntry, OpenState, PreloadPolicy, SiblingDirection, ThumbnailFilter,
    ThumbnailSpec,
};

/// Returns the version of the core crate for telemetry and debugging.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
