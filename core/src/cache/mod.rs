//! Decoded-frame caching keyed by page number.

pub mod frames;

pub use frames::{ComicFrameList, FrameCache};
