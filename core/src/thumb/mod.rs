//! Asynchronous thumbnail production and delivery.

pub mod loader;
pub mod scale;

pub use loader::{Thumbnail, ThumbnailReceiver};
pub use scale::scale_to_fit;
