//! Image decoding primitives.

pub mod image;

pub use image::{DecodedImage, decode_frame};

pub type Result<T> = crate::Result<T>;
