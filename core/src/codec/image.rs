//! Decoding container entries into RGBA frames.

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, anyhow};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder as _, ImageFormat, ImageReader, RgbaImage};
use moxcms::{CmsError, ColorProfile, Layout, TransformOptions};
use tracing::warn;

use crate::types::ImageDimensions;

use super::Result;

/// RGBA pixel buffer produced by decoding one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub dimensions: ImageDimensions,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Raw straight-alpha RGBA8888 data, row-major from the top-left.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Decode a page frame from raw container bytes.
///
/// `origin` is the entry's internal path, used to pick the decoder by
/// extension before falling back to content sniffing. Supports JPEG, PNG,
/// WebP and GIF (first frame). EXIF orientation is applied and embedded ICC
/// profiles are converted to sRGB; a broken profile only logs a warning.
pub fn decode_frame(origin: &Path, data: &[u8]) -> Result<DecodedImage> {
    if data.is_empty() {
        return Err(anyhow!("empty image data for {:?}", origin));
    }

    let reader = if let Some(format) = infer_format(origin) {
        ImageReader::with_format(Cursor::new(data), format)
    } else {
        ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .context("guessing image format")?
    };

    let mut decoder = reader
        .into_decoder()
        .with_context(|| format!("constructing decoder for {:?}", origin))?;

    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let icc_profile = decoder.icc_profile().unwrap_or(None);

    let mut image =
        DynamicImage::from_decoder(decoder).with_context(|| format!("decoding {:?}", origin))?;

    if orientation != Orientation::NoTransforms {
        image.apply_orientation(orientation);
    }

    let mut rgba = image.into_rgba8();

    if let Some(profile) = icc_profile {
        if let Err(err) = convert_to_srgb_in_place(&mut rgba, &profile) {
            warn!(target: "codec", "failed to convert ICC profile for {:?}: {err}", origin);
        }
    }

    let dimensions = ImageDimensions { width: rgba.width(), height: rgba.height() };
    let pixels = rgba.into_raw();

    Ok(DecodedImage { dimensions, pixels })
}

fn infer_format(path: &Path) -> Option<ImageFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .and_then(|ext| ImageFormat::from_extension(&ext))
}

fn convert_to_srgb_in_place(image: &mut RgbaImage, profile_bytes: &[u8]) -> Result<()> {
    let src_profile = ColorProfile::new_from_slice(profile_bytes)
        .map_err(|err| anyhow!("invalid ICC profile: {err}"))?;
    let dest_profile = ColorProfile::new_srgb();
    let (width, height) = image.dimensions();
    let raw = image.as_mut();

    match src_profile.create_transform_8bit(
        Layout::Rgba,
        &dest_profile,
        Layout::Rgba,
        TransformOptions::default(),
    ) {
        Ok(transform) => {
            let mut dst = vec![0u8; raw.len()];
            let raw_slice: &[u8] = &raw[..];
            transform
                .transform(raw_slice, &mut dst)
                .map_err(|err| anyhow!("icc transform failed: {err}"))?;
            raw.copy_from_slice(&dst);
            Ok(())
        }
        Err(CmsError::InvalidLayout) => {
            // Some profiles only describe three channels; transform RGB and
            // carry alpha through untouched.
            let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
            for px in raw.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
            }
            let mut dst_rgb = vec![0u8; rgb.len()];
            let transform = src_profile.create_transform_8bit(
                Layout::Rgb,
                &dest_profile,
                Layout::Rgb,
                TransformOptions::default(),
            )?;
            transform
                .transform(&rgb, &mut dst_rgb)
                .map_err(|err| anyhow!("icc transform failed: {err}"))?;
            for (rgba_px, rgb_px) in raw.chunks_exact_mut(4).zip(dst_rgb.chunks_exact(3)) {
                rgba_px[0..3].copy_from_slice(rgb_px);
            }
            Ok(())
        }
        Err(err) => Err(anyhow!("icc transform setup failed: {err}")),
    }
}
