//! Downscaling decoded frames to thumbnail size.

use anyhow::{anyhow, ensure};
use fast_image_resize as fir;

use crate::codec::DecodedImage;
use crate::types::{ImageDimensions, ThumbnailFilter, ThumbnailSpec};

use crate::Result;

impl From<ThumbnailFilter> for fir::ResizeAlg {
    fn from(value: ThumbnailFilter) -> Self {
        use fir::FilterType;
        match value {
            ThumbnailFilter::Nearest => fir::ResizeAlg::Nearest,
            ThumbnailFilter::Bilinear => fir::ResizeAlg::Convolution(FilterType::Bilinear),
            ThumbnailFilter::CatmullRom => fir::ResizeAlg::Convolution(FilterType::CatmullRom),
            ThumbnailFilter::Lanczos3 => fir::ResizeAlg::Convolution(FilterType::Lanczos3),
        }
    }
}

/// Target dimensions that fit `source` within a `longest_edge` square while
/// preserving aspect ratio. Never returns a zero dimension.
fn fit_within(source: ImageDimensions, longest_edge: u32) -> ImageDimensions {
    let long = source.width.max(source.height);
    if long <= longest_edge {
        return source;
    }

    let scale = longest_edge as f64 / long as f64;
    let width = ((source.width as f64 * scale).round() as u32).max(1);
    let height = ((source.height as f64 * scale).round() as u32).max(1);
    ImageDimensions { width, height }
}

/// Scale a decoded frame down so its longer edge fits the requested size.
///
/// Frames already small enough are returned as a plain copy.
pub fn scale_to_fit(source: &DecodedImage, spec: &ThumbnailSpec) -> Result<DecodedImage> {
    ensure!(spec.longest_edge > 0, "thumbnail edge must be non-zero");
    ensure!(
        source.width() > 0 && source.height() > 0,
        "source image has zero dimensions"
    );

    let target = fit_within(source.dimensions, spec.longest_edge);
    if target == source.dimensions {
        return Ok(source.clone());
    }

    let src_pixels = source.pixels();
    ensure!(
        src_pixels.len() >= (source.width() as usize * source.height() as usize * 4),
        "source buffer is smaller than expected"
    );

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        src_pixels,
        fir::PixelType::U8x4,
    )
    .map_err(|err| anyhow!("failed to prepare source image: {err}"))?;

    let mut dst_image = fir::images::Image::new(target.width, target.height, fir::PixelType::U8x4);

    let options = fir::ResizeOptions::new().resize_alg(spec.filter.into()).use_alpha(true);

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .map_err(|err| anyhow!("thumbnail resize failed: {err}"))?;

    Ok(DecodedImage { dimensions: target, pixels: dst_image.into_vec() })
}
