//! Aspect-preserving fit of a decoded buffer into the tile preview box.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Pixel, Rgb, Rgba};

use crate::decode::{PixelFormat, RawImage};

/// Preview area of a tile, in pixels.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TileBox {
    pub width: u32,
    pub height: u32,
}

impl TileBox {
    pub const fn new(width: u32, height: u32) -> Self {
        TileBox { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// A [`RawImage`] resampled for one [`TileBox`]. Same layout rules.
pub type ScaledImage = RawImage;

/// Output dimensions for a `width`×`height` source in `bx`.
///
/// Wider than the box: full box width. Otherwise: full box height.
/// Both truncated and clamped to at least one pixel.
pub fn fit_dims(width: u32, height: u32, bx: TileBox) -> (u32, u32) {
    let img_aspect = if width == 0 || height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    };

    let (w, h) = if img_aspect > bx.aspect() {
        (bx.width as f32, bx.width as f32 / img_aspect)
    } else {
        (bx.height as f32 * img_aspect, bx.height as f32)
    };

    let w = (w as u32).clamp(1, bx.width.max(1));
    let h = (h as u32).clamp(1, bx.height.max(1));
    (w, h)
}

fn resize_as<P>(raw: &RawImage, w: u32, h: u32) -> Option<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let src: ImageBuffer<P, &[u8]> = ImageBuffer::from_raw(raw.width, raw.height, &raw.pixels[..])?;
    Some(imageops::resize(&src, w, h, FilterType::Triangle).into_raw())
}

/// Resample `raw` to fit `bx`. Deterministic: identical inputs produce
/// identical bytes.
pub fn fit(raw: &RawImage, bx: TileBox) -> ScaledImage {
    let (w, h) = fit_dims(raw.width, raw.height, bx);

    let resized = if raw.width == 0 || raw.height == 0 {
        None
    } else {
        match raw.format {
            PixelFormat::Rgb => resize_as::<Rgb<u8>>(raw, w, h),
            PixelFormat::Rgba => resize_as::<Rgba<u8>>(raw, w, h),
        }
    };

    // Inconsistent or empty sources scale to a blank buffer of the right size.
    let pixels = resized
        .unwrap_or_else(|| vec![0; w as usize * h as usize * raw.format.bytes_per_pixel()]);

    ScaledImage {
        pixels,
        width: w,
        height: h,
        format: raw.format,
    }
}
