//! Raw pixel buffers and per-category decode dispatch.
//!
//! Every decoder hands back an owned [`RawImage`] in one of the two upload
//! layouts: RGB for opaque colour sources, RGBA for everything else (alpha,
//! gray, gray+alpha). `pixels.len() == width * height * bpp` always holds.

use std::path::Path;
use std::time::Duration;

use image::{DynamicImage, ImageReader};

use crate::audio;
use crate::config::Config;
use crate::error::PreviewError;
use crate::media::{self, Category};
use crate::video::VideoDecoder;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PixelFormat {
    Rgb,
    Rgba,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

/// Decoded pixels, single mip level, tightly packed rows.
#[derive(Clone, PartialEq, Eq)]
pub struct RawImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl std::fmt::Debug for RawImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl RawImage {
    /// Normalize any decoded image into RGB or RGBA.
    pub fn from_dynamic(img: DynamicImage) -> RawImage {
        let color = img.color();
        if color.has_alpha() || !color.has_color() {
            let rgba = img.into_rgba8();
            let (width, height) = rgba.dimensions();
            RawImage {
                pixels: rgba.into_raw(),
                width,
                height,
                format: PixelFormat::Rgba,
            }
        } else {
            let rgb = img.into_rgb8();
            let (width, height) = rgb.dimensions();
            RawImage {
                pixels: rgb.into_raw(),
                width,
                height,
                format: PixelFormat::Rgb,
            }
        }
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    pub fn is_consistent(&self) -> bool {
        self.pixels.len() == self.expected_len()
    }

    /// Width over height; 1.0 for degenerate buffers.
    pub fn aspect(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

// ── Decoders ────────────────────────────────────────────────────────────

/// Standard raster formats, from a file or from memory. The format is
/// guessed from content, not from the extension.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageDecoder;

impl ImageDecoder {
    pub fn decode_file(&self, path: &Path) -> Result<RawImage, PreviewError> {
        let reader = ImageReader::open(path)
            .map_err(|e| PreviewError::unavailable(path, e))?
            .with_guessed_format()
            .map_err(|e| PreviewError::unavailable(path, e))?;
        let img = reader.decode().map_err(|e| PreviewError::decode(path, e))?;
        Ok(RawImage::from_dynamic(img))
    }

    /// `path` only names the source in errors.
    pub fn decode_bytes(&self, path: &Path, bytes: &[u8]) -> Result<RawImage, PreviewError> {
        let img = image::load_from_memory(bytes).map_err(|e| PreviewError::decode(path, e))?;
        Ok(RawImage::from_dynamic(img))
    }
}

/// Embedded cover art, decoded through the image decoder.
#[derive(Clone, Copy, Debug)]
pub struct AudioCoverDecoder {
    pub max_cover_bytes: usize,
    image: ImageDecoder,
}

impl AudioCoverDecoder {
    pub fn new(max_cover_bytes: usize) -> Self {
        AudioCoverDecoder {
            max_cover_bytes,
            image: ImageDecoder,
        }
    }

    pub fn decode(&self, path: &Path) -> Result<RawImage, PreviewError> {
        let bytes = audio::extract_cover(path, self.max_cover_bytes)?;
        self.image.decode_bytes(path, &bytes)
    }
}

// ── Dispatch ────────────────────────────────────────────────────────────

/// What the loader needs from the media layer.
pub trait PreviewDecoder: Send + Sync {
    fn classify(&self, path: &Path) -> Category;
    fn decode(&self, category: Category, path: &Path) -> Result<RawImage, PreviewError>;
}

#[derive(Clone, Debug)]
pub struct MediaDecoder {
    image: ImageDecoder,
    video: VideoDecoder,
    audio: AudioCoverDecoder,
}

impl MediaDecoder {
    pub fn from_config(config: &Config) -> Self {
        MediaDecoder {
            image: ImageDecoder,
            video: VideoDecoder::new(
                config.video.ffmpeg.clone(),
                Duration::from_secs(config.video.timeout_secs),
            ),
            audio: AudioCoverDecoder::new(config.audio.max_cover_bytes),
        }
    }
}

impl Default for MediaDecoder {
    fn default() -> Self {
        MediaDecoder::from_config(&Config::default())
    }
}

impl PreviewDecoder for MediaDecoder {
    fn classify(&self, path: &Path) -> Category {
        media::classify(path)
    }

    fn decode(&self, category: Category, path: &Path) -> Result<RawImage, PreviewError> {
        let raw = match category {
            Category::Image => self.image.decode_file(path)?,
            Category::Video => self.video.decode(path)?,
            Category::Audio => self.audio.decode(path)?,
            Category::Unsupported => return Err(PreviewError::unsupported(path)),
        };
        if !raw.is_consistent() {
            return Err(PreviewError::decode(
                path,
                format!(
                    "buffer is {} bytes, expected {}",
                    raw.pixels.len(),
                    raw.expected_len()
                ),
            ));
        }
        Ok(raw)
    }
}
