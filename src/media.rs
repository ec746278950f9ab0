//! Media type classification: extension first, content sniffing second.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::audio;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Video,
    Audio,
    Image,
    Unsupported,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::Video => "video",
            Category::Audio => "audio",
            Category::Image => "image",
            Category::Unsupported => "unsupported",
        }
    }
}

pub const VIDEO_EXTS: &[&str] = &[
    "mp4", "mov", "mkv", "avi", "webm", "flv", "wmv", "m4v", "3gp",
];
pub const AUDIO_EXTS: &[&str] = &["mp3", "wav", "flac", "ogg"];
pub const IMAGE_EXTS: &[&str] = &[
    "png", "jpg", "jpeg", "bmp", "tga", "psd", "gif", "hdr", "pic", "pnm", "webp", "tiff", "tif",
    "ico", "avif",
];

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = b"\xff\xd8\xff";
const GIF_MAGIC: &[u8] = b"GIF8";
const BMP_MAGIC: &[u8] = b"BM";
const RIFF_MAGIC: &[u8] = b"RIFF";
const WEBP_MAGIC: &[u8] = b"WEBP";
const MP4_MAGIC: &[u8] = b"ftyp";
const EBML_MAGIC: &[u8] = b"\x1a\x45\xdf\xa3";

/// Bytes read from the head of a file for sniffing.
const SNIFF_LEN: usize = 16;

/// Lowercased extension, if any.
pub fn ext_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase())
}

/// Category from the extension alone; `None` if absent or unrecognized.
pub fn by_extension(path: &Path) -> Option<Category> {
    let ext = ext_of(path)?;
    let ext = ext.as_str();
    if VIDEO_EXTS.contains(&ext) {
        Some(Category::Video)
    } else if AUDIO_EXTS.contains(&ext) {
        Some(Category::Audio)
    } else if IMAGE_EXTS.contains(&ext) {
        Some(Category::Image)
    } else {
        None
    }
}

/// Fixed-offset signature check on the first bytes of a file.
pub fn sniff(head: &[u8]) -> Option<Category> {
    let at = |offset: usize, magic: &[u8]| {
        head.len() >= offset + magic.len() && &head[offset..offset + magic.len()] == magic
    };

    if at(4, MP4_MAGIC) || at(0, EBML_MAGIC) {
        return Some(Category::Video);
    }
    if at(0, PNG_MAGIC)
        || at(0, JPEG_MAGIC)
        || at(0, GIF_MAGIC)
        || at(0, BMP_MAGIC)
        || (at(0, RIFF_MAGIC) && at(8, WEBP_MAGIC))
    {
        return Some(Category::Image);
    }
    None
}

fn read_head(path: &Path) -> Option<Vec<u8>> {
    let mut f = File::open(path).ok()?;
    let mut buf = Vec::with_capacity(SNIFF_LEN);
    f.by_ref().take(SNIFF_LEN as u64).read_to_end(&mut buf).ok()?;
    Some(buf)
}

/// Classify a file. Unreadable files and directories end up `Unsupported`.
pub fn classify(path: &Path) -> Category {
    if path.is_dir() {
        return Category::Unsupported;
    }
    if let Some(c) = by_extension(path) {
        return c;
    }
    let Some(head) = read_head(path) else {
        return Category::Unsupported;
    };
    if let Some(c) = sniff(&head) {
        return c;
    }
    if audio::looks_like_audio(path) {
        return Category::Audio;
    }
    Category::Unsupported
}
