//! Shared placeholder bitmaps shown until (or instead of) a real preview.
//!
//! One bitmap per kind for the whole process. The built-ins are drawn here;
//! a directory of PNG overrides can replace any of them.

use std::path::Path;
use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::decode::{ImageDecoder, RawImage};
use crate::listing::{Entry, EntryKind};
use crate::media::{self, Category};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PlaceholderKind {
    Generic,
    Directory,
    Audio,
}

impl PlaceholderKind {
    pub const ALL: [PlaceholderKind; 3] = [
        PlaceholderKind::Generic,
        PlaceholderKind::Directory,
        PlaceholderKind::Audio,
    ];

    pub fn index(self) -> usize {
        match self {
            PlaceholderKind::Generic => 0,
            PlaceholderKind::Directory => 1,
            PlaceholderKind::Audio => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PlaceholderKind::Generic => "generic",
            PlaceholderKind::Directory => "directory",
            PlaceholderKind::Audio => "audio",
        }
    }

    /// File looked up in the override directory.
    pub fn file_name(self) -> &'static str {
        match self {
            PlaceholderKind::Generic => "placeholder.png",
            PlaceholderKind::Directory => "dir_placeholder.png",
            PlaceholderKind::Audio => "music_placeholder.png",
        }
    }

    /// Placeholder an entry starts with, before anything is decoded.
    pub fn for_entry(entry: &Entry, dir: &Path) -> Self {
        if entry.is_dir_like() {
            return PlaceholderKind::Directory;
        }
        match media::by_extension(&entry.source_path(dir)) {
            Some(Category::Audio) => PlaceholderKind::Audio,
            _ => PlaceholderKind::Generic,
        }
    }

    /// Category settled at registration. Only regular files (and links to
    /// them) are ever classified.
    pub fn presettled(entry: &Entry) -> Option<Category> {
        match entry.kind {
            EntryKind::Dir | EntryKind::Other => Some(Category::Unsupported),
            EntryKind::Symlink if entry.is_dir_like() => Some(Category::Unsupported),
            _ => None,
        }
    }

    pub fn draw(self) -> RawImage {
        let img = match self {
            PlaceholderKind::Generic => draw_document(),
            PlaceholderKind::Directory => draw_folder(),
            PlaceholderKind::Audio => draw_note(),
        };
        RawImage::from_dynamic(img.into())
    }
}

// ── Built-in artwork ────────────────────────────────────────────────────

const SIZE: u32 = 128;

fn fill_rect(img: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32, c: [u8; 4]) {
    for y in y0..y1.min(img.height()) {
        for x in x0..x1.min(img.width()) {
            img.put_pixel(x, y, Rgba(c));
        }
    }
}

fn outline_rect(img: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32, c: [u8; 4]) {
    fill_rect(img, x0, y0, x1, y0 + 2, c);
    fill_rect(img, x0, y1 - 2, x1, y1, c);
    fill_rect(img, x0, y0, x0 + 2, y1, c);
    fill_rect(img, x1 - 2, y0, x1, y1, c);
}

fn fill_ellipse(img: &mut RgbaImage, cx: f32, cy: f32, rx: f32, ry: f32, c: [u8; 4]) {
    for y in 0..img.height() {
        for x in 0..img.width() {
            let dx = (x as f32 + 0.5 - cx) / rx;
            let dy = (y as f32 + 0.5 - cy) / ry;
            if dx * dx + dy * dy <= 1.0 {
                img.put_pixel(x, y, Rgba(c));
            }
        }
    }
}

/// Sheet of paper with a folded corner.
fn draw_document() -> RgbaImage {
    let mut img = RgbaImage::new(SIZE, SIZE);
    let paper = [210, 210, 215, 255];
    let edge = [120, 120, 130, 255];
    let fold = [170, 170, 180, 255];

    fill_rect(&mut img, 28, 12, 100, 116, paper);
    outline_rect(&mut img, 28, 12, 100, 116, edge);
    // Corner fold: clear the triangle, then shade it.
    for i in 0..24u32 {
        fill_rect(&mut img, 100 - 24 + i, 12, 100, 13 + i, [0, 0, 0, 0]);
        fill_rect(&mut img, 100 - 24, 12 + i, 100 - 24 + i + 1, 13 + i, fold);
    }
    for y in (40..100).step_by(12) {
        fill_rect(&mut img, 40, y, 88, y + 3, edge);
    }
    img
}

fn draw_folder() -> RgbaImage {
    let mut img = RgbaImage::new(SIZE, SIZE);
    let body = [180, 140, 60, 255];
    let tab = [160, 120, 40, 255];
    let edge = [100, 80, 30, 255];

    fill_rect(&mut img, 10, 26, 54, 40, tab);
    outline_rect(&mut img, 10, 26, 54, 40, edge);
    fill_rect(&mut img, 10, 36, 118, 108, body);
    outline_rect(&mut img, 10, 36, 118, 108, edge);
    img
}

/// Eighth note on a dark card.
fn draw_note() -> RgbaImage {
    let mut img = RgbaImage::new(SIZE, SIZE);
    let card = [40, 44, 60, 255];
    let edge = [70, 76, 100, 255];
    let ink = [200, 205, 230, 255];

    fill_rect(&mut img, 12, 12, 116, 116, card);
    outline_rect(&mut img, 12, 12, 116, 116, edge);
    fill_ellipse(&mut img, 54.0, 88.0, 14.0, 10.0, ink);
    fill_rect(&mut img, 64, 30, 69, 88, ink);
    fill_rect(&mut img, 64, 30, 86, 36, ink);
    fill_rect(&mut img, 80, 30, 86, 52, ink);
    img
}

// ── Set ─────────────────────────────────────────────────────────────────

/// The three source bitmaps, one shared `Arc` per kind.
#[derive(Clone, Debug)]
pub struct PlaceholderSet {
    images: [Arc<RawImage>; 3],
}

impl Default for PlaceholderSet {
    fn default() -> Self {
        PlaceholderSet::builtin()
    }
}

impl PlaceholderSet {
    pub fn builtin() -> Self {
        PlaceholderSet {
            images: PlaceholderKind::ALL.map(|k| Arc::new(k.draw())),
        }
    }

    /// Built-ins, with any readable `<dir>/<kind file>` taking precedence.
    pub fn load(dir: Option<&Path>) -> Self {
        let mut set = PlaceholderSet::builtin();
        let Some(dir) = dir else {
            return set;
        };
        for kind in PlaceholderKind::ALL {
            let path = dir.join(kind.file_name());
            if !path.exists() {
                continue;
            }
            match ImageDecoder.decode_file(&path) {
                Ok(raw) => {
                    log::debug!("placeholder: {} from {}", kind.name(), path.display());
                    set.images[kind.index()] = Arc::new(raw);
                }
                Err(e) => log::warn!("placeholder: {e}, using built-in {}", kind.name()),
            }
        }
        set
    }

    pub fn get(&self, kind: PlaceholderKind) -> &Arc<RawImage> {
        &self.images[kind.index()]
    }
}
