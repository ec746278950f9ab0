//! Render-side texture handling.
//!
//! Flow, once per frame on the render thread:
//!   1. TileTextures::begin_frame(cache) → drops everything after a directory
//!      change, and textures whose entry moved to a new generation
//!   2. TileTextures::texture_for(cache, id) → uploads lazily for tiles that
//!      are actually drawn; a superseded texture is released first
//!
//! The loader never touches textures. Placeholders get one texture per kind,
//! shared by every tile that shows it.

use std::collections::HashMap;

use crate::cache::PreviewCache;
use crate::decode::PixelFormat;
use crate::listing::EntryId;
use crate::placeholder::PlaceholderKind;
use crate::scale::ScaledImage;

/// Creates and destroys GPU textures. Only ever called on the render thread.
pub trait TextureBackend {
    type Texture;

    fn upload(&mut self, image: &ScaledImage) -> Self::Texture;
    fn release(&mut self, texture: Self::Texture);
}

struct Slot<T> {
    generation: u64,
    texture: T,
}

/// Make `slot` hold a texture of `generation`, tearing down a stale one
/// before uploading.
fn refresh<B: TextureBackend>(
    backend: &mut B,
    slot: &mut Option<Slot<B::Texture>>,
    generation: u64,
    image: &ScaledImage,
) {
    if slot.as_ref().is_some_and(|s| s.generation == generation) {
        return;
    }
    if let Some(old) = slot.take() {
        backend.release(old.texture);
    }
    *slot = Some(Slot {
        generation,
        texture: backend.upload(image),
    });
}

pub struct TileTextures<B: TextureBackend> {
    backend: B,
    entries: HashMap<EntryId, Slot<B::Texture>>,
    placeholders: [Option<Slot<B::Texture>>; 3],
    epoch: u64,
    revision: u64,
}

impl<B: TextureBackend> TileTextures<B> {
    pub fn new(backend: B) -> Self {
        TileTextures {
            backend,
            entries: HashMap::new(),
            placeholders: [None, None, None],
            epoch: 0,
            revision: u64::MAX,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Live textures, placeholders included.
    pub fn len(&self) -> usize {
        self.entries.len() + self.placeholders.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-frame hook. Cheap when the cache has not changed.
    pub fn begin_frame(&mut self, cache: &PreviewCache) {
        let epoch = cache.epoch();
        if epoch != self.epoch {
            self.release_all();
            self.epoch = epoch;
        }

        let revision = cache.revision();
        if revision == self.revision {
            return;
        }
        self.revision = revision;

        let stale: Vec<EntryId> = self
            .entries
            .iter()
            .filter(|(id, slot)| match cache.get(**id) {
                Some(e) => e.is_placeholder() || e.generation != slot.generation,
                None => true,
            })
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            if let Some(slot) = self.entries.remove(&id) {
                self.backend.release(slot.texture);
            }
        }

        for kind in PlaceholderKind::ALL {
            let (_, generation) = cache.placeholder(kind);
            let slot = &mut self.placeholders[kind.index()];
            if slot.as_ref().is_some_and(|s| s.generation != generation) {
                if let Some(old) = slot.take() {
                    self.backend.release(old.texture);
                }
            }
        }
    }

    /// Texture for a tile about to be drawn, uploading it if needed.
    /// `None` only if the entry is unknown to the cache.
    pub fn texture_for(&mut self, cache: &PreviewCache, id: EntryId) -> Option<&B::Texture> {
        let entry = cache.get(id)?;

        if let Some(kind) = entry.placeholder {
            let slot = &mut self.placeholders[kind.index()];
            refresh(&mut self.backend, slot, entry.generation, &entry.scaled);
            return slot.as_ref().map(|s| &s.texture);
        }

        let mut slot = self.entries.remove(&id);
        refresh(&mut self.backend, &mut slot, entry.generation, &entry.scaled);
        let slot = self.entries.entry(id).or_insert(slot?);
        Some(&slot.texture)
    }

    pub fn release_all(&mut self) {
        for (_, slot) in self.entries.drain() {
            self.backend.release(slot.texture);
        }
        for slot in self.placeholders.iter_mut() {
            if let Some(old) = slot.take() {
                self.backend.release(old.texture);
            }
        }
    }
}

impl<B: TextureBackend> Drop for TileTextures<B> {
    fn drop(&mut self) {
        self.release_all();
    }
}

// ── OpenGL ──────────────────────────────────────────────────────────────

/// GL texture handle plus its size.
#[derive(Clone, Copy, Debug)]
pub struct GlTexture {
    pub id: u32,
    pub width: u32,
    pub height: u32,
}

/// Uploads through the `gl` crate. The GL function pointers must be loaded
/// and a context current on the calling thread.
#[derive(Default)]
pub struct GlBackend;

impl TextureBackend for GlBackend {
    type Texture = GlTexture;

    fn upload(&mut self, image: &ScaledImage) -> GlTexture {
        let (internal, format) = match image.format {
            PixelFormat::Rgb => (gl::RGB8, gl::RGB),
            PixelFormat::Rgba => (gl::RGBA8, gl::RGBA),
        };
        let id = unsafe {
            let mut tex = 0u32;
            gl::GenTextures(1, &mut tex);
            gl::BindTexture(gl::TEXTURE_2D, tex);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::LINEAR as i32);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::LINEAR as i32);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as i32);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as i32);
            // RGB rows are not 4-byte aligned.
            gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);
            gl::TexImage2D(
                gl::TEXTURE_2D,
                0,
                internal as i32,
                image.width as i32,
                image.height as i32,
                0,
                format,
                gl::UNSIGNED_BYTE,
                image.pixels.as_ptr() as *const _,
            );
            gl::PixelStorei(gl::UNPACK_ALIGNMENT, 4);
            gl::BindTexture(gl::TEXTURE_2D, 0);
            tex
        };
        GlTexture {
            id,
            width: image.width,
            height: image.height,
        }
    }

    fn release(&mut self, texture: GlTexture) {
        unsafe {
            gl::DeleteTextures(1, &texture.id);
        }
    }
}

// ── Headless ────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CpuTexture {
    pub serial: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TextureOp {
    Upload(u64),
    Release(u64),
}

/// Backend without a GPU: hands out serial numbers and records every
/// upload and release in order.
#[derive(Default)]
pub struct CountingBackend {
    next: u64,
    ops: Vec<TextureOp>,
    live: usize,
    uploaded_bytes: u64,
}

impl CountingBackend {
    pub fn ops(&self) -> &[TextureOp] {
        &self.ops
    }

    pub fn uploads(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, TextureOp::Upload(_)))
            .count()
    }

    pub fn live(&self) -> usize {
        self.live
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes
    }
}

impl TextureBackend for CountingBackend {
    type Texture = CpuTexture;

    fn upload(&mut self, image: &ScaledImage) -> CpuTexture {
        self.next += 1;
        self.ops.push(TextureOp::Upload(self.next));
        self.live += 1;
        self.uploaded_bytes += image.pixels.len() as u64;
        CpuTexture {
            serial: self.next,
            width: image.width,
            height: image.height,
            format: image.format,
        }
    }

    fn release(&mut self, texture: CpuTexture) {
        self.ops.push(TextureOp::Release(texture.serial));
        self.live -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::RawImage;
    use crate::media::Category;
    use crate::placeholder::PlaceholderSet;
    use crate::scale::{self, TileBox};

    const BOX: TileBox = TileBox::new(114, 119);

    fn id(n: u64) -> EntryId {
        EntryId::new(7, n)
    }

    fn publish(cache: &PreviewCache, n: u64, w: u32, h: u32) {
        let raw = RawImage {
            pixels: vec![50; (w * h * 3) as usize],
            width: w,
            height: h,
            format: PixelFormat::Rgb,
        };
        let bx = cache.tile_box();
        let scaled = scale::fit(&raw, bx);
        assert!(cache.put_decoded(id(n), Category::Image, raw, scaled, bx));
    }

    fn setup() -> (PreviewCache, TileTextures<CountingBackend>) {
        let cache = PreviewCache::new(PlaceholderSet::builtin(), BOX);
        (cache, TileTextures::new(CountingBackend::default()))
    }

    #[test]
    fn unknown_entry_has_no_texture() {
        let (cache, mut tex) = setup();
        tex.begin_frame(&cache);
        assert!(tex.texture_for(&cache, id(1)).is_none());
        assert_eq!(tex.backend().uploads(), 0);
    }

    #[test]
    fn placeholder_texture_is_shared() {
        let (cache, mut tex) = setup();
        for n in 0..5 {
            cache.put_placeholder(id(n), PlaceholderKind::Generic, None);
        }
        tex.begin_frame(&cache);
        let first = *tex.texture_for(&cache, id(0)).unwrap();
        for n in 1..5 {
            assert_eq!(*tex.texture_for(&cache, id(n)).unwrap(), first);
        }
        assert_eq!(tex.backend().uploads(), 1);
        assert_eq!(tex.len(), 1);
    }

    #[test]
    fn upload_is_lazy_and_cached() {
        let (cache, mut tex) = setup();
        cache.put_placeholder(id(1), PlaceholderKind::Generic, None);
        publish(&cache, 1, 800, 600);
        tex.begin_frame(&cache);
        assert_eq!(tex.backend().uploads(), 0);

        let t = *tex.texture_for(&cache, id(1)).unwrap();
        assert_eq!((t.width, t.height), (114, 85));
        tex.begin_frame(&cache);
        assert_eq!(*tex.texture_for(&cache, id(1)).unwrap(), t);
        assert_eq!(tex.backend().uploads(), 1);
    }

    #[test]
    fn new_generation_tears_down_before_upload() {
        let (cache, mut tex) = setup();
        cache.put_placeholder(id(1), PlaceholderKind::Generic, None);
        publish(&cache, 1, 40, 40);
        tex.begin_frame(&cache);
        let old = tex.texture_for(&cache, id(1)).unwrap().serial;

        publish(&cache, 1, 80, 40);
        // Without begin_frame the lazy path still swaps in order.
        let new = tex.texture_for(&cache, id(1)).unwrap().serial;
        assert_ne!(old, new);
        assert_eq!(
            tex.backend().ops(),
            &[
                TextureOp::Upload(old),
                TextureOp::Release(old),
                TextureOp::Upload(new)
            ]
        );
        assert_eq!(tex.backend().live(), 1);
    }

    #[test]
    fn begin_frame_releases_stale_generation() {
        let (cache, mut tex) = setup();
        cache.put_placeholder(id(1), PlaceholderKind::Generic, None);
        publish(&cache, 1, 40, 40);
        tex.begin_frame(&cache);
        tex.texture_for(&cache, id(1));

        cache.rescale_all(TileBox::new(20, 20));
        tex.begin_frame(&cache);
        assert_eq!(tex.backend().live(), 0);
        let t = *tex.texture_for(&cache, id(1)).unwrap();
        assert_eq!((t.width, t.height), (20, 20));
    }

    #[test]
    fn invalidation_releases_everything() {
        let (cache, mut tex) = setup();
        cache.put_placeholder(id(1), PlaceholderKind::Generic, None);
        cache.put_placeholder(id(2), PlaceholderKind::Directory, None);
        publish(&cache, 1, 30, 30);
        tex.begin_frame(&cache);
        tex.texture_for(&cache, id(1));
        tex.texture_for(&cache, id(2));
        assert_eq!(tex.backend().live(), 2);

        cache.invalidate_all();
        tex.begin_frame(&cache);
        assert_eq!(tex.backend().live(), 0);
        assert!(tex.is_empty());
        assert!(tex.texture_for(&cache, id(1)).is_none());
    }

    #[test]
    fn drop_releases_live_textures() {
        let (cache, mut tex) = setup();
        cache.put_placeholder(id(1), PlaceholderKind::Audio, None);
        tex.begin_frame(&cache);
        tex.texture_for(&cache, id(1));
        assert_eq!(tex.len(), 1);
        tex.release_all();
        assert_eq!(tex.backend().live(), 0);
    }
}
