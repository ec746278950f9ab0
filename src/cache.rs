//! Preview cache: the single authoritative map from entry identity to its
//! current preview.
//!
//! Readers get `Arc<CacheEntry>` snapshots. Writers build the replacement
//! entry outside the lock and hold the write lock only for the swap, so a
//! decode or resample never blocks the render loop.
//!
//! Every change of an entry's scaled buffer gets a fresh generation number;
//! the render side compares generations to know when to re-upload. Placeholder
//! entries share the generation of their placeholder asset.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::decode::RawImage;
use crate::listing::EntryId;
use crate::media::Category;
use crate::placeholder::{PlaceholderKind, PlaceholderSet};
use crate::scale::{self, ScaledImage, TileBox};

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub id: EntryId,
    /// `None` until classified. Settled entries are never processed again.
    pub category: Option<Category>,
    pub raw: Arc<RawImage>,
    pub scaled: Arc<ScaledImage>,
    /// Box `scaled` was computed for.
    pub scaled_for: TileBox,
    /// Set while the entry shows a shared placeholder.
    pub placeholder: Option<PlaceholderKind>,
    pub generation: u64,
}

impl CacheEntry {
    pub fn is_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }

    pub fn is_settled(&self) -> bool {
        self.category.is_some()
    }
}

#[derive(Clone, Debug)]
struct PlaceholderAsset {
    raw: Arc<RawImage>,
    scaled: Arc<ScaledImage>,
    scaled_for: TileBox,
    generation: u64,
}

struct Inner {
    entries: HashMap<EntryId, Arc<CacheEntry>>,
    placeholders: [PlaceholderAsset; 3],
    tile_box: TileBox,
}

impl Inner {
    fn placeholder_entry(
        &self,
        id: EntryId,
        kind: PlaceholderKind,
        category: Option<Category>,
    ) -> CacheEntry {
        let asset = &self.placeholders[kind.index()];
        CacheEntry {
            id,
            category,
            raw: asset.raw.clone(),
            scaled: asset.scaled.clone(),
            scaled_for: asset.scaled_for,
            placeholder: Some(kind),
            generation: asset.generation,
        }
    }
}

pub struct PreviewCache {
    inner: RwLock<Inner>,
    /// Bumped by `invalidate_all`; the render side drops every texture.
    epoch: AtomicU64,
    /// Bumped on every mutation; lets the render side skip unchanged frames.
    revision: AtomicU64,
    next_generation: AtomicU64,
}

impl PreviewCache {
    pub fn new(placeholders: PlaceholderSet, tile_box: TileBox) -> Self {
        let next_generation = AtomicU64::new(1);
        let assets = PlaceholderKind::ALL.map(|kind| {
            let raw = placeholders.get(kind).clone();
            PlaceholderAsset {
                scaled: Arc::new(scale::fit(&raw, tile_box)),
                raw,
                scaled_for: tile_box,
                generation: next_generation.fetch_add(1, Ordering::Relaxed),
            }
        });
        PreviewCache {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                placeholders: assets,
                tile_box,
            }),
            epoch: AtomicU64::new(0),
            revision: AtomicU64::new(0),
            next_generation,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::Release);
    }

    fn generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn get(&self, id: EntryId) -> Option<Arc<CacheEntry>> {
        self.read().entries.get(&id).cloned()
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.read().entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<EntryId> {
        self.read().entries.keys().copied().collect()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    pub fn tile_box(&self) -> TileBox {
        self.read().tile_box
    }

    /// Current scaled buffer and generation of a placeholder kind.
    pub fn placeholder(&self, kind: PlaceholderKind) -> (Arc<ScaledImage>, u64) {
        let inner = self.read();
        let asset = &inner.placeholders[kind.index()];
        (asset.scaled.clone(), asset.generation)
    }

    // ── Mutations ───────────────────────────────────────────────────────

    /// Register `id` with a shared placeholder. No-op if already present.
    pub fn put_placeholder(
        &self,
        id: EntryId,
        kind: PlaceholderKind,
        category: Option<Category>,
    ) -> bool {
        let mut inner = self.write();
        if inner.entries.contains_key(&id) {
            return false;
        }
        let entry = Arc::new(inner.placeholder_entry(id, kind, category));
        inner.entries.insert(id, entry);
        drop(inner);
        self.bump();
        true
    }

    /// Publish decoded content for `id`. Dropped if `id` is no longer cached
    /// (the directory changed while it was decoding).
    pub fn put_decoded(
        &self,
        id: EntryId,
        category: Category,
        raw: RawImage,
        scaled: ScaledImage,
        scaled_for: TileBox,
    ) -> bool {
        let entry = Arc::new(CacheEntry {
            id,
            category: Some(category),
            raw: Arc::new(raw),
            scaled: Arc::new(scaled),
            scaled_for,
            placeholder: None,
            generation: self.generation(),
        });

        let mut inner = self.write();
        match inner.entries.get_mut(&id) {
            Some(slot) => *slot = entry,
            None => return false,
        }
        drop(inner);
        self.bump();
        true
    }

    /// Settle `id` as failed: it keeps (or reverts to) a placeholder and is
    /// never processed again. Audio entries show the audio placeholder.
    pub fn mark_failed(&self, id: EntryId, category: Category) -> bool {
        let mut inner = self.write();
        let Some(current) = inner.entries.get(&id) else {
            return false;
        };
        let kind = if category == Category::Audio {
            PlaceholderKind::Audio
        } else {
            current.placeholder.unwrap_or(PlaceholderKind::Generic)
        };
        let entry = Arc::new(inner.placeholder_entry(id, kind, Some(category)));
        inner.entries.insert(id, entry);
        drop(inner);
        self.bump();
        true
    }

    /// Drop every entry and its buffers. Textures are released by the render
    /// side when it sees the new epoch.
    pub fn invalidate_all(&self) {
        let old = {
            let mut inner = self.write();
            std::mem::take(&mut inner.entries)
        };
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.bump();
        drop(old);
    }

    pub fn set_tile_box(&self, tile_box: TileBox) {
        let mut inner = self.write();
        if inner.tile_box != tile_box {
            inner.tile_box = tile_box;
            drop(inner);
            self.bump();
        }
    }

    /// Resample each shared placeholder once for `tile_box` and repoint the
    /// entries that show it. Returns how many placeholder buffers changed.
    pub fn rescale_placeholders(&self, tile_box: TileBox) -> usize {
        let stale: Vec<(PlaceholderKind, Arc<RawImage>)> = {
            let inner = self.read();
            PlaceholderKind::ALL
                .into_iter()
                .filter(|k| inner.placeholders[k.index()].scaled_for != tile_box)
                .map(|k| (k, inner.placeholders[k.index()].raw.clone()))
                .collect()
        };
        if stale.is_empty() {
            return 0;
        }

        let fresh: Vec<(PlaceholderKind, Arc<ScaledImage>, u64)> = stale
            .iter()
            .map(|(k, raw)| (*k, Arc::new(scale::fit(raw, tile_box)), self.generation()))
            .collect();

        let mut inner = self.write();
        for (kind, scaled, generation) in &fresh {
            let asset = &mut inner.placeholders[kind.index()];
            asset.scaled = scaled.clone();
            asset.scaled_for = tile_box;
            asset.generation = *generation;
        }
        let repointed: Vec<Arc<CacheEntry>> = inner
            .entries
            .values()
            .filter_map(|e| {
                let kind = e.placeholder?;
                fresh
                    .iter()
                    .any(|(k, _, _)| *k == kind)
                    .then(|| Arc::new(inner.placeholder_entry(e.id, kind, e.category)))
            })
            .collect();
        for entry in repointed {
            inner.entries.insert(entry.id, entry);
        }
        drop(inner);
        self.bump();
        fresh.len()
    }

    /// Resample one decoded entry for `tile_box`. Placeholders and entries
    /// already at that size are left alone, as is an entry that was replaced
    /// while it was being resampled.
    pub fn rescale_entry(&self, id: EntryId, tile_box: TileBox) -> bool {
        let Some(current) = self.get(id) else {
            return false;
        };
        if current.is_placeholder() || current.scaled_for == tile_box {
            return false;
        }

        let entry = Arc::new(CacheEntry {
            scaled: Arc::new(scale::fit(&current.raw, tile_box)),
            scaled_for: tile_box,
            generation: self.generation(),
            ..(*current).clone()
        });

        let mut inner = self.write();
        match inner.entries.get_mut(&id) {
            Some(slot) if Arc::ptr_eq(slot, &current) => *slot = entry,
            _ => return false,
        }
        drop(inner);
        self.bump();
        true
    }

    /// Resample everything for a new tile box in one go.
    pub fn rescale_all(&self, tile_box: TileBox) {
        self.set_tile_box(tile_box);
        self.rescale_placeholders(tile_box);
        for id in self.ids() {
            self.rescale_entry(id, tile_box);
        }
    }
}
