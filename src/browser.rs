//! Navigation and zoom controller: owns the listing, the loader and the tile
//! layout, and turns user actions into cache operations.
//!
//! Navigation is stop-the-world for the loader: the new directory is read
//! first, then the listing, queue and cache are swapped while the loader is
//! held at a safe point. Zoom only posts a rescale request.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, RwLockReadGuard};

use crate::cache::PreviewCache;
use crate::config::{Config, TilesConfig};
use crate::decode::PreviewDecoder;
use crate::error::{ListingError, OpenError};
use crate::listing::{Entry, EntryId, Listing, Origin};
use crate::loader::{LoaderEvent, LoaderState, LoaderStats, PreviewLoader, Shared};
use crate::placeholder::PlaceholderSet;
use crate::scale::TileBox;
use crate::watcher::{DirWatcher, FsEvent};

// ── Layout ──────────────────────────────────────────────────────────────

/// Tile geometry at one zoom level. Base sizes times the scale, truncated.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct TileLayout {
    pub scale: f32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub spacing: u32,
    pub text_padding: u32,
    pub font_size: f32,
}

impl TileLayout {
    pub fn for_scale(tiles: &TilesConfig, scale: f32) -> Self {
        let mul = |v: u32| (v as f32 * scale) as u32;
        TileLayout {
            scale,
            tile_width: mul(tiles.width),
            tile_height: mul(tiles.height),
            spacing: mul(tiles.spacing),
            text_padding: mul(tiles.text_padding),
            font_size: tiles.font_size * scale,
        }
    }

    /// Preview area inside a tile.
    pub fn tile_box(&self) -> TileBox {
        TileBox::new(
            self.tile_width.saturating_sub(self.text_padding).max(1),
            self.tile_height.saturating_sub(self.text_padding).max(1),
        )
    }

    /// Tiles per row in a window `width` pixels wide.
    pub fn columns(&self, width: u32) -> u32 {
        (width / (self.tile_width + self.spacing).max(1)).max(1)
    }
}

// ── Browser ─────────────────────────────────────────────────────────────

fn canonical_dir(dir: &Path) -> Result<PathBuf, ListingError> {
    fs::canonicalize(dir).map_err(|source| ListingError::Open {
        dir: dir.to_path_buf(),
        source,
    })
}

pub struct Browser {
    config: Config,
    shared: Arc<Shared>,
    loader: PreviewLoader,
    layout: TileLayout,
    watcher: Option<(DirWatcher, Receiver<FsEvent>)>,
}

impl Browser {
    /// Read `dir`, register every entry as a placeholder and start the
    /// loader.
    pub fn open(
        dir: &Path,
        config: Config,
        decoder: Arc<dyn PreviewDecoder>,
        events: Option<Sender<LoaderEvent>>,
    ) -> Result<Self, OpenError> {
        let dir = canonical_dir(dir)?;
        let listing = Listing::read(&dir)?;

        let layout = TileLayout::for_scale(&config.tiles, config.zoom.min);
        let placeholders = PlaceholderSet::load(config.placeholders.dir.as_deref());
        let cache = PreviewCache::new(placeholders, layout.tile_box());

        let shared = Arc::new(Shared::new(cache, listing));
        shared.register_listing();
        log::info!(
            "browser: {} ({} entries)",
            dir.display(),
            shared.listing().entries.len()
        );

        let loader =
            PreviewLoader::spawn(shared.clone(), decoder, config.loader_interval(), events)?;

        Ok(Browser {
            config,
            shared,
            loader,
            layout,
            watcher: None,
        })
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn cache(&self) -> &PreviewCache {
        &self.shared.cache
    }

    pub fn listing(&self) -> RwLockReadGuard<'_, Listing> {
        self.shared.listing()
    }

    pub fn dir(&self) -> PathBuf {
        self.shared.listing().dir.clone()
    }

    /// Live entries in display order.
    pub fn entries(&self) -> Vec<Entry> {
        self.shared.listing().visible().cloned().collect()
    }

    pub fn layout(&self) -> TileLayout {
        self.layout
    }

    pub fn scale(&self) -> f32 {
        self.layout.scale
    }

    pub fn loader_state(&self) -> LoaderState {
        self.loader.state()
    }

    pub fn stats(&self) -> &LoaderStats {
        self.loader.stats()
    }

    /// Every live entry is settled and sized for the current layout.
    pub fn is_settled(&self) -> bool {
        if !self.shared.queue().is_empty() || self.shared.control.pending_rescale().is_some() {
            return false;
        }
        let tile_box = self.layout.tile_box();
        let cache = &self.shared.cache;
        if cache.tile_box() != tile_box {
            return false;
        }
        self.shared.listing().visible().all(|e| {
            cache
                .get(e.id)
                .is_some_and(|c| c.is_settled() && c.scaled_for == tile_box)
        })
    }

    // ── Navigation ──────────────────────────────────────────────────────

    /// Replace the listing with `dir`. On a read error nothing changes.
    pub fn navigate(&mut self, dir: &Path) -> Result<(), ListingError> {
        let dir = canonical_dir(dir)?;
        let listing = Listing::read(&dir)?;
        let n = listing.entries.len();

        let old = {
            let _guard = self.shared.control.begin_mutation();
            self.shared.queue().clear();
            self.shared.cache.invalidate_all();
            let old = std::mem::replace(&mut *self.shared.listing_mut(), listing);
            self.shared.register_listing();
            old.dir
        };

        if let Some((w, _)) = &self.watcher {
            w.unwatch_dir(&old);
            w.watch_dir(&dir);
        }

        log::info!("browser: {} ({} entries)", dir.display(), n);
        Ok(())
    }

    /// Navigate into a directory entry. `Ok(false)` if it is not one.
    pub fn enter(&mut self, id: EntryId) -> Result<bool, ListingError> {
        let target = {
            let listing = self.shared.listing();
            listing
                .entries
                .iter()
                .find(|e| e.id == id && !e.removed && e.is_dir_like())
                .map(|e| e.source_path(&listing.dir))
        };
        match target {
            Some(dir) => self.navigate(&dir).map(|()| true),
            None => Ok(false),
        }
    }

    // ── Incremental additions ───────────────────────────────────────────

    /// Register `entry`, append it to the listing and queue it for decoding.
    /// Entries already present are ignored.
    fn append(&self, entry: Entry) -> bool {
        let dir = {
            let mut listing = self.shared.listing_mut();
            if let Some(pos) = listing.position(entry.id) {
                let existing = &mut listing.entries[pos];
                let revived = existing.removed;
                existing.removed = false;
                return revived;
            }
            listing.entries.push(entry.clone());
            listing.dir.clone()
        };
        self.shared.register(&entry, &dir);
        self.shared.enqueue(entry);
        true
    }

    /// Paths dropped onto the window, appended with absolute origins.
    /// Returns how many were added.
    pub fn drop_paths(&self, paths: &[PathBuf]) -> usize {
        let mut added = 0;
        for path in paths {
            let abs = match fs::canonicalize(path) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("browser: dropped {}: {}", path.display(), e);
                    continue;
                }
            };
            match Entry::dropped(&abs) {
                Ok(entry) => {
                    if self.append(entry) {
                        added += 1;
                    }
                }
                Err(e) => log::warn!("browser: dropped {}: {}", abs.display(), e),
            }
        }
        if added > 0 {
            log::debug!("browser: {} dropped entries queued", added);
        }
        added
    }

    /// Queue an already-built entry (e.g. from an external source).
    pub fn enqueue(&self, entry: Entry) -> bool {
        self.append(entry)
    }

    /// Apply a watcher event for the current directory. Events for other
    /// directories are ignored.
    pub fn apply_fs_event(&self, event: &FsEvent) -> bool {
        let (FsEvent::Created(path) | FsEvent::Removed(path)) = event;
        let dir = self.dir();
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return false;
        };
        if parent != dir {
            return false;
        }
        let name = name.to_string_lossy();

        match event {
            FsEvent::Created(_) => match Entry::listed(&dir, &name) {
                Ok(entry) => self.append(entry),
                Err(e) => {
                    log::debug!("browser: {} vanished: {}", path.display(), e);
                    false
                }
            },
            FsEvent::Removed(_) => {
                let mut listing = self.shared.listing_mut();
                match listing
                    .entries
                    .iter_mut()
                    .find(|e| e.origin == Origin::Listed && !e.removed && e.name == name)
                {
                    Some(e) => {
                        e.removed = true;
                        true
                    }
                    None => false,
                }
            }
        }
    }

    // ── Watching ────────────────────────────────────────────────────────

    /// Follow creations and removals in the current directory, and in every
    /// directory navigated to afterwards. Call `poll_fs_events` each frame.
    pub fn watch(&mut self) -> io::Result<()> {
        if self.watcher.is_none() {
            let (w, rx) = DirWatcher::start()?;
            w.watch_dir(&self.dir());
            self.watcher = Some((w, rx));
        }
        Ok(())
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Apply pending watcher events. Returns how many changed the listing.
    pub fn poll_fs_events(&self) -> usize {
        let Some((_, rx)) = &self.watcher else {
            return 0;
        };
        let mut applied = 0;
        while let Ok(ev) = rx.try_recv() {
            if self.apply_fs_event(&ev) {
                log::debug!("browser: {:?}", ev);
                applied += 1;
            }
        }
        applied
    }

    // ── Zoom ────────────────────────────────────────────────────────────

    /// Change the zoom level (clamped to the configured range) and ask the
    /// loader to rescale. `false` if nothing changed.
    pub fn set_scale(&mut self, scale: f32) -> bool {
        let z = &self.config.zoom;
        let scale = scale.clamp(z.min, z.max);
        if (scale - self.layout.scale).abs() < f32::EPSILON {
            return false;
        }
        self.layout = TileLayout::for_scale(&self.config.tiles, scale);
        let tile_box = self.layout.tile_box();
        self.shared.control.request_rescale(tile_box);
        log::debug!(
            "browser: scale {:.2}, preview box {}x{}",
            scale,
            tile_box.width,
            tile_box.height
        );
        true
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set_scale(self.layout.scale + self.config.zoom.step)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_scale(self.layout.scale - self.config.zoom.step)
    }

    /// Stop and join the loader. Shared buffers go away only after this.
    pub fn shutdown(&mut self) {
        if let Some((w, _)) = &mut self.watcher {
            w.stop();
        }
        self.loader.stop();
    }
}

impl Drop for Browser {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{MediaDecoder, RawImage};
    use crate::error::PreviewError;
    use crate::media::Category;
    use crate::placeholder::PlaceholderKind;
    use std::collections::HashSet;
    use std::sync::mpsc::{self, Receiver};
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(10);

    fn test_config() -> Config {
        let mut c = Config::default();
        c.loader.interval_ms = 10;
        c
    }

    fn write_png(path: &Path, w: u32, h: u32) {
        image::RgbImage::from_pixel(w, h, image::Rgb([90, 120, 150]))
            .save(path)
            .unwrap();
    }

    fn wait_settled(b: &Browser) {
        let deadline = Instant::now() + WAIT;
        while !b.is_settled() {
            assert!(Instant::now() < deadline, "browser never settled");
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn id_of(b: &Browser, name: &str) -> EntryId {
        b.entries().iter().find(|e| e.name == name).unwrap().id
    }

    /// Decoder that blocks on one file name until released, so a test can
    /// act while the loader is inside a pass.
    struct GatedDecoder {
        inner: MediaDecoder,
        gate: String,
        entered: Mutex<Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl GatedDecoder {
        fn new(gate: &str) -> (Self, Receiver<()>, Sender<()>) {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            let dec = GatedDecoder {
                inner: MediaDecoder::default(),
                gate: gate.to_string(),
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            };
            (dec, entered_rx, release_tx)
        }
    }

    impl PreviewDecoder for GatedDecoder {
        fn classify(&self, path: &Path) -> Category {
            self.inner.classify(path)
        }

        fn decode(&self, category: Category, path: &Path) -> Result<RawImage, PreviewError> {
            if path.file_name().is_some_and(|n| n == self.gate.as_str()) {
                self.entered.lock().unwrap().send(()).ok();
                self.release.lock().unwrap().recv_timeout(WAIT).ok();
            }
            self.inner.decode(category, path)
        }
    }

    #[test]
    fn layout_scales_and_truncates() {
        let tiles = TilesConfig::default();
        let l = TileLayout::for_scale(&tiles, 1.0);
        assert_eq!(l.tile_box(), TileBox::new(114, 119));
        let l = TileLayout::for_scale(&tiles, 1.25);
        assert_eq!((l.tile_width, l.tile_height), (150, 156));
        assert_eq!(l.text_padding, 7);
        assert_eq!(l.tile_box(), TileBox::new(143, 149));
        assert_eq!(l.columns(1000), 5);
        let l = TileLayout::for_scale(&tiles, 3.0);
        assert_eq!(l.tile_box(), TileBox::new(342, 357));
    }

    #[test]
    fn open_registers_placeholders_and_decodes() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("photo.png"), 800, 600);
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let b = Browser::open(
            dir.path(),
            test_config(),
            Arc::new(MediaDecoder::default()),
            None,
        )
        .unwrap();
        for e in b.entries() {
            assert!(b.cache().get(e.id).is_some(), "{} not registered", e.name);
        }
        assert_eq!(b.entries()[0].name, "..");

        wait_settled(&b);
        let photo = b.cache().get(id_of(&b, "photo.png")).unwrap();
        assert_eq!((photo.scaled.width, photo.scaled.height), (114, 85));
        let sub = b.cache().get(id_of(&b, "sub")).unwrap();
        assert_eq!(sub.placeholder, Some(PlaceholderKind::Directory));
    }

    #[test]
    fn open_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Browser::open(
            &dir.path().join("nope"),
            test_config(),
            Arc::new(MediaDecoder::default()),
            None,
        )
        .err()
        .unwrap();
        assert!(matches!(err, OpenError::Listing(ListingError::Open { .. })));
    }

    #[test]
    fn navigate_invalidates_old_entries() {
        let a = tempfile::tempdir().unwrap();
        let b_dir = tempfile::tempdir().unwrap();
        write_png(&a.path().join("one.png"), 20, 20);
        write_png(&b_dir.path().join("two.png"), 30, 10);

        let mut b = Browser::open(
            a.path(),
            test_config(),
            Arc::new(MediaDecoder::default()),
            None,
        )
        .unwrap();
        wait_settled(&b);
        let old = id_of(&b, "one.png");
        let epoch = b.cache().epoch();

        b.navigate(b_dir.path()).unwrap();
        assert!(b.cache().get(old).is_none());
        assert_eq!(b.cache().epoch(), epoch + 1);
        let two = id_of(&b, "two.png");
        assert!(b.cache().get(two).is_some());

        wait_settled(&b);
        assert!(!b.cache().get(two).unwrap().is_placeholder());
    }

    #[test]
    fn failed_navigation_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("keep.png"), 10, 10);
        let mut b = Browser::open(
            dir.path(),
            test_config(),
            Arc::new(MediaDecoder::default()),
            None,
        )
        .unwrap();
        let before = b.dir();
        let id = id_of(&b, "keep.png");

        assert!(b.navigate(&dir.path().join("missing")).is_err());
        assert_eq!(b.dir(), before);
        assert!(b.cache().get(id).is_some());
    }

    #[test]
    fn enter_directory_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("inner")).unwrap();
        write_png(&dir.path().join("inner/x.png"), 5, 5);
        write_png(&dir.path().join("file.png"), 5, 5);

        let mut b = Browser::open(
            dir.path(),
            test_config(),
            Arc::new(MediaDecoder::default()),
            None,
        )
        .unwrap();
        assert!(!b.enter(id_of(&b, "file.png")).unwrap());
        assert!(b.enter(id_of(&b, "inner")).unwrap());
        assert!(b.dir().ends_with("inner"));
        assert!(b.entries().iter().any(|e| e.name == "x.png"));

        assert!(b.enter(id_of(&b, "..")).unwrap());
        assert_eq!(b.dir(), std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn drop_paths_registers_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let p = elsewhere.path().join("dropped.png");
        write_png(&p, 40, 20);

        let b = Browser::open(
            dir.path(),
            test_config(),
            Arc::new(MediaDecoder::default()),
            None,
        )
        .unwrap();
        let missing = elsewhere.path().join("missing.png");
        assert_eq!(b.drop_paths(&[p.clone(), missing]), 1);

        let entry = b.entries().into_iter().find(|e| e.name == "dropped.png").unwrap();
        assert!(matches!(entry.origin, Origin::Absolute(_)));
        assert!(b.cache().get(entry.id).is_some());

        // Dropping the same file again is a no-op.
        assert_eq!(b.drop_paths(&[p]), 0);
        wait_settled(&b);
        assert!(!b.cache().get(entry.id).unwrap().is_placeholder());
    }

    #[test]
    fn watcher_events_update_listing() {
        let dir = tempfile::tempdir().unwrap();
        let b = Browser::open(
            dir.path(),
            test_config(),
            Arc::new(MediaDecoder::default()),
            None,
        )
        .unwrap();
        let canon = b.dir();

        let p = canon.join("arrived.png");
        write_png(&p, 12, 12);
        assert!(b.apply_fs_event(&FsEvent::Created(p.clone())));
        assert!(!b.apply_fs_event(&FsEvent::Created(p.clone())));
        let id = id_of(&b, "arrived.png");
        assert!(b.cache().get(id).is_some());

        let other = tempfile::tempdir().unwrap();
        let q = other.path().join("elsewhere.png");
        write_png(&q, 12, 12);
        assert!(!b.apply_fs_event(&FsEvent::Created(q)));

        std::fs::remove_file(&p).unwrap();
        assert!(b.apply_fs_event(&FsEvent::Removed(p.clone())));
        assert!(!b.entries().iter().any(|e| e.name == "arrived.png"));
        assert!(!b.apply_fs_event(&FsEvent::Removed(p)));
    }

    fn wait_for_entry(b: &Browser, name: &str) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            b.poll_fs_events();
            if b.entries().iter().any(|e| e.name == name) {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn watch_follows_navigation() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let mut b = Browser::open(
            first.path(),
            test_config(),
            Arc::new(MediaDecoder::default()),
            None,
        )
        .unwrap();
        b.watch().unwrap();
        assert!(b.is_watching());
        thread::sleep(Duration::from_millis(500));

        write_png(&b.dir().join("before.png"), 8, 8);
        assert!(wait_for_entry(&b, "before.png"));

        b.navigate(second.path()).unwrap();
        thread::sleep(Duration::from_millis(500));

        write_png(&b.dir().join("after.png"), 8, 8);
        assert!(wait_for_entry(&b, "after.png"));
        let id = id_of(&b, "after.png");
        assert!(b.cache().get(id).is_some());

        // The old directory is no longer watched.
        write_png(&first.path().join("stale.png"), 8, 8);
        assert!(!wait_for_entry(&b, "stale.png"));
    }

    #[test]
    fn poll_without_watcher_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let b = Browser::open(
            dir.path(),
            test_config(),
            Arc::new(MediaDecoder::default()),
            None,
        )
        .unwrap();
        assert!(!b.is_watching());
        assert_eq!(b.poll_fs_events(), 0);
    }

    #[test]
    fn zoom_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = Browser::open(
            dir.path(),
            test_config(),
            Arc::new(MediaDecoder::default()),
            None,
        )
        .unwrap();
        assert!(!b.zoom_out());
        assert!(b.zoom_in());
        assert_eq!(b.scale(), 1.25);
        assert!(b.set_scale(10.0));
        assert_eq!(b.scale(), 3.0);
        assert!(!b.zoom_in());
        assert_eq!(b.layout().tile_box(), TileBox::new(342, 357));
        wait_settled(&b);
        assert_eq!(b.cache().tile_box(), TileBox::new(342, 357));
    }

    #[test]
    fn drops_during_rescan_drain_before_next_pass() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a_gate.png"), 64, 48);
        let elsewhere = tempfile::tempdir().unwrap();
        let drops: Vec<PathBuf> = (0..3)
            .map(|i| {
                let p = elsewhere.path().join(format!("drop{i}.png"));
                write_png(&p, 30 + i, 30);
                p
            })
            .collect();

        let (dec, entered, release) = GatedDecoder::new("a_gate.png");
        let (tx, rx) = mpsc::channel();
        let b = Browser::open(dir.path(), test_config(), Arc::new(dec), Some(tx)).unwrap();

        entered.recv_timeout(WAIT).unwrap();
        assert_eq!(b.loader_state(), LoaderState::Rescanning);
        assert_eq!(b.drop_paths(&drops), 3);
        let dropped: HashSet<EntryId> = b
            .entries()
            .iter()
            .filter(|e| e.name.starts_with("drop"))
            .map(|e| e.id)
            .collect();
        assert_eq!(dropped.len(), 3);
        release.send(()).unwrap();

        let mut rescans = 0;
        let mut drained = false;
        let mut published = HashSet::new();
        while rescans < 2 {
            match rx.recv_timeout(WAIT).unwrap() {
                LoaderEvent::StateChanged(LoaderState::Rescanning) => rescans += 1,
                LoaderEvent::StateChanged(LoaderState::Draining) => drained = true,
                LoaderEvent::Published(id, _) => {
                    published.insert(id);
                }
                _ => {}
            }
        }
        assert!(drained);
        assert!(dropped.is_subset(&published), "drops not drained first");
    }

    #[test]
    fn zoom_mid_pass_applies_on_following_pass() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a_gate.png"), 800, 600);
        write_png(&dir.path().join("b.png"), 800, 600);
        write_png(&dir.path().join("c.png"), 800, 600);

        let (dec, entered, release) = GatedDecoder::new("a_gate.png");
        let (tx, rx) = mpsc::channel();
        let mut b = Browser::open(dir.path(), test_config(), Arc::new(dec), Some(tx)).unwrap();
        let old_box = b.layout().tile_box();
        let (id_b, id_c) = (id_of(&b, "b.png"), id_of(&b, "c.png"));

        entered.recv_timeout(WAIT).unwrap();
        assert!(b.zoom_in());
        let new_box = b.layout().tile_box();
        assert_eq!(new_box, TileBox::new(143, 149));
        release.send(()).unwrap();

        let mut published_old = HashSet::new();
        loop {
            match rx.recv_timeout(WAIT).unwrap() {
                LoaderEvent::Published(id, bx) => {
                    assert_eq!(bx, old_box, "in-flight pass switched boxes");
                    published_old.insert(id);
                }
                LoaderEvent::Rescaled(bx) => {
                    assert_eq!(bx, new_box);
                    break;
                }
                _ => {}
            }
        }
        assert!(published_old.contains(&id_b) && published_old.contains(&id_c));

        wait_settled(&b);
        for id in [id_b, id_c] {
            let e = b.cache().get(id).unwrap();
            assert_eq!(e.scaled_for, new_box);
            assert_eq!((e.scaled.width, e.scaled.height), (143, 107));
        }
    }

    #[test]
    fn shutdown_stops_loader() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = Browser::open(
            dir.path(),
            test_config(),
            Arc::new(MediaDecoder::default()),
            None,
        )
        .unwrap();
        b.shutdown();
        assert_eq!(b.loader_state(), LoaderState::Stopped);
        b.shutdown();
    }
}
