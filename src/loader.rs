//! Background preview loader.
//!
//! One long-lived thread. Every cycle it drains entries registered since the
//! last cycle (drops, watcher), then runs a rescan pass over the listing:
//! apply a pending rescale, then decode whatever is still unclassified.
//! All decoding happens here; GPU work stays on the render thread.

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::cache::PreviewCache;
use crate::control::WorkerControl;
use crate::decode::PreviewDecoder;
use crate::listing::{Entry, EntryId, Listing};
use crate::media::Category;
use crate::placeholder::PlaceholderKind;
use crate::scale::{self, TileBox};

// ── State ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LoaderState {
    Idle,
    Draining,
    Rescanning,
    Stopped,
}

impl LoaderState {
    pub fn name(&self) -> &'static str {
        match self {
            LoaderState::Idle => "idle",
            LoaderState::Draining => "draining",
            LoaderState::Rescanning => "rescanning",
            LoaderState::Stopped => "stopped",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LoaderState::Idle,
            1 => LoaderState::Draining,
            2 => LoaderState::Rescanning,
            _ => LoaderState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LoaderState::Idle => 0,
            LoaderState::Draining => 1,
            LoaderState::Rescanning => 2,
            LoaderState::Stopped => 3,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum LoaderEvent {
    StateChanged(LoaderState),
    /// Decoded preview published, scaled for the given box.
    Published(EntryId, TileBox),
    /// Settled without a preview (unsupported or failed).
    Failed(EntryId),
    /// A rescale request was picked up by the pass that just started.
    Rescaled(TileBox),
}

// ── Stats (shared with UI via Arc) ──────────────────────────────────────

#[derive(Default)]
pub struct LoaderStats {
    pub done: AtomicU64,
    pub failed: AtomicU64,
    pub unsupported: AtomicU64,
    pub passes: AtomicU64,
    last_error: Mutex<String>,
}

impl LoaderStats {
    fn record_done(&self) {
        self.done.fetch_add(1, Ordering::Relaxed);
    }

    fn record_fail(&self, err: &str) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut le) = self.last_error.lock() {
            le.clear();
            le.extend(err.chars().take(120));
        }
    }

    pub fn last_error(&self) -> String {
        self.last_error
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

// ── Shared state ────────────────────────────────────────────────────────

/// Everything the UI thread and the loader both touch.
pub struct Shared {
    pub cache: PreviewCache,
    listing: RwLock<Listing>,
    queue: Mutex<VecDeque<Entry>>,
    pub control: WorkerControl,
}

impl Shared {
    pub fn new(cache: PreviewCache, listing: Listing) -> Self {
        Shared {
            cache,
            listing: RwLock::new(listing),
            queue: Mutex::new(VecDeque::new()),
            control: WorkerControl::new(),
        }
    }

    pub fn listing(&self) -> RwLockReadGuard<'_, Listing> {
        self.listing.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn listing_mut(&self) -> RwLockWriteGuard<'_, Listing> {
        self.listing.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn queue(&self) -> MutexGuard<'_, VecDeque<Entry>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Give a newly known entry its placeholder.
    pub fn register(&self, entry: &Entry, dir: &Path) -> bool {
        self.cache.put_placeholder(
            entry.id,
            PlaceholderKind::for_entry(entry, dir),
            PlaceholderKind::presettled(entry),
        )
    }

    /// Register every entry of the current listing.
    pub fn register_listing(&self) {
        let listing = self.listing();
        for entry in listing.visible() {
            self.register(entry, &listing.dir);
        }
    }

    /// Queue an entry for decoding ahead of the next rescan pass.
    pub fn enqueue(&self, entry: Entry) {
        self.queue().push_back(entry);
    }
}

// ── Loader handle ───────────────────────────────────────────────────────

pub struct PreviewLoader {
    shared: Arc<Shared>,
    stats: Arc<LoaderStats>,
    state: Arc<AtomicU8>,
    handle: Option<JoinHandle<()>>,
}

impl PreviewLoader {
    pub fn spawn(
        shared: Arc<Shared>,
        decoder: Arc<dyn PreviewDecoder>,
        interval: Duration,
        events: Option<Sender<LoaderEvent>>,
    ) -> io::Result<Self> {
        let stats = Arc::new(LoaderStats::default());
        let state = Arc::new(AtomicU8::new(LoaderState::Idle.as_u8()));

        let worker = Worker {
            shared: shared.clone(),
            decoder,
            interval,
            events,
            stats: stats.clone(),
            state: state.clone(),
        };
        let handle = thread::Builder::new()
            .name("preview-loader".into())
            .spawn(move || worker.run())?;

        log::info!("loader: started, interval {}ms", interval.as_millis());

        Ok(PreviewLoader {
            shared,
            stats,
            state,
            handle: Some(handle),
        })
    }

    pub fn state(&self) -> LoaderState {
        LoaderState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn stats(&self) -> &LoaderStats {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the worker and wait for it. The worker finishes the entry it is
    /// on, if any.
    pub fn stop(&mut self) {
        self.shared.control.request_stop();
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                log::error!("loader: worker panicked");
            }
            log::info!("loader: stopped");
        }
    }
}

impl Drop for PreviewLoader {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Worker loop ─────────────────────────────────────────────────────────

struct Worker {
    shared: Arc<Shared>,
    decoder: Arc<dyn PreviewDecoder>,
    interval: Duration,
    events: Option<Sender<LoaderEvent>>,
    stats: Arc<LoaderStats>,
    state: Arc<AtomicU8>,
}

impl Worker {
    fn emit(&self, event: LoaderEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }

    fn set_state(&self, state: LoaderState) {
        let prev = self.state.swap(state.as_u8(), Ordering::AcqRel);
        if prev != state.as_u8() {
            log::trace!("loader: {}", state.name());
            self.emit(LoaderEvent::StateChanged(state));
        }
    }

    fn run(self) {
        let control = &self.shared.control;
        loop {
            if control.stop_requested() {
                break;
            }
            if control.is_mutating() {
                self.set_state(LoaderState::Idle);
                control.sleep(self.interval);
                continue;
            }
            if self.drain() && self.rescan() {
                self.stats.passes.fetch_add(1, Ordering::Relaxed);
            }
            if control.stop_requested() {
                break;
            }
            self.set_state(LoaderState::Idle);
            control.sleep(self.interval);
        }
        self.set_state(LoaderState::Stopped);
    }

    /// Process queued entries one step at a time. `false` if interrupted.
    fn drain(&self) -> bool {
        loop {
            let Some(_step) = self.shared.control.try_step() else {
                return false;
            };
            let Some(entry) = self.shared.queue().pop_front() else {
                return true;
            };
            self.set_state(LoaderState::Draining);
            let dir = self.shared.listing().dir.clone();
            self.process(&entry, &dir);
        }
    }

    /// One rescan pass. `false` if interrupted; a consumed rescale request is
    /// then put back for the next pass.
    fn rescan(&self) -> bool {
        self.set_state(LoaderState::Rescanning);
        let cache = &self.shared.cache;
        let control = &self.shared.control;
        let epoch = cache.epoch();

        let requested = control.take_rescale();
        let interrupted = || {
            if let Some(bx) = requested {
                control.restore_rescale(bx);
            }
            false
        };

        if let Some(bx) = requested {
            let t0 = Instant::now();
            {
                let Some(_step) = control.try_step() else {
                    return interrupted();
                };
                cache.set_tile_box(bx);
                cache.rescale_placeholders(bx);
            }
            self.emit(LoaderEvent::Rescaled(bx));
            let mut n = 0;
            for id in cache.ids() {
                let Some(_step) = control.try_step() else {
                    return interrupted();
                };
                if cache.epoch() != epoch {
                    return interrupted();
                }
                if cache.rescale_entry(id, bx) {
                    n += 1;
                }
            }
            log::debug!(
                "loader: rescaled {} previews to {}x{} in {:?}",
                n,
                bx.width,
                bx.height,
                t0.elapsed()
            );
        }

        let (dir, entries) = {
            let listing = self.shared.listing();
            let pending: Vec<Entry> = listing
                .visible()
                .filter(|e| cache.get(e.id).is_some_and(|c| !c.is_settled()))
                .cloned()
                .collect();
            (listing.dir.clone(), pending)
        };

        for entry in &entries {
            let Some(_step) = control.try_step() else {
                return interrupted();
            };
            if cache.epoch() != epoch {
                return interrupted();
            }
            self.process(entry, &dir);
        }
        true
    }

    /// Classify, decode, scale and publish one entry. Failures settle the
    /// entry on its placeholder and go no further.
    fn process(&self, entry: &Entry, dir: &Path) {
        let cache = &self.shared.cache;
        let id = entry.id;
        match cache.get(id) {
            Some(current) if !current.is_settled() => {}
            _ => return,
        }

        let path = entry.source_path(dir);
        let category = self.decoder.classify(&path);
        if category == Category::Unsupported {
            log::debug!("loader: {} unsupported", path.display());
            cache.mark_failed(id, category);
            self.stats.unsupported.fetch_add(1, Ordering::Relaxed);
            self.emit(LoaderEvent::Failed(id));
            return;
        }

        let tile_box = cache.tile_box();
        let t0 = Instant::now();
        match self.decoder.decode(category, &path) {
            Ok(raw) => {
                let scaled = scale::fit(&raw, tile_box);
                log::trace!(
                    "loader: {} {}x{} -> {}x{} in {:?}",
                    path.display(),
                    raw.width,
                    raw.height,
                    scaled.width,
                    scaled.height,
                    t0.elapsed()
                );
                if cache.put_decoded(id, category, raw, scaled, tile_box) {
                    self.stats.record_done();
                    self.emit(LoaderEvent::Published(id, tile_box));
                }
            }
            Err(e) => {
                if e.is_unsupported() {
                    log::debug!("loader: {e}");
                    self.stats.unsupported.fetch_add(1, Ordering::Relaxed);
                } else {
                    log::warn!("loader: {e}");
                    self.stats.record_fail(&e.to_string());
                }
                cache.mark_failed(id, category);
                self.emit(LoaderEvent::Failed(id));
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
