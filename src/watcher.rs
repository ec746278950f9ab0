//! Directory watcher: reports entries appearing in or disappearing from the
//! browsed directory.
//!
//! Spawns a background thread that owns a `notify` watcher. The browsed
//! directory is watched non-recursively; `Browser::navigate` switches it
//! with watch/unwatch commands. Creations and removals are sent back over a
//! channel and applied like drops by `Browser::poll_fs_events`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Events sent from the watcher thread to the main loop.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FsEvent {
    /// A file or directory appeared (created, or renamed into place).
    Created(PathBuf),
    /// A file or directory went away (removed, or renamed away).
    Removed(PathBuf),
}

enum WatchCmd {
    Watch(PathBuf),
    Unwatch(PathBuf),
}

/// Handle to the running watcher. Drop to stop.
pub struct DirWatcher {
    quit: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
    cmd_tx: mpsc::Sender<WatchCmd>,
}

impl DirWatcher {
    /// Start the watcher thread. Nothing is watched until `watch_dir`.
    pub fn start() -> io::Result<(Self, mpsc::Receiver<FsEvent>)> {
        let (tx, rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let quit = Arc::new(AtomicBool::new(false));
        let quit2 = quit.clone();

        let thread = std::thread::Builder::new()
            .name("fs-watcher".into())
            .spawn(move || run_watcher(tx, quit2, cmd_rx))?;

        Ok((
            DirWatcher {
                quit,
                thread: Some(thread),
                cmd_tx,
            },
            rx,
        ))
    }

    pub fn watch_dir(&self, dir: &Path) {
        self.cmd_tx.send(WatchCmd::Watch(dir.to_path_buf())).ok();
    }

    pub fn unwatch_dir(&self, dir: &Path) {
        self.cmd_tx.send(WatchCmd::Unwatch(dir.to_path_buf())).ok();
    }

    pub fn stop(&mut self) {
        self.quit.store(true, Ordering::Release);
        if let Some(t) = self.thread.take() {
            t.join().ok();
        }
    }
}

impl Drop for DirWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_watcher(tx: mpsc::Sender<FsEvent>, quit: Arc<AtomicBool>, cmd_rx: mpsc::Receiver<WatchCmd>) {
    let (ntx, nrx) = mpsc::channel();

    let mut watcher: RecommendedWatcher = match notify::recommended_watcher(move |res| {
        if let Ok(event) = res {
            ntx.send(event).ok();
        }
    }) {
        Ok(w) => w,
        Err(e) => {
            log::warn!("watcher: failed to create: {}", e);
            return;
        }
    };

    while !quit.load(Ordering::Relaxed) {
        while let Ok(cmd) = cmd_rx.try_recv() {
            match cmd {
                WatchCmd::Watch(dir) => match watcher.watch(&dir, RecursiveMode::NonRecursive) {
                    Ok(()) => log::debug!("watcher: +watch {}", dir.display()),
                    Err(e) => log::warn!("watcher: failed to watch {}: {}", dir.display(), e),
                },
                WatchCmd::Unwatch(dir) => match watcher.unwatch(&dir) {
                    Ok(()) => log::debug!("watcher: -watch {}", dir.display()),
                    Err(e) => log::warn!("watcher: failed to unwatch {}: {}", dir.display(), e),
                },
            }
        }

        match nrx.recv_timeout(Duration::from_millis(200)) {
            Ok(event) => {
                for ev in translate(&event) {
                    if tx.send(ev).is_err() {
                        return;
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    log::debug!("watcher: stopped");
}

/// Map a notify event onto creations and removals. Content modifications
/// are ignored: the entry's identity does not change.
fn translate(event: &Event) -> Vec<FsEvent> {
    let make: fn(PathBuf) -> FsEvent = match event.kind {
        EventKind::Create(_) => FsEvent::Created,
        EventKind::Remove(_) => FsEvent::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => FsEvent::Created,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => FsEvent::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // paths = [from, to]
            let mut out = Vec::new();
            if let Some(from) = event.paths.first() {
                out.push(FsEvent::Removed(from.clone()));
            }
            if let Some(to) = event.paths.get(1) {
                out.push(FsEvent::Created(to.clone()));
            }
            return out;
        }
        _ => return Vec::new(),
    };
    event.paths.iter().cloned().map(make).collect()
}
