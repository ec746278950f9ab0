//! CLI subcommand implementations.
//!
//! `preview` drives the whole pipeline headlessly: it opens a browser on a
//! directory and runs a frame loop against the CPU texture backend until
//! every tile is settled, then reports what each tile shows.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::browser::Browser;
use crate::config::Config;
use crate::decode::{MediaDecoder, PixelFormat};
use crate::media::{self, Category};
use crate::render::{CountingBackend, TileTextures};

const FRAME: Duration = Duration::from_millis(16);

pub struct PreviewOptions {
    pub dir: PathBuf,
    pub scale: Option<f32>,
    pub out: Option<PathBuf>,
    /// Give up waiting after this long and report what is there.
    pub deadline: Duration,
    /// Keep watching the directory this long after the first settle.
    pub follow: Duration,
}

#[derive(Debug, Serialize)]
pub struct TileReport {
    pub name: String,
    pub category: Option<Category>,
    pub width: u32,
    pub height: u32,
    /// Placeholder kind if the tile shows one.
    pub placeholder: Option<&'static str>,
    pub generation: u64,
}

#[derive(Debug, Serialize)]
pub struct PreviewReport {
    pub dir: PathBuf,
    pub scale: f32,
    pub tile_box: (u32, u32),
    pub tiles: Vec<TileReport>,
    pub published: u64,
    pub failed: u64,
    pub uploads: usize,
    pub timed_out: bool,
}

/// One simulated frame: drop stale textures, then touch every tile.
fn draw_frame(browser: &Browser, textures: &mut TileTextures<CountingBackend>) {
    textures.begin_frame(browser.cache());
    for entry in browser.entries() {
        textures.texture_for(browser.cache(), entry.id);
    }
}

fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}

pub fn run_preview(config: Config, opts: &PreviewOptions) -> Result<PreviewReport> {
    use std::sync::atomic::Ordering;

    let decoder = Arc::new(MediaDecoder::from_config(&config));
    let mut browser = Browser::open(&opts.dir, config, decoder, None)
        .with_context(|| format!("opening {}", opts.dir.display()))?;
    if let Some(scale) = opts.scale {
        browser.set_scale(scale);
    }

    if !opts.follow.is_zero() {
        browser.watch().context("starting directory watcher")?;
    }

    let mut textures = TileTextures::new(CountingBackend::default());
    let start = Instant::now();
    let mut settled_at: Option<Instant> = None;
    let mut timed_out = false;

    loop {
        let changed = browser.poll_fs_events();
        if changed > 0 {
            log::info!("preview: {} entries changed on disk", changed);
        }

        draw_frame(&browser, &mut textures);

        if browser.is_settled() {
            let at = *settled_at.get_or_insert_with(Instant::now);
            if at.elapsed() >= opts.follow {
                break;
            }
        }
        if start.elapsed() >= opts.deadline {
            log::warn!(
                "preview: gave up after {}s, some tiles still pending",
                opts.deadline.as_secs()
            );
            timed_out = true;
            break;
        }
        thread::sleep(FRAME);
    }

    browser.shutdown();
    draw_frame(&browser, &mut textures);

    if let Some(out) = &opts.out {
        std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    }

    let mut tiles = Vec::new();
    for entry in browser.entries() {
        let Some(c) = browser.cache().get(entry.id) else {
            continue;
        };
        if let (Some(out), None) = (&opts.out, c.placeholder) {
            let path = out.join(format!("{}.png", safe_file_name(&entry.name)));
            let color = match c.scaled.format {
                PixelFormat::Rgb => image::ColorType::Rgb8,
                PixelFormat::Rgba => image::ColorType::Rgba8,
            };
            image::save_buffer(&path, &c.scaled.pixels, c.scaled.width, c.scaled.height, color)
                .with_context(|| format!("writing {}", path.display()))?;
        }
        tiles.push(TileReport {
            name: entry.name.clone(),
            category: c.category,
            width: c.scaled.width,
            height: c.scaled.height,
            placeholder: c.placeholder.map(|k| k.name()),
            generation: c.generation,
        });
    }

    let tile_box = browser.layout().tile_box();
    Ok(PreviewReport {
        dir: browser.dir(),
        scale: browser.scale(),
        tile_box: (tile_box.width, tile_box.height),
        tiles,
        published: browser.stats().done.load(Ordering::Relaxed),
        failed: browser.stats().failed.load(Ordering::Relaxed),
        uploads: textures.backend().uploads(),
        timed_out,
    })
}

pub fn print_report(report: &PreviewReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{} (scale {:.2}, preview box {}x{})",
        report.dir.display(),
        report.scale,
        report.tile_box.0,
        report.tile_box.1
    );
    for t in &report.tiles {
        let category = t.category.map(|c| c.name()).unwrap_or("pending");
        let shown = match t.placeholder {
            Some(kind) => format!("[{} placeholder]", kind),
            None => format!("{}x{}", t.width, t.height),
        };
        println!("  {:<12} {:<24} {}", category, shown, t.name);
    }
    println!(
        "{} previews, {} failed, {} texture uploads{}",
        report.published,
        report.failed,
        report.uploads,
        if report.timed_out { " (timed out)" } else { "" }
    );
    Ok(())
}

pub fn preview(config: Config, opts: &PreviewOptions, json: bool) -> Result<()> {
    let report = run_preview(config, opts)?;
    print_report(&report, json)
}

#[derive(Debug, Serialize)]
pub struct Classified {
    pub path: PathBuf,
    pub category: Category,
}

pub fn classify_paths(paths: &[PathBuf]) -> Vec<Classified> {
    paths
        .iter()
        .map(|p| Classified {
            path: p.clone(),
            category: media::classify(p),
        })
        .collect()
}

pub fn classify(paths: &[PathBuf], json: bool) -> Result<()> {
    let results = classify_paths(paths);
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for r in &results {
            println!("{:<12} {}", r.category.name(), r.path.display());
        }
    }
    Ok(())
}

pub fn show_config(config: &Config, path: &Path) -> Result<()> {
    println!("# {}", path.display());
    print!("{}", config.to_toml()?);
    Ok(())
}
