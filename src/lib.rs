//! Preview cache and decode pipeline for a tile directory browser.
//!
//! A [`browser::Browser`] owns the directory listing and a background
//! [`loader::PreviewLoader`] that classifies and decodes entries into the
//! shared [`cache::PreviewCache`]. The render side turns cache entries into
//! textures through [`render::TileTextures`].

pub mod audio;
pub mod browser;
pub mod cache;
pub mod cli;
pub mod config;
pub mod control;
pub mod decode;
pub mod error;
pub mod listing;
pub mod loader;
pub mod logging;
pub mod media;
pub mod placeholder;
pub mod render;
pub mod scale;
pub mod video;
pub mod watcher;
