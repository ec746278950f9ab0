//! User configuration (`config.toml`) and application directories.
//!
//! Every field has a default, so a missing file or a partial one is fine.
//! `FE_CONFIG` points at an explicit file; `FE_DATA_DIR` moves the log
//! directory.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const QUALIFIER: &str = "dev";
const ORGANIZATION: &str = "fe";
const APPLICATION: &str = "fe";

const CONFIG_ENV: &str = "FE_CONFIG";
const DATA_DIR_ENV: &str = "FE_DATA_DIR";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilesConfig {
    pub width: u32,
    pub height: u32,
    pub spacing: u32,
    pub text_padding: u32,
    pub font_size: f32,
}

impl Default for TilesConfig {
    fn default() -> Self {
        TilesConfig {
            width: 120,
            height: 125,
            spacing: 21,
            text_padding: 6,
            font_size: 20.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        ZoomConfig {
            min: 1.0,
            max: 3.0,
            step: 0.25,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub interval_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig { interval_ms: 256 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// ffmpeg binary; looked up on `PATH` when unset.
    pub ffmpeg: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        VideoConfig {
            ffmpeg: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub max_cover_bytes: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig {
            max_cover_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderConfig {
    /// Directory with `placeholder.png`, `dir_placeholder.png` and
    /// `music_placeholder.png` overrides.
    pub dir: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tiles: TilesConfig,
    pub zoom: ZoomConfig,
    pub loader: LoaderConfig,
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub placeholders: PlaceholderConfig,
    pub log: LogConfig,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Config> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Config> {
        match std::fs::read_to_string(path) {
            Ok(s) => Config::from_toml_str(&s).with_context(|| format!("in {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Load from the standard location. Returns the path that was consulted.
    pub fn load() -> Result<(Config, PathBuf)> {
        let path = config_path()?;
        let config = Config::load_from(&path)?;
        Ok((config, path))
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.tiles;
        if t.text_padding >= t.width || t.text_padding >= t.height {
            bail!(
                "tiles: text_padding {} leaves no preview area in {}x{}",
                t.text_padding,
                t.width,
                t.height
            );
        }
        let z = &self.zoom;
        if !(z.min > 0.0 && z.min <= z.max) {
            bail!("zoom: need 0 < min <= max, got {}..{}", z.min, z.max);
        }
        if z.step <= 0.0 {
            bail!("zoom: step must be positive, got {}", z.step);
        }
        if self.loader.interval_ms == 0 {
            bail!("loader: interval_ms must be positive");
        }
        Ok(())
    }

    pub fn loader_interval(&self) -> Duration {
        Duration::from_millis(self.loader.interval_ms)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Directories ─────────────────────────────────────────────────────────

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .ok_or_else(|| anyhow!("unable to determine project directories"))
}

/// An empty value counts as unset.
fn path_from_env(name: &str) -> Option<PathBuf> {
    let value = env::var_os(name)?;
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

pub fn config_path() -> Result<PathBuf> {
    if let Some(p) = path_from_env(CONFIG_ENV) {
        return Ok(p);
    }
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Where log files go.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(p) = path_from_env(DATA_DIR_ENV) {
        return Ok(p);
    }
    Ok(project_dirs()?.data_local_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tile_geometry() {
        let c = Config::default();
        assert_eq!((c.tiles.width, c.tiles.height), (120, 125));
        assert_eq!(c.tiles.spacing, 21);
        assert_eq!(c.tiles.text_padding, 6);
        assert_eq!(c.loader_interval(), Duration::from_millis(256));
        assert_eq!(c.video.timeout_secs, 30);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let c = Config::from_toml_str(
            r#"
            [loader]
            interval_ms = 50

            [video]
            ffmpeg = "/opt/ffmpeg/bin/ffmpeg"
            "#,
        )
        .unwrap();
        assert_eq!(c.loader.interval_ms, 50);
        assert_eq!(c.video.ffmpeg, Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")));
        assert_eq!(c.video.timeout_secs, 30);
        assert_eq!(c.zoom, ZoomConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::from_toml_str("[zoom]\nmin = 3.0\nmax = 1.0\n").is_err());
        assert!(Config::from_toml_str("[zoom]\nstep = 0.0\n").is_err());
        assert!(Config::from_toml_str("[tiles]\ntext_padding = 500\n").is_err());
        assert!(Config::from_toml_str("[loader]\ninterval_ms = 0\n").is_err());
        assert!(Config::from_toml_str("tiles = 5").is_err());
    }

    #[test]
    fn load_from_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let c = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(c, Config::default());
    }

    #[test]
    fn load_from_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tiles\n").unwrap();
        let err = format!("{:#}", Config::load_from(&path).unwrap_err());
        assert!(err.contains("config.toml"), "{err}");
    }

    #[test]
    fn toml_round_trip() {
        let mut c = Config::default();
        c.placeholders.dir = Some("/usr/share/fe/icons".into());
        c.log.level = "debug".into();
        let s = c.to_toml().unwrap();
        assert_eq!(Config::from_toml_str(&s).unwrap(), c);
    }

    #[test]
    fn empty_env_value_is_unset() {
        env::set_var("FE_TEST_EMPTY_PATH", "");
        assert_eq!(path_from_env("FE_TEST_EMPTY_PATH"), None);
        env::set_var("FE_TEST_SOME_PATH", "/tmp/fe.toml");
        assert_eq!(
            path_from_env("FE_TEST_SOME_PATH"),
            Some(PathBuf::from("/tmp/fe.toml"))
        );
    }
}
