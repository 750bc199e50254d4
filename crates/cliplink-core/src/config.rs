use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default CDN prefix identifying clip media addresses.
pub const DEFAULT_CLIP_URL_PREFIX: &str = "https://production.assets.clips.twitchcdn.net";

/// Global configuration loaded from `~/.config/cliplink/config.toml`.
///
/// Missing keys fall back to the defaults below, so a partial file is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliplinkConfig {
    /// Media addresses starting with this prefix are treated as clips.
    pub clip_url_prefix: String,
    /// Selector for candidate media elements.
    pub media_selector: String,
    /// Attribute of the media element holding its address.
    pub media_source_attr: String,
    /// Selector for the title element that becomes the download link.
    pub title_selector: String,
    /// Link text used when the title element is empty.
    pub fallback_title: String,
    /// Seconds to wait for the clip's media element; `0` waits indefinitely.
    pub watch_timeout_secs: Option<u64>,
    /// Seconds to wait for the title element; unset or `0` waits indefinitely.
    pub title_timeout_secs: Option<u64>,
    /// Cancel the previous navigation's pending watch when a new navigation starts.
    pub cancel_superseded: bool,
}

impl Default for CliplinkConfig {
    fn default() -> Self {
        Self {
            clip_url_prefix: DEFAULT_CLIP_URL_PREFIX.to_string(),
            media_selector: "video".to_string(),
            media_source_attr: "src".to_string(),
            title_selector: r#"[data-a-target="stream-title"]"#.to_string(),
            fallback_title: "Untitled Clip".to_string(),
            watch_timeout_secs: Some(180),
            title_timeout_secs: None,
            cancel_superseded: true,
        }
    }
}

impl CliplinkConfig {
    pub fn watch_timeout(&self) -> Option<Duration> {
        secs(self.watch_timeout_secs)
    }

    pub fn title_timeout(&self) -> Option<Duration> {
        secs(self.title_timeout_secs)
    }
}

fn secs(value: Option<u64>) -> Option<Duration> {
    value.filter(|s| *s > 0).map(Duration::from_secs)
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("cliplink")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<CliplinkConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config file: {}", path.display()))?;
    let cfg: CliplinkConfig = toml::from_str(&data)
        .with_context(|| format!("parse config file: {}", path.display()))?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<CliplinkConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = CliplinkConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}
