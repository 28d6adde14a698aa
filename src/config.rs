use anyhow::Context;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::theme::parse_color;

pub const APP_DIR_NAME: &str = "now-playing";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Frame counts above this would hold hundreds of megabytes of encoded PNGs.
pub const MAX_VINYL_FRAMES: usize = 360;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub ui: UiConfig,
    pub artwork: ArtworkConfig,
    pub text: TextConfig,
    pub timing: TimingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ui: UiConfig::default(),
            artwork: ArtworkConfig::default(),
            text: TextConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Manual,
    Auto,
}

impl ColorMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "manual" => Some(Self::Manual),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiConfig {
    pub color: String,
    pub color_mode: ColorMode,
    pub max_width: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            color: "2".to_string(),
            color_mode: ColorMode::Auto,
            max_width: 45,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtworkConfig {
    pub enabled: bool,
    pub padding: usize,
    pub width_pixels: u32,
    pub width_columns: u32,
    pub vinyl_mode: bool,
    pub vinyl_rpm: f64,
    pub vinyl_frames: usize,
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            padding: 16,
            width_pixels: 300,
            width_columns: 14,
            vinyl_mode: false,
            vinyl_rpm: 10.0,
            vinyl_frames: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextConfig {
    pub max_length_with_art: usize,
    pub max_length_no_art: usize,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            max_length_with_art: 22,
            max_length_no_art: 36,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimingConfig {
    pub ui_refresh_ms: u64,
    pub data_fetch_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            ui_refresh_ms: 100,
            data_fetch_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn ui_refresh(&self) -> Duration {
        Duration::from_millis(self.ui_refresh_ms)
    }

    pub fn data_fetch(&self) -> Duration {
        Duration::from_millis(self.data_fetch_ms)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ConfigIssue {
    pub field: &'static str,
    pub message: String,
}

impl ConfigIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub color: Option<String>,
    pub no_artwork: bool,
    pub vinyl: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(color) = &self.color {
            config.ui.color = color.clone();
        }
        if self.no_artwork {
            config.artwork.enabled = false;
        }
        if self.vinyl {
            config.artwork.vinyl_mode = true;
        }
    }
}

impl Config {
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        let mut candidates = Vec::new();

        if let Some(dir) = xdg_config_dir() {
            candidates.push(dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME));
        }

        if let Ok(current_dir) = env::current_dir() {
            candidates.push(current_dir.join(CONFIG_FILE_NAME));
            candidates.push(current_dir.join("config").join(CONFIG_FILE_NAME));
        }

        if let Ok(exe) = env::current_exe() {
            if let Some(dir) = exe.parent() {
                candidates.push(dir.join(CONFIG_FILE_NAME));
            }
        }

        candidates.into_iter().find(|path| path.exists())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<(Self, Vec<ConfigIssue>)> {
        if !path.exists() {
            return Ok((Config::default(), Vec::new()));
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse_str(&data).with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn parse_str(data: &str) -> anyhow::Result<(Self, Vec<ConfigIssue>)> {
        let doc: ConfigDocument = toml::from_str(data)?;
        Ok(resolve_document(doc))
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.ui.max_width < 20 {
            issues.push(ConfigIssue::new(
                "ui.max_width",
                format!("must be >= 20 (got {})", self.ui.max_width),
            ));
        }
        if parse_color(&self.ui.color).is_err() {
            issues.push(ConfigIssue::new(
                "ui.color",
                format!(
                    "must be valid ANSI code (0-255) or hex color (#RRGGBB) (got '{}')",
                    self.ui.color
                ),
            ));
        }
        if self.artwork.padding >= self.ui.max_width {
            issues.push(ConfigIssue::new(
                "artwork.padding",
                format!(
                    "must be < ui.max_width ({} >= {})",
                    self.artwork.padding, self.ui.max_width
                ),
            ));
        }
        if !(1..=10_000).contains(&self.artwork.width_pixels) {
            issues.push(ConfigIssue::new(
                "artwork.width_pixels",
                format!("must be > 0 and <= 10000 (got {})", self.artwork.width_pixels),
            ));
        }
        if !(1..=100).contains(&self.artwork.width_columns) {
            issues.push(ConfigIssue::new(
                "artwork.width_columns",
                format!("must be > 0 and <= 100 (got {})", self.artwork.width_columns),
            ));
        }
        if !(self.artwork.vinyl_rpm > 0.0 && self.artwork.vinyl_rpm <= 1000.0) {
            issues.push(ConfigIssue::new(
                "artwork.vinyl_rpm",
                format!("must be > 0 and <= 1000 (got {:.2})", self.artwork.vinyl_rpm),
            ));
        }
        if !(1..=MAX_VINYL_FRAMES).contains(&self.artwork.vinyl_frames) {
            issues.push(ConfigIssue::new(
                "artwork.vinyl_frames",
                format!(
                    "must be > 0 and <= {MAX_VINYL_FRAMES} (got {})",
                    self.artwork.vinyl_frames
                ),
            ));
        }
        if !(1..=200).contains(&self.text.max_length_with_art) {
            issues.push(ConfigIssue::new(
                "text.max_length_with_art",
                format!("must be > 0 and <= 200 (got {})", self.text.max_length_with_art),
            ));
        }
        if !(1..=200).contains(&self.text.max_length_no_art) {
            issues.push(ConfigIssue::new(
                "text.max_length_no_art",
                format!("must be > 0 and <= 200 (got {})", self.text.max_length_no_art),
            ));
        }
        if !(10..=5_000).contains(&self.timing.ui_refresh_ms) {
            issues.push(ConfigIssue::new(
                "timing.ui_refresh_ms",
                format!("must be >= 10 and <= 5000 (got {})", self.timing.ui_refresh_ms),
            ));
        }
        if !(100..=60_000).contains(&self.timing.data_fetch_ms) {
            issues.push(ConfigIssue::new(
                "timing.data_fetch_ms",
                format!("must be >= 100 and <= 60000 (got {})", self.timing.data_fetch_ms),
            ));
        }
        issues
    }

    pub fn repair(&mut self, issues: &[ConfigIssue]) {
        let defaults = Config::default();
        for issue in issues {
            match issue.field {
                "ui.max_width" => self.ui.max_width = defaults.ui.max_width,
                "ui.color_mode" => self.ui.color_mode = defaults.ui.color_mode,
                "ui.color" => self.ui.color = defaults.ui.color.clone(),
                "artwork.padding" => self.artwork.padding = defaults.artwork.padding,
                "artwork.width_pixels" => self.artwork.width_pixels = defaults.artwork.width_pixels,
                "artwork.width_columns" => {
                    self.artwork.width_columns = defaults.artwork.width_columns
                }
                "artwork.vinyl_rpm" => self.artwork.vinyl_rpm = defaults.artwork.vinyl_rpm,
                "artwork.vinyl_frames" => self.artwork.vinyl_frames = defaults.artwork.vinyl_frames,
                "text.max_length_with_art" => {
                    self.text.max_length_with_art = defaults.text.max_length_with_art
                }
                "text.max_length_no_art" => {
                    self.text.max_length_no_art = defaults.text.max_length_no_art
                }
                "timing.ui_refresh_ms" => self.timing.ui_refresh_ms = defaults.timing.ui_refresh_ms,
                "timing.data_fetch_ms" => self.timing.data_fetch_ms = defaults.timing.data_fetch_ms,
                _ => {}
            }
        }
        // A default padding can still collide with a narrow valid width.
        if self.artwork.padding >= self.ui.max_width {
            self.artwork.padding = self.ui.max_width / 2;
        }
    }

    pub fn text_width(&self, artwork_shown: bool) -> usize {
        if artwork_shown {
            self.text.max_length_with_art
        } else {
            self.text.max_length_no_art
        }
    }
}

fn xdg_config_dir() -> Option<PathBuf> {
    match env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".config")),
    }
}

fn resolve_document(doc: ConfigDocument) -> (Config, Vec<ConfigIssue>) {
    let defaults = Config::default();
    let mut issues = Vec::new();

    let color_mode = match doc.ui.color_mode.as_deref() {
        None => defaults.ui.color_mode,
        Some(raw) => ColorMode::parse(raw).unwrap_or_else(|| {
            issues.push(ConfigIssue::new(
                "ui.color_mode",
                format!("must be 'manual' or 'auto' (got '{raw}')"),
            ));
            defaults.ui.color_mode
        }),
    };

    let mut config = Config {
        ui: UiConfig {
            color: doc.ui.color.unwrap_or(defaults.ui.color.clone()),
            color_mode,
            max_width: non_negative(doc.ui.max_width, defaults.ui.max_width as i64),
        },
        artwork: ArtworkConfig {
            enabled: doc.artwork.enabled.unwrap_or(defaults.artwork.enabled),
            padding: 0,
            width_pixels: non_negative(
                doc.artwork.width_pixels,
                defaults.artwork.width_pixels as i64,
            ),
            width_columns: non_negative(
                doc.artwork.width_columns,
                defaults.artwork.width_columns as i64,
            ),
            vinyl_mode: doc.artwork.vinyl_mode.unwrap_or(defaults.artwork.vinyl_mode),
            vinyl_rpm: doc.artwork.vinyl_rpm.unwrap_or(defaults.artwork.vinyl_rpm),
            vinyl_frames: non_negative(
                doc.artwork.vinyl_frames,
                defaults.artwork.vinyl_frames as i64,
            ),
        },
        text: TextConfig {
            max_length_with_art: non_negative(
                doc.text.max_length_with_art,
                defaults.text.max_length_with_art as i64,
            ),
            max_length_no_art: non_negative(
                doc.text.max_length_no_art,
                defaults.text.max_length_no_art as i64,
            ),
        },
        timing: TimingConfig {
            ui_refresh_ms: non_negative(doc.timing.ui_refresh_ms, defaults.timing.ui_refresh_ms as i64),
            data_fetch_ms: non_negative(doc.timing.data_fetch_ms, defaults.timing.data_fetch_ms as i64),
        },
    };

    let padding = doc.artwork.padding.unwrap_or(defaults.artwork.padding as i64);
    if padding < 0 {
        issues.push(ConfigIssue::new(
            "artwork.padding",
            format!("must be >= 0 (got {padding})"),
        ));
        config.artwork.padding = defaults.artwork.padding;
    } else {
        config.artwork.padding = padding as usize;
    }

    let late: Vec<_> = config
        .validate()
        .into_iter()
        .filter(|issue| issues.iter().all(|seen| seen.field != issue.field))
        .collect();
    issues.extend(late);
    config.repair(&issues);
    (config, issues)
}

fn non_negative<T: TryFrom<i64> + Default>(value: Option<i64>, default: i64) -> T {
    T::try_from(value.unwrap_or(default).max(0)).unwrap_or_default()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    ui: UiSection,
    #[serde(default)]
    artwork: ArtworkSection,
    #[serde(default)]
    text: TextSection,
    #[serde(default)]
    timing: TimingSection,
}

#[derive(Debug, Default, Deserialize)]
struct UiSection {
    color: Option<String>,
    color_mode: Option<String>,
    max_width: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ArtworkSection {
    enabled: Option<bool>,
    padding: Option<i64>,
    width_pixels: Option<i64>,
    width_columns: Option<i64>,
    vinyl_mode: Option<bool>,
    vinyl_rpm: Option<f64>,
    vinyl_frames: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct TextSection {
    max_length_with_art: Option<i64>,
    max_length_no_art: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct TimingSection {
    ui_refresh_ms: Option<i64>,
    data_fetch_ms: Option<i64>,
}
