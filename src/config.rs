use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::memory::classify::ClassifierConfig;
use crate::options::{GroupBy, SortBy, Units};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub classifier: ClassifierSection,
    pub zram: ZramConfig,
    pub viewport: ViewportSection,
    pub paths: PathsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub loop_secs: f64,
    pub window: bool,
    pub group_by: GroupBy,
    pub sort_by: SortBy,
    pub units: Units,
    pub light: bool,
    pub cpu: bool,
    pub cpu_avg_secs: u64,
    pub fit_to_window: bool,
    pub rise_to_top: bool,
    pub numbers: bool,
    pub top_pct: u32,
    pub cmdlen: usize,
    /// Defaults to 100 when units are KB, else 1000.
    pub min_delta_kb: Option<i64>,
    pub search: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            loop_secs: 5.0,
            window: true,
            group_by: GroupBy::Exe,
            sort_by: SortBy::Mem,
            units: Units::Mebibytes,
            light: true,
            cpu: true,
            cpu_avg_secs: 20,
            fit_to_window: false,
            rise_to_top: true,
            numbers: false,
            top_pct: 100,
            cmdlen: 36,
            min_delta_kb: None,
            search: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    pub guard_kb: u64,
    pub stack_min_kb: u64,
    pub stack_max_kb: u64,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        let defaults = ClassifierConfig::default();
        ClassifierSection {
            guard_kb: defaults.guard_kb,
            stack_min_kb: defaults.stack_min_kb,
            stack_max_kb: defaults.stack_max_kb,
        }
    }
}

impl ClassifierSection {
    pub fn to_classifier(&self) -> ClassifierConfig {
        ClassifierConfig {
            guard_kb: self.guard_kb,
            stack_min_kb: self.stack_min_kb,
            stack_max_kb: self.stack_max_kb,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ZramConfig {
    pub limit_pct: f64,
    /// Compression ratio assumed until there is enough data to measure one.
    pub fallback_ratio: f64,
}

impl Default for ZramConfig {
    fn default() -> Self {
        ZramConfig {
            limit_pct: 80.0,
            fallback_ratio: 3.5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ViewportSection {
    pub head_rows: usize,
    pub body_rows: usize,
    pub key_poll_ms: u64,
    pub render_attempts: u32,
    pub render_backoff_ms: u64,
}

impl Default for ViewportSection {
    fn default() -> Self {
        ViewportSection {
            head_rows: 50,
            body_rows: 1000,
            key_poll_ms: 200,
            render_attempts: 128,
            render_backoff_ms: 160,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub proc_root: PathBuf,
    pub block_root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            proc_root: PathBuf::from("/proc"),
            block_root: PathBuf::from("/sys/class/block"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: Option<PathBuf>,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            file: None,
            level: "warn".to_string(),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pmemstat").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}
