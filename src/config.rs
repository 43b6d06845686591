use crate::app_dirs::AppDirs;
use crate::overlay::{OverlayStyle, DEFAULT_LINE_WIDTH};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub number_of_secs: u64,
    pub number_of_words: usize,
    pub line_width: usize,
    pub overlay: OverlayStyle,
    pub tick_rate_ms: u64,
    pub allow_backspace: bool,
    /// Two-column `word,weight` CSV; the built-in table is used when unset
    pub word_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            number_of_secs: 60,
            number_of_words: 300,
            line_width: DEFAULT_LINE_WIDTH,
            overlay: OverlayStyle::Stream,
            tick_rate_ms: 100,
            allow_backspace: true,
            word_file: None,
        }
    }
}

impl Config {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.number_of_secs)
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(1))
    }

    /// Replaces settings that would make an empty or instant test with their
    /// defaults
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.number_of_secs == 0 {
            log::warn!("number_of_secs must be positive, using {}", defaults.number_of_secs);
            self.number_of_secs = defaults.number_of_secs;
        }
        if self.number_of_words == 0 {
            log::warn!("number_of_words must be positive, using {}", defaults.number_of_words);
            self.number_of_words = defaults.number_of_words;
        }
        if self.line_width == 0 {
            log::warn!("line_width must be positive, using {}", defaults.line_width);
            self.line_width = defaults.line_width;
        }
        self
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    /// Missing or unreadable config falls back to defaults
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg.validated(),
            Err(err) => {
                log::warn!(
                    "ignoring unreadable config {}: {}",
                    self.path.display(),
                    err
                );
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
