use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "typr";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", APP_NAME)
    }

    /// `$HOME/.local/state/typr`, falling back to the platform data dir
    pub fn state_dir() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join(APP_NAME)
        } else {
            Self::project()
                .map(|dirs| dirs.data_local_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        }
    }

    pub fn results_path() -> PathBuf {
        Self::state_dir().join("stats.csv")
    }

    pub fn log_path() -> PathBuf {
        Self::state_dir().join("typr.log")
    }

    pub fn config_path() -> PathBuf {
        Self::project()
            .map(|dirs| dirs.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("typr_config.json"))
    }
}
