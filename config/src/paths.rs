use std::path::PathBuf;
use std::sync::OnceLock;

static DATA_DIR_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

const APP_DIR: &str = "relay";

pub struct PathManager;

impl PathManager {
    /// Set a custom data directory (the server's `--data-dir` flag).
    /// Only the first call wins.
    pub fn set_data_dir(path: PathBuf) {
        let _ = DATA_DIR_OVERRIDE.set(path);
    }

    fn base_data_dir() -> Option<PathBuf> {
        if let Some(d) = DATA_DIR_OVERRIDE.get() {
            return Some(d.clone());
        }
        dirs::data_dir().map(|d| d.join(APP_DIR))
    }

    pub fn data_dir() -> Option<PathBuf> {
        Self::base_data_dir()
    }

    pub fn config_dir() -> Option<PathBuf> {
        if let Some(d) = DATA_DIR_OVERRIDE.get() {
            return Some(d.clone());
        }
        dirs::config_dir().map(|d| d.join(APP_DIR))
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("settings.toml"))
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::data_dir().map(|d| d.join("relay.db"))
    }

    /// Root directory that uploaded attachments are stored under.
    /// Locators like `/uploads/abc.png` resolve relative to this directory's parent.
    pub fn uploads_dir() -> Option<PathBuf> {
        Self::data_dir().map(|d| d.join("public").join("uploads"))
    }

    pub fn logs_dir() -> Option<PathBuf> {
        Self::data_dir().map(|d| d.join("logs"))
    }

    pub fn log_file_path() -> Option<PathBuf> {
        Self::logs_dir().map(|d| d.join("relay.log"))
    }

    pub fn ensure_dirs_exist() -> std::io::Result<()> {
        for dir in [
            Self::data_dir(),
            Self::config_dir(),
            Self::logs_dir(),
            Self::uploads_dir(),
        ]
        .into_iter()
        .flatten()
        {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}
