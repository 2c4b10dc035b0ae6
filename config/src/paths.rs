use std::path::PathBuf;
use std::sync::OnceLock;

const APP_DIR: &str = "tikz-studio";

/// Environment variable that relocates data, config and logs
pub const DATA_DIR_VAR: &str = "TIKZ_DATA_DIR";

static DATA_DIR_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

pub struct PathManager;

impl PathManager {
    /// Set a custom data directory, e.g. for portable installs.
    /// Only the first call has any effect.
    pub fn set_data_dir(path: PathBuf) {
        let _ = DATA_DIR_OVERRIDE.set(path);
    }

    /// Apply `TIKZ_DATA_DIR` from the process environment, if set.
    /// Must run before anything asks for a path.
    pub fn init_from_env() -> Option<PathBuf> {
        let dir = Self::override_from(|key| std::env::var(key).ok())?;
        Self::set_data_dir(dir.clone());
        Some(dir)
    }

    fn override_from(env: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
        env(DATA_DIR_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    pub fn data_dir() -> Option<PathBuf> {
        if let Some(d) = DATA_DIR_OVERRIDE.get() {
            return Some(d.clone());
        }
        dirs::data_dir().map(|d| d.join(APP_DIR))
    }

    pub fn config_dir() -> Option<PathBuf> {
        if let Some(d) = DATA_DIR_OVERRIDE.get() {
            return Some(d.clone());
        }
        dirs::config_dir().map(|d| d.join(APP_DIR))
    }

    pub fn logs_dir() -> Option<PathBuf> {
        // On macOS, logs usually go to ~/Library/Logs/
        #[cfg(target_os = "macos")]
        {
            if DATA_DIR_OVERRIDE.get().is_none() {
                if let Some(home) = dirs::home_dir() {
                    return Some(home.join("Library/Logs/TikzStudio"));
                }
            }
        }
        Self::data_dir().map(|d| d.join("logs"))
    }

    pub fn log_file_path() -> Option<PathBuf> {
        Self::logs_dir().map(|d| d.join("tikz-studio.log"))
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("settings.toml"))
    }
}
