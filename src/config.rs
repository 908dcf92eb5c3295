use std::env;
use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::OnceCell;

const APP_DIR: &str = "matchbook";
const DB_FILE: &str = "matchbook.sqlite";
const DEFAULT_SNAPSHOT_SECS: u64 = 30;
const DEFAULT_LOG_FILTER: &str = "info";

static SETTINGS: OnceCell<Settings> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub db_path: Option<PathBuf>,
    pub snapshot_interval: Duration,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: app_cache_dir().map(|dir| dir.join(DB_FILE)),
            snapshot_interval: Duration::from_secs(DEFAULT_SNAPSHOT_SECS),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Settings {
    /// Reads `.env.local` and `.env` (if present) and then the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let db_path = lookup("MATCHBOOK_DB")
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| PathBuf::from(raw.trim()))
            .or(defaults.db_path);
        let snapshot_secs = lookup("SNAPSHOT_INTERVAL_SECS")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_SNAPSHOT_SECS)
            .max(1);
        let log_filter = lookup("MATCHBOOK_LOG")
            .filter(|raw| !raw.trim().is_empty())
            .unwrap_or(defaults.log_filter);
        Self {
            db_path,
            snapshot_interval: Duration::from_secs(snapshot_secs),
            log_filter,
        }
    }
}

/// Process-wide settings, read from the environment on first use.
pub fn settings() -> &'static Settings {
    SETTINGS.get_or_init(Settings::from_env)
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(APP_DIR));
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}
