//! Settings Persistence System
//!
//! Provides persistent player settings with:
//! - Atomic file writes (temp file + rename)
//! - Tolerant loading (bad values are clamped, unreadable files use defaults)
//! - Advisory locking against concurrent writers
//!
//! Storage location: {config_dir}/subplayer/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::core::player::DEFAULT_PLAYER_NAME;
use crate::core::{CoreError, CoreResult, TimeSec};

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Lock file name (advisory lock to prevent concurrent writers)
pub const SETTINGS_LOCK_FILE: &str = "settings.json.lock";

/// Application directory name under the platform config dir
pub const APP_DIR_NAME: &str = "subplayer";

/// Player settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Explicit path to the player executable
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Executable name looked up when no path is configured
    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    /// Extra arguments passed before the slave-mode flags
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Position poll period while playing (ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Deadline for each query answer (ms)
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Deadline for the player to become ready after spawn (ms)
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,

    /// Time given to `quit` before the player is killed (ms)
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Default rewind/forward amount (seconds)
    #[serde(default = "default_seek_step_sec")]
    pub seek_step_sec: f64,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

fn default_binary_name() -> String {
    DEFAULT_PLAYER_NAME.to_string()
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_query_timeout_ms() -> u64 {
    2_000
}

fn default_startup_timeout_ms() -> u64 {
    5_000
}

fn default_shutdown_grace_ms() -> u64 {
    1_000
}

fn default_seek_step_sec() -> f64 {
    1.0
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            binary_path: None,
            binary_name: default_binary_name(),
            extra_args: Vec::new(),
            poll_interval_ms: default_poll_interval_ms(),
            query_timeout_ms: default_query_timeout_ms(),
            startup_timeout_ms: default_startup_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            seek_step_sec: default_seek_step_sec(),
        }
    }
}

impl PlayerSettings {
    /// Normalizes and clamps settings so persisted state is always valid.
    ///
    /// Corrects bad values instead of failing, so a hand-edited config never
    /// stops the player from starting.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        if self.binary_name.trim().is_empty() {
            self.binary_name = default_binary_name();
        }
        if self
            .binary_path
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            self.binary_path = None;
        }
        self.extra_args.retain(|arg| !arg.trim().is_empty());

        self.poll_interval_ms = self.poll_interval_ms.clamp(20, 2_000);
        self.query_timeout_ms = self.query_timeout_ms.clamp(100, 30_000);
        self.startup_timeout_ms = self.startup_timeout_ms.clamp(500, 60_000);
        self.shutdown_grace_ms = self.shutdown_grace_ms.clamp(100, 10_000);
        self.seek_step_sec = clamp_f64(self.seek_step_sec, 0.04, 600.0);
    }

    /// A normalized copy
    pub fn normalized(&self) -> Self {
        let mut copy = self.clone();
        copy.normalize();
        copy
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn seek_step(&self) -> TimeSec {
        self.seek_step_sec
    }
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

/// Default settings directory: `{config_dir}/subplayer`
pub fn default_settings_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME))
}

/// Settings manager for loading/saving settings
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager with the given settings directory
    pub fn new(settings_dir: impl AsRef<Path>) -> Self {
        Self {
            settings_path: settings_dir.as_ref().join(SETTINGS_FILE),
        }
    }

    /// Create a manager for the platform default directory
    pub fn with_default_dir() -> CoreResult<Self> {
        default_settings_dir()
            .map(Self::new)
            .ok_or_else(|| CoreError::Settings("No configuration directory available".to_string()))
    }

    fn lock_path(&self) -> PathBuf {
        self.settings_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SETTINGS_LOCK_FILE)
    }

    fn with_lock<T>(&self, exclusive: bool, op: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        // Ensure parent directory exists so the lock file can be created.
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CoreError::Settings(format!("Failed to create settings directory: {}", e))
            })?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| CoreError::Settings(format!("Failed to open settings lock file: {}", e)))?;

        if exclusive {
            fs2::FileExt::lock_exclusive(&lock_file).map_err(|e| {
                CoreError::Settings(format!("Failed to lock settings file (exclusive): {}", e))
            })?;
        } else {
            fs2::FileExt::lock_shared(&lock_file).map_err(|e| {
                CoreError::Settings(format!("Failed to lock settings file (shared): {}", e))
            })?;
        }

        let result = op();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock settings lock file: {}", e);
        }

        result
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk, returning defaults if the file is missing or
    /// unreadable
    pub fn load(&self) -> PlayerSettings {
        let result = self.with_lock(false, || {
            if !self.settings_path.exists() {
                info!("Settings file not found, using defaults");
                return Ok(PlayerSettings::default());
            }

            let content = fs::read_to_string(&self.settings_path)?;
            let mut settings = serde_json::from_str::<PlayerSettings>(&content)?;

            if settings.version < SETTINGS_VERSION {
                info!(
                    "Migrating settings from version {} to {}",
                    settings.version, SETTINGS_VERSION
                );
            }
            settings.normalize();
            Ok(settings)
        });

        match result {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                PlayerSettings::default()
            }
        }
    }

    /// Save settings to disk using atomic write (temp file + rename)
    pub fn save(&self, settings: &PlayerSettings) -> CoreResult<PlayerSettings> {
        self.with_lock(true, || {
            let normalized = settings.normalized();
            let content = serde_json::to_string_pretty(&normalized)?;

            // Note: std::fs::rename does not overwrite on Windows.
            let temp_path = self.settings_path.with_extension("json.tmp");
            if temp_path.exists() {
                let _ = fs::remove_file(&temp_path);
            }

            let mut file = fs::File::create(&temp_path).map_err(|e| {
                CoreError::Settings(format!("Failed to create temp settings file: {}", e))
            })?;
            file.write_all(content.as_bytes())
                .map_err(|e| CoreError::Settings(format!("Failed to write settings: {}", e)))?;
            file.sync_all()
                .map_err(|e| CoreError::Settings(format!("Failed to sync settings file: {}", e)))?;
            drop(file);

            if cfg!(windows) && self.settings_path.exists() {
                let backup_path = self.settings_path.with_extension("json.bak");
                if backup_path.exists() {
                    let _ = fs::remove_file(&backup_path);
                }
                fs::rename(&self.settings_path, &backup_path).map_err(|e| {
                    CoreError::Settings(format!("Failed to backup existing settings file: {}", e))
                })?;
                if let Err(e) = fs::rename(&temp_path, &self.settings_path) {
                    // Best-effort restore.
                    let _ = fs::rename(&backup_path, &self.settings_path);
                    return Err(CoreError::Settings(format!(
                        "Failed to finalize settings file: {}",
                        e
                    )));
                }
                let _ = fs::remove_file(&backup_path);
            } else {
                fs::rename(&temp_path, &self.settings_path).map_err(|e| {
                    CoreError::Settings(format!("Failed to finalize settings file: {}", e))
                })?;
            }

            info!("Settings saved to {:?}", self.settings_path);
            Ok(normalized)
        })
    }

    /// Reset settings to defaults and delete the settings file
    pub fn reset(&self) -> CoreResult<PlayerSettings> {
        self.with_lock(true, || {
            if self.settings_path.exists() {
                fs::remove_file(&self.settings_path).map_err(|e| {
                    CoreError::Settings(format!("Failed to delete settings file: {}", e))
                })?;
                info!("Settings file deleted");
            }
            Ok(PlayerSettings::default())
        })
    }
}
