//! Application-level configuration loading, including the live tracking tunables.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::engine::{TrackingSettings, UndoPolicy};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "RINKSIDE_CONFIG_PATH";
/// Directory holding the live game snapshot when none is configured.
const DEFAULT_CACHE_DIR: &str = "data";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    tracking: TrackingSettings,
    cache_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        undo_window_ms = app_config.tracking.undo.window.as_millis() as u64,
                        tick_ms = app_config.tracking.tick_interval.as_millis() as u64,
                        "loaded tracking settings from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Engine tunables.
    pub fn tracking(&self) -> TrackingSettings {
        self.tracking
    }

    /// Directory of the live game snapshot; `None` disables the local cache.
    pub fn cache_dir(&self) -> Option<&PathBuf> {
        self.cache_dir.as_ref()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tracking: TrackingSettings::default(),
            cache_dir: Some(PathBuf::from(DEFAULT_CACHE_DIR)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    tracking: RawTracking,
    /// `null` disables the cache, a missing key keeps the default directory.
    #[serde(deserialize_with = "explicit_null")]
    cache_dir: Option<Option<PathBuf>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTracking {
    undo_window_ms: Option<u64>,
    match_tolerance_ms: Option<u64>,
    tick_interval_ms: Option<u64>,
    notification_capacity: Option<usize>,
}

fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<PathBuf>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<PathBuf>::deserialize(deserializer).map(Some)
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = TrackingSettings::default();
        let raw = value.tracking;
        let tracking = TrackingSettings {
            tick_interval: raw
                .tick_interval_ms
                .filter(|ms| *ms > 0)
                .map_or(defaults.tick_interval, Duration::from_millis),
            undo: UndoPolicy {
                window: raw
                    .undo_window_ms
                    .map_or(defaults.undo.window, Duration::from_millis),
                match_tolerance: raw
                    .match_tolerance_ms
                    .map_or(defaults.undo.match_tolerance, Duration::from_millis),
            },
            notification_capacity: raw
                .notification_capacity
                .unwrap_or(defaults.notification_capacity),
        };
        let cache_dir = value
            .cache_dir
            .unwrap_or_else(|| Some(PathBuf::from(DEFAULT_CACHE_DIR)));
        Self {
            tracking,
            cache_dir,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_the_remaining_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"tracking": {"undo_window_ms": 10000}}"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.tracking().undo.window, Duration::from_secs(10));
        assert_eq!(config.tracking().tick_interval, Duration::from_secs(1));
        assert_eq!(config.cache_dir(), Some(&PathBuf::from(DEFAULT_CACHE_DIR)));
    }

    #[test]
    fn a_null_cache_dir_disables_the_cache() {
        let raw: RawConfig = serde_json::from_str(r#"{"cache_dir": null}"#).unwrap();
        assert!(AppConfig::from(raw).cache_dir().is_none());
    }
}
