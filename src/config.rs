//! Configuration Module
//!
//! Handles loading and managing disk cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Directory name used under the platform cache root.
const CACHE_DIR_NAME: &str = "url-disk-cache";

/// Shortest accepted maintenance interval in seconds.
const MIN_MAINTENANCE_INTERVAL: u64 = 1;

/// Disk cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Minimum seconds between now and a response's expiration for it to be written to disk
    pub min_cache_interval: u64,
    /// Disk usage target in bytes enforced by eviction sweeps
    pub capacity_bytes: u64,
    /// Directory holding entry files and the persisted index
    pub cache_dir: PathBuf,
    /// Periodic maintenance interval in seconds
    pub maintenance_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `URL_CACHE_DIR` - Cache directory (default: [`Config::default_cache_path`])
    /// - `URL_CACHE_MIN_INTERVAL` - Admission threshold in seconds (default: 300)
    /// - `URL_CACHE_CAPACITY` - Disk capacity in bytes (default: 20 MiB)
    /// - `URL_CACHE_MAINTENANCE_INTERVAL` - Maintenance frequency in seconds (default: 5, min: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_cache_interval: env::var("URL_CACHE_MIN_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_cache_interval),
            capacity_bytes: env::var("URL_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.capacity_bytes),
            cache_dir: env::var_os("URL_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            maintenance_interval: env::var("URL_CACHE_MAINTENANCE_INTERVAL")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(|v| v.max(MIN_MAINTENANCE_INTERVAL))
                .unwrap_or(defaults.maintenance_interval),
        }
    }

    /// Returns a copy of this config pointing at another cache directory.
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// Returns the admission threshold as a Duration.
    pub fn min_cache_duration(&self) -> Duration {
        Duration::from_secs(self.min_cache_interval)
    }

    /// Returns the time between periodic maintenance passes.
    ///
    /// Never shorter than one second, whatever `maintenance_interval` holds.
    pub fn maintenance_period(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval.max(MIN_MAINTENANCE_INTERVAL))
    }

    /// Returns the default cache directory.
    ///
    /// Lives under the user's cache root so it is private to the user and
    /// excluded from backup and sync tools: `$XDG_CACHE_HOME`, then
    /// `$HOME/.cache`, then the OS temp directory.
    pub fn default_cache_path() -> PathBuf {
        let root = env::var_os("XDG_CACHE_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
            .unwrap_or_else(env::temp_dir);
        root.join(CACHE_DIR_NAME)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_cache_interval: 300,
            capacity_bytes: 20 * 1024 * 1024,
            cache_dir: Self::default_cache_path(),
            maintenance_interval: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.min_cache_interval, 300);
        assert_eq!(config.capacity_bytes, 20 * 1024 * 1024);
        assert_eq!(config.maintenance_interval, 5);
        assert!(config.cache_dir.ends_with(CACHE_DIR_NAME));
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("URL_CACHE_MIN_INTERVAL");
        env::remove_var("URL_CACHE_CAPACITY");
        env::remove_var("URL_CACHE_DIR");
        env::remove_var("URL_CACHE_MAINTENANCE_INTERVAL");

        let config = Config::from_env();
        assert_eq!(config.min_cache_interval, 300);
        assert_eq!(config.capacity_bytes, 20 * 1024 * 1024);
        assert_eq!(config.maintenance_interval, 5);
    }

    #[test]
    fn test_with_cache_dir() {
        let config = Config::default().with_cache_dir("/tmp/somewhere");
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/somewhere"));
        assert_eq!(config.min_cache_duration(), Duration::from_secs(300));
    }

    #[test]
    fn test_maintenance_period_never_zero() {
        let mut config = Config::default();
        assert_eq!(config.maintenance_period(), Duration::from_secs(5));

        config.maintenance_interval = 0;
        assert_eq!(config.maintenance_period(), Duration::from_secs(1));
    }
}
