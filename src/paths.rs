//! Application path management for portable and installed modes.
//!
//! Handles detection and resolution of application paths to support both
//! portable mode (files next to executable) and installed mode (files in
//! the platform data directory).
//!
//! ## Mode Detection
//!
//! - **Portable mode**: If a `.portable` marker file exists next to the
//!   executable, all data files are stored in the same directory.
//! - **Installed mode** (default): Data is stored in the platform data
//!   directory (`%APPDATA%\Lockslot GW` on Windows, `~/.local/share` on
//!   Linux).

use std::path::PathBuf;
use tracing::debug;

/// Application name used for directories in installed mode
const APP_NAME: &str = "Lockslot GW";

/// Application paths for config, state, and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the configuration file
    pub config: PathBuf,
    /// Path to the state directory (slot store file)
    pub state_dir: PathBuf,
    /// Path to the logs directory
    pub logs_dir: PathBuf,
    /// Whether running in portable mode (config next to exe)
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    ///
    /// **Debug mode**: If `config.yaml` exists in the current working
    /// directory (typical when running with `cargo run`), use that directory.
    ///
    /// **Portable mode**: If a `.portable` marker file exists next to the
    /// executable, all data files live beside it. Explicit opt-in so a
    /// non-writable install location never becomes the data directory by
    /// accident.
    ///
    /// **Installed mode** (default): Data is stored in the platform data
    /// directory.
    ///
    /// Note: This is called before logging is initialized, so early
    /// diagnostics go to stderr.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        // In debug builds, a config.yaml in the working directory wins.
        // This enables seamless development with `cargo run`
        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            let cwd_config = cwd.join("config.yaml");
            if cwd_config.exists() {
                eprintln!(
                    "[paths] Running in DEV mode (config.yaml found in cwd: {})",
                    cwd.display()
                );
                return Self {
                    config: cwd_config,
                    state_dir: cwd.join(".state"),
                    logs_dir: cwd.join("logs"),
                    is_portable: true,
                };
            }
        }

        let portable_marker = exe_dir.join(".portable");

        if portable_marker.exists() {
            Self {
                config: exe_dir.join("config.yaml"),
                state_dir: exe_dir.join(".state"),
                logs_dir: exe_dir.join("logs"),
                is_portable: true,
            }
        } else {
            let app_data = dirs::data_dir()
                .unwrap_or_else(|| {
                    eprintln!(
                        "[paths] WARNING: no platform data directory, falling back to exe dir"
                    );
                    exe_dir.clone()
                })
                .join(APP_NAME);

            Self {
                config: app_data.join("config.yaml"),
                state_dir: app_data.join("state"),
                logs_dir: app_data.join("logs"),
                is_portable: false,
            }
        }
    }

    /// Get the base directory (for displaying in logs)
    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        if !self.state_dir.exists() {
            debug!("Creating state directory: {}", self.state_dir.display());
            std::fs::create_dir_all(&self.state_dir)?;
        }

        if !self.logs_dir.exists() {
            debug!("Creating logs directory: {}", self.logs_dir.display());
            std::fs::create_dir_all(&self.logs_dir)?;
        }

        if !self.is_portable {
            if let Some(config_parent) = self.config.parent() {
                if !config_parent.exists() {
                    debug!("Creating config directory: {}", config_parent.display());
                    std::fs::create_dir_all(config_parent)?;
                }
            }
        }

        Ok(())
    }

    /// Full path of the slot store file within the state directory
    ///
    /// An absolute `file_name` replaces the state directory entirely.
    pub fn store_path(&self, file_name: &str) -> PathBuf {
        self.state_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_paths_structure() {
        let paths = AppPaths {
            config: PathBuf::from("test/config.yaml"),
            state_dir: PathBuf::from("test/.state"),
            logs_dir: PathBuf::from("test/logs"),
            is_portable: true,
        };

        assert!(paths.is_portable);
        assert_eq!(paths.config, PathBuf::from("test/config.yaml"));
        assert_eq!(
            paths.store_path("slots.yaml"),
            PathBuf::from("test/.state/slots.yaml")
        );
    }
}
