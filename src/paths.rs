//! Application path resolution
//!
//! The config file is looked up in this order:
//! 1. The path given on the command line
//! 2. `config.yaml` in the working directory
//! 3. `<data dir>/surface-sync/config.yaml` (`%APPDATA%` on Windows,
//!    `~/.local/share` on Linux)
//!
//! Logs go to a `logs` directory next to the config file.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for the per-user data directory
const APP_NAME: &str = "surface-sync";

const CONFIG_FILE: &str = "config.yaml";

/// Resolved locations of the config file and logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config: PathBuf,
    pub logs_dir: PathBuf,
}

impl AppPaths {
    /// Resolve paths. Runs before logging is initialized.
    pub fn detect(config_override: Option<&str>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::resolve(config_override, &cwd, dirs::data_dir())
    }

    fn resolve(config_override: Option<&str>, cwd: &Path, data_dir: Option<PathBuf>) -> Self {
        let config = match config_override {
            Some(path) => PathBuf::from(path),
            None => {
                let local = cwd.join(CONFIG_FILE);
                if local.exists() {
                    local
                } else {
                    data_dir
                        .unwrap_or_else(|| cwd.to_path_buf())
                        .join(APP_NAME)
                        .join(CONFIG_FILE)
                }
            }
        };

        let logs_dir = config
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(cwd)
            .join("logs");

        Self { config, logs_dir }
    }

    /// Create the log directory if needed
    pub fn ensure_logs_dir(&self) -> anyhow::Result<()> {
        if !self.logs_dir.exists() {
            debug!("Creating logs directory: {}", self.logs_dir.display());
            std::fs::create_dir_all(&self.logs_dir).with_context(|| {
                format!("Failed to create logs directory {}", self.logs_dir.display())
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_override_wins() {
        let cwd = TempDir::new().unwrap();
        std::fs::write(cwd.path().join(CONFIG_FILE), "").unwrap();

        let paths = AppPaths::resolve(Some("/etc/custom.yaml"), cwd.path(), None);
        assert_eq!(paths.config, PathBuf::from("/etc/custom.yaml"));
        assert_eq!(paths.logs_dir, PathBuf::from("/etc/logs"));
    }

    #[test]
    fn test_working_directory_then_data_dir() {
        let cwd = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();

        let paths = AppPaths::resolve(None, cwd.path(), Some(data.path().to_path_buf()));
        assert_eq!(paths.config, data.path().join(APP_NAME).join(CONFIG_FILE));

        std::fs::write(cwd.path().join(CONFIG_FILE), "").unwrap();
        let paths = AppPaths::resolve(None, cwd.path(), Some(data.path().to_path_buf()));
        assert_eq!(paths.config, cwd.path().join(CONFIG_FILE));
        assert_eq!(paths.logs_dir, cwd.path().join("logs"));
    }

    #[test]
    fn test_bare_file_name_logs_in_cwd() {
        let cwd = TempDir::new().unwrap();
        let paths = AppPaths::resolve(Some("local.yaml"), cwd.path(), None);
        assert_eq!(paths.logs_dir, cwd.path().join("logs"));
    }
}
