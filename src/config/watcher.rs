//! Config file hot reload
//!
//! The directory holding the file is watched, not the file: editors that
//! save through a temporary file and a rename replace the watched inode.
//! Bursts of events collapse into one reload once the file has been quiet
//! for [`DEBOUNCE`]. A save that parses to the settings already in force is
//! dropped; one that fails validation keeps them.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::AppConfig;

/// Quiet time after the last file event before reloading
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// A saved configuration that differs from the previous one
#[derive(Debug, Clone)]
pub struct ConfigReload {
    pub config: AppConfig,
    /// Changed sections the controller cannot apply; they wait for a restart
    pub restart_required: Vec<&'static str>,
}

/// Sections outside the sync controller that differ between the running
/// configuration and a reloaded one
pub fn restart_required(running: &AppConfig, reloaded: &AppConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if running.transport != reloaded.transport {
        changed.push("transport");
    }
    if running.simulator() != reloaded.simulator() {
        changed.push("simulator");
    }
    changed
}

/// Watches the config file and yields each changed, valid version
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<ConfigReload>,
}

impl ConfigWatcher {
    /// Load the file once, then start watching its directory
    pub async fn new(config_path: PathBuf) -> Result<(Self, AppConfig)> {
        let initial = load(&config_path)
            .await
            .context("Failed to load initial config")?;

        let file_name = config_path
            .file_name()
            .map(OsString::from)
            .with_context(|| format!("Config path has no file name: {}", config_path.display()))?;
        let dir = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        // notify calls back on its own thread; an unbounded send never blocks it
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if touches(&event, &file_name) => {
                trace!("Config event: {:?}", event.kind);
                let _ = signal_tx.send(());
            }
            Ok(_) => {}
            Err(e) => error!("Watch error: {}", e),
        })?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config directory: {}", dir.display()))?;

        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(reload_loop(config_path.clone(), initial.clone(), signal_rx, tx));

        info!("📝 Config file watcher started for: {}", config_path.display());
        Ok((Self { _watcher: watcher, rx }, initial))
    }

    /// Wait for the next changed config.
    /// Returns None once the watcher has shut down.
    pub async fn next_config(&mut self) -> Option<ConfigReload> {
        self.rx.recv().await
    }
}

async fn load(path: &Path) -> Result<AppConfig> {
    AppConfig::load(&path.to_string_lossy()).await
}

/// Writes, creations and renames that land on the config file itself
fn touches(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name.as_os_str()))
}

async fn reload_loop(
    path: PathBuf,
    running: AppConfig,
    mut signals: mpsc::UnboundedReceiver<()>,
    tx: mpsc::Sender<ConfigReload>,
) {
    let mut current = running.clone();

    while signals.recv().await.is_some() {
        // Trailing edge: every new event restarts the quiet period
        loop {
            match tokio::time::timeout(DEBOUNCE, signals.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        let config = match load(&path).await {
            Ok(config) => config,
            Err(e) => {
                warn!("⚠️  Failed to reload config (keeping old config): {:#}", e);
                continue;
            }
        };
        if config == current {
            debug!("Config file saved without changes");
            continue;
        }

        let reload = ConfigReload {
            restart_required: restart_required(&running, &config),
            config: config.clone(),
        };
        current = config;
        if tx.send(reload).await.is_err() {
            debug!("Config receiver dropped, stopping reloads");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportMode;
    use std::fs;
    use tempfile::TempDir;

    const TUNED: &str = r#"
transport:
  mode: simulated
sync:
  prefetch_threshold: 10
  encoder_step: 0.05
"#;

    async fn watch(content: &str) -> Result<(TempDir, PathBuf, ConfigWatcher)> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("test-config.yaml");
        fs::write(&config_path, content)?;

        let (watcher, config) = ConfigWatcher::new(config_path.clone()).await?;
        assert_eq!(config.transport.mode, TransportMode::Simulated);
        tokio::time::sleep(DEBOUNCE).await;
        Ok((temp_dir, config_path, watcher))
    }

    async fn next(watcher: &mut ConfigWatcher) -> Result<ConfigReload> {
        tokio::time::timeout(Duration::from_secs(2), watcher.next_config())
            .await?
            .context("watcher stopped")
    }

    #[tokio::test]
    async fn test_config_watcher_reloads_tuning() -> Result<()> {
        let (_dir, config_path, mut watcher) =
            watch("transport:\n  mode: simulated\nsync:\n  prefetch_threshold: 4\n").await?;

        fs::write(&config_path, TUNED)?;

        let reload = next(&mut watcher).await?;
        assert_eq!(reload.config.sync.prefetch_threshold, 10);
        assert_eq!(reload.config.sync.encoder_step, 0.05);
        assert!(reload.restart_required.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_unchanged_save_is_dropped() -> Result<()> {
        let original = "transport:\n  mode: simulated\n";
        let (_dir, config_path, mut watcher) = watch(original).await?;

        // Same settings, different text
        fs::write(&config_path, format!("# touched\n{}", original))?;
        tokio::time::sleep(DEBOUNCE * 3).await;
        fs::write(&config_path, TUNED)?;

        let reload = next(&mut watcher).await?;
        assert_eq!(reload.config.sync.prefetch_threshold, 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_rename_over_config_detected() -> Result<()> {
        let (dir, config_path, mut watcher) = watch("transport:\n  mode: simulated\n").await?;

        let staged = dir.path().join(".test-config.yaml.swp");
        fs::write(&staged, TUNED)?;
        fs::rename(&staged, &config_path)?;

        let reload = next(&mut watcher).await?;
        assert_eq!(reload.config.sync.encoder_step, 0.05);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_save_keeps_watching() -> Result<()> {
        let (_dir, config_path, mut watcher) = watch("transport:\n  mode: simulated\n").await?;

        fs::write(&config_path, "sync:\n  parameter_count: 0\n")?;
        tokio::time::sleep(DEBOUNCE * 3).await;
        fs::write(&config_path, TUNED)?;

        let reload = next(&mut watcher).await?;
        assert_eq!(reload.config.sync.prefetch_threshold, 10);
        Ok(())
    }

    #[test]
    fn test_restart_required_names_outer_sections() {
        let running = AppConfig::default();
        let mut reloaded = running.clone();
        reloaded.sync.encoder_step = 0.5;
        assert!(restart_required(&running, &reloaded).is_empty());

        reloaded.transport.input_port = "Other".to_string();
        assert_eq!(restart_required(&running, &reloaded), vec!["transport"]);
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.yaml");
        assert!(ConfigWatcher::new(path).await.is_err());
    }
}
