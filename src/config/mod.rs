//! Configuration management for surface-sync
//!
//! Handles loading, validating, and hot-reloading of the YAML configuration
//! file. Every section is optional; an empty file yields the factory setup.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::fs;

use crate::input::{default_bindings, Binding, ButtonId, InputAction, MACRO_COUNT};
use crate::overlay::OverlayKind;
use crate::sync::SyncSettings;

pub use watcher::{ConfigReload, ConfigWatcher};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub overlays: HashMap<OverlayKind, OverlayConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<InputConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulator: Option<SimulatorConfig>,
}

/// How frames reach the host
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// SysEx over a pair of MIDI ports
    #[default]
    Midi,
    /// In-process host simulator
    Simulated,
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TransportConfig {
    #[serde(default)]
    pub mode: TransportMode,
    /// Substring of the MIDI input port name (case-insensitive)
    #[serde(default = "default_port")]
    pub input_port: String,
    /// Substring of the MIDI output port name (case-insensitive)
    #[serde(default = "default_port")]
    pub output_port: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::default(),
            input_port: default_port(),
            output_port: default_port(),
        }
    }
}

/// Synchronization tunables
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SyncConfig {
    #[serde(default = "default_parameter_count")]
    pub parameter_count: usize,
    #[serde(default = "default_prefetch_threshold")]
    pub prefetch_threshold: usize,
    #[serde(default = "default_encoder_step")]
    pub encoder_step: f32,
    #[serde(default)]
    pub lists: ListCapacities,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            parameter_count: default_parameter_count(),
            prefetch_threshold: default_prefetch_threshold(),
            encoder_step: default_encoder_step(),
            lists: ListCapacities::default(),
        }
    }
}

/// Maximum rows cached per list
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListCapacities {
    #[serde(default = "default_list_capacity")]
    pub devices: usize,
    #[serde(default = "default_list_capacity")]
    pub pages: usize,
    #[serde(default = "default_track_capacity")]
    pub tracks: usize,
}

impl Default for ListCapacities {
    fn default() -> Self {
        Self {
            devices: default_list_capacity(),
            pages: default_list_capacity(),
            tracks: default_track_capacity(),
        }
    }
}

/// Per-overlay overrides
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct OverlayConfig {
    /// Release this button's latch when the overlay closes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latch_button: Option<ButtonId>,
    /// `false` disables latch cleanup for this overlay
    #[serde(default = "default_true")]
    pub latch: bool,
}

/// Input binding configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct InputConfig {
    /// Drop the factory table instead of extending it
    #[serde(default)]
    pub replace_defaults: bool,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

/// Built-in host simulator
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SimulatorConfig {
    #[serde(default = "default_sim_tracks")]
    pub tracks: usize,
    #[serde(default = "default_sim_devices")]
    pub devices_per_track: usize,
    #[serde(default = "default_sim_pages")]
    pub pages_per_device: usize,
    /// Rows per list window
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tracks: default_sim_tracks(),
            devices_per_track: default_sim_devices(),
            pages_per_device: default_sim_pages(),
            window_size: default_window_size(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to load config file: {}", path))?;

        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn parse(content: &str) -> Result<Self> {
        // An empty document deserializes to null
        let config: AppConfig = if content.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(content).context("Failed to parse YAML config")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let sync = &self.sync;
        if sync.parameter_count == 0 || sync.parameter_count > usize::from(MACRO_COUNT) {
            anyhow::bail!(
                "sync.parameter_count must be between 1 and {} (got {})",
                MACRO_COUNT,
                sync.parameter_count
            );
        }
        if !(sync.encoder_step > 0.0 && sync.encoder_step <= 1.0) {
            anyhow::bail!("sync.encoder_step must be in (0, 1] (got {})", sync.encoder_step);
        }
        for (name, capacity) in [
            ("devices", sync.lists.devices),
            ("pages", sync.lists.pages),
            ("tracks", sync.lists.tracks),
        ] {
            // One row for the back entry, at least one for an item
            if capacity < 2 {
                anyhow::bail!("sync.lists.{} must hold at least 2 rows (got {})", name, capacity);
            }
        }

        if self.transport.mode == TransportMode::Midi {
            if self.transport.input_port.trim().is_empty() {
                anyhow::bail!("transport.input_port cannot be empty in midi mode");
            }
            if self.transport.output_port.trim().is_empty() {
                anyhow::bail!("transport.output_port cannot be empty in midi mode");
            }
        }

        let mut latch_owners: HashMap<ButtonId, OverlayKind> = HashMap::new();
        for kind in OverlayKind::ALL {
            if let Some(button) = self.latch_for(kind) {
                if let Some(other) = latch_owners.insert(button, kind) {
                    anyhow::bail!(
                        "Latch button '{}' is used by both {} and {}",
                        button,
                        other,
                        kind
                    );
                }
            }
        }

        if let Some(input) = &self.input {
            if input.replace_defaults && input.bindings.is_empty() {
                anyhow::bail!("input.replace_defaults requires at least one binding");
            }
            let mut seen = HashSet::new();
            for (i, binding) in input.bindings.iter().enumerate() {
                if let InputAction::AdjustParameter { slot }
                | InputAction::TouchParameter { slot, .. } = binding.action
                {
                    if slot >= sync.parameter_count {
                        anyhow::bail!(
                            "Binding #{} targets slot {} but only {} slots exist",
                            i,
                            slot,
                            sync.parameter_count
                        );
                    }
                }
                if !seen.insert((binding.trigger, binding.scope)) {
                    anyhow::bail!(
                        "Binding #{} duplicates trigger {:?} in scope {}",
                        i,
                        binding.trigger,
                        String::from(binding.scope)
                    );
                }
            }
        }

        if let Some(sim) = &self.simulator {
            if sim.window_size == 0 {
                anyhow::bail!("simulator.window_size must be at least 1");
            }
            if sim.tracks == 0 {
                anyhow::bail!("simulator.tracks must be at least 1");
            }
        }

        Ok(())
    }

    /// Latch button released when `kind` closes
    pub fn latch_for(&self, kind: OverlayKind) -> Option<ButtonId> {
        match self.overlays.get(&kind) {
            Some(overlay) if !overlay.latch => None,
            Some(overlay) => overlay.latch_button.or_else(|| kind.default_latch()),
            None => kind.default_latch(),
        }
    }

    /// Tunables for the synchronization core
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            parameter_count: self.sync.parameter_count,
            prefetch_threshold: self.sync.prefetch_threshold,
            encoder_step: self.sync.encoder_step,
            device_capacity: self.sync.lists.devices,
            page_capacity: self.sync.lists.pages,
            track_capacity: self.sync.lists.tracks,
            overlay_latches: OverlayKind::ALL
                .iter()
                .map(|kind| (*kind, self.latch_for(*kind)))
                .collect(),
        }
    }

    /// Effective binding table; configured bindings take precedence over
    /// factory ones with the same trigger and tier
    pub fn bindings(&self) -> Vec<Binding> {
        match &self.input {
            Some(input) if input.replace_defaults => input.bindings.clone(),
            Some(input) => {
                let mut bindings = input.bindings.clone();
                bindings.extend(default_bindings());
                bindings
            }
            None => default_bindings(),
        }
    }

    pub fn simulator(&self) -> SimulatorConfig {
        self.simulator.clone().unwrap_or_default()
    }
}

// Default value functions
fn default_port() -> String { "Surface".to_string() }
fn default_true() -> bool { true }
fn default_parameter_count() -> usize { 8 }
fn default_prefetch_threshold() -> usize { 4 }
fn default_encoder_step() -> f32 { 0.01 }
fn default_list_capacity() -> usize { 64 }
fn default_track_capacity() -> usize { 128 }
fn default_sim_tracks() -> usize { 8 }
fn default_sim_devices() -> usize { 12 }
fn default_sim_pages() -> usize { 6 }
fn default_window_size() -> usize { 16 }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{BindingScope, EncoderId, Trigger};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.transport.mode, TransportMode::Midi);

        let settings = config.sync_settings();
        assert_eq!(settings.parameter_count, 8);
        assert_eq!(settings.prefetch_threshold, 4);
        assert_eq!(settings.track_capacity, 128);
        assert_eq!(
            settings.latch_for(OverlayKind::DeviceSelector),
            Some(ButtonId::LeftCenter)
        );
        assert_eq!(config.bindings(), default_bindings());
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = AppConfig::parse(include_str!("../../config.example.yaml")).unwrap();
        assert_eq!(config.sync_settings(), AppConfig::default().sync_settings());
        assert_eq!(config.bindings().len(), default_bindings().len() + 2);
        assert_eq!(config.simulator(), SimulatorConfig::default());
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
transport:
  mode: simulated
sync:
  prefetch_threshold: 6
  encoder_step: 0.02
  lists:
    tracks: 256
overlays:
  view_selector:
    latch: false
  page_selector:
    latch_button: bottom_right
input:
  bindings:
    - trigger: { edge: turn, encoder: macro_1 }
      scope: view
      action: { type: adjust_parameter, slot: 7 }
simulator:
  tracks: 3
  window_size: 4
"#;
        let config = AppConfig::parse(yaml).unwrap();
        assert_eq!(config.transport.mode, TransportMode::Simulated);
        assert_eq!(config.sync.lists.tracks, 256);
        assert_eq!(config.sync.lists.devices, 64);
        assert_eq!(config.latch_for(OverlayKind::ViewSelector), None);
        assert_eq!(config.latch_for(OverlayKind::PageSelector), Some(ButtonId::BottomRight));

        let sim = config.simulator();
        assert_eq!(sim.tracks, 3);
        assert_eq!(sim.devices_per_track, 12);

        // Configured binding is listed ahead of the factory one it shadows
        let bindings = config.bindings();
        assert_eq!(
            bindings[0].trigger,
            Trigger::Turn {
                encoder: EncoderId::Macro(1)
            }
        );
        assert_eq!(bindings[0].scope, BindingScope::View);
        assert_eq!(bindings.len(), default_bindings().len() + 1);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(AppConfig::parse("sync:\n  parameter_count: 0\n").is_err());
        assert!(AppConfig::parse("sync:\n  parameter_count: 9\n").is_err());
        assert!(AppConfig::parse("sync:\n  encoder_step: 0\n").is_err());
        assert!(AppConfig::parse("sync:\n  lists:\n    pages: 1\n").is_err());
        assert!(AppConfig::parse("transport:\n  input_port: ''\n").is_err());
        assert!(AppConfig::parse("transport:\n  mode: serial\n").is_err());
        // Two overlays cannot share a latch button
        assert!(AppConfig::parse("overlays:\n  page_selector:\n    latch_button: left_center\n").is_err());

        let slot_out_of_range = r#"
sync:
  parameter_count: 4
input:
  bindings:
    - trigger: { edge: turn, encoder: macro_6 }
      scope: view
      action: { type: adjust_parameter, slot: 5 }
"#;
        assert!(AppConfig::parse(slot_out_of_range).is_err());
        assert!(AppConfig::parse("input:\n  replace_defaults: true\n").is_err());
    }

    #[tokio::test]
    async fn test_save_then_load() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("config.yaml");
        let path = path.to_string_lossy().to_string();

        let mut config = AppConfig::default();
        config.sync.prefetch_threshold = 9;
        config.simulator = Some(SimulatorConfig::default());
        config.save(&path).await?;

        let loaded = AppConfig::load(&path).await?;
        assert_eq!(loaded, config);
        Ok(())
    }
}
