//! Console surface - logs every hardware command for testing and debugging

use tracing::{debug, info};

use super::{ControlSurface, EncoderMode, SurfaceCommand};

/// ControlSurface that logs instead of moving hardware
///
/// Useful for running against a simulated host or checking what the core
/// would do to the controls without a device attached.
pub struct ConsoleSurface {
    name: String,
    /// Last position sent per parameter, for change-only logging
    positions: Vec<Option<f32>>,
    /// Command counter for debugging
    command_count: u64,
}

impl ConsoleSurface {
    pub fn new(name: impl Into<String>, parameter_count: usize) -> Self {
        Self {
            name: name.into(),
            positions: vec![None; parameter_count],
            command_count: 0,
        }
    }

    pub fn command_count(&self) -> u64 {
        self.command_count
    }

    pub fn position(&self, index: usize) -> Option<f32> {
        self.positions.get(index).copied().flatten()
    }
}

impl ControlSurface for ConsoleSurface {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&mut self, command: &SurfaceCommand) {
        self.command_count += 1;
        let stamp = chrono::Local::now().format("%H:%M:%S%.3f");

        match command {
            SurfaceCommand::SetPosition { index, value } => {
                if let Some(slot) = self.positions.get_mut(*index) {
                    if *slot == Some(*value) {
                        debug!("Surface '{}' position {} unchanged", self.name, index);
                        return;
                    }
                    *slot = Some(*value);
                }
                info!(
                    "🎚️  [{}] Surface '{}' → encoder {} = {:.3} [cmd #{}]",
                    stamp, self.name, index, value, self.command_count
                );
            }
            SurfaceCommand::ConfigureEncoder {
                index,
                mode,
                steps,
                origin,
            } => {
                let mode = match mode {
                    EncoderMode::Continuous => "continuous".to_string(),
                    EncoderMode::Stepped => format!("stepped x{}", steps),
                    EncoderMode::Toggle => "toggle".to_string(),
                };
                info!(
                    "🎛️  [{}] Surface '{}' → encoder {} configured {} (origin {:.2}) [cmd #{}]",
                    stamp, self.name, index, mode, origin, self.command_count
                );
            }
        }
    }
}
