//! Physical control surface abstraction
//!
//! The core never drives hardware directly. It emits [`SurfaceCommand`]s
//! which a [`ControlSurface`] implementation turns into motor moves, LED
//! rings or whatever the hardware offers.

pub mod console;

pub use console::ConsoleSurface;

/// How an encoder should behave for the parameter bound to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderMode {
    /// Free rotation over [0, 1]
    Continuous,
    /// Detented steps, one per discrete value
    Stepped,
    /// Two-state switch
    Toggle,
}

/// Command for the physical controls
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCommand {
    /// Move the control for parameter `index` to `value`
    SetPosition { index: usize, value: f32 },
    /// Reconfigure the encoder for parameter `index`
    ConfigureEncoder {
        index: usize,
        mode: EncoderMode,
        steps: usize,
        origin: f32,
    },
}

/// Sink for surface commands
pub trait ControlSurface {
    fn name(&self) -> &str;

    fn apply(&mut self, command: &SurfaceCommand);

    fn apply_all(&mut self, commands: &[SurfaceCommand]) {
        for command in commands {
            self.apply(command);
        }
    }
}
