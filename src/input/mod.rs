//! Physical input identifiers, events and latch tracking
//!
//! Buttons and encoders are named after their position on the controller.
//! Events are routed through [`dispatch::InputRouter`], which only lets
//! bindings of the scope that currently owns input fire.

pub mod dispatch;

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use dispatch::{default_bindings, Binding, BindingScope, InputAction, InputRouter, RoutedAction, Trigger};

/// Number of macro encoders/buttons, one per parameter slot
pub const MACRO_COUNT: u8 = 8;

/// Push buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ButtonId {
    LeftTop,
    LeftCenter,
    LeftBottom,
    BottomLeft,
    BottomCenter,
    BottomRight,
    /// Push of the navigation encoder
    Nav,
    /// Push of the option encoder
    Opt,
    /// Macro button 1..=8
    Macro(u8),
}

/// Rotary encoders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EncoderId {
    Nav,
    Opt,
    /// Macro encoder 1..=8
    Macro(u8),
}

fn parse_macro(s: &str) -> Option<u8> {
    let n: u8 = s.strip_prefix("macro_")?.parse().ok()?;
    (1..=MACRO_COUNT).contains(&n).then_some(n)
}

impl ButtonId {
    pub fn name(self) -> String {
        match self {
            ButtonId::LeftTop => "left_top".to_string(),
            ButtonId::LeftCenter => "left_center".to_string(),
            ButtonId::LeftBottom => "left_bottom".to_string(),
            ButtonId::BottomLeft => "bottom_left".to_string(),
            ButtonId::BottomCenter => "bottom_center".to_string(),
            ButtonId::BottomRight => "bottom_right".to_string(),
            ButtonId::Nav => "nav".to_string(),
            ButtonId::Opt => "opt".to_string(),
            ButtonId::Macro(n) => format!("macro_{}", n),
        }
    }
}

impl FromStr for ButtonId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = match s.to_ascii_lowercase().as_str() {
            "left_top" => ButtonId::LeftTop,
            "left_center" => ButtonId::LeftCenter,
            "left_bottom" => ButtonId::LeftBottom,
            "bottom_left" => ButtonId::BottomLeft,
            "bottom_center" => ButtonId::BottomCenter,
            "bottom_right" => ButtonId::BottomRight,
            "nav" => ButtonId::Nav,
            "opt" => ButtonId::Opt,
            other => ButtonId::Macro(
                parse_macro(other).ok_or_else(|| format!("unknown button '{}'", s))?,
            ),
        };
        Ok(id)
    }
}

impl TryFrom<String> for ButtonId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ButtonId> for String {
    fn from(id: ButtonId) -> Self {
        id.name()
    }
}

impl std::fmt::Display for ButtonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl EncoderId {
    pub fn name(self) -> String {
        match self {
            EncoderId::Nav => "nav".to_string(),
            EncoderId::Opt => "opt".to_string(),
            EncoderId::Macro(n) => format!("macro_{}", n),
        }
    }

    /// Encoder driving parameter slot `index`
    pub fn for_parameter(index: usize) -> Option<Self> {
        u8::try_from(index + 1)
            .ok()
            .filter(|n| *n <= MACRO_COUNT)
            .map(EncoderId::Macro)
    }
}

impl FromStr for EncoderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = match s.to_ascii_lowercase().as_str() {
            "nav" => EncoderId::Nav,
            "opt" => EncoderId::Opt,
            other => EncoderId::Macro(
                parse_macro(other).ok_or_else(|| format!("unknown encoder '{}'", s))?,
            ),
        };
        Ok(id)
    }
}

impl TryFrom<String> for EncoderId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EncoderId> for String {
    fn from(id: EncoderId) -> Self {
        id.name()
    }
}

impl std::fmt::Display for EncoderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Raw event from the input source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Press(ButtonId),
    Release(ButtonId),
    /// Encoder turned by a signed number of detents
    Turn(EncoderId, i32),
}

/// Lets overlay cleanup disarm a latched button
pub trait LatchControl {
    /// Disarm `button`; returns whether it was armed
    fn release_latch(&mut self, button: ButtonId) -> bool;
}

/// Latch state of every button
///
/// A latching press arms the button and swallows its next release. Pressing
/// an armed button disarms it.
#[derive(Debug, Clone, Default)]
pub struct ButtonLatches {
    armed: HashSet<ButtonId>,
    swallow_release: HashSet<ButtonId>,
}

impl ButtonLatches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, button: ButtonId) {
        self.armed.insert(button);
        self.swallow_release.insert(button);
    }

    pub fn is_armed(&self, button: ButtonId) -> bool {
        self.armed.contains(&button)
    }

    /// Consume the pending swallow for `button`, if any
    pub fn take_swallowed_release(&mut self, button: ButtonId) -> bool {
        self.swallow_release.remove(&button)
    }

    /// Toggle-off by the user: the next release is delivered normally
    pub fn disarm(&mut self, button: ButtonId) -> bool {
        self.armed.remove(&button)
    }

    pub fn clear(&mut self) {
        self.armed.clear();
        self.swallow_release.clear();
    }
}

impl LatchControl for ButtonLatches {
    fn release_latch(&mut self, button: ButtonId) -> bool {
        self.swallow_release.remove(&button);
        self.armed.remove(&button)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_names_parse_back() {
        let all = [
            ButtonId::LeftTop,
            ButtonId::LeftCenter,
            ButtonId::LeftBottom,
            ButtonId::BottomLeft,
            ButtonId::BottomCenter,
            ButtonId::BottomRight,
            ButtonId::Nav,
            ButtonId::Opt,
            ButtonId::Macro(1),
            ButtonId::Macro(8),
        ];
        for id in all {
            assert_eq!(id.name().parse::<ButtonId>(), Ok(id));
        }
        assert!("macro_0".parse::<ButtonId>().is_err());
        assert!("macro_9".parse::<ButtonId>().is_err());
        assert!("shift".parse::<ButtonId>().is_err());
        assert_eq!("LEFT_TOP".parse::<ButtonId>(), Ok(ButtonId::LeftTop));
    }

    #[test]
    fn test_encoder_for_parameter() {
        assert_eq!(EncoderId::for_parameter(0), Some(EncoderId::Macro(1)));
        assert_eq!(EncoderId::for_parameter(7), Some(EncoderId::Macro(8)));
        assert_eq!(EncoderId::for_parameter(8), None);
        assert_eq!("macro_3".parse::<EncoderId>(), Ok(EncoderId::Macro(3)));
    }

    #[test]
    fn test_latch_release_clears_swallow() {
        let mut latches = ButtonLatches::new();
        latches.arm(ButtonId::LeftCenter);
        assert!(latches.is_armed(ButtonId::LeftCenter));

        assert!(latches.release_latch(ButtonId::LeftCenter));
        assert!(!latches.is_armed(ButtonId::LeftCenter));
        assert!(!latches.take_swallowed_release(ButtonId::LeftCenter));
        assert!(!latches.release_latch(ButtonId::LeftCenter));
    }
}
