//! Top-level UI views

use serde::{Deserialize, Serialize};

/// Main screens the controller can show
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewId {
    #[default]
    RemoteControls,
    Mix,
    Clip,
}

impl ViewId {
    pub const ALL: [ViewId; 3] = [ViewId::RemoteControls, ViewId::Mix, ViewId::Clip];

    /// Position in [`ViewId::ALL`]
    pub fn ordinal(self) -> usize {
        match self {
            ViewId::RemoteControls => 0,
            ViewId::Mix => 1,
            ViewId::Clip => 2,
        }
    }

    pub fn from_ordinal(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    /// Next view, wrapping around
    pub fn next(self) -> Self {
        Self::from_ordinal(self.ordinal() + 1)
    }

    /// Previous view, wrapping around
    pub fn previous(self) -> Self {
        Self::from_ordinal(self.ordinal() + Self::ALL.len() - 1)
    }
}

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewId::RemoteControls => write!(f, "remote_controls"),
            ViewId::Mix => write!(f, "mix"),
            ViewId::Clip => write!(f, "clip"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_cycle_wraps() {
        assert_eq!(ViewId::Clip.next(), ViewId::RemoteControls);
        assert_eq!(ViewId::RemoteControls.previous(), ViewId::Clip);
        assert_eq!(ViewId::Mix.next().previous(), ViewId::Mix);
    }
}
