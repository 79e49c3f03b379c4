//! Overlay stack
//!
//! Overlays are modal contexts (selectors) drawn over the current view. At
//! most two can be visible: one stacked on top of another. Whichever is on
//! top owns input (see [`authority`]).
//!
//! Closing an overlay always disarms its latch button first, so a
//! press-to-open button is never left armed once its overlay is gone.

pub mod authority;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::input::{ButtonId, LatchControl};
use crate::state::ListKind;

pub use authority::{AuthorityResolver, ScopeId};

/// Maximum number of simultaneously visible overlays
pub const MAX_DEPTH: usize = 2;

/// Modal contexts known to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    PageSelector,
    DeviceSelector,
    TrackSelector,
    ViewSelector,
}

impl OverlayKind {
    pub const ALL: [OverlayKind; 4] = [
        OverlayKind::PageSelector,
        OverlayKind::DeviceSelector,
        OverlayKind::TrackSelector,
        OverlayKind::ViewSelector,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OverlayKind::PageSelector => "page_selector",
            OverlayKind::DeviceSelector => "device_selector",
            OverlayKind::TrackSelector => "track_selector",
            OverlayKind::ViewSelector => "view_selector",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Input scope owned while this overlay is on top
    pub fn default_scope(self) -> ScopeId {
        match self {
            OverlayKind::PageSelector => ScopeId(1),
            OverlayKind::DeviceSelector => ScopeId(2),
            OverlayKind::TrackSelector => ScopeId(3),
            OverlayKind::ViewSelector => ScopeId(4),
        }
    }

    /// Button that opens this overlay with a latching press
    pub fn default_latch(self) -> Option<ButtonId> {
        match self {
            OverlayKind::PageSelector => Some(ButtonId::LeftBottom),
            OverlayKind::DeviceSelector => Some(ButtonId::LeftCenter),
            OverlayKind::TrackSelector => Some(ButtonId::BottomLeft),
            OverlayKind::ViewSelector => Some(ButtonId::Opt),
        }
    }

    /// Host list browsed by this overlay, if any
    pub fn list(self) -> Option<ListKind> {
        match self {
            OverlayKind::PageSelector => Some(ListKind::Pages),
            OverlayKind::DeviceSelector => Some(ListKind::Devices),
            OverlayKind::TrackSelector => Some(ListKind::Tracks),
            OverlayKind::ViewSelector => None,
        }
    }
}

impl std::fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Registration and visibility of one overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayEntry {
    pub kind: OverlayKind,
    pub visible: bool,
    pub scope: ScopeId,
    pub latch_button: Option<ButtonId>,
}

/// Ordered record of what a stack operation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayTransition {
    Shown(OverlayKind),
    Hidden(OverlayKind),
    LatchReleased { overlay: OverlayKind, button: ButtonId },
}

/// Fixed-depth stack of visible overlays
#[derive(Debug, Clone, Default)]
pub struct OverlayStack {
    entries: Vec<OverlayEntry>,
    /// Bottom first; never deeper than [`MAX_DEPTH`]
    stack: Vec<OverlayKind>,
}

impl OverlayStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stack with every overlay kind registered with its default scope and
    /// the given latch buttons
    pub fn with_latches(latch_for: impl Fn(OverlayKind) -> Option<ButtonId>) -> Self {
        let mut stack = Self::new();
        for kind in OverlayKind::ALL {
            stack.register(kind, kind.default_scope(), latch_for(kind));
        }
        stack
    }

    /// Register an overlay once; later registrations of the same kind are
    /// ignored
    pub fn register(&mut self, kind: OverlayKind, scope: ScopeId, latch_button: Option<ButtonId>) -> bool {
        if self.entry(kind).is_some() {
            warn!("⚠️  Overlay {} already registered, keeping first registration", kind);
            return false;
        }
        self.entries.push(OverlayEntry {
            kind,
            visible: false,
            scope,
            latch_button,
        });
        true
    }

    pub fn entry(&self, kind: OverlayKind) -> Option<&OverlayEntry> {
        self.entries.iter().find(|e| e.kind == kind)
    }

    pub fn entries(&self) -> &[OverlayEntry] {
        &self.entries
    }

    fn entry_mut(&mut self, kind: OverlayKind) -> Option<&mut OverlayEntry> {
        self.entries.iter_mut().find(|e| e.kind == kind)
    }

    /// Overlay on top, owning input
    pub fn current(&self) -> Option<OverlayKind> {
        self.stack.last().copied()
    }

    /// Overlay stacked underneath the current one
    pub fn previous(&self) -> Option<OverlayKind> {
        self.stack.len().checked_sub(2).map(|i| self.stack[i])
    }

    pub fn is_visible(&self, kind: OverlayKind) -> bool {
        self.entry(kind).map(|e| e.visible).unwrap_or(false)
    }

    pub fn any_active(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Show `kind`.
    ///
    /// With `stack`, a different current overlay stays visible underneath.
    /// Without it, or when the stack is already full, everything visible is
    /// hidden first.
    pub fn show(
        &mut self,
        kind: OverlayKind,
        stack: bool,
        latches: &mut dyn LatchControl,
    ) -> SyncResult<Vec<OverlayTransition>> {
        if self.entry(kind).is_none() {
            return Err(SyncError::UnregisteredOverlay(kind));
        }

        let mut transitions = Vec::new();
        if self.current() == Some(kind) {
            return Ok(transitions);
        }

        let stacking = stack && self.current().is_some() && self.stack.len() < MAX_DEPTH;
        if stack && !stacking && self.stack.len() >= MAX_DEPTH {
            debug!("Overlay stack full, {} replaces instead of stacking", kind);
        }

        if !stacking {
            while let Some(top) = self.stack.pop() {
                self.close(top, latches, &mut transitions);
            }
        }

        if let Some(entry) = self.entry_mut(kind) {
            entry.visible = true;
        }
        self.stack.push(kind);
        transitions.push(OverlayTransition::Shown(kind));

        self.check_invariants();
        Ok(transitions)
    }

    /// Close the current overlay, uncovering the one underneath
    pub fn hide(&mut self, latches: &mut dyn LatchControl) -> Vec<OverlayTransition> {
        let mut transitions = Vec::new();
        if let Some(top) = self.stack.pop() {
            self.close(top, latches, &mut transitions);
        }
        self.check_invariants();
        transitions
    }

    /// Close every overlay, visible or not
    pub fn hide_all(&mut self, latches: &mut dyn LatchControl) -> Vec<OverlayTransition> {
        let mut transitions = Vec::new();
        self.stack.clear();
        let kinds: Vec<OverlayKind> = self.entries.iter().map(|e| e.kind).collect();
        for kind in kinds {
            self.close(kind, latches, &mut transitions);
        }
        self.check_invariants();
        transitions
    }

    /// Release the latch, then hide
    fn close(
        &mut self,
        kind: OverlayKind,
        latches: &mut dyn LatchControl,
        transitions: &mut Vec<OverlayTransition>,
    ) {
        let Some(entry) = self.entry_mut(kind) else {
            return;
        };

        if let Some(button) = entry.latch_button {
            if latches.release_latch(button) {
                transitions.push(OverlayTransition::LatchReleased {
                    overlay: kind,
                    button,
                });
            }
        }

        if entry.visible {
            entry.visible = false;
            transitions.push(OverlayTransition::Hidden(kind));
        }
    }

    /// Visible set must equal the stack, with no duplicates
    fn check_invariants(&self) {
        debug_assert!(self.stack.len() <= MAX_DEPTH, "overlay stack too deep: {:?}", self.stack);
        debug_assert!(
            self.stack.len() < 2 || self.stack[0] != self.stack[1],
            "overlay stacked on itself: {:?}",
            self.stack
        );
        debug_assert!(
            self.entries
                .iter()
                .all(|e| e.visible == self.stack.contains(&e.kind)),
            "overlay visibility out of sync with stack {:?}",
            self.stack
        );
    }
}
