//! Input authority
//!
//! Decides which bindings may fire given the overlay currently on top.

use serde::{Deserialize, Serialize};

use super::OverlayStack;
use crate::input::BindingScope;

/// Identifier of an input scope owned by an overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(pub u16);

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Read-only view of the overlay stack for input dispatch
#[derive(Debug, Clone, Copy)]
pub struct AuthorityResolver<'a> {
    overlays: &'a OverlayStack,
}

impl<'a> AuthorityResolver<'a> {
    pub fn new(overlays: &'a OverlayStack) -> Self {
        Self { overlays }
    }

    /// Scope of the overlay on top, or `None` when the view owns input
    pub fn current_scope(&self) -> Option<ScopeId> {
        self.overlays
            .current()
            .and_then(|kind| self.overlays.entry(kind))
            .map(|entry| entry.scope)
    }

    /// Priority of a binding scope right now (lower wins), or `None` when
    /// bindings of that scope are suppressed
    pub fn priority(&self, scope: BindingScope) -> Option<u8> {
        let current = self.current_scope();
        match scope {
            BindingScope::Scope(id) if current == Some(id) => Some(0),
            BindingScope::Scope(_) => None,
            BindingScope::View if current.is_none() => Some(1),
            BindingScope::View => None,
            BindingScope::Global => Some(2),
        }
    }

    pub fn permits(&self, scope: BindingScope) -> bool {
        self.priority(scope).is_some()
    }
}
