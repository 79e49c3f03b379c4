//! Controller-held mirror of host state
//!
//! Lists arrive in windows and are stitched together by [`ListCache`];
//! parameters live in a fixed set of slots reconciled by [`ParameterStore`].
//! The chains of an expandable device are browsed through [`ChildBrowser`].
//! Every mutation is reported as a [`StateEvent`] to read-only observers.

pub mod children;
pub mod events;
pub mod index;
pub mod list_cache;
pub mod parameters;

use serde::{Deserialize, Serialize};

pub use children::{ChildBrowser, ChildSelection};
pub use events::{Effects, ObserverId, StateEvent, StateObservers};
pub use list_cache::{ItemFlags, ListCache, ListEntry, ListItem, ListState, Selection};
pub use parameters::{ParameterKind, ParameterSlot, ParameterStore};

/// The paginated lists mirrored from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Devices,
    Pages,
    Tracks,
}

impl ListKind {
    pub const ALL: [ListKind; 3] = [ListKind::Devices, ListKind::Pages, ListKind::Tracks];
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListKind::Devices => write!(f, "devices"),
            ListKind::Pages => write!(f, "pages"),
            ListKind::Tracks => write!(f, "tracks"),
        }
    }
}
