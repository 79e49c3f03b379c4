//! Error types for the synchronization core
//!
//! Nothing in the core is fatal: every `SyncError` means "this message or
//! action was ignored and state is unchanged". Callers log and move on.

use thiserror::Error;

use crate::overlay::OverlayKind;
use crate::state::ListKind;

/// Reasons a host message or local action was rejected without mutation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("parameter index {index} out of range (slots: {count})")]
    ParameterOutOfRange { index: usize, count: usize },

    #[error("{kind} list index {index} out of range (len: {len})")]
    ListIndexOutOfRange { kind: ListKind, index: usize, len: usize },

    #[error("{kind} list is empty")]
    EmptyList { kind: ListKind },

    #[error("{kind} row under the cursor is not loaded")]
    NoSelection { kind: ListKind },

    #[error("children of device {device_index} were not requested")]
    UnexpectedChildren { device_index: usize },

    #[error("batch frame carries {got} entries, expected {expected}")]
    BatchLength { got: usize, expected: usize },

    #[error("overlay {0} is not registered")]
    UnregisteredOverlay(OverlayKind),

    #[error("no overlay owns input")]
    NoActiveOverlay,
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
