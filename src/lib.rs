//! surface-sync
//!
//! Controller-side state synchronization for a DAW control surface. The
//! [`sync::SyncController`] mirrors the host's lists and parameters, arbitrates
//! input between selector overlays and the active view, and emits both wire
//! messages for the host and commands for the physical controls.

pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod overlay;
pub mod paths;
pub mod protocol;
pub mod sim;
pub mod state;
pub mod surface;
pub mod sync;
pub mod transport;
pub mod view;
