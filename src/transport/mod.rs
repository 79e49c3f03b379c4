//! Byte transports between controller and host
//!
//! A transport moves complete SysEx frames. It knows nothing about message
//! contents; encoding lives in [`crate::protocol::codec`].

pub mod loopback;
pub mod midi;

use anyhow::Result;
use bytes::Bytes;
use tokio::sync::mpsc;

pub use loopback::LoopbackTransport;
pub use midi::MidiTransport;

/// Capacity of the inbound frame channel
pub const FRAME_CHANNEL_CAPACITY: usize = 1000;

/// Frame pipe to the host
pub trait Transport {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    /// Send one complete frame
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Take the inbound frame receiver (only once)
    fn take_receiver(&mut self) -> Option<mpsc::Receiver<Bytes>>;

    /// Release the underlying connection
    fn close(&mut self) {}
}
