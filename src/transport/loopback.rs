//! In-process transport pair

use anyhow::{anyhow, Result};
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::trace;

use super::{Transport, FRAME_CHANNEL_CAPACITY};

/// One end of an in-memory frame link
pub struct LoopbackTransport {
    name: String,
    tx: mpsc::Sender<Bytes>,
    rx: Option<mpsc::Receiver<Bytes>>,
}

impl LoopbackTransport {
    /// Two connected ends: frames sent on one arrive on the other
    pub fn pair(a: &str, b: &str) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (b_tx, a_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        (
            Self {
                name: a.to_string(),
                tx: a_tx,
                rx: Some(a_rx),
            },
            Self {
                name: b.to_string(),
                tx: b_tx,
                rx: Some(b_rx),
            },
        )
    }
}

impl Transport for LoopbackTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        trace!("{} → {}", self.name, hex::encode_upper(frame));
        self.tx
            .try_send(Bytes::copy_from_slice(frame))
            .map_err(|e| anyhow!("{}: failed to queue frame: {}", self.name, e))
    }

    fn take_receiver(&mut self) -> Option<mpsc::Receiver<Bytes>> {
        self.rx.take()
    }
}
