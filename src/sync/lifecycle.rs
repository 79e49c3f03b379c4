//! Host connection lifecycle

use tracing::{debug, info, warn};

use crate::protocol::ControllerMessage;
use crate::state::{Effects, ListKind, StateEvent};

use super::{DeviceInfo, TrackInfo};

impl super::SyncController {
    /// Ask the host to announce itself. Call once the transport is up.
    pub fn start(&mut self) {
        let mut fx = Effects::new();
        info!("🔌 Requesting host status");
        fx.send(ControllerMessage::RequestHostStatus);
        self.finish(fx);
    }

    pub(super) fn on_host_initialized(&mut self, is_active: bool, fx: &mut Effects) {
        if self.host.connected && self.host.active == is_active {
            debug!("Duplicate host initialization ignored");
            return;
        }

        let was_connected = self.host.connected;
        let was_active = self.host.active;
        self.host.connected = true;
        self.host.active = is_active;

        if !was_connected {
            info!("✅ Host connected (active: {})", is_active);
            // The host learns the current view on the next broadcast
            self.last_view_state = None;
            fx.event(StateEvent::HostConnection { connected: true });
        } else {
            info!("🔄 Host activity changed: {}", is_active);
        }

        if is_active && !was_active {
            for kind in ListKind::ALL {
                let offset = self.cache_mut(kind).begin_refresh();
                self.request_window(kind, offset, fx);
                fx.event(StateEvent::ListChanged { kind });
            }
        }
    }

    pub(super) fn on_host_deactivated(&mut self, fx: &mut Effects) {
        if !self.host.connected {
            debug!("Host deactivation while disconnected ignored");
            return;
        }

        warn!("🔌 Host disconnected, clearing synchronized state");
        self.host = Default::default();
        self.device = DeviceInfo::default();
        self.track = TrackInfo::default();
        self.last_view_state = None;

        for kind in ListKind::ALL {
            self.cache_mut(kind).reset();
            fx.event(StateEvent::ListChanged { kind });
        }
        self.close_children(fx);
        self.children.close();
        self.params.reset(fx);
        self.hide_all_overlays(fx);
        fx.event(StateEvent::HostConnection { connected: false });
    }

    /// Close every overlay, releasing their latches
    pub(super) fn hide_all_overlays(&mut self, fx: &mut Effects) {
        let transitions = self.overlays.hide_all(self.input.latches_mut());
        self.record_transitions(&transitions, fx);
    }
}
