//! View state broadcast
//!
//! The host wants to know which view is on screen and whether a selector
//! covers it. The pair is compared against the last one sent after every
//! handler, so intermediate states inside one handler never leak out and
//! an unchanged pair is never repeated.

use tracing::debug;

use crate::protocol::ControllerMessage;
use crate::state::Effects;

impl super::SyncController {
    pub(super) fn sync_view_state(&mut self, fx: &mut Effects) {
        if !self.host.connected {
            return;
        }

        let state = (self.view, self.overlays.any_active());
        if self.last_view_state == Some(state) {
            return;
        }

        debug!("📤 View state: {} (overlay active: {})", state.0, state.1);
        self.last_view_state = Some(state);
        fx.send(ControllerMessage::ViewStateChanged {
            view: state.0,
            overlay_active: state.1,
        });
    }
}
