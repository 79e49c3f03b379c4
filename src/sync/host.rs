//! Inbound host message handling

use tracing::{debug, info, trace, warn};

use crate::error::SyncResult;
use crate::overlay::OverlayKind;
use crate::protocol::{HostMessage, ListWindow};
use crate::state::{Effects, ListKind, StateEvent};

impl super::SyncController {
    /// Apply one decoded host message.
    ///
    /// Invalid messages are logged and dropped; state is left untouched.
    pub fn handle_host_message(&mut self, message: HostMessage) {
        let kind = message.kind();
        trace!("📥 {}", kind);

        let mut fx = Effects::new();
        if let Err(e) = self.dispatch_host_message(message, &mut fx) {
            warn!("⚠️  Ignoring {} from host: {}", kind, e);
        }
        self.finish(fx);
    }

    fn dispatch_host_message(&mut self, message: HostMessage, fx: &mut Effects) -> SyncResult<()> {
        match message {
            HostMessage::HostInitialized { is_active } => {
                self.on_host_initialized(is_active, fx);
                return Ok(());
            }
            HostMessage::HostDeactivated => {
                self.on_host_deactivated(fx);
                return Ok(());
            }
            _ if !self.host.connected => {
                debug!("Dropping {} received before host initialization", message.kind());
                return Ok(());
            }
            _ => {}
        }

        match message {
            HostMessage::ListWindow(window) => self.on_list_window(&window, fx)?,
            HostMessage::ItemStateChanged(change) => {
                self.cache_mut(change.kind).update_item_state(&change)?;
                fx.event(StateEvent::ListChanged { kind: change.kind });
            }
            HostMessage::DeviceChanged { name, enabled } => self.on_device_changed(name, enabled, fx),
            HostMessage::TrackChanged {
                name,
                muted,
                soloed,
            } => self.on_track_changed(name, muted, soloed, fx),
            HostMessage::ParameterUpdate(update) => self.params.apply_snapshot(&update, fx)?,
            HostMessage::ParameterValueChange(change) => {
                self.params.on_value_change(&change, fx)?;
            }
            HostMessage::ParameterBatch(batch) => self.params.apply_batch(&batch, fx)?,
            HostMessage::ParameterNameChanged { index, name } => {
                self.params.set_name(index, &name, fx)?
            }
            HostMessage::ParameterDiscreteValues(update) => {
                self.params.set_discrete_values(&update, fx)?
            }
            HostMessage::ParameterOriginChanged { index, origin } => {
                self.params.set_origin(index, origin, fx)?
            }
            HostMessage::ParameterModulationChanged {
                index,
                is_modulated,
            } => self.params.set_modulated(index, is_modulated, fx)?,
            HostMessage::ParameterAutomationChanged {
                index,
                has_automation,
            } => self.params.set_automation(index, has_automation, fx)?,
            HostMessage::DeviceChildren(children) => {
                self.children.apply(&children)?;
                fx.event(StateEvent::DeviceChildrenChanged { showing: true });
                if self.overlays.current() == Some(OverlayKind::DeviceSelector) {
                    fx.event(StateEvent::CursorMoved {
                        overlay: OverlayKind::DeviceSelector,
                        index: self.children.cursor(),
                    });
                }
            }
            HostMessage::HostInitialized { .. } | HostMessage::HostDeactivated => {}
        }
        Ok(())
    }

    fn on_list_window(&mut self, window: &ListWindow, fx: &mut Effects) -> SyncResult<()> {
        let kind = window.kind;
        let outcome = self.cache_mut(kind).apply_window(window)?;

        // A fresh device list replaces the children on screen
        if kind == ListKind::Devices && window.start_index == 0 {
            self.close_children(fx);
        }

        if outcome.written > 0 || window.start_index == 0 {
            fx.event(StateEvent::ListChanged { kind });
        }
        if outcome.skipped > 0 {
            debug!("{} window at {}: {} rows beyond capacity", kind, window.start_index, outcome.skipped);
        }
        if let Some(offset) = outcome.prefetch {
            self.request_window(kind, offset, fx);
        }
        Ok(())
    }

    /// New device under focus: its parameters and page names are stale
    fn on_device_changed(&mut self, name: String, enabled: bool, fx: &mut Effects) {
        info!("🎛️  Device: {}{}", name, if enabled { "" } else { " (bypassed)" });
        self.device.name = name.clone();
        self.device.enabled = enabled;

        self.params.mark_all_loading(fx);

        let offset = self.cache_mut(ListKind::Pages).begin_refresh();
        self.request_window(ListKind::Pages, offset, fx);
        fx.event(StateEvent::ListChanged { kind: ListKind::Pages });

        // Same list, new active row
        let offset = self.cache_mut(ListKind::Devices).request_first_window();
        self.request_window(ListKind::Devices, offset, fx);

        fx.event(StateEvent::DeviceChanged { name, enabled });
    }

    /// New track selected: the device list belongs to the previous track
    fn on_track_changed(&mut self, name: String, muted: bool, soloed: bool, fx: &mut Effects) {
        info!("🎚️  Track: {}", name);
        self.track.name = name.clone();
        self.track.muted = muted;
        self.track.soloed = soloed;

        self.close_children(fx);
        let offset = self.cache_mut(ListKind::Devices).begin_refresh();
        self.request_window(ListKind::Devices, offset, fx);
        fx.event(StateEvent::ListChanged { kind: ListKind::Devices });

        let offset = self.cache_mut(ListKind::Tracks).request_first_window();
        self.request_window(ListKind::Tracks, offset, fx);

        fx.event(StateEvent::TrackChanged { name });
    }
}
