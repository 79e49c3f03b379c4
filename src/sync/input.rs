//! Input events and selector actions

use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::input::{InputAction, InputEvent, RoutedAction};
use crate::overlay::{AuthorityResolver, OverlayKind, OverlayTransition};
use crate::protocol::{ControllerMessage, ItemToggle};
use crate::state::index::wrap_index;
use crate::state::{ChildSelection, Effects, ListKind, Selection, StateEvent};
use crate::view::ViewId;

impl super::SyncController {
    /// Route one physical input event under the current overlay authority
    pub fn handle_input(&mut self, event: InputEvent) {
        let authority = AuthorityResolver::new(&self.overlays);
        let Some(routed) = self.input.route(event, &authority) else {
            return;
        };

        let mut fx = Effects::new();
        if let Err(e) = self.execute(routed, &mut fx) {
            warn!("⚠️  {:?} ignored: {}", routed.action, e);
        }
        self.finish(fx);
    }

    fn execute(&mut self, routed: RoutedAction, fx: &mut Effects) -> SyncResult<()> {
        match routed.action {
            InputAction::OpenSelector { overlay, stack } => self.open_selector(overlay, stack, fx),
            InputAction::Navigate => self.navigate(routed.delta, fx),
            InputAction::Confirm { close } => self.confirm(close, fx),
            InputAction::Dive => self.dive(fx),
            InputAction::Cancel => {
                self.close_selector(fx);
                Ok(())
            }
            InputAction::Toggle { toggle } => self.toggle_item(toggle, fx),
            InputAction::AdjustParameter { slot } => {
                let step = self.settings.encoder_step;
                self.params.step_value(slot, routed.delta, step, fx)?;
                Ok(())
            }
            InputAction::TouchParameter { slot, touched } => self.params.touch(slot, touched, fx),
            InputAction::RestoreAutomation => {
                self.params.restore_automation(fx);
                Ok(())
            }
            InputAction::ResetAutomationOverrides => {
                info!("🔄 Resetting automation overrides");
                fx.send(ControllerMessage::ResetAutomationOverrides);
                Ok(())
            }
            InputAction::NextView => {
                self.switch_view(self.view.next(), fx);
                Ok(())
            }
            InputAction::PreviousView => {
                self.switch_view(self.view.previous(), fx);
                Ok(())
            }
        }
    }

    /// Show a selector; its list is fetched the first time it opens
    fn open_selector(&mut self, kind: OverlayKind, stack: bool, fx: &mut Effects) -> SyncResult<()> {
        let transitions = self.overlays.show(kind, stack, self.input.latches_mut())?;
        self.record_transitions(&transitions, fx);

        match kind.list() {
            Some(list) => {
                let cache = self.cache(list);
                if !cache.has_loaded() && cache.in_flight() != Some(0) {
                    let offset = self.cache_mut(list).request_first_window();
                    self.request_window(list, offset, fx);
                }
            }
            None => {
                self.view_cursor = self.view.ordinal();
                fx.event(StateEvent::CursorMoved {
                    overlay: kind,
                    index: self.view_cursor,
                });
            }
        }
        Ok(())
    }

    fn navigate(&mut self, delta: i32, fx: &mut Effects) -> SyncResult<()> {
        let overlay = self.overlays.current().ok_or(SyncError::NoActiveOverlay)?;

        let index = match overlay.list() {
            Some(ListKind::Devices) if self.children.is_showing() => self.children.navigate(delta),
            Some(list) => {
                let threshold = self.settings.prefetch_threshold;
                let outcome = self.cache_mut(list).navigate(delta, threshold)?;
                if let Some(offset) = outcome.prefetch {
                    self.request_window(list, offset, fx);
                }
                outcome.index
            }
            None => {
                self.view_cursor =
                    wrap_index(self.view_cursor as i64 + delta as i64, ViewId::ALL.len());
                self.view_cursor
            }
        };

        fx.event(StateEvent::CursorMoved { overlay, index });
        Ok(())
    }

    fn confirm(&mut self, close: bool, fx: &mut Effects) -> SyncResult<()> {
        let overlay = self.overlays.current().ok_or(SyncError::NoActiveOverlay)?;

        match overlay.list() {
            Some(ListKind::Devices) if self.children.is_showing() => self.enter_child(fx)?,
            Some(list) => match self.cache(list).selection() {
                Some(Selection::Back) => {
                    debug!("📤 Leaving nested {} list", list);
                    fx.send(ControllerMessage::ExitToParent { kind: list });
                    // The parent list replaces this one; keep the selector open
                    return Ok(());
                }
                Some(Selection::Item(index)) => {
                    debug!("📤 Selecting {} {}", list, index);
                    self.cache_mut(list).set_active(index);
                    fx.send(ControllerMessage::SelectByIndex { kind: list, index });
                    fx.event(StateEvent::ListChanged { kind: list });
                }
                None => return Err(SyncError::NoSelection { kind: list }),
            },
            None => {
                let view = ViewId::from_ordinal(self.view_cursor);
                self.switch_view(view, fx);
            }
        }

        if close {
            self.close_selector(fx);
        }
        Ok(())
    }

    /// Nav release in the device selector: expandable devices open their
    /// children, anything else is selected with the selector left open
    fn dive(&mut self, fx: &mut Effects) -> SyncResult<()> {
        if self.overlays.current().and_then(|o| o.list()) != Some(ListKind::Devices) {
            return self.confirm(false, fx);
        }
        if self.children.is_showing() {
            return self.enter_child(fx);
        }

        let devices = self.cache(ListKind::Devices);
        let expandable = devices.selected_item().is_some_and(|item| item.flags.expandable);
        match devices.selection() {
            Some(Selection::Item(index)) if expandable => {
                debug!("📤 Requesting children of device {}", index);
                self.children.request(index);
                fx.send(ControllerMessage::RequestDeviceChildren {
                    device_index: index,
                });
                Ok(())
            }
            _ => self.confirm(false, fx),
        }
    }

    /// Act on the children row under the cursor
    fn enter_child(&mut self, fx: &mut Effects) -> SyncResult<()> {
        let (Some(parent), Some(selection)) = (self.children.parent(), self.children.selection())
        else {
            return Err(SyncError::NoSelection {
                kind: ListKind::Devices,
            });
        };

        match selection {
            ChildSelection::Back => {
                debug!("📤 Leaving children of device {}", parent);
                self.close_children(fx);
                let offset = self.cache_mut(ListKind::Devices).begin_refresh();
                self.request_window(ListKind::Devices, offset, fx);
                fx.event(StateEvent::ListChanged {
                    kind: ListKind::Devices,
                });
            }
            ChildSelection::Child { index, child_type } => {
                debug!("📤 Entering {} {} of device {}", child_type, index, parent);
                fx.send(ControllerMessage::EnterDeviceChild {
                    device_index: parent,
                    child_type,
                    child_index: index,
                });
            }
        }
        Ok(())
    }

    /// Close the selector on top.
    ///
    /// Leaving the stacked track selector uncovers the device selector,
    /// whose list now belongs to another track: window 0 is re-requested
    /// without clearing the rows on screen.
    fn close_selector(&mut self, fx: &mut Effects) {
        let transitions = self.overlays.hide(self.input.latches_mut());
        let closed_track_selector = transitions
            .iter()
            .any(|t| *t == OverlayTransition::Hidden(OverlayKind::TrackSelector));
        self.record_transitions(&transitions, fx);

        if closed_track_selector && self.overlays.current() == Some(OverlayKind::DeviceSelector) {
            let offset = self.cache_mut(ListKind::Devices).request_first_window();
            self.request_window(ListKind::Devices, offset, fx);
        }
    }

    fn toggle_item(&mut self, toggle: ItemToggle, fx: &mut Effects) -> SyncResult<()> {
        let kind = toggle.list();
        if self.overlays.current().and_then(|o| o.list()) != Some(kind) {
            debug!("{:?} ignored outside the {} selector", toggle, kind);
            return Ok(());
        }
        if kind == ListKind::Devices && self.children.is_showing() {
            debug!("{:?} ignored on device children", toggle);
            return Ok(());
        }

        match self.cache(kind).selection() {
            Some(Selection::Item(index)) => {
                debug!("📤 Toggling {:?} on {} {}", toggle, kind, index);
                fx.send(ControllerMessage::ToggleItem { kind, index, toggle });
                Ok(())
            }
            Some(Selection::Back) => Ok(()),
            None => Err(SyncError::NoSelection { kind }),
        }
    }

    fn switch_view(&mut self, view: ViewId, fx: &mut Effects) {
        if view == self.view {
            return;
        }
        info!("📺 View: {} -> {}", self.view, view);
        self.view = view;
        fx.event(StateEvent::ViewChanged { view });
    }

    pub(super) fn record_transitions(&mut self, transitions: &[OverlayTransition], fx: &mut Effects) {
        for transition in transitions {
            match *transition {
                OverlayTransition::Shown(kind) => {
                    debug!("Overlay shown: {}", kind);
                    fx.event(StateEvent::OverlayShown { kind });
                }
                OverlayTransition::Hidden(kind) => {
                    debug!("Overlay hidden: {}", kind);
                    if kind == OverlayKind::DeviceSelector {
                        self.close_children(fx);
                    }
                    fx.event(StateEvent::OverlayHidden { kind });
                }
                OverlayTransition::LatchReleased { overlay, button } => {
                    debug!("Latch {} released with {}", button, overlay);
                }
            }
        }
    }
}
