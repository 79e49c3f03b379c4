//! State change notifications
//!
//! Handlers never call observers directly. They record what changed in an
//! [`Effects`] buffer; the controller dispatches the buffered events in order
//! once the handler has finished mutating, so an observer always sees a
//! consistent snapshot and cannot re-enter a half-applied update.

use std::sync::Arc;

use crate::overlay::OverlayKind;
use crate::protocol::ControllerMessage;
use crate::surface::SurfaceCommand;
use crate::view::ViewId;

use super::ListKind;

/// Everything a renderer may want to redraw
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    /// Rows, counts or nesting of a list changed
    ListChanged { kind: ListKind },
    /// Children of a device were shown or dismissed
    DeviceChildrenChanged { showing: bool },
    /// The cursor of the selector on top moved
    CursorMoved { overlay: OverlayKind, index: usize },
    /// Any field of one parameter slot changed
    ParameterChanged { index: usize },
    /// Every slot was re-initialized or reset
    ParametersReset,
    OverlayShown { kind: OverlayKind },
    OverlayHidden { kind: OverlayKind },
    ViewChanged { view: ViewId },
    DeviceChanged { name: String, enabled: bool },
    TrackChanged { name: String },
    HostConnection { connected: bool },
}

/// Observer callback type
pub type StateCallback = Arc<dyn Fn(&StateEvent) + Send + Sync>;

/// Handle returned by [`StateObservers::subscribe`]
pub type ObserverId = usize;

/// Registered read-only observers
#[derive(Default)]
pub struct StateObservers {
    callbacks: Vec<(ObserverId, StateCallback)>,
    next_id: ObserverId,
}

impl StateObservers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; returns an id usable with [`Self::unsubscribe`]
    pub fn subscribe(&mut self, callback: StateCallback) -> ObserverId {
        let id = self.next_id;
        self.next_id += 1;
        self.callbacks.push((id, callback));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(existing, _)| *existing != id);
        self.callbacks.len() != before
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Deliver events in order, each to every observer in registration order
    pub fn notify(&self, events: &[StateEvent]) {
        for event in events {
            for (_, callback) in &self.callbacks {
                callback(event);
            }
        }
    }
}

impl std::fmt::Debug for StateObservers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateObservers")
            .field("count", &self.callbacks.len())
            .finish()
    }
}

/// Side effects collected while a handler runs
#[derive(Debug, Default)]
pub struct Effects {
    pub events: Vec<StateEvent>,
    pub surface: Vec<SurfaceCommand>,
    pub outbound: Vec<ControllerMessage>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(&mut self, event: StateEvent) {
        // Collapse repeated notifications for the same thing within one handler
        if self.events.last() != Some(&event) {
            self.events.push(event);
        }
    }

    pub fn surface(&mut self, command: SurfaceCommand) {
        self.surface.push(command);
    }

    pub fn send(&mut self, message: ControllerMessage) {
        self.outbound.push(message);
    }
}
