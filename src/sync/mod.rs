//! Synchronization controller - the controller-side mirror of host state
//!
//! The controller owns every piece of synchronized state:
//! - One paginated cache per host list (devices, pages, tracks)
//! - The children of the expandable device being browsed
//! - The parameter slots bound to the macro encoders
//! - The overlay stack and the input router that obeys it
//! - The active view and the connection status of the host
//!
//! It is single-threaded by construction. Host messages and input events are
//! fed in one at a time; each handler mutates state, then the controller
//! broadcasts the view state if it changed, queues outbound messages and
//! surface commands, and finally notifies observers.

mod host;
mod input;
mod lifecycle;
mod view_state;


use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::input::{Binding, ButtonId, InputRouter};
use crate::overlay::{OverlayKind, OverlayStack};
use crate::protocol::ControllerMessage;
use crate::state::{
    ChildBrowser, Effects, ListCache, ListKind, ListState, ObserverId, ParameterSlot,
    ParameterStore, StateEvent, StateObservers,
};
use crate::surface::SurfaceCommand;
use crate::view::ViewId;

/// Tunables of the synchronization core
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Number of parameter slots (one per macro encoder)
    pub parameter_count: usize,
    /// Rows ahead of the loaded edge at which the next window is requested
    pub prefetch_threshold: usize,
    /// Normalized change per encoder detent on continuous parameters
    pub encoder_step: f32,
    pub device_capacity: usize,
    pub page_capacity: usize,
    pub track_capacity: usize,
    /// Latch button per overlay; kinds not listed use their factory button
    pub overlay_latches: HashMap<OverlayKind, Option<ButtonId>>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            parameter_count: 8,
            prefetch_threshold: 4,
            encoder_step: 0.01,
            device_capacity: 64,
            page_capacity: 64,
            track_capacity: 128,
            overlay_latches: HashMap::new(),
        }
    }
}

impl SyncSettings {
    pub fn capacity(&self, kind: ListKind) -> usize {
        match kind {
            ListKind::Devices => self.device_capacity,
            ListKind::Pages => self.page_capacity,
            ListKind::Tracks => self.track_capacity,
        }
    }

    pub fn latch_for(&self, kind: OverlayKind) -> Option<ButtonId> {
        self.overlay_latches
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_latch())
    }
}

/// Connection status as reported by the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStatus {
    pub connected: bool,
    /// The host has a project open and serves lists
    pub active: bool,
}

/// Header of the device the parameters belong to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub enabled: bool,
}

/// Header of the track that owns the device list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackInfo {
    pub name: String,
    pub muted: bool,
    pub soloed: bool,
}

/// One cache per list kind
#[derive(Debug, Clone)]
struct ListCaches {
    devices: ListCache,
    pages: ListCache,
    tracks: ListCache,
}

impl ListCaches {
    fn new(settings: &SyncSettings) -> Self {
        Self {
            devices: ListCache::new(ListKind::Devices, settings.capacity(ListKind::Devices)),
            pages: ListCache::new(ListKind::Pages, settings.capacity(ListKind::Pages)),
            tracks: ListCache::new(ListKind::Tracks, settings.capacity(ListKind::Tracks)),
        }
    }

    fn get(&self, kind: ListKind) -> &ListCache {
        match kind {
            ListKind::Devices => &self.devices,
            ListKind::Pages => &self.pages,
            ListKind::Tracks => &self.tracks,
        }
    }

    fn get_mut(&mut self, kind: ListKind) -> &mut ListCache {
        match kind {
            ListKind::Devices => &mut self.devices,
            ListKind::Pages => &mut self.pages,
            ListKind::Tracks => &mut self.tracks,
        }
    }
}

/// Controller-side state synchronization engine
#[derive(Debug)]
pub struct SyncController {
    pub(crate) settings: SyncSettings,
    lists: ListCaches,
    pub(crate) children: ChildBrowser,
    pub(crate) params: ParameterStore,
    pub(crate) overlays: OverlayStack,
    pub(crate) input: InputRouter,
    pub(crate) view: ViewId,
    /// Cursor of the view selector, as a [`ViewId`] ordinal
    pub(crate) view_cursor: usize,
    pub(crate) host: HostStatus,
    pub(crate) device: DeviceInfo,
    pub(crate) track: TrackInfo,
    /// Last (view, overlay active) pair sent to the host
    pub(crate) last_view_state: Option<(ViewId, bool)>,
    observers: StateObservers,
    outbox: Vec<ControllerMessage>,
    surface_queue: Vec<SurfaceCommand>,
}

impl Default for SyncController {
    fn default() -> Self {
        Self::new(SyncSettings::default(), crate::input::default_bindings())
    }
}

impl SyncController {
    pub fn new(settings: SyncSettings, bindings: Vec<Binding>) -> Self {
        let overlays = OverlayStack::with_latches(|kind| settings.latch_for(kind));
        info!(
            "✅ Sync controller ready: {} parameter slots, {} bindings, prefetch threshold {}",
            settings.parameter_count,
            bindings.len(),
            settings.prefetch_threshold
        );

        Self {
            lists: ListCaches::new(&settings),
            children: ChildBrowser::new(),
            params: ParameterStore::new(settings.parameter_count),
            overlays,
            input: InputRouter::new(bindings),
            view: ViewId::default(),
            view_cursor: 0,
            host: HostStatus::default(),
            device: DeviceInfo::default(),
            track: TrackInfo::default(),
            last_view_state: None,
            observers: StateObservers::new(),
            outbox: Vec::new(),
            surface_queue: Vec::new(),
            settings,
        }
    }

    /// Apply new tunables and bindings at runtime.
    ///
    /// Prefetch threshold, encoder step and bindings take effect immediately.
    /// Slot counts, capacities and latch buttons only apply on restart.
    pub fn reconfigure(&mut self, settings: SyncSettings, bindings: Vec<Binding>) {
        if settings.parameter_count != self.settings.parameter_count
            || settings.device_capacity != self.settings.device_capacity
            || settings.page_capacity != self.settings.page_capacity
            || settings.track_capacity != self.settings.track_capacity
            || settings.overlay_latches != self.settings.overlay_latches
        {
            warn!("⚠️  Slot count, list capacity and latch changes need a restart");
        }

        self.settings.prefetch_threshold = settings.prefetch_threshold;
        self.settings.encoder_step = settings.encoder_step;
        if self.input.bindings() != bindings.as_slice() {
            // Latches are dropped with the old table; selectors would be left unlatched
            let mut fx = Effects::new();
            self.hide_all_overlays(&mut fx);
            self.input.set_bindings(bindings);
            self.finish(fx);
        }

        info!(
            "🔄 Sync settings applied: prefetch threshold {}, encoder step {}",
            self.settings.prefetch_threshold, self.settings.encoder_step
        );
    }

    // ===== Observation =====

    /// Register a read-only observer; it is called after each handler finishes
    pub fn subscribe(&mut self, callback: Arc<dyn Fn(&StateEvent) + Send + Sync>) -> ObserverId {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Take queued messages for the host (consumes them, leaving an empty Vec)
    pub fn take_outbound(&mut self) -> Vec<ControllerMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Take queued commands for the physical surface
    pub fn take_surface_commands(&mut self) -> Vec<SurfaceCommand> {
        std::mem::take(&mut self.surface_queue)
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn list(&self, kind: ListKind) -> &ListState {
        self.lists.get(kind).state()
    }

    pub(crate) fn cache(&self, kind: ListKind) -> &ListCache {
        self.lists.get(kind)
    }

    pub(crate) fn cache_mut(&mut self, kind: ListKind) -> &mut ListCache {
        self.lists.get_mut(kind)
    }

    /// Children list shown by the device selector after a dive
    pub fn device_children(&self) -> &ChildBrowser {
        &self.children
    }

    pub fn parameters(&self) -> &[ParameterSlot] {
        self.params.slots()
    }

    pub fn parameter(&self, index: usize) -> Option<&ParameterSlot> {
        self.params.slot(index)
    }

    pub fn overlays(&self) -> &OverlayStack {
        &self.overlays
    }

    pub fn current_overlay(&self) -> Option<OverlayKind> {
        self.overlays.current()
    }

    pub fn view(&self) -> ViewId {
        self.view
    }

    /// View highlighted in the view selector
    pub fn view_cursor(&self) -> ViewId {
        ViewId::from_ordinal(self.view_cursor)
    }

    pub fn host_status(&self) -> HostStatus {
        self.host
    }

    pub fn is_connected(&self) -> bool {
        self.host.connected
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn track(&self) -> &TrackInfo {
        &self.track
    }

    pub fn input_router(&self) -> &InputRouter {
        &self.input
    }

    // ===== Internal =====

    /// Send a window request for `kind` at `offset`
    pub(crate) fn request_window(&mut self, kind: ListKind, offset: usize, fx: &mut Effects) {
        tracing::debug!("📤 Requesting {} window at {}", kind, offset);
        fx.send(ControllerMessage::RequestListWindow {
            kind,
            start_index: offset,
        });
    }

    /// Leave the children list, if shown
    pub(crate) fn close_children(&mut self, fx: &mut Effects) {
        if self.children.is_showing() {
            self.children.close();
            fx.event(StateEvent::DeviceChildrenChanged { showing: false });
        }
    }

    /// Close handler: broadcast view state, queue effects, then notify
    pub(crate) fn finish(&mut self, mut fx: Effects) {
        self.sync_view_state(&mut fx);
        self.surface_queue.append(&mut fx.surface);
        self.outbox.append(&mut fx.outbound);
        self.observers.notify(&fx.events);
    }
}
