//! Simulated host
//!
//! Stands in for the DAW extension when no MIDI link is configured. It keeps
//! a small generated project (tracks, devices with remote-control pages, an
//! instrument rack and a drum rack per track) and answers controller messages
//! the way the real host does: windows on request, echoes for edits, state
//! changes for selections and toggles.
//!
//! The first parameter of every page is automated. Editing it overrides the
//! automation until the controller restores it.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use tracing::{debug, info, trace, warn};

use crate::config::SimulatorConfig;
use crate::protocol::{
    ChildType, ControllerMessage, DeviceChild, DeviceChildren, HostMessage, HostSysExCodec,
    ItemStateChanged, ItemToggle, ListWindow, MessageCodec, ParameterUpdate, ParameterValueChange,
    WireItem,
};
use crate::state::{ListKind, ParameterKind};
use crate::transport::Transport;

const DEVICE_CATALOG: [&str; 8] = [
    "EQ Eight",
    "Compressor",
    "Instrument Rack",
    "Reverb",
    "Delay",
    "Saturator",
    "Drum Rack",
    "Utility",
];
const RACK_CHAINS: [&str; 3] = ["Chain A", "Chain B", "Chain C"];
const DRUM_PADS: [&str; 3] = ["Kick", "Snare", "Hat"];
/// Devices inside every chain or pad
const INNER_DEVICES: [&str; 2] = ["Operator", "Auto Filter"];
const AUTOMATED_SLOT: usize = 0;
const PAGE_NAMES: [&str; 6] = ["Main", "Filter", "Envelope", "LFO", "Modulation", "Output"];
const PARAMETER_NAMES: [&str; 8] = [
    "Cutoff", "Resonance", "Drive", "Mix", "Attack", "Release", "Shape", "Bypass",
];
const SHAPES: [&str; 4] = ["Sine", "Saw", "Square", "Noise"];
const SWITCH: [&str; 2] = ["Off", "On"];

#[derive(Debug, Clone)]
struct SimDevice {
    name: String,
    enabled: bool,
    children: Vec<DeviceChild>,
}

impl SimDevice {
    fn children_of(base: &str) -> Vec<DeviceChild> {
        let (names, child_type) = match base {
            "Instrument Rack" => (&RACK_CHAINS[..], ChildType::Layer),
            "Drum Rack" => (&DRUM_PADS[..], ChildType::Drum),
            _ => return Vec::new(),
        };
        names
            .iter()
            .map(|name| DeviceChild {
                name: name.to_string(),
                child_type,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct SimTrack {
    name: String,
    muted: bool,
    soloed: bool,
    devices: Vec<SimDevice>,
    active_device: usize,
}

/// (track, device, page, slot)
type ParamKey = (usize, usize, usize, usize);

/// Generated project answering controller messages
#[derive(Debug, Clone)]
pub struct SimulatedHost {
    window_size: usize,
    pages_per_device: usize,
    parameter_count: usize,
    tracks: Vec<SimTrack>,
    active_track: usize,
    active_page: usize,
    /// (device, child) whose inner devices are listed instead of the track's
    nested_in: Option<(usize, usize)>,
    values: HashMap<ParamKey, f32>,
    /// Automated parameters the controller has overridden
    overrides: HashSet<ParamKey>,
}

impl SimulatedHost {
    pub fn new(config: &SimulatorConfig, parameter_count: usize) -> Self {
        let tracks = (0..config.tracks.max(1))
            .map(|t| SimTrack {
                name: format!("Track {}", t + 1),
                muted: false,
                soloed: false,
                devices: (0..config.devices_per_track)
                    .map(|d| {
                        let base = DEVICE_CATALOG[d % DEVICE_CATALOG.len()];
                        let round = d / DEVICE_CATALOG.len();
                        SimDevice {
                            name: if round == 0 {
                                base.to_string()
                            } else {
                                format!("{} {}", base, round + 1)
                            },
                            enabled: true,
                            children: SimDevice::children_of(base),
                        }
                    })
                    .collect(),
                active_device: 0,
            })
            .collect();

        info!(
            "🎛️  Simulated host: {} tracks, {} devices each, window {}",
            config.tracks.max(1),
            config.devices_per_track,
            config.window_size
        );

        Self {
            window_size: config.window_size.max(1),
            pages_per_device: config.pages_per_device,
            parameter_count,
            tracks,
            active_track: 0,
            active_page: 0,
            nested_in: None,
            values: HashMap::new(),
            overrides: HashSet::new(),
        }
    }

    fn track(&self) -> &SimTrack {
        &self.tracks[self.active_track]
    }

    fn track_mut(&mut self) -> &mut SimTrack {
        &mut self.tracks[self.active_track]
    }

    /// Answer one controller message
    pub fn respond(&mut self, message: ControllerMessage) -> Vec<HostMessage> {
        match message {
            ControllerMessage::RequestHostStatus => {
                let mut replies = vec![
                    HostMessage::HostInitialized { is_active: true },
                    self.track_changed(),
                ];
                replies.extend(self.device_changed());
                replies
            }
            ControllerMessage::RequestListWindow { kind, start_index } => {
                vec![HostMessage::ListWindow(self.window(kind, start_index))]
            }
            ControllerMessage::SelectByIndex { kind, index } => self.select(kind, index),
            ControllerMessage::ExitToParent { kind } => {
                if kind == ListKind::Devices && self.nested_in.take().is_some() {
                    debug!("Leaving device chain");
                    vec![HostMessage::ListWindow(self.window(ListKind::Devices, 0))]
                } else {
                    Vec::new()
                }
            }
            ControllerMessage::ToggleItem {
                kind,
                index,
                toggle,
            } => self.toggle(kind, index, toggle),
            ControllerMessage::RequestDeviceChildren { device_index } => {
                self.children(device_index).into_iter().collect()
            }
            ControllerMessage::EnterDeviceChild {
                device_index,
                child_type,
                child_index,
            } => self.enter_child(device_index, child_type, child_index),
            ControllerMessage::ParameterValueChange { index, value, .. } => {
                self.edit(index, value).into_iter().collect()
            }
            ControllerMessage::ParameterTouch { index, touched } => {
                trace!("Param {} touched: {}", index, touched);
                Vec::new()
            }
            ControllerMessage::RestoreAutomation { index } => {
                self.restore(index).into_iter().collect()
            }
            ControllerMessage::ResetAutomationOverrides => {
                let page = self.key(0);
                let slots: Vec<usize> = self
                    .overrides
                    .iter()
                    .filter(|(t, d, p, _)| (*t, *d, *p) == (page.0, page.1, page.2))
                    .map(|key| key.3)
                    .collect();
                let replies = slots.into_iter().filter_map(|slot| self.restore(slot)).collect();
                for key in self.overrides.drain() {
                    self.values.remove(&key);
                }
                replies
            }
            ControllerMessage::ViewStateChanged {
                view,
                overlay_active,
            } => {
                debug!("Controller view: {} (overlay: {})", view, overlay_active);
                Vec::new()
            }
        }
    }

    fn names(&self, kind: ListKind) -> (Vec<WireItem>, usize, bool) {
        match kind {
            ListKind::Tracks => (
                self.tracks
                    .iter()
                    .map(|t| WireItem {
                        muted: t.muted,
                        soloed: t.soloed,
                        type_tag: "audio".to_string(),
                        ..WireItem::named(t.name.clone())
                    })
                    .collect(),
                self.active_track,
                false,
            ),
            ListKind::Devices => match self.nested_in {
                Some((device, child)) => {
                    let prefix = self.track().devices[device].children[child].name.clone();
                    (
                        INNER_DEVICES
                            .iter()
                            .map(|d| WireItem {
                                type_tag: "device".to_string(),
                                ..WireItem::named(format!("{} {}", prefix, d))
                            })
                            .collect(),
                        0,
                        true,
                    )
                }
                None => (
                    self.track()
                        .devices
                        .iter()
                        .map(|d| WireItem {
                            enabled: d.enabled,
                            expandable: !d.children.is_empty(),
                            type_tag: "device".to_string(),
                            ..WireItem::named(d.name.clone())
                        })
                        .collect(),
                    self.track().active_device,
                    false,
                ),
            },
            ListKind::Pages => (
                (0..self.pages_per_device)
                    .map(|p| WireItem::named(PAGE_NAMES[p % PAGE_NAMES.len()]))
                    .collect(),
                self.active_page,
                false,
            ),
        }
    }

    /// Window of `kind` starting at `start`
    pub fn window(&self, kind: ListKind, start: usize) -> ListWindow {
        let (items, current_index, is_nested) = self.names(kind);
        let total_count = items.len();
        ListWindow {
            kind,
            start_index: start,
            items: items.into_iter().skip(start).take(self.window_size).collect(),
            total_count,
            is_nested,
            current_index,
        }
    }

    fn select(&mut self, kind: ListKind, index: usize) -> Vec<HostMessage> {
        match kind {
            ListKind::Tracks if index < self.tracks.len() => {
                self.active_track = index;
                self.active_page = 0;
                self.nested_in = None;
                let mut replies = vec![self.track_changed()];
                replies.extend(self.device_changed());
                replies
            }
            ListKind::Devices if self.nested_in.is_some() => match INNER_DEVICES.get(index) {
                Some(name) => {
                    debug!("Inner device {} selected", index);
                    let mut replies = vec![HostMessage::DeviceChanged {
                        name: name.to_string(),
                        enabled: true,
                    }];
                    replies.extend(self.snapshots());
                    replies
                }
                None => Vec::new(),
            },
            ListKind::Devices if index < self.track().devices.len() => {
                self.track_mut().active_device = index;
                self.active_page = 0;
                self.device_changed()
            }
            ListKind::Pages if index < self.pages_per_device => {
                self.active_page = index;
                self.snapshots()
            }
            _ => {
                warn!("⚠️  Simulated host: {} {} does not exist", kind, index);
                Vec::new()
            }
        }
    }

    fn children(&self, device_index: usize) -> Option<HostMessage> {
        let Some(device) = self.track().devices.get(device_index) else {
            warn!("⚠️  Simulated host: no device {}", device_index);
            return None;
        };
        debug!("{} has {} children", device.name, device.children.len());
        Some(HostMessage::DeviceChildren(DeviceChildren {
            device_index,
            children: device.children.clone(),
        }))
    }

    /// Focus a chain or pad: the device list now shows its inner devices
    fn enter_child(
        &mut self,
        device_index: usize,
        child_type: ChildType,
        child_index: usize,
    ) -> Vec<HostMessage> {
        let known = self
            .track()
            .devices
            .get(device_index)
            .and_then(|d| d.children.get(child_index))
            .is_some_and(|c| c.child_type == child_type);
        if !known {
            warn!(
                "⚠️  Simulated host: device {} has no {} {}",
                device_index, child_type, child_index
            );
            return Vec::new();
        }

        debug!("Entering {} {} of device {}", child_type, child_index, device_index);
        self.nested_in = Some((device_index, child_index));
        vec![HostMessage::ListWindow(self.window(ListKind::Devices, 0))]
    }

    fn toggle(&mut self, kind: ListKind, index: usize, toggle: ItemToggle) -> Vec<HostMessage> {
        let mut change = ItemStateChanged {
            kind,
            index,
            enabled: None,
            muted: None,
            soloed: None,
        };

        match toggle {
            ItemToggle::DeviceEnabled if self.nested_in.is_none() => {
                let Some(device) = self.track_mut().devices.get_mut(index) else {
                    return Vec::new();
                };
                device.enabled = !device.enabled;
                change.enabled = Some(device.enabled);
            }
            ItemToggle::TrackMute => {
                let Some(track) = self.tracks.get_mut(index) else {
                    return Vec::new();
                };
                track.muted = !track.muted;
                change.muted = Some(track.muted);
            }
            ItemToggle::TrackSolo => {
                let Some(track) = self.tracks.get_mut(index) else {
                    return Vec::new();
                };
                track.soloed = !track.soloed;
                change.soloed = Some(track.soloed);
            }
            ItemToggle::DeviceEnabled => return Vec::new(),
        }
        vec![HostMessage::ItemStateChanged(change)]
    }

    fn track_changed(&self) -> HostMessage {
        let track = self.track();
        HostMessage::TrackChanged {
            name: track.name.clone(),
            muted: track.muted,
            soloed: track.soloed,
        }
    }

    /// Device header followed by every slot of its first page
    fn device_changed(&self) -> Vec<HostMessage> {
        let track = self.track();
        let Some(device) = track.devices.get(track.active_device) else {
            return Vec::new();
        };
        let mut replies = vec![HostMessage::DeviceChanged {
            name: device.name.clone(),
            enabled: device.enabled,
        }];
        replies.extend(self.snapshots());
        replies
    }

    fn key(&self, slot: usize) -> ParamKey {
        (self.active_track, self.track().active_device, self.active_page, slot)
    }

    fn choices(slot: usize) -> (ParameterKind, &'static [&'static str]) {
        match slot {
            6 => (ParameterKind::DiscreteList, &SHAPES[..]),
            7 => (ParameterKind::DiscreteButton, &SWITCH[..]),
            _ => (ParameterKind::Continuous, &[]),
        }
    }

    /// Stored value, or a deterministic starting point
    fn value(&self, slot: usize) -> f32 {
        let key = self.key(slot);
        self.values.get(&key).copied().unwrap_or_else(|| {
            let (t, d, p, s) = key;
            let seed = (t * 31 + d * 17 + p * 7 + s * 3) % 11;
            snap(seed as f32 / 10.0, Self::choices(slot).1.len())
        })
    }

    fn display(slot: usize, value: f32) -> String {
        let (_, values) = Self::choices(slot);
        if values.len() > 1 {
            values[discrete_position(value, values.len())].to_string()
        } else {
            format!("{:.0} %", value * 100.0)
        }
    }

    fn snapshots(&self) -> Vec<HostMessage> {
        (0..self.parameter_count)
            .map(|slot| {
                let (kind, values) = Self::choices(slot);
                let value = self.value(slot);
                HostMessage::ParameterUpdate(ParameterUpdate {
                    index: slot,
                    kind,
                    discrete_count: values.len(),
                    current_value_index: if values.is_empty() {
                        0
                    } else {
                        discrete_position(value, values.len())
                    },
                    origin: 0.0,
                    value,
                    display_value: Self::display(slot, value),
                    name: PARAMETER_NAMES[slot % PARAMETER_NAMES.len()].to_string(),
                    visible: true,
                    is_modulated: false,
                    modulated_value: None,
                    discrete_values: values.iter().map(|v| v.to_string()).collect(),
                    has_automation: slot == AUTOMATED_SLOT,
                })
            })
            .collect()
    }

    /// Store an edit and confirm it; discrete values are snapped to a step
    fn edit(&mut self, slot: usize, value: f32) -> Option<HostMessage> {
        if slot >= self.parameter_count {
            warn!("⚠️  Simulated host: no parameter slot {}", slot);
            return None;
        }
        let value = snap(value.clamp(0.0, 1.0), Self::choices(slot).1.len());
        let key = self.key(slot);
        self.values.insert(key, value);
        if slot == AUTOMATED_SLOT {
            self.overrides.insert(key);
        }
        trace!("Param {} = {:.3}", slot, value);

        Some(HostMessage::ParameterValueChange(ParameterValueChange {
            index: slot,
            value,
            display_value: Self::display(slot, value),
            is_echo: true,
        }))
    }

    /// Drop the override of one slot; the automated value comes back
    fn restore(&mut self, slot: usize) -> Option<HostMessage> {
        let key = self.key(slot);
        if !self.overrides.remove(&key) {
            return None;
        }
        self.values.remove(&key);
        let value = self.value(slot);
        debug!("Param {} back to automation at {:.3}", slot, value);

        Some(HostMessage::ParameterValueChange(ParameterValueChange {
            index: slot,
            value,
            display_value: Self::display(slot, value),
            is_echo: false,
        }))
    }

    /// Serve a transport until the controller side goes away
    pub async fn run<T: Transport>(mut self, mut transport: T) -> Result<()> {
        let codec = HostSysExCodec;
        let mut frames = transport
            .take_receiver()
            .ok_or_else(|| anyhow!("Simulated host transport already in use"))?;

        info!("✅ Simulated host running on {}", transport.name());
        while let Some(frame) = frames.recv().await {
            let message = match codec.decode(&frame) {
                Ok(message) => message,
                Err(e) => {
                    warn!("⚠️  Simulated host dropped frame: {}", e);
                    continue;
                }
            };
            trace!("📥 sim {}", message.kind());

            for reply in self.respond(message) {
                match codec.encode(&reply) {
                    Ok(frame) => transport.send(&frame)?,
                    Err(e) => warn!("⚠️  Simulated host failed to encode {}: {}", reply.kind(), e),
                }
            }
        }

        info!("Simulated host stopped");
        Ok(())
    }
}

fn discrete_position(value: f32, count: usize) -> usize {
    crate::state::parameters::discrete_index(value, count)
}

/// Snap to the nearest of `count` evenly spaced steps
fn snap(value: f32, count: usize) -> f32 {
    if count < 2 {
        return value.min(1.0);
    }
    let max = (count - 1) as f32;
    discrete_position(value, count) as f32 / max
}
