//! Host ↔ controller message set
//!
//! Every message has a stable kind id (shared by both directions where the
//! same message flows both ways) and travels with an origin flag. Byte
//! framing lives in [`codec`].

pub mod codec;

use serde::{Deserialize, Serialize};

use crate::state::{ListKind, ParameterKind};
use crate::view::ViewId;

pub use codec::{CodecError, HostSysExCodec, MessageCodec, SysExCodec};

/// Wire identifier of every message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    HostInitialized = 0x01,
    HostDeactivated = 0x02,
    RequestHostStatus = 0x03,

    ListWindow = 0x10,
    ItemStateChanged = 0x11,
    DeviceChanged = 0x12,
    TrackChanged = 0x13,
    DeviceChildren = 0x14,

    ParameterUpdate = 0x20,
    ParameterValueChange = 0x21,
    ParameterBatch = 0x22,
    ParameterNameChanged = 0x23,
    ParameterDiscreteValues = 0x24,
    ParameterOriginChanged = 0x25,
    ParameterModulationChanged = 0x26,
    ParameterAutomationChanged = 0x27,
    ParameterTouch = 0x28,
    RestoreAutomation = 0x29,
    ResetAutomationOverrides = 0x2A,

    RequestListWindow = 0x30,
    SelectByIndex = 0x31,
    ExitToParent = 0x32,
    ToggleItem = 0x33,
    RequestDeviceChildren = 0x34,
    EnterDeviceChild = 0x35,

    ViewStateChanged = 0x40,
}

impl MessageKind {
    const ALL: [MessageKind; 26] = [
        MessageKind::HostInitialized,
        MessageKind::HostDeactivated,
        MessageKind::RequestHostStatus,
        MessageKind::ListWindow,
        MessageKind::ItemStateChanged,
        MessageKind::DeviceChanged,
        MessageKind::TrackChanged,
        MessageKind::DeviceChildren,
        MessageKind::ParameterUpdate,
        MessageKind::ParameterValueChange,
        MessageKind::ParameterBatch,
        MessageKind::ParameterNameChanged,
        MessageKind::ParameterDiscreteValues,
        MessageKind::ParameterOriginChanged,
        MessageKind::ParameterModulationChanged,
        MessageKind::ParameterAutomationChanged,
        MessageKind::ParameterTouch,
        MessageKind::RestoreAutomation,
        MessageKind::ResetAutomationOverrides,
        MessageKind::RequestListWindow,
        MessageKind::SelectByIndex,
        MessageKind::ExitToParent,
        MessageKind::ToggleItem,
        MessageKind::RequestDeviceChildren,
        MessageKind::EnterDeviceChild,
        MessageKind::ViewStateChanged,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.id() == id)
    }

    /// Variant name used as the payload tag
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::HostInitialized => "HostInitialized",
            MessageKind::HostDeactivated => "HostDeactivated",
            MessageKind::RequestHostStatus => "RequestHostStatus",
            MessageKind::ListWindow => "ListWindow",
            MessageKind::ItemStateChanged => "ItemStateChanged",
            MessageKind::DeviceChanged => "DeviceChanged",
            MessageKind::TrackChanged => "TrackChanged",
            MessageKind::DeviceChildren => "DeviceChildren",
            MessageKind::ParameterUpdate => "ParameterUpdate",
            MessageKind::ParameterValueChange => "ParameterValueChange",
            MessageKind::ParameterBatch => "ParameterBatch",
            MessageKind::ParameterNameChanged => "ParameterNameChanged",
            MessageKind::ParameterDiscreteValues => "ParameterDiscreteValues",
            MessageKind::ParameterOriginChanged => "ParameterOriginChanged",
            MessageKind::ParameterModulationChanged => "ParameterModulationChanged",
            MessageKind::ParameterAutomationChanged => "ParameterAutomationChanged",
            MessageKind::ParameterTouch => "ParameterTouch",
            MessageKind::RestoreAutomation => "RestoreAutomation",
            MessageKind::ResetAutomationOverrides => "ResetAutomationOverrides",
            MessageKind::RequestListWindow => "RequestListWindow",
            MessageKind::SelectByIndex => "SelectByIndex",
            MessageKind::ExitToParent => "ExitToParent",
            MessageKind::ToggleItem => "ToggleItem",
            MessageKind::RequestDeviceChildren => "RequestDeviceChildren",
            MessageKind::EnterDeviceChild => "EnterDeviceChild",
            MessageKind::ViewStateChanged => "ViewStateChanged",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Whether the host may send this kind
    pub fn sent_by_host(self) -> bool {
        matches!(
            self,
            MessageKind::HostInitialized
                | MessageKind::HostDeactivated
                | MessageKind::ListWindow
                | MessageKind::ItemStateChanged
                | MessageKind::DeviceChanged
                | MessageKind::TrackChanged
                | MessageKind::DeviceChildren
                | MessageKind::ParameterUpdate
                | MessageKind::ParameterValueChange
                | MessageKind::ParameterBatch
                | MessageKind::ParameterNameChanged
                | MessageKind::ParameterDiscreteValues
                | MessageKind::ParameterOriginChanged
                | MessageKind::ParameterModulationChanged
                | MessageKind::ParameterAutomationChanged
        )
    }

    /// Whether the controller may send this kind
    pub fn sent_by_controller(self) -> bool {
        !self.sent_by_host() || self == MessageKind::ParameterValueChange
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), self.id())
    }
}

/// One list row as sent by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireItem {
    /// Empty name marks the end of a short window
    pub name: String,
    #[serde(default)]
    pub type_tag: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub soloed: bool,
    #[serde(default)]
    pub expandable: bool,
}

impl WireItem {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            ..Default::default()
        }
    }
}

/// Slice of a host list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListWindow {
    pub kind: ListKind,
    pub start_index: usize,
    pub items: Vec<WireItem>,
    pub total_count: usize,
    #[serde(default)]
    pub is_nested: bool,
    /// Host's active item, raw index
    #[serde(default)]
    pub current_index: usize,
}

/// Attribute change of one list item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStateChanged {
    pub kind: ListKind,
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soloed: Option<bool>,
}

/// Full snapshot of one parameter slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub index: usize,
    pub kind: ParameterKind,
    #[serde(default)]
    pub discrete_count: usize,
    #[serde(default)]
    pub current_value_index: usize,
    #[serde(default)]
    pub origin: f32,
    pub value: f32,
    #[serde(default)]
    pub display_value: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub is_modulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulated_value: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discrete_values: Vec<String>,
    /// Parameter carries host automation
    #[serde(default)]
    pub has_automation: bool,
}

/// Single host value change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterValueChange {
    pub index: usize,
    pub value: f32,
    #[serde(default)]
    pub display_value: String,
    /// Host is confirming a value the controller sent
    #[serde(default)]
    pub is_echo: bool,
}

/// Values and modulation of every slot in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBatch {
    pub values: Vec<f32>,
    pub modulated_values: Vec<f32>,
    pub display_values: Vec<String>,
    /// Bit `i` set: slot `i` carries a new value
    pub dirty_mask: u32,
    /// Bit `i` set: slot `i` value is an echo
    pub echo_mask: u32,
    /// Bit `i` set: slot `i` carries automation. Applies to every slot on
    /// every frame.
    #[serde(default)]
    pub automation_mask: u32,
}

/// New discrete value set for one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDiscreteValues {
    pub index: usize,
    pub values: Vec<String>,
    #[serde(default)]
    pub current_value_index: usize,
}

/// Kind of inner chain an expandable device holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildType {
    Slot,
    Layer,
    Drum,
}

impl std::fmt::Display for ChildType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChildType::Slot => write!(f, "slot"),
            ChildType::Layer => write!(f, "layer"),
            ChildType::Drum => write!(f, "drum pad"),
        }
    }
}

/// One inner chain of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceChild {
    pub name: String,
    pub child_type: ChildType,
}

/// Inner chains of the device at `device_index` (raw index)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceChildren {
    pub device_index: usize,
    pub children: Vec<DeviceChild>,
}

/// Attribute the user can toggle on a list item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemToggle {
    DeviceEnabled,
    TrackMute,
    TrackSolo,
}

impl ItemToggle {
    /// List the toggle applies to
    pub fn list(self) -> ListKind {
        match self {
            ItemToggle::DeviceEnabled => ListKind::Devices,
            ItemToggle::TrackMute | ItemToggle::TrackSolo => ListKind::Tracks,
        }
    }
}

/// Host → controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostMessage {
    HostInitialized { is_active: bool },
    HostDeactivated,
    ListWindow(ListWindow),
    ItemStateChanged(ItemStateChanged),
    DeviceChanged { name: String, enabled: bool },
    TrackChanged {
        name: String,
        #[serde(default)]
        muted: bool,
        #[serde(default)]
        soloed: bool,
    },
    ParameterUpdate(ParameterUpdate),
    ParameterValueChange(ParameterValueChange),
    ParameterBatch(ParameterBatch),
    ParameterNameChanged { index: usize, name: String },
    ParameterDiscreteValues(ParameterDiscreteValues),
    ParameterOriginChanged { index: usize, origin: f32 },
    ParameterModulationChanged { index: usize, is_modulated: bool },
    ParameterAutomationChanged { index: usize, has_automation: bool },
    DeviceChildren(DeviceChildren),
}

impl HostMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            HostMessage::HostInitialized { .. } => MessageKind::HostInitialized,
            HostMessage::HostDeactivated => MessageKind::HostDeactivated,
            HostMessage::ListWindow(_) => MessageKind::ListWindow,
            HostMessage::ItemStateChanged(_) => MessageKind::ItemStateChanged,
            HostMessage::DeviceChanged { .. } => MessageKind::DeviceChanged,
            HostMessage::TrackChanged { .. } => MessageKind::TrackChanged,
            HostMessage::ParameterUpdate(_) => MessageKind::ParameterUpdate,
            HostMessage::ParameterValueChange(_) => MessageKind::ParameterValueChange,
            HostMessage::ParameterBatch(_) => MessageKind::ParameterBatch,
            HostMessage::ParameterNameChanged { .. } => MessageKind::ParameterNameChanged,
            HostMessage::ParameterDiscreteValues(_) => MessageKind::ParameterDiscreteValues,
            HostMessage::ParameterOriginChanged { .. } => MessageKind::ParameterOriginChanged,
            HostMessage::ParameterModulationChanged { .. } => {
                MessageKind::ParameterModulationChanged
            }
            HostMessage::ParameterAutomationChanged { .. } => {
                MessageKind::ParameterAutomationChanged
            }
            HostMessage::DeviceChildren(_) => MessageKind::DeviceChildren,
        }
    }
}

/// Controller → host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControllerMessage {
    RequestHostStatus,
    RequestListWindow { kind: ListKind, start_index: usize },
    SelectByIndex { kind: ListKind, index: usize },
    ExitToParent { kind: ListKind },
    ToggleItem { kind: ListKind, index: usize, toggle: ItemToggle },
    /// Ask for the inner chains of an expandable device
    RequestDeviceChildren { device_index: usize },
    /// Focus the first device inside one inner chain
    EnterDeviceChild {
        device_index: usize,
        child_type: ChildType,
        child_index: usize,
    },
    ParameterValueChange { index: usize, value: f32, is_echo: bool },
    /// Encoder grabbed or let go; the host suspends automation while touched
    ParameterTouch { index: usize, touched: bool },
    /// Hand one parameter back to its automation
    RestoreAutomation { index: usize },
    /// Drop every automation override of the project
    ResetAutomationOverrides,
    ViewStateChanged { view: ViewId, overlay_active: bool },
}

impl ControllerMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            ControllerMessage::RequestHostStatus => MessageKind::RequestHostStatus,
            ControllerMessage::RequestListWindow { .. } => MessageKind::RequestListWindow,
            ControllerMessage::SelectByIndex { .. } => MessageKind::SelectByIndex,
            ControllerMessage::ExitToParent { .. } => MessageKind::ExitToParent,
            ControllerMessage::ToggleItem { .. } => MessageKind::ToggleItem,
            ControllerMessage::RequestDeviceChildren { .. } => MessageKind::RequestDeviceChildren,
            ControllerMessage::EnterDeviceChild { .. } => MessageKind::EnterDeviceChild,
            ControllerMessage::ParameterValueChange { .. } => MessageKind::ParameterValueChange,
            ControllerMessage::ParameterTouch { .. } => MessageKind::ParameterTouch,
            ControllerMessage::RestoreAutomation { .. } => MessageKind::RestoreAutomation,
            ControllerMessage::ResetAutomationOverrides => MessageKind::ResetAutomationOverrides,
            ControllerMessage::ViewStateChanged { .. } => MessageKind::ViewStateChanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ids_are_unique_and_7bit() {
        let mut seen = std::collections::HashSet::new();
        for kind in MessageKind::ALL {
            assert!(kind.id() < 0x80, "{} is not 7-bit", kind);
            assert_eq!(MessageKind::from_id(kind.id()), Some(kind));
            assert_eq!(MessageKind::from_name(kind.name()), Some(kind));
            seen.insert(kind.id());
        }
        assert_eq!(seen.len(), 25);
    }

    #[test]
    fn test_direction_table() {
        assert!(MessageKind::ListWindow.sent_by_host());
        assert!(!MessageKind::ListWindow.sent_by_controller());
        assert!(MessageKind::RequestListWindow.sent_by_controller());
        assert!(!MessageKind::RequestListWindow.sent_by_host());
        assert!(MessageKind::ParameterValueChange.sent_by_host());
        assert!(MessageKind::ParameterValueChange.sent_by_controller());
        assert!(MessageKind::DeviceChildren.sent_by_host());
        assert!(MessageKind::EnterDeviceChild.sent_by_controller());
        assert!(MessageKind::ParameterTouch.sent_by_controller());
        assert!(!MessageKind::ParameterAutomationChanged.sent_by_controller());
    }
}
