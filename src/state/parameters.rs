//! Reconciling parameter store
//!
//! One slot per physical control. Local edits are applied immediately and
//! sent to the host; host messages are merged back with echo rules that keep
//! continuous controls from jittering while still letting the host correct
//! discrete values it snapped.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use super::events::{Effects, StateEvent};
use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    ControllerMessage, ParameterBatch, ParameterDiscreteValues, ParameterUpdate,
    ParameterValueChange,
};
use crate::surface::{EncoderMode, SurfaceCommand};

/// How a parameter behaves on its encoder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Knob-like: free value in [0, 1]
    #[default]
    Continuous,
    /// Stepped choice between named values
    DiscreteList,
    /// Two-state switch
    DiscreteButton,
}

impl ParameterKind {
    pub fn is_discrete(self) -> bool {
        !matches!(self, ParameterKind::Continuous)
    }

    fn encoder_mode(self) -> EncoderMode {
        match self {
            ParameterKind::Continuous => EncoderMode::Continuous,
            ParameterKind::DiscreteList => EncoderMode::Stepped,
            ParameterKind::DiscreteButton => EncoderMode::Toggle,
        }
    }
}

/// Controller-side copy of one host parameter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSlot {
    pub name: String,
    pub value: f32,
    pub display_value: String,
    pub kind: ParameterKind,
    pub discrete_count: usize,
    pub discrete_values: Vec<String>,
    pub current_value_index: usize,
    /// Bipolar origin (0.5 for pan-like parameters)
    pub origin: f32,
    pub modulation_offset: f32,
    pub is_modulated: bool,
    /// Host automation drives this parameter
    pub has_automation: bool,
    /// Encoder is held; the host suspends automation meanwhile
    pub touched: bool,
    pub visible: bool,
    /// Waiting for a fresh snapshot after a device change
    pub loading: bool,
}

/// Snap a normalized value onto `count` steps
pub fn discrete_index(value: f32, count: usize) -> usize {
    if count <= 1 {
        return 0;
    }
    let max = (count - 1) as f32;
    (value * max).round().clamp(0.0, max) as usize
}

/// Bit `index` of a per-slot mask; slots past the mask width read as clear
fn mask_bit(mask: u32, index: usize) -> bool {
    u32::try_from(index)
        .ok()
        .and_then(|shift| mask.checked_shr(shift))
        .is_some_and(|bits| bits & 1 != 0)
}

/// Fixed set of parameter slots
#[derive(Debug, Clone)]
pub struct ParameterStore {
    slots: Vec<ParameterSlot>,
}

impl ParameterStore {
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![ParameterSlot::default(); count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<&ParameterSlot> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[ParameterSlot] {
        &self.slots
    }

    fn slot_mut(&mut self, index: usize) -> SyncResult<&mut ParameterSlot> {
        let count = self.slots.len();
        self.slots
            .get_mut(index)
            .ok_or(SyncError::ParameterOutOfRange { index, count })
    }

    fn encoder_config(index: usize, slot: &ParameterSlot) -> SurfaceCommand {
        SurfaceCommand::ConfigureEncoder {
            index,
            mode: slot.kind.encoder_mode(),
            steps: slot.discrete_count,
            origin: slot.origin,
        }
    }

    /// Replace a slot wholesale from a host snapshot.
    ///
    /// Discrete metadata is written before the kind, and the encoder is
    /// reconfigured from that metadata when the kind lands. The physical
    /// position is set last, from the new value.
    pub fn apply_snapshot(&mut self, update: &ParameterUpdate, fx: &mut Effects) -> SyncResult<()> {
        let index = update.index;
        let slot = self.slot_mut(index)?;

        slot.discrete_count = update.discrete_count;
        slot.discrete_values = update.discrete_values.clone();
        slot.current_value_index = update
            .current_value_index
            .min(update.discrete_count.saturating_sub(1));
        slot.origin = update.origin;

        slot.kind = update.kind;
        fx.surface(Self::encoder_config(index, slot));

        slot.name = update.name.clone();
        slot.value = update.value;
        slot.display_value = update.display_value.clone();
        slot.visible = update.visible;
        slot.loading = false;
        slot.is_modulated = update.is_modulated;
        slot.has_automation = update.has_automation;
        slot.modulation_offset = update.modulated_value.unwrap_or(update.value) - update.value;

        fx.surface(SurfaceCommand::SetPosition {
            index,
            value: slot.value,
        });
        fx.event(StateEvent::ParameterChanged { index });
        Ok(())
    }

    /// Merge a single host value change.
    ///
    /// Returns whether the slot was touched.
    pub fn on_value_change(
        &mut self,
        change: &ParameterValueChange,
        fx: &mut Effects,
    ) -> SyncResult<bool> {
        let index = change.index;
        let slot = self.slot_mut(index)?;

        if change.is_echo && !slot.kind.is_discrete() {
            trace!("Param {} echo {:.3} skipped (local {:.3})", index, change.value, slot.value);
            return Ok(false);
        }

        slot.value = change.value;
        slot.display_value = change.display_value.clone();
        if slot.kind.is_discrete() {
            slot.current_value_index = discrete_index(slot.value, slot.discrete_count);
        }

        if !change.is_echo {
            fx.surface(SurfaceCommand::SetPosition {
                index,
                value: slot.value,
            });
        }
        fx.event(StateEvent::ParameterChanged { index });
        Ok(true)
    }

    /// Merge a batched frame of values and modulation.
    ///
    /// The frame is rejected whole when its arrays do not match the slot
    /// count.
    pub fn apply_batch(&mut self, batch: &ParameterBatch, fx: &mut Effects) -> SyncResult<()> {
        let expected = self.slots.len();
        for got in [
            batch.values.len(),
            batch.modulated_values.len(),
            batch.display_values.len(),
        ] {
            if got != expected {
                return Err(SyncError::BatchLength { got, expected });
            }
        }

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let dirty = mask_bit(batch.dirty_mask, index);
            let echo = mask_bit(batch.echo_mask, index);
            let mut changed = false;

            let automated = mask_bit(batch.automation_mask, index);
            if automated != slot.has_automation {
                slot.has_automation = automated;
                changed = true;
            }

            if dirty && !(echo && !slot.kind.is_discrete()) {
                slot.value = batch.values[index];
                slot.display_value = batch.display_values[index].clone();
                if slot.kind.is_discrete() {
                    slot.current_value_index = discrete_index(slot.value, slot.discrete_count);
                }
                if !echo {
                    fx.surface(SurfaceCommand::SetPosition {
                        index,
                        value: slot.value,
                    });
                }
                changed = true;
            }

            // Tracks the local value every frame, optimistic edits included
            let offset = batch.modulated_values[index] - slot.value;
            if offset != slot.modulation_offset {
                slot.modulation_offset = offset;
                changed = true;
            }

            if changed {
                fx.event(StateEvent::ParameterChanged { index });
            }
        }
        Ok(())
    }

    /// Optimistic local edit: applied now, sent to the host as non-echo
    pub fn set_value(&mut self, index: usize, value: f32, fx: &mut Effects) -> SyncResult<f32> {
        let slot = self.slot_mut(index)?;
        let value = value.clamp(0.0, 1.0);

        slot.value = value;
        if slot.kind.is_discrete() {
            slot.current_value_index = discrete_index(value, slot.discrete_count);
        }

        debug!("🎛️  Param {} ({}) -> {:.3}", index, slot.name, value);
        fx.event(StateEvent::ParameterChanged { index });
        fx.send(ControllerMessage::ParameterValueChange {
            index,
            value,
            is_echo: false,
        });
        Ok(value)
    }

    /// Turn an encoder by `delta` detents and apply the result as a local edit.
    ///
    /// Continuous slots move by `step` per detent; discrete slots move one
    /// value per detent.
    pub fn step_value(
        &mut self,
        index: usize,
        delta: i32,
        step: f32,
        fx: &mut Effects,
    ) -> SyncResult<f32> {
        let count = self.slots.len();
        let slot = self
            .slots
            .get(index)
            .ok_or(SyncError::ParameterOutOfRange { index, count })?;

        let target = if slot.kind.is_discrete() && slot.discrete_count > 1 {
            let max = (slot.discrete_count - 1) as i64;
            let next = (slot.current_value_index as i64 + delta as i64).clamp(0, max);
            next as f32 / max as f32
        } else {
            slot.value + delta as f32 * step
        };

        self.set_value(index, target, fx)
    }

    pub fn set_name(&mut self, index: usize, name: &str, fx: &mut Effects) -> SyncResult<()> {
        let slot = self.slot_mut(index)?;
        slot.name = name.to_string();
        fx.event(StateEvent::ParameterChanged { index });
        Ok(())
    }

    /// Replace the discrete value set; the encoder is reconfigured for the new
    /// step count
    pub fn set_discrete_values(
        &mut self,
        update: &ParameterDiscreteValues,
        fx: &mut Effects,
    ) -> SyncResult<()> {
        let index = update.index;
        let slot = self.slot_mut(index)?;
        slot.discrete_count = update.values.len();
        slot.discrete_values = update.values.clone();
        slot.current_value_index = update
            .current_value_index
            .min(slot.discrete_count.saturating_sub(1));

        fx.surface(Self::encoder_config(index, slot));
        fx.event(StateEvent::ParameterChanged { index });
        Ok(())
    }

    pub fn set_origin(&mut self, index: usize, origin: f32, fx: &mut Effects) -> SyncResult<()> {
        let slot = self.slot_mut(index)?;
        slot.origin = origin;
        fx.surface(Self::encoder_config(index, slot));
        fx.event(StateEvent::ParameterChanged { index });
        Ok(())
    }

    pub fn set_modulated(&mut self, index: usize, modulated: bool, fx: &mut Effects) -> SyncResult<()> {
        let slot = self.slot_mut(index)?;
        slot.is_modulated = modulated;
        if !modulated {
            slot.modulation_offset = 0.0;
        }
        fx.event(StateEvent::ParameterChanged { index });
        Ok(())
    }

    pub fn set_automation(
        &mut self,
        index: usize,
        has_automation: bool,
        fx: &mut Effects,
    ) -> SyncResult<()> {
        let slot = self.slot_mut(index)?;
        slot.has_automation = has_automation;
        fx.event(StateEvent::ParameterChanged { index });
        Ok(())
    }

    /// Encoder grabbed or let go. Only state changes reach the host.
    pub fn touch(&mut self, index: usize, touched: bool, fx: &mut Effects) -> SyncResult<()> {
        let slot = self.slot_mut(index)?;
        if slot.touched == touched {
            return Ok(());
        }
        slot.touched = touched;

        trace!("Param {} touched: {}", index, touched);
        fx.event(StateEvent::ParameterChanged { index });
        fx.send(ControllerMessage::ParameterTouch { index, touched });
        Ok(())
    }

    /// Hand every slot back to its automation
    pub fn restore_automation(&mut self, fx: &mut Effects) {
        info!("🔄 Restoring automation on {} parameters", self.slots.len());
        for index in 0..self.slots.len() {
            fx.send(ControllerMessage::RestoreAutomation { index });
        }
    }

    /// Device switched: every slot waits for its next snapshot
    pub fn mark_all_loading(&mut self, fx: &mut Effects) {
        for slot in &mut self.slots {
            slot.loading = true;
        }
        fx.event(StateEvent::ParametersReset);
    }

    /// Back to defaults, e.g. after the host disconnected
    pub fn reset(&mut self, fx: &mut Effects) {
        for slot in &mut self.slots {
            *slot = ParameterSlot::default();
        }
        fx.event(StateEvent::ParametersReset);
    }
}
