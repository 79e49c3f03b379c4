//! Inner chains of an expandable device
//!
//! Diving into a rack or drum rack swaps the device selector over to a short
//! list of the device's chains (slots, layers or drum pads), headed by a back
//! row. The list arrives whole in one message, so unlike [`super::ListCache`]
//! there is no windowing.

use tracing::debug;

use super::index::wrap_index;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{ChildType, DeviceChild, DeviceChildren};

/// Row under the cursor of the children list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSelection {
    /// Row 0: return to the device list
    Back,
    Child { index: usize, child_type: ChildType },
}

/// Children list shown in place of the devices
#[derive(Debug, Clone, Default)]
pub struct ChildBrowser {
    /// Device whose children were last requested, raw index
    pending: Option<usize>,
    /// Device whose children are on screen
    parent: Option<usize>,
    children: Vec<DeviceChild>,
    /// Cursor; row 0 is the back row
    cursor: usize,
}

impl ChildBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_showing(&self) -> bool {
        self.parent.is_some()
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[DeviceChild] {
        &self.children
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Rows on screen, back row included
    pub fn display_len(&self) -> usize {
        self.children.len() + 1
    }

    /// Remember which device the next children message must belong to
    pub fn request(&mut self, device_index: usize) {
        self.pending = Some(device_index);
    }

    /// Show the host's answer. Children of a device nobody asked about are
    /// rejected.
    pub fn apply(&mut self, message: &DeviceChildren) -> SyncResult<()> {
        if self.pending != Some(message.device_index) {
            return Err(SyncError::UnexpectedChildren {
                device_index: message.device_index,
            });
        }

        debug!(
            "Device {}: {} children",
            message.device_index,
            message.children.len()
        );
        self.pending = None;
        self.parent = Some(message.device_index);
        self.children = message.children.clone();
        // First child, not the back row
        self.cursor = usize::from(!self.children.is_empty());
        Ok(())
    }

    /// Move the cursor, wrapping at both ends
    pub fn navigate(&mut self, delta: i32) -> usize {
        self.cursor = wrap_index(self.cursor as i64 + delta as i64, self.display_len());
        self.cursor
    }

    pub fn selection(&self) -> Option<ChildSelection> {
        if !self.is_showing() {
            return None;
        }
        match self.cursor {
            0 => Some(ChildSelection::Back),
            row => self.children.get(row - 1).map(|child| ChildSelection::Child {
                index: row - 1,
                child_type: child.child_type,
            }),
        }
    }

    /// Back to the device list
    pub fn close(&mut self) {
        self.pending = None;
        self.parent = None;
        self.children.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn children(device_index: usize, names: &[&str]) -> DeviceChildren {
        DeviceChildren {
            device_index,
            children: names
                .iter()
                .map(|name| DeviceChild {
                    name: name.to_string(),
                    child_type: ChildType::Drum,
                })
                .collect(),
        }
    }

    #[test]
    fn test_answer_opens_on_first_child() {
        let mut browser = ChildBrowser::new();
        browser.request(4);
        browser.apply(&children(4, &["Kick", "Snare"])).unwrap();

        assert!(browser.is_showing());
        assert_eq!(browser.parent(), Some(4));
        assert_eq!(browser.display_len(), 3);
        assert_eq!(
            browser.selection(),
            Some(ChildSelection::Child {
                index: 0,
                child_type: ChildType::Drum
            })
        );

        browser.navigate(-1);
        assert_eq!(browser.selection(), Some(ChildSelection::Back));
        assert_eq!(browser.navigate(-1), 2);
    }

    #[test]
    fn test_unrequested_children_rejected() {
        let mut browser = ChildBrowser::new();
        assert_eq!(
            browser.apply(&children(1, &["A"])),
            Err(SyncError::UnexpectedChildren { device_index: 1 })
        );

        browser.request(2);
        assert!(browser.apply(&children(3, &["A"])).is_err());
        assert!(!browser.is_showing());
    }

    #[test]
    fn test_empty_children_leave_only_back() {
        let mut browser = ChildBrowser::new();
        browser.request(0);
        browser.apply(&children(0, &[])).unwrap();
        assert_eq!(browser.selection(), Some(ChildSelection::Back));
        assert_eq!(browser.navigate(5), 0);

        browser.close();
        assert_eq!(browser.selection(), None);
    }
}
