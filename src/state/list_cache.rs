//! Paginated list cache
//!
//! Holds one partially-loaded list (devices, pages or tracks). The host sends
//! the list in bounded windows; the cache stitches them together, keeps the
//! cursor stable across late prefetch responses and decides when the next
//! window should be requested.
//!
//! The cache never talks to the transport itself. Operations that want more
//! data return the window offset to request and the owner queues it.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::index::{is_back_entry, should_prefetch, to_display_index, to_raw_index, wrap_index};
use super::ListKind;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{ItemStateChanged, ListWindow, WireItem};

/// Attribute flags carried by every list item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFlags {
    pub enabled: bool,
    pub muted: bool,
    pub soloed: bool,
    /// Item has children the user can dive into
    pub expandable: bool,
}

/// A host item stored at its display position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub absolute_index: usize,
    pub name: String,
    pub type_tag: String,
    pub flags: ItemFlags,
}

/// One populated display row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    /// Synthetic "go to parent" row of a nested list
    Back,
    Item(ListItem),
}

impl ListEntry {
    pub fn item(&self) -> Option<&ListItem> {
        match self {
            ListEntry::Item(item) => Some(item),
            ListEntry::Back => None,
        }
    }
}

/// What the cursor currently points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Back,
    Item(usize),
}

/// Snapshot of one list as seen by the renderer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListState {
    /// Host item count (excluding the back entry)
    pub total_count: usize,
    /// Raw indices below this value are populated
    pub loaded_up_to: usize,
    /// Display-indexed rows; `None` for rows not loaded yet
    pub items: Vec<Option<ListEntry>>,
    /// Cursor, in display space
    pub current_index: usize,
    /// Host's active item, in raw space
    pub active_index: usize,
    pub is_nested: bool,
}

impl ListState {
    /// Number of navigable rows, back entry included
    pub fn display_len(&self) -> usize {
        self.items.len()
    }

    pub fn entry(&self, display: usize) -> Option<&ListEntry> {
        self.items.get(display).and_then(|e| e.as_ref())
    }

    /// Whether every host item has arrived
    pub fn is_complete(&self) -> bool {
        self.loaded_up_to >= self.total_count
    }
}

/// Result of applying one window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowOutcome {
    /// Number of items written
    pub written: usize,
    /// Items skipped for falling outside storage
    pub skipped: usize,
    /// Next window to request, if any
    pub prefetch: Option<usize>,
}

/// Result of a cursor move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOutcome {
    pub index: usize,
    pub prefetch: Option<usize>,
}

/// Cache for a single list kind
#[derive(Debug, Clone)]
pub struct ListCache {
    kind: ListKind,
    /// Maximum number of display rows held in memory
    capacity: usize,
    state: ListState,
    /// Offset of the window request currently in flight
    in_flight: Option<usize>,
    /// Set after the list was cleared; windows not starting at 0 are stale
    /// until the first one arrives
    awaiting_first_window: bool,
}

impl ListCache {
    pub fn new(kind: ListKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity: capacity.max(1),
            state: ListState::default(),
            in_flight: None,
            awaiting_first_window: false,
        }
    }

    pub fn kind(&self) -> ListKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn in_flight(&self) -> Option<usize> {
        self.in_flight
    }

    /// Whether anything has been received since the last reset
    pub fn has_loaded(&self) -> bool {
        !self.state.items.is_empty()
    }

    /// Apply a window response from the host.
    ///
    /// Items outside storage are skipped individually. A window that does not
    /// start at 0 while the cache waits for a fresh first window is dropped
    /// whole: it belongs to a list that no longer exists. A later window
    /// starting at or past the known item count is rejected and leaves the
    /// cache untouched.
    pub fn apply_window(&mut self, window: &ListWindow) -> SyncResult<WindowOutcome> {
        let start = window.start_index;

        if start > 0 && self.awaiting_first_window {
            debug!(
                "Dropping stale {} window at {} (waiting for first window)",
                self.kind, start
            );
            return Ok(WindowOutcome::default());
        }

        if start > 0 && start >= self.state.total_count {
            return Err(SyncError::ListIndexOutOfRange {
                kind: self.kind,
                index: start,
                len: self.state.total_count,
            });
        }

        if self.in_flight == Some(start) {
            self.in_flight = None;
        }

        let nested = window.is_nested;

        if start == 0 {
            self.awaiting_first_window = false;
            self.in_flight = None;

            let nest = usize::from(nested);
            let total = window.total_count.min(self.capacity.saturating_sub(nest));
            if total < window.total_count {
                warn!(
                    "⚠️  {} list holds {} items, keeping first {} (capacity {})",
                    self.kind, window.total_count, total, self.capacity
                );
            }

            // Resize truncates rows left over from a longer list
            self.state.items.clear();
            self.state.items.resize(total + nest, None);
            self.state.total_count = total;
            self.state.loaded_up_to = 0;
            self.state.is_nested = nested;
        } else if nested != self.state.is_nested {
            // Indices computed under the other layout cannot be reused
            debug!(
                "Dropping {} window at {}: nesting changed without a first window",
                self.kind, start
            );
            return Ok(WindowOutcome::default());
        }

        let loaded_before = self.state.loaded_up_to;
        let mut outcome = WindowOutcome::default();
        let mut received = 0;

        for (offset, wire) in window.items.iter().enumerate() {
            if wire.name.is_empty() {
                break;
            }
            received = offset + 1;

            let absolute = match start.checked_add(offset) {
                Some(absolute) if absolute < self.state.total_count => absolute,
                _ => {
                    outcome.skipped += 1;
                    continue;
                }
            };
            let display = to_display_index(absolute, nested);
            if display >= self.state.items.len() {
                outcome.skipped += 1;
                continue;
            }

            self.state.items[display] = Some(ListEntry::Item(Self::item_from_wire(absolute, wire)));
            outcome.written += 1;
        }

        if nested && start == 0 && !self.state.items.is_empty() {
            self.state.items[0] = Some(ListEntry::Back);
        }

        let window_end = start.saturating_add(received).min(self.state.total_count);
        // A window that starts past the loaded edge would leave a hole
        if start <= self.state.loaded_up_to {
            self.state.loaded_up_to = self.state.loaded_up_to.max(window_end);
        } else {
            debug!(
                "{} window at {} leaves a gap after {}",
                self.kind, start, self.state.loaded_up_to
            );
        }

        if start == 0 {
            let len = self.state.display_len();
            self.state.active_index = window.current_index.min(self.state.total_count.saturating_sub(1));
            self.state.current_index = if len == 0 {
                0
            } else {
                to_display_index(self.state.active_index, nested).min(len - 1)
            };
        }

        trace!(
            "{} window {}..{} applied: loaded {}/{}",
            self.kind,
            start,
            window_end,
            self.state.loaded_up_to,
            self.state.total_count
        );

        let progressed = self.state.loaded_up_to > loaded_before;
        outcome.prefetch = self.auto_prefetch(progressed);
        Ok(outcome)
    }

    /// Follow-up request after a window: chase the host's active item until it
    /// is loaded. A window that added nothing ends the chase.
    fn auto_prefetch(&mut self, progressed: bool) -> Option<usize> {
        let state = &self.state;
        let active_missing =
            state.active_index >= state.loaded_up_to && state.loaded_up_to < state.total_count;

        if active_missing && progressed {
            self.request_next()
        } else {
            None
        }
    }

    /// Move the cursor by `delta` rows, wrapping at both ends
    pub fn navigate(&mut self, delta: i32, threshold: usize) -> SyncResult<NavigateOutcome> {
        let len = self.state.display_len();
        if len == 0 {
            return Err(SyncError::EmptyList { kind: self.kind });
        }

        let index = wrap_index(self.state.current_index as i64 + delta as i64, len);
        self.state.current_index = index;

        let prefetch = match to_raw_index(index, self.state.is_nested) {
            Some(raw)
                if should_prefetch(raw, self.state.loaded_up_to, self.state.total_count, threshold) =>
            {
                self.request_next()
            }
            _ => None,
        };

        Ok(NavigateOutcome { index, prefetch })
    }

    /// Offset of the next window, unless that request is already in flight
    fn request_next(&mut self) -> Option<usize> {
        if self.state.loaded_up_to >= self.state.total_count {
            return None;
        }
        let offset = self.state.loaded_up_to;
        if self.in_flight == Some(offset) {
            return None;
        }
        self.in_flight = Some(offset);
        Some(offset)
    }

    /// What the cursor points at, if that row is known
    pub fn selection(&self) -> Option<Selection> {
        let display = self.state.current_index;
        if display >= self.state.display_len() {
            return None;
        }
        if is_back_entry(display, self.state.is_nested) {
            return Some(Selection::Back);
        }
        to_raw_index(display, self.state.is_nested).map(Selection::Item)
    }

    /// Loaded item under the cursor
    pub fn selected_item(&self) -> Option<&ListItem> {
        self.state
            .entry(self.state.current_index)
            .and_then(ListEntry::item)
    }

    /// Record the host's active item after a confirmed selection
    pub fn set_active(&mut self, raw: usize) {
        self.state.active_index = raw;
    }

    /// Forget everything and mark that window 0 has been requested.
    ///
    /// Used when the owning entity changes: rows of the previous list must
    /// not survive.
    pub fn begin_refresh(&mut self) -> usize {
        self.state = ListState::default();
        self.awaiting_first_window = true;
        self.in_flight = Some(0);
        0
    }

    /// Re-request window 0 while keeping current rows on screen
    pub fn request_first_window(&mut self) -> usize {
        self.in_flight = Some(0);
        0
    }

    /// Back to the empty state, e.g. after the host went away
    pub fn reset(&mut self) {
        self.state = ListState::default();
        self.in_flight = None;
        self.awaiting_first_window = false;
    }

    /// Update attributes of one loaded item
    pub fn update_item_state(&mut self, change: &ItemStateChanged) -> SyncResult<()> {
        let out_of_range = SyncError::ListIndexOutOfRange {
            kind: self.kind,
            index: change.index,
            len: self.state.total_count,
        };
        if change.index >= self.state.total_count {
            return Err(out_of_range);
        }

        let display = to_display_index(change.index, self.state.is_nested);
        let item = match self.state.items.get_mut(display) {
            Some(Some(ListEntry::Item(item))) => item,
            _ => return Err(out_of_range),
        };

        if let Some(enabled) = change.enabled {
            item.flags.enabled = enabled;
        }
        if let Some(muted) = change.muted {
            item.flags.muted = muted;
        }
        if let Some(soloed) = change.soloed {
            item.flags.soloed = soloed;
        }
        Ok(())
    }

    fn item_from_wire(absolute_index: usize, wire: &WireItem) -> ListItem {
        ListItem {
            absolute_index,
            name: wire.name.clone(),
            type_tag: wire.type_tag.clone(),
            flags: ItemFlags {
                enabled: wire.enabled,
                muted: wire.muted,
                soloed: wire.soloed,
                expandable: wire.expandable,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn window(start: usize, count: usize, total: usize, nested: bool, current: usize) -> ListWindow {
        ListWindow {
            kind: ListKind::Devices,
            start_index: start,
            items: (start..start + count)
                .map(|i| WireItem::named(format!("Item {}", i)))
                .collect(),
            total_count: total,
            is_nested: nested,
            current_index: current,
        }
    }

    #[test]
    fn test_first_window_populates_prefix() {
        let mut cache = ListCache::new(ListKind::Devices, 128);
        let outcome = cache.apply_window(&window(0, 12, 50, false, 0)).unwrap();

        assert_eq!(outcome.written, 12);
        assert_eq!(outcome.prefetch, None);
        let state = cache.state();
        assert_eq!(state.total_count, 50);
        assert_eq!(state.loaded_up_to, 12);
        assert_eq!(state.display_len(), 50);
        assert!(state.items[..12].iter().all(|e| e.is_some()));
        assert!(state.items[12..].iter().all(|e| e.is_none()));
    }

    #[test]
    fn test_navigation_prefetch_fires_once() {
        let mut cache = ListCache::new(ListKind::Devices, 128);
        cache.apply_window(&window(0, 12, 50, false, 0)).unwrap();

        let nav = cache.navigate(40, 4).unwrap();
        assert_eq!(nav.index, 40);
        assert_eq!(nav.prefetch, Some(12));

        // Same request still in flight
        let nav = cache.navigate(1, 4).unwrap();
        assert_eq!(nav.prefetch, None);
    }

    #[test]
    fn test_prefetch_chain_reaches_total() {
        let mut cache = ListCache::new(ListKind::Devices, 128);
        cache.apply_window(&window(0, 12, 50, false, 0)).unwrap();

        // One request per navigation; the window reply does not chase the cursor
        let nav = cache.navigate(40, 4).unwrap();
        assert_eq!(nav.prefetch, Some(12));
        let outcome = cache.apply_window(&window(12, 12, 50, false, 0)).unwrap();
        assert_eq!(outcome.prefetch, None);
        assert_eq!(cache.state().loaded_up_to, 24);
        assert_eq!(cache.state().current_index, 40);

        let mut requests = vec![12];
        while !cache.state().is_complete() {
            let offset = cache.navigate(1, 4).unwrap().prefetch.unwrap();
            requests.push(offset);
            let count = 12.min(50 - offset);
            let outcome = cache.apply_window(&window(offset, count, 50, false, 0)).unwrap();
            assert_eq!(outcome.prefetch, None);
        }

        assert_eq!(requests, vec![12, 24, 36, 48]);
        assert_eq!(cache.state().loaded_up_to, 50);
        assert_eq!(cache.state().current_index, 43);
        assert!(cache.state().items.iter().all(|e| e.is_some()));
    }

    #[test]
    fn test_empty_window_ends_active_chase() {
        let mut cache = ListCache::new(ListKind::Devices, 128);
        let outcome = cache.apply_window(&window(0, 12, 50, false, 30)).unwrap();
        assert_eq!(outcome.prefetch, Some(12));

        // Host answers with nothing: no request loop
        let outcome = cache.apply_window(&window(12, 0, 50, false, 0)).unwrap();
        assert_eq!(outcome.written, 0);
        assert_eq!(outcome.prefetch, None);
        assert_eq!(cache.in_flight(), None);
        assert_eq!(cache.state().loaded_up_to, 12);

        let outcome = cache.apply_window(&window(0, 0, 50, false, 30)).unwrap();
        assert_eq!(outcome.prefetch, None);
    }

    #[test]
    fn test_window_start_at_usize_max_rejected() {
        let mut cache = ListCache::new(ListKind::Devices, 128);
        cache.apply_window(&window(0, 12, 50, true, 0)).unwrap();
        let before = cache.state().clone();

        let mut hostile = window(0, 4, 50, true, 0);
        hostile.start_index = usize::MAX;
        assert_eq!(
            cache.apply_window(&hostile),
            Err(SyncError::ListIndexOutOfRange {
                kind: ListKind::Devices,
                index: usize::MAX,
                len: 50,
            })
        );
        assert_eq!(cache.state(), &before);
    }

    #[test]
    fn test_window_past_total_leaves_state_unchanged() {
        let mut cache = ListCache::new(ListKind::Devices, 16);
        cache.apply_window(&window(0, 8, 40, false, 0)).unwrap();
        let before = cache.state().clone();
        assert_eq!(before.total_count, 16);

        // Past the clamped total and past the original total
        assert!(cache.apply_window(&window(16, 4, 40, false, 0)).is_err());
        assert!(cache.apply_window(&window(60, 4, 40, false, 0)).is_err());
        assert_eq!(cache.state(), &before);

        // A window before any list arrived has nothing to land in
        let mut fresh = ListCache::new(ListKind::Pages, 16);
        assert!(fresh.apply_window(&window(4, 4, 8, false, 0)).is_err());
        assert!(!fresh.has_loaded());
    }

    #[test]
    fn test_window_overlapping_end_skips_tail() {
        let mut cache = ListCache::new(ListKind::Tracks, 64);
        cache.apply_window(&window(0, 8, 10, false, 0)).unwrap();

        let outcome = cache.apply_window(&window(8, 6, 10, false, 0)).unwrap();
        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.skipped, 4);
        assert_eq!(cache.state().loaded_up_to, 10);
        assert_eq!(cache.state().display_len(), 10);
    }

    #[test]
    fn test_late_window_keeps_cursor() {
        let mut cache = ListCache::new(ListKind::Devices, 128);
        cache.apply_window(&window(0, 12, 50, false, 3)).unwrap();
        cache.navigate(5, 4).unwrap();
        assert_eq!(cache.state().current_index, 8);

        // Later window carries a different current index; it must be ignored
        cache.apply_window(&window(12, 12, 50, false, 30)).unwrap();
        assert_eq!(cache.state().current_index, 8);
        assert_eq!(cache.state().active_index, 3);
    }

    #[test]
    fn test_shrink_truncates_stale_rows() {
        let mut cache = ListCache::new(ListKind::Tracks, 128);
        cache.apply_window(&window(0, 100, 100, false, 0)).unwrap();
        assert_eq!(cache.state().loaded_up_to, 100);

        cache.apply_window(&window(0, 10, 10, false, 0)).unwrap();
        let state = cache.state();
        assert_eq!(state.display_len(), 10);
        assert_eq!(state.loaded_up_to, 10);
        assert!(state.entry(10).is_none());
        assert!(state.items.iter().all(|e| e.is_some()));
    }

    #[test]
    fn test_nested_window_inserts_back_entry() {
        let mut cache = ListCache::new(ListKind::Tracks, 128);
        cache.apply_window(&window(0, 3, 3, true, 1)).unwrap();

        let state = cache.state();
        assert_eq!(state.display_len(), 4);
        assert_eq!(state.entry(0), Some(&ListEntry::Back));
        assert_eq!(state.entry(1).and_then(|e| e.item()).map(|i| i.absolute_index), Some(0));
        assert_eq!(state.current_index, 2);
        assert_eq!(cache.selection(), Some(Selection::Item(1)));

        cache.navigate(-2, 4).unwrap();
        assert_eq!(cache.selection(), Some(Selection::Back));
    }

    #[test]
    fn test_items_stop_at_empty_name() {
        let mut cache = ListCache::new(ListKind::Pages, 64);
        let mut w = window(0, 8, 8, false, 0);
        w.items[5].name.clear();
        let outcome = cache.apply_window(&w).unwrap();

        assert_eq!(outcome.written, 5);
        assert_eq!(cache.state().loaded_up_to, 5);
        assert_eq!(outcome.prefetch, None);

        // Moving towards the gap asks for the rest
        let nav = cache.navigate(2, 4).unwrap();
        assert_eq!(nav.prefetch, Some(5));
    }

    #[test]
    fn test_capacity_clamps_list() {
        let mut cache = ListCache::new(ListKind::Devices, 16);
        let outcome = cache.apply_window(&window(0, 20, 40, false, 0)).unwrap();

        assert_eq!(cache.state().total_count, 16);
        assert_eq!(cache.state().display_len(), 16);
        assert_eq!(outcome.written, 16);
        assert_eq!(outcome.skipped, 4);
        assert!(cache.state().is_complete());
    }

    #[test]
    fn test_active_index_beyond_window_prefetches() {
        let mut cache = ListCache::new(ListKind::Devices, 128);
        let outcome = cache.apply_window(&window(0, 12, 50, false, 30)).unwrap();
        assert_eq!(outcome.prefetch, Some(12));
        assert_eq!(cache.state().current_index, 30);
    }

    #[test]
    fn test_stale_window_dropped_after_refresh() {
        let mut cache = ListCache::new(ListKind::Pages, 64);
        cache.apply_window(&window(0, 8, 20, false, 0)).unwrap();
        cache.begin_refresh();

        let outcome = cache.apply_window(&window(8, 8, 20, false, 0)).unwrap();
        assert_eq!(outcome.written, 0);
        assert!(!cache.has_loaded());

        cache.apply_window(&window(0, 4, 4, false, 0)).unwrap();
        assert_eq!(cache.state().total_count, 4);
    }

    #[test]
    fn test_navigate_empty_list_errors() {
        let mut cache = ListCache::new(ListKind::Devices, 8);
        assert_eq!(
            cache.navigate(1, 4),
            Err(SyncError::EmptyList { kind: ListKind::Devices })
        );
    }

    #[test]
    fn test_item_state_update() {
        let mut cache = ListCache::new(ListKind::Tracks, 32);
        cache.apply_window(&window(0, 4, 4, false, 0)).unwrap();

        let change = ItemStateChanged {
            kind: ListKind::Tracks,
            index: 2,
            enabled: None,
            muted: Some(true),
            soloed: None,
        };
        cache.update_item_state(&change).unwrap();
        let item = cache.state().entry(2).and_then(|e| e.item()).unwrap();
        assert!(item.flags.muted);

        let bad = ItemStateChanged { index: 9, ..change };
        assert!(cache.update_item_state(&bad).is_err());
    }

    #[test]
    fn test_nested_item_state_out_of_range_rejected() {
        let mut cache = ListCache::new(ListKind::Tracks, 32);
        cache.apply_window(&window(0, 4, 4, true, 0)).unwrap();
        let before = cache.state().clone();

        for index in [4, usize::MAX - 1, usize::MAX] {
            let change = ItemStateChanged {
                kind: ListKind::Tracks,
                index,
                enabled: Some(false),
                muted: Some(true),
                soloed: Some(true),
            };
            assert_eq!(
                cache.update_item_state(&change),
                Err(SyncError::ListIndexOutOfRange {
                    kind: ListKind::Tracks,
                    index,
                    len: 4,
                })
            );
        }
        assert_eq!(cache.state(), &before);

        // Last item is still reachable through the back-entry shift
        let last = ItemStateChanged {
            kind: ListKind::Tracks,
            index: 3,
            enabled: None,
            muted: Some(true),
            soloed: None,
        };
        cache.update_item_state(&last).unwrap();
        assert!(cache.state().entry(4).and_then(|e| e.item()).unwrap().flags.muted);
    }

    proptest! {
        #[test]
        fn prop_navigation_stays_in_range(
            total in 1usize..200,
            nested in any::<bool>(),
            deltas in proptest::collection::vec(-500i32..500, 1..50),
        ) {
            let mut cache = ListCache::new(ListKind::Tracks, 256);
            cache.apply_window(&window(0, total.min(16), total, nested, 0)).unwrap();
            let len = cache.state().display_len();

            for delta in deltas {
                let nav = cache.navigate(delta, 4).unwrap();
                prop_assert!(nav.index < len);
                prop_assert!(cache.state().loaded_up_to <= cache.state().total_count);
            }
        }
    }
}
