//! Raw ↔ display index mapping for nested lists
//!
//! A nested list (e.g. tracks inside a group) shows a synthetic "back" entry
//! at display index 0, shifting every host item down by one.

/// Convert a host (raw) index into the index shown on screen.
///
/// Saturates at `usize::MAX`; callers range-check host indices first.
#[inline]
pub fn to_display_index(raw: usize, nested: bool) -> usize {
    if nested {
        raw.saturating_add(1)
    } else {
        raw
    }
}

/// Convert a display index back to the host index.
///
/// Returns `None` for the back entry of a nested list, which has no host
/// counterpart.
#[inline]
pub fn to_raw_index(display: usize, nested: bool) -> Option<usize> {
    if nested {
        display.checked_sub(1)
    } else {
        Some(display)
    }
}

/// Whether `display` is the synthetic back entry of a nested list
#[inline]
pub fn is_back_entry(display: usize, nested: bool) -> bool {
    nested && display == 0
}

/// Circular wrap of a signed position into `[0, len)`.
///
/// `len` must be non-zero.
#[inline]
pub fn wrap_index(value: i64, len: usize) -> usize {
    let m = len as i64;
    (((value % m) + m) % m) as usize
}

/// Whether navigating to raw index `raw` should pull the next window.
///
/// True when more data remains and the cursor is within `threshold` items of
/// the loaded boundary (or already past it).
#[inline]
pub fn should_prefetch(raw: usize, loaded_up_to: usize, total: usize, threshold: usize) -> bool {
    loaded_up_to < total && raw.saturating_add(threshold) >= loaded_up_to
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_back_entry_has_no_raw_index() {
        assert_eq!(to_raw_index(0, true), None);
        assert_eq!(to_raw_index(0, false), Some(0));
        assert!(is_back_entry(0, true));
        assert!(!is_back_entry(0, false));
        assert!(!is_back_entry(1, true));
    }

    #[test]
    fn test_wrap_index_negative() {
        assert_eq!(wrap_index(-1, 5), 4);
        assert_eq!(wrap_index(-11, 5), 4);
        assert_eq!(wrap_index(5, 5), 0);
        assert_eq!(wrap_index(7, 5), 2);
    }

    #[test]
    fn test_should_prefetch_boundary() {
        // 12 loaded of 50, threshold 4: index 8 reaches the boundary
        assert!(!should_prefetch(7, 12, 50, 4));
        assert!(should_prefetch(8, 12, 50, 4));
        assert!(should_prefetch(40, 12, 50, 4));
        // Fully loaded lists never prefetch
        assert!(!should_prefetch(49, 50, 50, 4));
    }

    #[test]
    fn test_extreme_indices_do_not_overflow() {
        assert_eq!(to_display_index(usize::MAX, true), usize::MAX);
        assert!(should_prefetch(usize::MAX, 12, 50, 4));
    }

    proptest! {
        #[test]
        fn prop_display_raw_round_trip(raw in 0usize..100_000, nested in any::<bool>()) {
            prop_assert_eq!(to_raw_index(to_display_index(raw, nested), nested), Some(raw));
        }

        #[test]
        fn prop_wrap_stays_in_range(value in any::<i32>(), len in 1usize..10_000) {
            let idx = wrap_index(value as i64, len);
            prop_assert!(idx < len);
        }
    }
}
