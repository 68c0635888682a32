//! Page size budgeting.
//!
//! Pages are sized once, when they are created, from the encoded size of
//! the value that triggered the rollover:
//!
//! ```text
//! slots   = floor((page_size - header) / (timestamp + value_size))
//! padding = page_size - header - slots * timestamp
//! ```
//!
//! A fresh page stores empty slots (timestamp overhead only) plus
//! `padding` bytes, so its estimated size equals `page_size` exactly. The
//! padding is dropped on the first slot write, when real values start
//! occupying the reserved space.

use crate::config::PageLayout;
use crate::error::{PageError, Result};

/// Returns how many slots of `value_size` bytes fit in a page.
///
/// # Errors
///
/// Returns [`PageError::ValueTooLarge`] if fewer than one slot fits.
///
/// # Examples
///
/// ```rust
/// use folio::budget::capacity;
///
/// assert_eq!(capacity(4096, 110, 66, 1).unwrap(), 59);
/// assert!(capacity(256, 110, 66, 200).is_err());
/// ```
pub fn capacity(
    page_size: usize,
    header_overhead: usize,
    timestamp_overhead: usize,
    value_size: usize,
) -> Result<usize> {
    let too_large = || PageError::ValueTooLarge {
        value_size,
        page_size,
    };

    let available = page_size
        .checked_sub(header_overhead)
        .ok_or_else(too_large)?;
    let per_slot = timestamp_overhead.saturating_add(value_size);
    if per_slot == 0 {
        return Err(too_large().into());
    }

    let slots = available / per_slot;
    if slots < 1 {
        return Err(too_large().into());
    }
    Ok(slots)
}

/// Computes the slot capacity of a page under `layout`.
///
/// # Errors
///
/// Returns [`PageError::ValueTooLarge`] if fewer than one slot fits.
pub fn page_capacity(page_size: usize, layout: &PageLayout, value_size: usize) -> Result<usize> {
    capacity(
        page_size,
        layout.header_overhead,
        layout.timestamp_overhead,
        value_size,
    )
}

/// Number of padding bytes a fresh page of `slots` slots carries.
pub fn initial_padding(page_size: usize, layout: &PageLayout, slots: usize) -> usize {
    page_size
        .saturating_sub(layout.header_overhead)
        .saturating_sub(slots.saturating_mul(layout.timestamp_overhead))
}
