//! Capacity unit arithmetic.
//!
//! One read unit covers 4 KB read with strong consistency; an eventually
//! consistent read costs half. One write unit covers 1 KB written.

use super::item::{item_size, Item};
use super::types::Consistency;

pub const READ_UNIT_BYTES: usize = 4 * 1024;
pub const WRITE_UNIT_BYTES: usize = 1024;

/// Units charged for reading `bytes` in one request.
pub fn read_units(bytes: usize, consistency: Consistency) -> f64 {
    let units = bytes.div_ceil(READ_UNIT_BYTES).max(1) as f64;
    match consistency {
        Consistency::Strong => units,
        Consistency::Eventual => units / 2.0,
    }
}

/// Units charged for reading every item of `items` in one request.
pub fn read_units_for<'a>(items: impl IntoIterator<Item = &'a Item>, consistency: Consistency) -> f64 {
    read_units(items.into_iter().map(item_size).sum(), consistency)
}

/// Units charged for writing (or deleting) an item of `bytes`.
pub fn write_units(bytes: usize) -> f64 {
    bytes.div_ceil(WRITE_UNIT_BYTES).max(1) as f64
}
