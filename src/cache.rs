//! Per-read decision between cached state, a live query, or identity only.

use crate::types::DeviceEntry;

/// What a read should do with a stored entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// Return the identity without state; the stored entry is untouched
    Strip,

    /// Return the stored entry as is
    Serve,

    /// Query the device and store the outcome
    Query,
}

/// Decide how to answer a read of `entry`.
///
/// Only a successfully queried state counts as cached; an error entry is
/// queried again even when `use_cache` is set.
pub fn plan(entry: &DeviceEntry, include_state: bool, use_cache: bool) -> CacheDecision {
    if !include_state {
        CacheDecision::Strip
    } else if use_cache && entry.state().is_some() {
        CacheDecision::Serve
    } else {
        CacheDecision::Query
    }
}
