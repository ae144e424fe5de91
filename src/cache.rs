//! Style Cache — the one cached-property helper behind every string getter.
//!
//! Each slot holds at most one foreign-allocated value. A refresh releases
//! the old value before the host is queried for the new one, so a slot never
//! owns two allocations for the same property.

use crate::bridge::ForeignString;
use crate::error::BridgeError;
use crate::types::StyleProperty;

#[derive(Debug, Default)]
pub(crate) struct StyleCache {
    slots: [Option<ForeignString>; StyleProperty::COUNT],
}

impl StyleCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Drop the cached value for `prop`, fetch a fresh one, and install it.
    /// On a failed fetch the slot stays empty.
    pub(crate) fn refresh<F>(
        &mut self,
        prop: StyleProperty,
        fetch: F,
    ) -> Result<&ForeignString, BridgeError>
    where
        F: FnOnce() -> Result<ForeignString, BridgeError>,
    {
        let slot = &mut self.slots[prop.index()];
        drop(slot.take());
        let fresh = fetch()?;
        Ok(slot.insert(fresh))
    }

    /// Last fetched value, without a round trip.
    pub(crate) fn peek(&self, prop: StyleProperty) -> Option<&ForeignString> {
        self.slots[prop.index()].as_ref()
    }

    /// Number of slots currently holding a value.
    pub(crate) fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
