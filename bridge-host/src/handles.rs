//! Handle table.
//!
//! Maps opaque `u32` ids to host objects. Freed ids go on a LIFO free
//! list and are handed out again before the table grows.

use alloc::vec::Vec;

use crate::error::{BridgeError, BridgeResult};
use crate::object::ObjectRef;

/// Handle table statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleStats {
    /// Occupied slots.
    pub live: usize,
    /// Slots waiting for reuse.
    pub free: usize,
    /// Total slots ever created.
    pub capacity: usize,
}

/// Reuse-aware slot allocator for host objects.
#[derive(Debug, Default)]
pub struct HandleTable {
    /// Slot storage; `None` marks a free slot.
    slots: Vec<Option<ObjectRef>>,
    /// Reclaimed slot ids, most recent last.
    free: Vec<u32>,
}

impl HandleTable {
    /// Create an empty table.
    pub fn new() -> Self {
        HandleTable::default()
    }

    /// Store `object` and return its id.
    pub fn allocate(&mut self, object: ObjectRef) -> u32 {
        if let Some(id) = self.free.pop() {
            self.slots[id as usize] = Some(object);
            log::debug!("handle {} reused", id);
            return id;
        }
        let id = self.slots.len() as u32;
        self.slots.push(Some(object));
        log::debug!("handle {} allocated", id);
        id
    }

    /// Release `id`, returning the object it held.
    ///
    /// Releasing a free id reports `DoubleRelease`; an id that was never
    /// minted reports `InvalidHandle`. Neither touches the free list.
    pub fn release(&mut self, id: u32) -> BridgeResult<ObjectRef> {
        let slot = self
            .slots
            .get_mut(id as usize)
            .ok_or(BridgeError::InvalidHandle(id))?;
        match slot.take() {
            Some(object) => {
                self.free.push(id);
                log::debug!("handle {} released", id);
                Ok(object)
            }
            None => {
                log::warn!("handle {} released twice", id);
                Err(BridgeError::DoubleRelease(id))
            }
        }
    }

    /// Look up the object behind `id`.
    pub fn resolve(&self, id: u32) -> BridgeResult<ObjectRef> {
        self.slots
            .get(id as usize)
            .and_then(|slot| slot.clone())
            .ok_or(BridgeError::InvalidHandle(id))
    }

    /// Check whether `id` is currently occupied.
    pub fn contains(&self, id: u32) -> bool {
        matches!(self.slots.get(id as usize), Some(Some(_)))
    }

    /// Find the live id holding `object`, if any.
    pub fn find(&self, object: &ObjectRef) -> Option<u32> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref() == Some(object))
            .map(|i| i as u32)
    }

    /// Number of occupied slots.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Get table statistics.
    pub fn stats(&self) -> HandleStats {
        HandleStats {
            live: self.live_count(),
            free: self.free.len(),
            capacity: self.slots.len(),
        }
    }
}
