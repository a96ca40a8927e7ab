//! Connection slot registry
//!
//! Up to eight controllers are connected at once. Each live connection holds one
//! slot, which selects its player LED pattern. Slots are handed out lowest-first
//! and return to the free list on disconnect.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

/// Number of slots
pub const SLOT_COUNT: usize = 8;

/// Player LED pattern per slot
pub const LED_PATTERNS: [u8; SLOT_COUNT] = [
    0b0001, 0b0011, 0b0111, 0b1111, 0b1001, 0b0101, 0b1101, 0b0110,
];

/// Identity of a live connection
pub type ConnectionId = u64;

/// Registry shared by all connections (the slot coordinator)
pub type SharedRegistry = Arc<Mutex<ConnectionRegistry>>;

/// Create an empty shared registry
pub fn new_shared_registry() -> SharedRegistry {
    Arc::new(Mutex::new(ConnectionRegistry::new()))
}

/// LED pattern for a slot
pub fn led_pattern(slot: u8) -> u8 {
    LED_PATTERNS[usize::from(slot) % SLOT_COUNT]
}

/// Registry error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// All slots are held by live connections
    #[error("all 8 controller slots are in use")]
    Full,
}

/// Fixed slot table with a free list
#[derive(Debug)]
pub struct ConnectionRegistry {
    slots: [Option<ConnectionId>; SLOT_COUNT],
    free: BTreeSet<u8>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            slots: [None; SLOT_COUNT],
            free: (0..SLOT_COUNT as u8).collect(),
        }
    }

    /// Assign the lowest free slot to a connection
    pub fn assign(&mut self, id: ConnectionId) -> Result<u8, RegistryError> {
        if let Some(slot) = self.slot_of(id) {
            return Ok(slot);
        }
        let slot = self.free.pop_first().ok_or(RegistryError::Full)?;
        self.slots[usize::from(slot)] = Some(id);
        tracing::debug!(slot, id, "Slot assigned");
        Ok(slot)
    }

    /// Free a slot for reuse
    pub fn release(&mut self, slot: u8) {
        let Some(entry) = self.slots.get_mut(usize::from(slot)) else {
            return;
        };
        if entry.take().is_some() {
            self.free.insert(slot);
            tracing::debug!(slot, "Slot released");
        }
    }

    /// Free whatever slot a connection holds
    pub fn release_connection(&mut self, id: ConnectionId) -> Option<u8> {
        let slot = self.slot_of(id)?;
        self.release(slot);
        Some(slot)
    }

    /// Slot held by a connection
    pub fn slot_of(&self, id: ConnectionId) -> Option<u8> {
        self.slots
            .iter()
            .position(|entry| *entry == Some(id))
            .map(|slot| slot as u8)
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        SLOT_COUNT - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.len() == SLOT_COUNT
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_in_order_then_full() {
        let mut registry = ConnectionRegistry::new();
        for id in 0..8u64 {
            assert_eq!(registry.assign(100 + id), Ok(id as u8));
        }
        assert_eq!(registry.len(), 8);
        assert_eq!(registry.assign(999), Err(RegistryError::Full));
    }

    #[test]
    fn test_release_reuses_slot() {
        let mut registry = ConnectionRegistry::new();
        for id in 0..8u64 {
            registry.assign(id).unwrap();
        }
        registry.release(3);
        assert_eq!(registry.assign(42), Ok(3));
        assert_eq!(registry.slot_of(42), Some(3));
    }

    #[test]
    fn test_lowest_free_slot_first() {
        let mut registry = ConnectionRegistry::new();
        for id in 0..5u64 {
            registry.assign(id).unwrap();
        }
        registry.release(4);
        registry.release(1);
        assert_eq!(registry.assign(10), Ok(1));
        assert_eq!(registry.assign(11), Ok(4));
        assert_eq!(registry.assign(12), Ok(5));
    }

    #[test]
    fn test_assign_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        assert_eq!(registry.assign(7), Ok(0));
        assert_eq!(registry.assign(7), Ok(0));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_release_connection() {
        let mut registry = ConnectionRegistry::new();
        registry.assign(1).unwrap();
        registry.assign(2).unwrap();
        assert_eq!(registry.release_connection(1), Some(0));
        assert_eq!(registry.release_connection(1), None);
        assert_eq!(registry.assign(3), Ok(0));
    }

    #[test]
    fn test_release_unknown_slot_is_noop() {
        let mut registry = ConnectionRegistry::new();
        registry.release(5);
        registry.release(200);
        assert!(registry.is_empty());
        assert_eq!(registry.assign(1), Ok(0));
    }

    #[test]
    fn test_led_patterns() {
        assert_eq!(led_pattern(0), 0b0001);
        assert_eq!(led_pattern(3), 0b1111);
        assert_eq!(led_pattern(7), 0b0110);
    }
}
