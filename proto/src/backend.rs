use std::collections::HashMap;

use crate::AesKey;

/// Hardware AES key slot. Slots are named constants handed to [`KeyStorage`] explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeySlotId(pub u8);

impl KeySlotId {
    /// Slot whose normal key seeds UDS data-frame key derivation.
    pub const UDS_DATA_KEY: KeySlotId = KeySlotId(0x2D);
}

/// Secure key storage abstraction yielding the normal key of a hardware slot.
pub trait KeyStorage {
    /// Normal key for `slot`. Unprovisioned slots yield whatever the hardware would (all zero).
    fn normal_key(&self, slot: KeySlotId) -> AesKey;
}

/// Key storage backed by a map of provisioned slots.
#[derive(Clone, Debug, Default)]
pub struct InMemoryKeyStorage {
    keys: HashMap<KeySlotId, AesKey>,
}

impl InMemoryKeyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, slot: KeySlotId, key: AesKey) -> Self {
        self.keys.insert(slot, key);
        self
    }

    pub fn insert(&mut self, slot: KeySlotId, key: AesKey) {
        self.keys.insert(slot, key);
    }

    pub fn is_provisioned(&self, slot: KeySlotId) -> bool {
        self.keys.contains_key(&slot)
    }
}

impl KeyStorage for InMemoryKeyStorage {
    fn normal_key(&self, slot: KeySlotId) -> AesKey {
        match self.keys.get(&slot) {
            Some(key) => *key,
            None => {
                tracing::warn!(slot = slot.0, "normal key not provisioned, using zero key");
                AesKey::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisioned_slot_returns_key() {
        let storage = InMemoryKeyStorage::new().with_key(KeySlotId::UDS_DATA_KEY, [0x5A; 16]);
        assert!(storage.is_provisioned(KeySlotId::UDS_DATA_KEY));
        assert_eq!(storage.normal_key(KeySlotId::UDS_DATA_KEY), [0x5A; 16]);
    }

    #[test]
    fn unprovisioned_slot_is_zero() {
        let mut storage = InMemoryKeyStorage::new();
        storage.insert(KeySlotId(0x2C), [1; 16]);
        assert!(!storage.is_provisioned(KeySlotId::UDS_DATA_KEY));
        assert_eq!(storage.normal_key(KeySlotId::UDS_DATA_KEY), [0; 16]);
    }
}
