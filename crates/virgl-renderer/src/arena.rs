//! Guest handle tables.
//!
//! Guest handles are arbitrary non-zero `u32`s. Each one resolves to a slot
//! plus the generation the slot had when the handle was inserted; removing a
//! value bumps the slot generation so keys captured earlier stop resolving.

use std::collections::HashMap;

use virgl_core::Handle;

/// Slot and generation a handle resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Key {
    slot: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<(Handle, T)>,
}

#[derive(Debug)]
pub(crate) struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    index: HashMap<Handle, Key>,
    free: Vec<u32>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            free: Vec::new(),
        }
    }

    /// Insert `value` under `handle`. Handle 0 and handles already in use are
    /// refused and the value is handed back.
    pub(crate) fn insert(&mut self, handle: Handle, value: T) -> Result<Key, T> {
        if handle == 0 || self.index.contains_key(&handle) {
            return Err(value);
        }
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let entry = &mut self.slots[slot as usize];
        entry.value = Some((handle, value));
        let key = Key {
            slot,
            generation: entry.generation,
        };
        self.index.insert(handle, key);
        Ok(key)
    }

    pub(crate) fn key(&self, handle: Handle) -> Option<Key> {
        self.index.get(&handle).copied()
    }

    pub(crate) fn get_key(&self, key: Key) -> Option<&T> {
        let slot = self.slots.get(key.slot as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.value.as_ref().map(|(_, v)| v)
    }

    pub(crate) fn get(&self, handle: Handle) -> Option<&T> {
        self.get_key(self.key(handle)?)
    }

    pub(crate) fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let key = self.key(handle)?;
        let slot = self.slots.get_mut(key.slot as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.value.as_mut().map(|(_, v)| v)
    }

    pub(crate) fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    pub(crate) fn remove(&mut self, handle: Handle) -> Option<T> {
        let key = self.index.remove(&handle)?;
        let slot = self.slots.get_mut(key.slot as usize)?;
        let (_, value) = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.slot);
        Some(value)
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub(crate) fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<_> = self.index.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots
            .iter()
            .filter_map(|s| s.value.as_ref().map(|(h, v)| (*h, v)))
    }

    /// Remove everything, returning the values in handle order.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        self.handles()
            .into_iter()
            .filter_map(|h| self.remove(h))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rejects_zero_and_duplicates() {
        let mut table = HandleTable::new();
        assert_eq!(table.insert(0, "zero"), Err("zero"));
        assert!(table.insert(7, "a").is_ok());
        assert_eq!(table.insert(7, "b"), Err("b"));
        assert_eq!(table.get(7), Some(&"a"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn stale_key_after_reuse() {
        let mut table = HandleTable::new();
        let old = table.insert(1, 10).unwrap();
        assert_eq!(table.remove(1), Some(10));
        assert_eq!(table.get_key(old), None);

        // The freed slot is reused with a new generation.
        let new = table.insert(2, 20).unwrap();
        assert_ne!(old, new);
        assert_eq!(table.get_key(old), None);
        assert_eq!(table.get_key(new), Some(&20));
        assert_eq!(table.get(1), None);
    }

    #[test]
    fn drain_in_handle_order() {
        let mut table = HandleTable::new();
        for h in [5, 3, 9] {
            table.insert(h, h * 10).unwrap();
        }
        *table.get_mut(3).unwrap() += 1;
        assert_eq!(table.drain(), vec![31, 50, 90]);
        assert!(table.is_empty());
        assert_eq!(table.remove(3), None);
    }
}
