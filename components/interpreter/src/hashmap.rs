//! Open-addressing storage behind Bond's `HashMap`.
//!
//! [`BondMap`] only stores hashes and handles. Key equality may run user
//! code (`__eq__`), so lookups are split in two: [`BondMap::candidates`]
//! returns the occupied slots whose hash matches, and the VM decides which
//! candidate (if any) is equal before calling the slot accessors.

use crate::object::Value;
use memory_manager::{Trace, Tracer};

const INITIAL_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy)]
struct Entry {
    hash: u64,
    key: Value,
    value: Value,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Empty,
    Deleted,
    Full(Entry),
}

/// Linear-probing hash table keyed by precomputed hashes.
#[derive(Debug, Clone)]
pub struct BondMap {
    slots: Vec<Slot>,
    len: usize,
    /// Full plus deleted slots; drives resizing
    used: usize,
}

impl Default for BondMap {
    fn default() -> Self {
        Self::new()
    }
}

impl BondMap {
    /// Create an empty map.
    pub fn new() -> Self {
        BondMap {
            slots: vec![Slot::Empty; INITIAL_CAPACITY],
            len: 0,
            used: 0,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    /// Occupied slots whose stored hash equals `hash`, in probe order.
    pub fn candidates(&self, hash: u64) -> Vec<(usize, Value)> {
        let mut found = Vec::new();
        let mut index = hash as usize & self.mask();
        for _ in 0..self.slots.len() {
            match self.slots[index] {
                Slot::Empty => break,
                Slot::Full(entry) if entry.hash == hash => found.push((index, entry.key)),
                _ => {}
            }
            index = (index + 1) & self.mask();
        }
        found
    }

    /// Key stored at `slot`.
    pub fn key_at(&self, slot: usize) -> Option<Value> {
        match self.slots.get(slot) {
            Some(Slot::Full(entry)) => Some(entry.key),
            _ => None,
        }
    }

    /// Value stored at `slot`.
    pub fn value_at(&self, slot: usize) -> Option<Value> {
        match self.slots.get(slot) {
            Some(Slot::Full(entry)) => Some(entry.value),
            _ => None,
        }
    }

    /// Replace the value at an occupied `slot`.
    pub fn set_at(&mut self, slot: usize, value: Value) {
        if let Some(Slot::Full(entry)) = self.slots.get_mut(slot) {
            entry.value = value;
        }
    }

    /// Insert a key the caller has checked is absent.
    pub fn insert_new(&mut self, hash: u64, key: Value, value: Value) {
        if (self.used + 1) * 4 > self.slots.len() * 3 {
            self.resize();
        }
        let mut index = hash as usize & self.mask();
        loop {
            match self.slots[index] {
                Slot::Full(_) => index = (index + 1) & self.mask(),
                Slot::Deleted => {
                    self.slots[index] = Slot::Full(Entry { hash, key, value });
                    self.len += 1;
                    return;
                }
                Slot::Empty => {
                    self.slots[index] = Slot::Full(Entry { hash, key, value });
                    self.len += 1;
                    self.used += 1;
                    return;
                }
            }
        }
    }

    /// Remove the entry at `slot`, returning its value.
    pub fn remove_at(&mut self, slot: usize) -> Option<Value> {
        match self.slots.get(slot).copied() {
            Some(Slot::Full(entry)) => {
                self.slots[slot] = Slot::Deleted;
                self.len -= 1;
                Some(entry.value)
            }
            _ => None,
        }
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.slots = vec![Slot::Empty; INITIAL_CAPACITY];
        self.len = 0;
        self.used = 0;
    }

    /// First occupied slot at or after `from`, as `(slot, key, value)`.
    pub fn next_entry(&self, from: usize) -> Option<(usize, Value, Value)> {
        self.slots
            .iter()
            .enumerate()
            .skip(from)
            .find_map(|(i, slot)| match slot {
                Slot::Full(entry) => Some((i, entry.key, entry.value)),
                _ => None,
            })
    }

    /// Entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Full(entry) => Some((entry.key, entry.value)),
            _ => None,
        })
    }

    fn resize(&mut self) {
        let capacity = if self.len * 2 >= self.slots.len() {
            self.slots.len() * 2
        } else {
            self.slots.len()
        };
        let old = std::mem::replace(&mut self.slots, vec![Slot::Empty; capacity]);
        self.len = 0;
        self.used = 0;
        for slot in old {
            if let Slot::Full(entry) = slot {
                self.insert_new(entry.hash, entry.key, entry.value);
            }
        }
    }
}

impl Trace for BondMap {
    fn trace(&self, tracer: &mut Tracer<'_>) {
        for (key, value) in self.iter() {
            tracer.mark(key);
            tracer.mark(value);
        }
    }
}
