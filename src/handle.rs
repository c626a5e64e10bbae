//! Generational handles and the registries that hand them out.
//!
//! Every resource class (windows, bitmaps, drawing contexts and the physical surfaces behind
//! them) lives in its own [`Registry`]. A handle is an `(index, generation)` pair: a slot that
//! is vacated bumps its generation before it is reused, so a handle kept around after its
//! resource was destroyed no longer resolves instead of silently aliasing a newer resource.
//!
//! Across the foreign boundary a handle travels as a single `u64`
//! (`generation << 32 | index`). Fresh slots start at generation 0, which keeps the first ids
//! small: the root window is `0`, the first created window is `1`.

use std::collections::VecDeque;
use std::fmt::{self, Display};
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// Untyped `(index, generation)` pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RawHandle {
    index: u32,
    generation: u32,
}

impl RawHandle {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Packs the handle into the integer handed to foreign callers.
    pub fn to_raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    pub fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

/// Keys usable with a [`Registry`].
pub trait RegistryKey: Copy {
    fn from_handle(handle: RawHandle) -> Self;
    fn handle(self) -> RawHandle;
}

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(RawHandle);

        impl $name {
            pub fn to_raw(self) -> u64 {
                self.0.to_raw()
            }

            pub fn from_raw(raw: u64) -> Self {
                Self(RawHandle::from_raw(raw))
            }
        }

        impl RegistryKey for $name {
            fn from_handle(handle: RawHandle) -> Self {
                Self(handle)
            }

            fn handle(self) -> RawHandle {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_raw())
            }
        }
    };
}

handle_type!(
    /// Identifies a window. [`WindowId::ROOT`] always exists.
    WindowId
);
handle_type!(
    /// Identifies a bitmap.
    BitmapId
);
handle_type!(
    /// Identifies a drawing context (window or memory).
    ContextId
);
handle_type!(
    /// Identifies a physical surface shared by one or more contexts.
    SurfaceId
);

impl WindowId {
    /// The pre-existing root window.
    pub const ROOT: WindowId = WindowId(RawHandle::new(0, 0));

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

enum Slot<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32 },
}

impl<T> Slot<T> {
    fn generation(&self) -> u32 {
        match self {
            Slot::Occupied { generation, .. } | Slot::Vacant { generation } => *generation,
        }
    }
}

/// Arena of records keyed by generational handles.
pub struct Registry<K, T> {
    slots: Vec<Slot<T>>,
    // FIFO so a vacated index rests as long as possible before it comes back.
    free: VecDeque<u32>,
    len: usize,
    _key: PhantomData<K>,
}

impl<K: RegistryKey, T> Default for Registry<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: RegistryKey, T> Registry<K, T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: VecDeque::new(),
            len: 0,
            _key: PhantomData,
        }
    }

    /// Stores `value` in a vacant slot and returns its handle.
    pub fn insert(&mut self, value: T) -> K {
        self.len += 1;

        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index as usize];
            let generation = slot.generation();
            *slot = Slot::Occupied { generation, value };
            return K::from_handle(RawHandle::new(index, generation));
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot::Occupied { generation: 0, value });
        K::from_handle(RawHandle::new(index, 0))
    }

    /// Stores `value` under a caller-chosen handle.
    ///
    /// Succeeds only if the slot is vacant and still carries the requested generation (slots
    /// past the end are created on demand). Otherwise the value is handed back.
    pub fn insert_at(&mut self, key: K, value: T) -> Result<(), T> {
        let handle = key.handle();
        let index = handle.index() as usize;

        if index >= self.slots.len() {
            for vacant in self.slots.len()..index {
                self.slots.push(Slot::Vacant { generation: 0 });
                self.free.push_back(vacant as u32);
            }
            self.slots.push(Slot::Occupied {
                generation: handle.generation(),
                value,
            });
            self.len += 1;
            return Ok(());
        }

        match &self.slots[index] {
            Slot::Vacant { generation } if *generation == handle.generation() => {
                self.free.retain(|&i| i as usize != index);
                self.slots[index] = Slot::Occupied {
                    generation: handle.generation(),
                    value,
                };
                self.len += 1;
                Ok(())
            }
            _ => Err(value),
        }
    }

    pub fn get(&self, key: K) -> Option<&T> {
        let handle = key.handle();
        match self.slots.get(handle.index() as usize)? {
            Slot::Occupied { generation, value } if *generation == handle.generation() => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        let handle = key.handle();
        match self.slots.get_mut(handle.index() as usize)? {
            Slot::Occupied { generation, value } if *generation == handle.generation() => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    /// Removes the record, retiring its handle.
    pub fn remove(&mut self, key: K) -> Option<T> {
        let handle = key.handle();
        let index = handle.index() as usize;

        match self.slots.get(index) {
            Some(Slot::Occupied { generation, .. }) if *generation == handle.generation() => {}
            _ => return None,
        }

        let next = Slot::Vacant {
            generation: handle.generation().wrapping_add(1),
        };
        let Slot::Occupied { value, .. } = std::mem::replace(&mut self.slots[index], next) else {
            return None;
        };

        self.free.push_back(index as u32);
        self.len -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn keys(&self) -> Vec<K> {
        self.iter().map(|(key, _)| key).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| match slot {
            Slot::Occupied { generation, value } => {
                Some((K::from_handle(RawHandle::new(index as u32, *generation)), value))
            }
            Slot::Vacant { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trip_packs_generation_high() {
        let handle = RawHandle::new(7, 3);
        assert_eq!(handle.to_raw(), (3u64 << 32) | 7);
        assert_eq!(RawHandle::from_raw(handle.to_raw()), handle);
    }

    #[test]
    fn first_ids_are_small_and_sequential() {
        let mut reg: Registry<WindowId, &str> = Registry::new();
        reg.insert_at(WindowId::ROOT, "root").unwrap();
        let a = reg.insert("a");
        let b = reg.insert("b");
        assert_eq!(a.to_raw(), 1);
        assert_eq!(b.to_raw(), 2);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn stale_handle_does_not_alias_reused_slot() {
        let mut reg: Registry<BitmapId, u32> = Registry::new();
        let old = reg.insert(10);
        assert_eq!(reg.remove(old), Some(10));

        let new = reg.insert(20);
        assert_eq!(new.handle().index(), old.handle().index());
        assert_ne!(new, old);

        assert!(reg.get(old).is_none());
        assert_eq!(reg.get(new), Some(&20));
        assert!(reg.remove(old).is_none());
    }

    #[test]
    fn insert_at_rejects_occupied_slots() {
        let mut reg: Registry<WindowId, u8> = Registry::new();
        let id = WindowId::from_raw(3);
        assert!(reg.insert_at(id, 1).is_ok());
        assert_eq!(reg.insert_at(id, 2), Err(2));

        // Slots skipped by insert_at are handed out by insert.
        let next = reg.insert(9);
        assert_eq!(next.to_raw(), 0);
    }

    #[test]
    fn iter_skips_vacant_slots() {
        let mut reg: Registry<ContextId, char> = Registry::new();
        let a = reg.insert('a');
        let b = reg.insert('b');
        reg.remove(a);

        let keys: Vec<_> = reg.iter().map(|(k, v)| (k, *v)).collect();
        assert_eq!(keys, vec![(b, 'b')]);
        assert_eq!(reg.keys(), vec![b]);
    }
}
