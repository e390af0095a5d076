//! Generation-checked handles and the arena that issues them.
//!
//! A handle is a slot index plus the slot's generation at insertion time.
//! Removing a value bumps the slot generation, so every handle issued
//! before the removal stops resolving. Generations start at 1, which keeps
//! the packed value 0 permanently invalid (the C boundary uses it as null).

/// Untyped slot reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle {
    index: u32,
    generation: u32,
}

impl RawHandle {
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Packed form: generation in the high half, index in the low half.
    #[must_use]
    pub const fn into_raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Unpack a value produced by [`RawHandle::into_raw`]. Zero generations
    /// never occur in a live slot and are rejected.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Option<Self> {
        let generation = (raw >> 32) as u32;
        if generation == 0 {
            return None;
        }
        Some(Self {
            index: raw as u32,
            generation,
        })
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(RawHandle);

        impl $name {
            #[must_use]
            pub const fn into_raw(self) -> u64 {
                self.0.into_raw()
            }

            #[must_use]
            pub const fn from_raw(raw: u64) -> Option<Self> {
                match RawHandle::from_raw(raw) {
                    Some(h) => Some(Self(h)),
                    None => None,
                }
            }

            pub(crate) const fn raw(self) -> RawHandle {
                self.0
            }

            pub(crate) const fn from_raw_handle(h: RawHandle) -> Self {
                Self(h)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}.{}", stringify!($name), self.0.index, self.0.generation)
            }
        }
    };
}

typed_handle!(
    /// Identifies a thread for the lifetime of its runtime.
    ThreadHandle
);
typed_handle!(
    /// Identifies an initialized mutex.
    MutexHandle
);
typed_handle!(
    /// Identifies an initialized condition variable.
    CondHandle
);
typed_handle!(
    /// Identifies a thread-local storage key.
    KeyHandle
);

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with a free list. Not synchronized; callers wrap it in a
/// `parking_lot` lock.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    live: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> RawHandle {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return RawHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 1,
            value: Some(value),
        });
        RawHandle {
            index,
            generation: 1,
        }
    }

    #[must_use]
    pub fn get(&self, handle: RawHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: RawHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    #[must_use]
    pub fn contains(&self, handle: RawHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Take the value out and retire every outstanding handle to this slot.
    pub fn remove(&mut self, handle: RawHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = match slot.generation.wrapping_add(1) {
            0 => 1,
            g => g,
        };
        self.free_list.push(handle.index);
        self.live -= 1;
        Some(value)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }
}
