//! Generational slot arena.
//!
//! Entries live in fixed slots addressed by [`EntryHandle`]. Freeing a slot
//! bumps its generation, so a handle kept by a secondary index after the
//! entry is gone resolves to `None` instead of to whatever reuses the slot.
//! Freed slots go on a free list and are reused before the arena grows.

use crate::error::RegistryError;

/// Stable reference to an arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryHandle {
    index: u32,
    generation: u32,
}

impl EntryHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Bounded arena with free-list reuse.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    capacity: usize,
    live: usize,
}

impl<T> Arena<T> {
    /// Create an arena holding at most `capacity` live values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            capacity,
            live: 0,
        }
    }

    /// Allocate a slot and build its value from the handle it will carry.
    pub fn alloc_with<F>(&mut self, build: F) -> Result<EntryHandle, RegistryError>
    where
        F: FnOnce(EntryHandle) -> T,
    {
        if self.live >= self.capacity {
            return Err(RegistryError::ResourceExhausted {
                capacity: self.capacity,
            });
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        let handle = EntryHandle {
            index,
            generation: slot.generation,
        };
        slot.value = Some(build(handle));
        self.live += 1;
        Ok(handle)
    }

    pub fn get(&self, handle: EntryHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Free the slot named by `handle`. Stale handles are a no-op.
    pub fn free(&mut self, handle: EntryHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(value)
    }

    /// Take every live value and drop the backing storage.
    ///
    /// The arena refuses further allocations afterwards.
    pub fn release(&mut self) -> Vec<T> {
        let values = self
            .slots
            .drain(..)
            .filter_map(|slot| slot.value)
            .collect();
        self.slots.shrink_to_fit();
        self.free = Vec::new();
        self.capacity = 0;
        self.live = 0;
        values
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
