// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Generational slot storage behind every handle kind.

use crate::renderer::api::{Handle, HandleKind};
use crate::renderer::error::{ContextError, ContextResult};
use std::marker::PhantomData;

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Owns the context-side records of one resource kind and hands out handles to them.
///
/// Removing an entry bumps its slot's generation, so old handles to the slot stay stale
/// even after the slot is reused.
#[derive(Debug)]
pub(crate) struct Registry<K, T> {
    owner: u32,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    _kind: PhantomData<fn() -> K>,
}

impl<K: HandleKind, T> Registry<K, T> {
    pub(crate) fn new(owner: u32) -> Self {
        Self {
            owner,
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _kind: PhantomData,
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> Handle<K> {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Handle::new(index, slot.generation, self.owner);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle::new(index, 0, self.owner)
    }

    fn check_owner(&self, handle: Handle<K>) -> ContextResult<()> {
        if handle.owner() != self.owner {
            return Err(ContextError::ForeignHandle { kind: K::TYPE });
        }
        Ok(())
    }

    fn stale() -> ContextError {
        ContextError::StaleHandle { kind: K::TYPE }
    }

    pub(crate) fn get(&self, handle: Handle<K>) -> ContextResult<&T> {
        self.check_owner(handle)?;
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_ref())
            .ok_or_else(Self::stale)
    }

    pub(crate) fn get_mut(&mut self, handle: Handle<K>) -> ContextResult<&mut T> {
        self.check_owner(handle)?;
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_mut())
            .ok_or_else(Self::stale)
    }

    pub(crate) fn contains(&self, handle: Handle<K>) -> bool {
        self.get(handle).is_ok()
    }

    pub(crate) fn remove(&mut self, handle: Handle<K>) -> ContextResult<T> {
        self.check_owner(handle)?;
        let slot = self
            .slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .ok_or_else(Self::stale)?;
        let value = slot.value.take().ok_or_else(Self::stale)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        self.len -= 1;
        Ok(value)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Removes every live entry, invalidating all outstanding handles.
    pub(crate) fn drain(&mut self) -> Vec<(Handle<K>, T)> {
        let owner = self.owner;
        let mut drained = Vec::with_capacity(self.len);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                drained.push((Handle::new(index as u32, slot.generation, owner), value));
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.len = 0;
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::{marker, ResourceType};

    fn registry() -> Registry<marker::Buffer, &'static str> {
        Registry::new(1)
    }

    #[test]
    fn insert_and_get() {
        let mut reg = registry();
        let a = reg.insert("a");
        let b = reg.insert("b");
        assert_ne!(a, b);
        assert_eq!(*reg.get(a).unwrap(), "a");
        assert_eq!(*reg.get(b).unwrap(), "b");
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn removed_handles_are_stale_even_after_slot_reuse() {
        let mut reg = registry();
        let a = reg.insert("a");
        assert_eq!(reg.remove(a).unwrap(), "a");

        // ACT: the next insert reuses the freed slot.
        let b = reg.insert("b");

        // ASSERT
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert_eq!(
            reg.get(a).unwrap_err(),
            ContextError::StaleHandle {
                kind: ResourceType::Buffer
            }
        );
        assert!(reg.remove(a).is_err());
        assert_eq!(*reg.get(b).unwrap(), "b");
    }

    #[test]
    fn handles_from_another_registry_are_foreign() {
        let mut mine = registry();
        let mut theirs: Registry<marker::Buffer, &'static str> = Registry::new(2);
        mine.insert("mine");
        let foreign = theirs.insert("theirs");
        assert_eq!(
            mine.get(foreign).unwrap_err(),
            ContextError::ForeignHandle {
                kind: ResourceType::Buffer
            }
        );
    }

    #[test]
    fn drain_empties_and_invalidates() {
        let mut reg = registry();
        let a = reg.insert("a");
        let b = reg.insert("b");
        reg.remove(a).unwrap();

        let drained = reg.drain();

        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].0, b);
        assert_eq!(reg.len(), 0);
        assert!(!reg.contains(b));
    }
}
