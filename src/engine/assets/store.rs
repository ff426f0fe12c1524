// Generational storage for cached assets
//
// The store is the single owner of every asset a factory has produced.
// Handles address slots by `AssetKey`; a slot's generation is bumped when its
// asset is removed, so stale keys stop resolving instead of dangling.

use std::rc::Rc;

/// Generation-indexed key of an asset slot
///
/// Format: [32-bit index | 32-bit generation]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetKey {
    index: u32,
    generation: u32,
}

impl AssetKey {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

struct Entry<T> {
    asset: Rc<T>,
    refs: u32,
    pinned: bool,
}

struct Slot<T> {
    generation: u32,
    entry: Option<Entry<T>>,
}

/// Slot arena with per-slot reference counts
pub struct AssetStore<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> AssetStore<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Store an asset with a reference count of zero
    pub fn insert(&mut self, asset: T) -> AssetKey {
        self.insert_entry(asset, false)
    }

    /// Store an asset that `remove` will refuse to drop
    pub fn insert_pinned(&mut self, asset: T) -> AssetKey {
        self.insert_entry(asset, true)
    }

    fn insert_entry(&mut self, asset: T, pinned: bool) -> AssetKey {
        let entry = Entry {
            asset: Rc::new(asset),
            refs: 0,
            pinned,
        };
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            AssetKey::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            AssetKey::new(index, 0)
        }
    }

    fn entry(&self, key: AssetKey) -> Option<&Entry<T>> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, key: AssetKey) -> Option<&mut Entry<T>> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    /// The asset behind a key, if the slot is still occupied by it
    pub fn get(&self, key: AssetKey) -> Option<&Rc<T>> {
        self.entry(key).map(|entry| &entry.asset)
    }

    pub fn contains(&self, key: AssetKey) -> bool {
        self.entry(key).is_some()
    }

    pub fn ref_count(&self, key: AssetKey) -> Option<u32> {
        self.entry(key).map(|entry| entry.refs)
    }

    pub fn is_pinned(&self, key: AssetKey) -> bool {
        self.entry(key).map(|entry| entry.pinned).unwrap_or(false)
    }

    /// Increment the reference count; false if the key is stale
    pub fn retain(&mut self, key: AssetKey) -> bool {
        match self.entry_mut(key) {
            Some(entry) => {
                entry.refs += 1;
                true
            }
            None => false,
        }
    }

    /// Decrement the reference count; false if the key is stale
    pub fn release(&mut self, key: AssetKey) -> bool {
        match self.entry_mut(key) {
            Some(entry) => {
                debug_assert!(entry.refs > 0, "released an unreferenced asset");
                entry.refs = entry.refs.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    /// Take an unpinned asset out of its slot and retire the key
    pub fn remove(&mut self, key: AssetKey) -> Option<Rc<T>> {
        if self.is_pinned(key) || !self.contains(key) {
            return None;
        }

        let slot = &mut self.slots[key.index as usize];
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.live -= 1;
        Some(entry.asset)
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

impl<T> Default for AssetStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
