//! Per-store arenas backing variable-length and dynamic values.
//!
//! Both pools hand out integer ids of the form `1 + index`, so an id of 0 is
//! the natural "absent" marker in root data. Neither pool maintains a free
//! list: string bytes and array slots are only reclaimed by [`StringPool::clear`]
//! / [`ArrayPool::clear`] when the owning store is cleared.

use log::warn;
use memchr::{memchr, memmem};

/// Offset-plus-one into a store's string arena; 0 means absent.
pub type StringId = u16;

/// Slot-plus-one into a store's array pool; 0 means absent.
pub type ArrayId = u16;

/// Append-only byte arena holding a concatenation of NUL-terminated strings.
///
/// Interning is by substring search constrained by a trailing NUL, so a value
/// that happens to be the tail of an existing entry shares its bytes.
#[derive(Clone, Default)]
pub struct StringPool {
    data: Vec<u8>,
}

impl StringPool {
    /// Searches the arena for an exact match, returning 0 when absent.
    ///
    /// O(n) in pool size, which is acceptable for small embedded configs.
    pub fn find(&self, value: &[u8]) -> StringId {
        if value.is_empty() || self.data.is_empty() {
            return 0;
        }
        for pos in memmem::find_iter(&self.data, value) {
            if self.data.get(pos + value.len()) == Some(&0) {
                return (1 + pos) as StringId;
            }
        }
        0
    }

    /// Appends `value` plus a terminating NUL, returning its new id.
    pub fn add(&mut self, value: &[u8]) -> StringId {
        let offset = self.data.len();
        if offset + value.len() >= StringId::MAX as usize {
            warn!("string pool full, dropping {} byte value", value.len());
            return 0;
        }
        self.data.extend_from_slice(value);
        self.data.push(0);
        (1 + offset) as StringId
    }

    pub fn find_or_add(&mut self, value: &[u8]) -> StringId {
        match self.find(value) {
            0 => self.add(value),
            id => id,
        }
    }

    /// Resolves an id to its bytes, excluding the NUL. 0 resolves to `None`.
    pub fn get(&self, id: StringId) -> Option<&[u8]> {
        if id == 0 {
            return None;
        }
        let start = (id - 1) as usize;
        let tail = self.data.get(start..)?;
        let end = memchr(0, tail)?;
        Some(&tail[..end])
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The raw arena contents, NUL separators included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// One array slot: a vector of raw fixed-size items.
///
/// Items are opaque bytes; callers interpret them according to the schema
/// type the slot was created for.
#[derive(Clone)]
pub struct ArrayData {
    item_size: usize,
    data: Vec<u8>,
}

impl ArrayData {
    pub fn new(item_size: usize) -> Self {
        Self {
            item_size,
            data: Vec::new(),
        }
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    pub fn len(&self) -> usize {
        if self.item_size == 0 {
            0
        } else {
            self.data.len() / self.item_size
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Inserts an item at `index`, shifting the tail right. A `None` source
    /// zero-fills the new item. Fails when `index` is past the end or the
    /// source length does not match the item size.
    pub fn insert(&mut self, index: usize, src: Option<&[u8]>) -> bool {
        if index > self.len() || self.item_size == 0 {
            return false;
        }
        if src.is_some_and(|s| s.len() != self.item_size) {
            return false;
        }
        let at = index * self.item_size;
        let old_len = self.data.len();
        self.data.resize(old_len + self.item_size, 0);
        self.data.copy_within(at..old_len, at + self.item_size);
        let item = &mut self.data[at..at + self.item_size];
        match src {
            Some(src) => item.copy_from_slice(src),
            None => item.fill(0),
        }
        true
    }

    /// Removes the item at `index`, shifting the tail left.
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.len() {
            return false;
        }
        let at = index * self.item_size;
        self.data.drain(at..at + self.item_size);
        true
    }

    pub fn push(&mut self, src: Option<&[u8]>) -> bool {
        self.insert(self.len(), src)
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        if index >= self.len() {
            return None;
        }
        let at = index * self.item_size;
        Some(&self.data[at..at + self.item_size])
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        if index >= self.len() {
            return None;
        }
        let at = index * self.item_size;
        Some(&mut self.data[at..at + self.item_size])
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

/// Vector of [`ArrayData`] slots addressed by [`ArrayId`].
#[derive(Clone, Default)]
pub struct ArrayPool {
    slots: Vec<ArrayData>,
}

impl ArrayPool {
    /// Allocates a slot for items of `item_size` bytes.
    pub fn add(&mut self, item_size: usize) -> ArrayId {
        if self.slots.len() >= ArrayId::MAX as usize {
            warn!("array pool full");
            return 0;
        }
        self.slots.push(ArrayData::new(item_size));
        self.slots.len() as ArrayId
    }

    pub fn get(&self, id: ArrayId) -> Option<&ArrayData> {
        self.slots.get(id.checked_sub(1)? as usize)
    }

    pub fn get_mut(&mut self, id: ArrayId) -> Option<&mut ArrayData> {
        self.slots.get_mut(id.checked_sub(1)? as usize)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
