use std::ptr::NonNull;

use drc_core::Handle;

use crate::code_cache::CodeCache;
use crate::error::CacheError;

const UNDEFINED: u32 = u32::MAX;

/// Default number of handle slots.
pub const DEFAULT_HANDLE_CAPACITY: usize = 1024;

/// Code pointers for every allocated handle.
///
/// The slot array lives in near memory of the code cache. Handle
/// identities survive `clear_definitions`, so code that captured a
/// handle keeps working once the handle is defined again.
pub struct HandleTable {
    slots: NonNull<u32>,
    capacity: usize,
    names: Vec<&'static str>,
}

// SAFETY: the slot array is owned by the cache that owns this table's
// environment and is only accessed through `&self`/`&mut self`.
unsafe impl Send for HandleTable {}

impl HandleTable {
    /// Carve a table of `capacity` slots out of `cache`'s near memory.
    pub fn new(cache: &mut CodeCache, capacity: usize) -> Result<Self, CacheError> {
        let bytes = capacity * std::mem::size_of::<u32>();
        let slots = cache.alloc_near(bytes, std::mem::align_of::<u32>())?.cast::<u32>();
        let mut table = Self {
            slots,
            capacity,
            names: Vec::with_capacity(capacity),
        };
        for i in 0..capacity {
            table.set_slot(i, UNDEFINED);
        }
        Ok(table)
    }

    fn slot(&self, i: usize) -> u32 {
        assert!(i < self.capacity);
        // SAFETY: i < capacity, inside the near allocation.
        unsafe { self.slots.as_ptr().add(i).read() }
    }

    fn set_slot(&mut self, i: usize, val: u32) {
        assert!(i < self.capacity);
        // SAFETY: i < capacity, inside the near allocation.
        unsafe { self.slots.as_ptr().add(i).write(val) };
    }

    /// Allocate a new, undefined handle.
    pub fn alloc(&mut self, name: &'static str) -> Result<Handle, CacheError> {
        if self.names.len() >= self.capacity {
            return Err(CacheError::HandlesExhausted {
                capacity: self.capacity,
            });
        }
        let h = Handle(self.names.len() as u32);
        self.names.push(name);
        Ok(h)
    }

    /// Bind `h` to a code pointer.
    pub fn define(&mut self, h: Handle, code: u32) {
        self.set_slot(h.0 as usize, code);
    }

    /// Code pointer for `h`, if it has been defined since the last reset.
    pub fn resolve(&self, h: Handle) -> Option<u32> {
        if h.0 as usize >= self.names.len() {
            return None;
        }
        match self.slot(h.0 as usize) {
            UNDEFINED => None,
            code => Some(code),
        }
    }

    pub fn name(&self, h: Handle) -> &'static str {
        self.names.get(h.0 as usize).copied().unwrap_or("?")
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Forget all definitions; handles stay allocated.
    pub fn clear_definitions(&mut self) {
        for i in 0..self.names.len() {
            self.set_slot(i, UNDEFINED);
        }
    }
}
