/// Number of buckets in the (mode, pc) hash table.
pub const HASH_SIZE: usize = 1 << 15; // 32768

/// Number of entries in the direct-mapped jump cache.
pub const JMP_CACHE_SIZE: usize = 1 << 12; // 4096

/// An installed translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashEntry {
    pub mode: u8,
    pub pc: u32,
    /// Code pointer returned by the backend.
    pub code: u32,
    /// Next entry in the same bucket.
    next: Option<u32>,
}

/// Map from `(mode, pc)` to translated code.
///
/// Entries are chained per bucket. Installing a key that is already
/// present replaces its code pointer in place, so a key never has more
/// than one entry.
pub struct HashTable {
    buckets: Vec<Option<u32>>,
    entries: Vec<HashEntry>,
    jump_cache: JumpCache,
}

impl HashTable {
    pub fn new() -> Self {
        Self {
            buckets: vec![None; HASH_SIZE],
            entries: Vec::with_capacity(4096),
            jump_cache: JumpCache::new(),
        }
    }

    /// Compute the bucket for a key.
    pub fn hash(mode: u8, pc: u32) -> usize {
        let h = (pc as u64).wrapping_mul(0x9e3779b97f4a7c15) ^ mode as u64;
        (h >> 17) as usize & (HASH_SIZE - 1)
    }

    fn find(&self, mode: u8, pc: u32) -> Option<u32> {
        let mut cur = self.buckets[Self::hash(mode, pc)];
        while let Some(idx) = cur {
            let e = &self.entries[idx as usize];
            if e.mode == mode && e.pc == pc {
                return Some(idx);
            }
            cur = e.next;
        }
        None
    }

    /// Install or replace the entry for `(mode, pc)`.
    pub fn install(&mut self, mode: u8, pc: u32, code: u32) {
        if let Some(idx) = self.find(mode, pc) {
            self.entries[idx as usize].code = code;
            return;
        }
        let bucket = Self::hash(mode, pc);
        let idx = self.entries.len() as u32;
        self.entries.push(HashEntry {
            mode,
            pc,
            code,
            next: self.buckets[bucket],
        });
        self.buckets[bucket] = Some(idx);
    }

    pub fn exists(&self, mode: u8, pc: u32) -> bool {
        self.find(mode, pc).is_some()
    }

    /// Look up the code pointer for `(mode, pc)`.
    pub fn lookup(&mut self, mode: u8, pc: u32) -> Option<u32> {
        if let Some(idx) = self.jump_cache.lookup(pc) {
            let e = &self.entries[idx as usize];
            if e.mode == mode && e.pc == pc {
                return Some(e.code);
            }
        }
        let idx = self.find(mode, pc)?;
        self.jump_cache.insert(pc, idx);
        Some(self.entries[idx as usize].code)
    }

    /// Drop every entry.
    pub fn reset(&mut self) {
        self.buckets.fill(None);
        self.entries.clear();
        self.jump_cache.invalidate();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HashEntry> {
        self.entries.iter()
    }
}

impl Default for HashTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Direct-mapped cache of hash entry indices.
///
/// Indexed by `(pc >> 2) & (JMP_CACHE_SIZE - 1)`; hits are checked
/// against the full key by the caller.
pub struct JumpCache {
    entries: Box<[Option<u32>; JMP_CACHE_SIZE]>,
}

impl JumpCache {
    pub fn new() -> Self {
        Self {
            entries: Box::new([None; JMP_CACHE_SIZE]),
        }
    }

    fn index(pc: u32) -> usize {
        (pc as usize >> 2) & (JMP_CACHE_SIZE - 1)
    }

    pub fn lookup(&self, pc: u32) -> Option<u32> {
        self.entries[Self::index(pc)]
    }

    pub fn insert(&mut self, pc: u32, idx: u32) {
        self.entries[Self::index(pc)] = Some(idx);
    }

    pub fn invalidate(&mut self) {
        self.entries.fill(None);
    }
}

impl Default for JumpCache {
    fn default() -> Self {
        Self::new()
    }
}
