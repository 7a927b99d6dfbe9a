use std::io;
use std::mem;
use std::ptr::{self, NonNull};

use crate::error::CacheError;

/// Default code cache size: 32 MiB.
pub const DEFAULT_CACHE_SIZE: usize = 32 * 1024 * 1024;

/// Alignment of code allocations.
const CODE_ALIGN: usize = 16;

/// Arena holding generated code and "near" data, backed by mmap'd
/// memory.
///
/// Code grows upward from the base; near allocations grow downward
/// from the top. `reset` discards all code but keeps near allocations,
/// which are never freed individually. The whole arena is unmapped on
/// drop.
pub struct CodeCache {
    ptr: *mut u8,
    size: usize,
    /// Next free byte for code.
    code_top: usize,
    /// Lowest byte used by near allocations.
    near_bottom: usize,
}

// SAFETY: CodeCache owns its mmap'd memory exclusively.
unsafe impl Send for CodeCache {}

impl CodeCache {
    /// Reserve an arena of `size` bytes (rounded up to page size).
    pub fn allocate(size: usize) -> Result<Self, CacheError> {
        let page_size = page_size();
        let size = (size.max(1) + page_size - 1) & !(page_size - 1);

        // SAFETY: mmap with MAP_ANONYMOUS | MAP_PRIVATE, no file backing.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(CacheError::OutOfMemory {
                size,
                source: io::Error::last_os_error(),
            });
        }

        tracing::debug!(size, "code cache reserved");
        Ok(Self {
            ptr: ptr as *mut u8,
            size,
            code_top: 0,
            near_bottom: size,
        })
    }

    /// Total capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Bytes of code emitted since the last reset.
    #[inline]
    pub fn code_size(&self) -> usize {
        self.code_top
    }

    /// Bytes held by near allocations.
    #[inline]
    pub fn near_size(&self) -> usize {
        self.size - self.near_bottom
    }

    /// Bytes left between code and near data.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.near_bottom - self.code_top
    }

    /// Allocate `bytes` of zeroed memory that shares the arena with
    /// generated code. The memory stays valid until the cache is
    /// dropped and is not reclaimed by `reset`.
    pub fn alloc_near(
        &mut self,
        bytes: usize,
        align: usize,
    ) -> Result<NonNull<u8>, CacheError> {
        let align = align.max(1).next_power_of_two();
        let start = self
            .near_bottom
            .checked_sub(bytes)
            .map(|s| s & !(align - 1))
            .filter(|&s| s >= self.code_top)
            .ok_or(CacheError::Full {
                requested: bytes,
                remaining: self.remaining(),
            })?;
        self.near_bottom = start;
        // SAFETY: start < size, within the mapping.
        let p = unsafe { self.ptr.add(start) };
        NonNull::new(p).ok_or(CacheError::Full {
            requested: bytes,
            remaining: 0,
        })
    }

    /// Reserve room for `bytes` of code and return its offset.
    pub fn begin_code(&mut self, bytes: usize) -> Result<u32, CacheError> {
        let start = (self.code_top + CODE_ALIGN - 1) & !(CODE_ALIGN - 1);
        if start + bytes > self.near_bottom {
            return Err(CacheError::Full {
                requested: bytes,
                remaining: self.remaining(),
            });
        }
        self.code_top = start + bytes;
        Ok(start as u32)
    }

    /// Discard all code. Near allocations are kept.
    pub fn reset(&mut self) {
        self.code_top = 0;
    }

    /// Whether `offset` lies inside emitted code.
    #[inline]
    pub fn contains(&self, offset: u32, len: usize) -> bool {
        offset as usize + len <= self.code_top
    }

    /// Store a plain-data record at `offset`.
    ///
    /// `offset` must come from `begin_code` and be aligned for `T`.
    pub fn write_record<T: Copy>(&mut self, offset: u32, rec: T) {
        let off = offset as usize;
        assert!(off + mem::size_of::<T>() <= self.code_top);
        assert_eq!(off % mem::align_of::<T>(), 0, "misaligned record");
        // SAFETY: in bounds and aligned, checked above.
        unsafe { (self.ptr.add(off) as *mut T).write(rec) };
    }

    /// Load a plain-data record previously stored at `offset`.
    pub fn read_record<T: Copy>(&self, offset: u32) -> Option<T> {
        let off = offset as usize;
        if off + mem::size_of::<T>() > self.code_top
            || off % mem::align_of::<T>() != 0
        {
            return None;
        }
        // SAFETY: in bounds and aligned; only `write_record::<T>` stores
        // into code space, and callers read with the same `T`.
        Some(unsafe { (self.ptr.add(off) as *const T).read() })
    }
}

impl Drop for CodeCache {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: `ptr` and `size` describe the mapping made in
            // `allocate`, and nothing borrows it once the cache drops.
            unsafe {
                libc::munmap(self.ptr as *mut libc::c_void, self.size);
            }
        }
    }
}

fn page_size() -> usize {
    // SAFETY: sysconf is always safe to call.
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}
