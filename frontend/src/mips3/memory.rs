use drc_core::MemSize;
use serde::{Deserialize, Serialize};

/// The generic memory system, reached for every access that is not
/// served from a fast-RAM region.
///
/// Values are passed in host integer order; byte ordering on the bus is
/// the implementor's business.
pub trait Memory {
    fn read(&mut self, paddr: u32, size: MemSize) -> u64;

    /// Write the bits of `value` selected by `mask`.
    fn write(&mut self, paddr: u32, size: MemSize, value: u64, mask: u64);

    /// Instruction word at `paddr`, or `None` when nothing backs it.
    fn fetch(&mut self, paddr: u32) -> Option<u32>;
}

/// A physical address window served directly from a host buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastRamRegion {
    pub start: u32,
    /// Inclusive end address.
    pub end: u32,
    pub readonly: bool,
    pub big_endian: bool,
    data: Vec<u8>,
}

impl FastRamRegion {
    /// Create a region backed by `data`; the window spans
    /// `start..=end` and must not exceed the buffer.
    pub fn new(start: u32, end: u32, readonly: bool, big_endian: bool, data: Vec<u8>) -> Self {
        let len = (end - start) as usize + 1;
        let mut data = data;
        data.resize(len, 0);
        Self {
            start,
            end,
            readonly,
            big_endian,
            data,
        }
    }

    pub fn contains(&self, paddr: u32, size: MemSize) -> bool {
        paddr >= self.start
            && paddr
                .checked_add(size.bytes() - 1)
                .is_some_and(|last| last <= self.end)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Read `size` bytes at `offset` in guest byte order.
    pub fn read(&self, offset: u32, size: MemSize) -> u64 {
        let off = offset as usize;
        let n = size.bytes() as usize;
        let Some(bytes) = self.data.get(off..off + n) else {
            return 0;
        };
        let mut v = 0u64;
        for (i, &b) in bytes.iter().enumerate() {
            let shift = if self.big_endian { (n - 1 - i) * 8 } else { i * 8 };
            v |= (b as u64) << shift;
        }
        v
    }

    /// Write the bytes of `value` selected by `mask`.
    pub fn write(&mut self, offset: u32, size: MemSize, value: u64, mask: u64) {
        let off = offset as usize;
        let n = size.bytes() as usize;
        let big = self.big_endian;
        let Some(bytes) = self.data.get_mut(off..off + n) else {
            return;
        };
        for (i, b) in bytes.iter_mut().enumerate() {
            let shift = if big { (n - 1 - i) * 8 } else { i * 8 };
            let m = (mask >> shift) as u8;
            *b = (*b & !m) | ((value >> shift) as u8 & m);
        }
    }
}

/// Extra cycles charged whenever `opcode` is compiled at `pc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotspot {
    pub pc: u32,
    pub opcode: u32,
    pub cycles: u32,
}
