mod code_cache;

use drc_backend::Machine;
use drc_core::MemSize;

/// Flat state block plus a byte-addressed little RAM.
pub struct TestMachine {
    pub state: Vec<u64>,
    pub ram: Vec<u8>,
    pub writes: Vec<(u32, MemSize, u64, u64)>,
    pub calls: Vec<u32>,
}

impl TestMachine {
    pub fn new() -> Self {
        Self {
            state: vec![0; 64],
            ram: vec![0; 256],
            writes: Vec::new(),
            calls: Vec::new(),
        }
    }
}

impl Machine for TestMachine {
    fn state(&self) -> &[u64] {
        &self.state
    }

    fn state_mut(&mut self) -> &mut [u64] {
        &mut self.state
    }

    fn tlb_entry(&self, vaddr: u32) -> u32 {
        vaddr | 1
    }

    fn fetch(&mut self, paddr: u32) -> u32 {
        paddr ^ 0xffff_ffff
    }

    fn read(&mut self, paddr: u32, size: MemSize) -> u64 {
        let at = paddr as usize;
        self.ram[at..at + size.bytes() as usize]
            .iter()
            .rev()
            .fold(0, |v, &b| (v << 8) | b as u64)
    }

    fn write(&mut self, paddr: u32, size: MemSize, value: u64, mask: u64) {
        self.writes.push((paddr, size, value, mask));
    }

    fn fast_read(&self, _region: usize, offset: u32, _size: MemSize) -> u64 {
        offset as u64 + 0x1000
    }

    fn fast_write(&mut self, _region: usize, _offset: u32, _size: MemSize, _value: u64, _mask: u64) {}

    fn call(&mut self, func: u32) {
        self.calls.push(func);
    }
}
