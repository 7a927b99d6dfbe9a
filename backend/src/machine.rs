use drc_core::MemSize;

/// Guest-side services used by generated code.
///
/// Implemented by the guest CPU state. The state block is an array of
/// 64-bit slots addressed by `Operand::Mem`.
pub trait Machine {
    /// The guest state block.
    fn state(&self) -> &[u64];

    fn state_mut(&mut self) -> &mut [u64];

    /// Page table entry covering `vaddr`.
    fn tlb_entry(&self, vaddr: u32) -> u32;

    /// Instruction word at a physical address, without side effects.
    fn fetch(&mut self, paddr: u32) -> u32;

    /// Generic memory read.
    fn read(&mut self, paddr: u32, size: MemSize) -> u64;

    /// Generic memory write of the bits selected by `mask`.
    fn write(&mut self, paddr: u32, size: MemSize, value: u64, mask: u64);

    /// Read from a fast-RAM region at `offset` from its base.
    fn fast_read(&self, region: usize, offset: u32, size: MemSize) -> u64;

    fn fast_write(
        &mut self,
        region: usize,
        offset: u32,
        size: MemSize,
        value: u64,
        mask: u64,
    );

    /// Native function escape hatch.
    fn call(&mut self, func: u32);
}
