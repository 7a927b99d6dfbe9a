use drc_backend::Machine;
use drc_core::MemSize;
use serde::{Deserialize, Serialize};

use super::config::Mips3Config;
use super::cpu::{self, cause, cop0, sr, NativeCall, Privilege, STATE_SLOTS};
use super::memory::{FastRamRegion, Memory};
use super::tlb::{Fault, Intent, PageTable, Tlb, TlbEntry};

/// Why an instruction word could not be fetched at describe time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchError {
    /// Translation failed; the guest takes an exception when the
    /// instruction is reached.
    PageFault(Fault),
    /// Nothing backs the physical address.
    Unmapped { paddr: u32 },
}

/// A fetched instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fetched {
    pub paddr: u32,
    pub word: u32,
    /// Page table entry observed for the instruction's page.
    pub pte: u32,
}

/// Architectural state captured for save states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateImage {
    pub regs: Vec<u64>,
    pub tlb: Tlb,
    pub timer_deadline: u64,
}

/// Complete guest state seen by generated code.
pub struct Mips3State {
    pub regs: Vec<u64>,
    pub tlb: Tlb,
    pub page_table: PageTable,
    pub memory: Box<dyn Memory>,
    pub fastram: Vec<FastRamRegion>,
    /// Total-cycle timestamp of the next Count == Compare match.
    timer_deadline: u64,
}

impl Mips3State {
    pub fn new(config: &Mips3Config, memory: Box<dyn Memory>) -> Self {
        let mut s = Self {
            regs: vec![0; STATE_SLOTS],
            tlb: Tlb::new(config.tlb_entries),
            page_table: PageTable::new(),
            memory,
            fastram: Vec::new(),
            timer_deadline: u64::MAX,
        };
        s.reset(config);
        s
    }

    /// Put the CPU in its power-on state.
    pub fn reset(&mut self, config: &Mips3Config) {
        self.regs.fill(0);
        self.tlb = Tlb::new(config.tlb_entries);
        self.page_table = PageTable::new();
        self.set_cop0(cop0::STATUS, sr::BEV | sr::ERL);
        self.set_cop0(cop0::PRID, config.prid as u64);
        self.set_cop0(cop0::WIRED, 0);
        self.set_cop0(cop0::RANDOM, config.tlb_entries.saturating_sub(1) as u64);
        self.set_cop0(cop0::CONFIG, if config.big_endian { 1 << 15 } else { 0 });
        self.regs[cpu::PC as usize] = cpu::RESET_VECTOR as u64;
        self.update_mode();
        self.timer_deadline = u64::MAX;
    }

    #[inline]
    pub fn reg(&self, slot: u16) -> u64 {
        self.regs[slot as usize]
    }

    #[inline]
    pub fn set_reg(&mut self, slot: u16, val: u64) {
        self.regs[slot as usize] = val;
    }

    pub fn cop0(&self, reg: usize) -> u64 {
        self.regs[cpu::cpr0_slot(reg) as usize]
    }

    pub fn set_cop0(&mut self, reg: usize, val: u64) {
        self.regs[cpu::cpr0_slot(reg) as usize] = val;
    }

    pub fn pc(&self) -> u32 {
        self.regs[cpu::PC as usize] as u32
    }

    pub fn mode(&self) -> u8 {
        self.regs[cpu::MODE as usize] as u8
    }

    pub fn privilege(&self) -> Privilege {
        Privilege::from_mode(self.mode())
    }

    /// Recompute the hash mode from Status.
    pub fn update_mode(&mut self) {
        let mode = cpu::mode_from_status(self.cop0(cop0::STATUS));
        self.regs[cpu::MODE as usize] = mode as u64;
    }

    fn asid(&self) -> u8 {
        self.cop0(cop0::ENTRY_HI) as u8
    }

    // -- Cycle accounting --

    /// Cycles executed since reset, including the running slice.
    pub fn total_cycles(&self) -> u64 {
        let budget = self.reg(cpu::BUDGET) as i64;
        let icount = self.reg(cpu::ICOUNT) as i64;
        self.reg(cpu::CYCLES_BASE)
            .wrapping_add(budget.wrapping_sub(icount) as u64)
    }

    /// Live value of the Count register.
    pub fn count(&self) -> u32 {
        self.count_at(self.total_cycles())
    }

    fn count_at(&self, now: u64) -> u32 {
        (now.wrapping_sub(self.reg(cpu::COUNT_ZERO_TIME)) / 2) as u32
    }

    /// Cycle time seen by a native call, including the caller's
    /// uncharged cycles.
    fn now(&self) -> u64 {
        self.total_cycles().wrapping_add(self.reg(cpu::ARG1))
    }

    /// Set Count as of total cycle time `now`.
    pub fn set_count(&mut self, val: u32, now: u64) {
        let zero = now.wrapping_sub(val as u64 * 2);
        self.set_reg(cpu::COUNT_ZERO_TIME, zero);
        self.rearm_timer(now);
    }

    /// Set Compare as of total cycle time `now`; acknowledges the
    /// timer interrupt.
    pub fn set_compare(&mut self, val: u32, now: u64) {
        self.set_cop0(cop0::COMPARE, val as u64);
        let c = self.cop0(cop0::CAUSE) & !cause::IP7;
        self.set_cop0(cop0::CAUSE, c);
        self.rearm_timer(now);
    }

    fn rearm_timer(&mut self, now: u64) {
        let count = self.count_at(now);
        let compare = self.cop0(cop0::COMPARE) as u32;
        let delta = compare.wrapping_sub(count) as u64;
        let delta = if delta == 0 { 1u64 << 32 } else { delta };
        self.timer_deadline = now.saturating_add(delta * 2);
    }

    /// Raise IP7 if Count has reached Compare.
    pub fn update_timer(&mut self) {
        if self.total_cycles() >= self.timer_deadline {
            let c = self.cop0(cop0::CAUSE) | cause::IP7;
            self.set_cop0(cop0::CAUSE, c);
            self.timer_deadline = self.timer_deadline.saturating_add(1u64 << 33);
        }
    }

    /// Cycles until the timer fires, if armed.
    pub fn cycles_until_timer(&self) -> Option<u64> {
        if self.timer_deadline == u64::MAX {
            return None;
        }
        Some(self.timer_deadline.saturating_sub(self.total_cycles()))
    }

    /// Drive external interrupt line `line` (0..=4 maps to IP2..IP6).
    pub fn set_irq_line(&mut self, line: u32, asserted: bool) {
        if line > 4 {
            return;
        }
        let bit = 0x400u64 << line;
        let c = self.cop0(cop0::CAUSE);
        let c = if asserted { c | bit } else { c & !bit };
        self.set_cop0(cop0::CAUSE, c);
    }

    // -- TLB --

    fn tlb_entry_from_cop0(&self) -> TlbEntry {
        let mask = self.cop0(cop0::PAGE_MASK) & 0x01ff_e000;
        TlbEntry {
            page_mask: mask,
            entry_hi: self.cop0(cop0::ENTRY_HI) & !(mask | 0x1f00),
            entry_lo: [self.cop0(cop0::ENTRY_LO0), self.cop0(cop0::ENTRY_LO1)],
        }
    }

    fn random(&self) -> u64 {
        let n = self.tlb.len() as u64;
        let wired = self.cop0(cop0::WIRED) & 0x3f;
        if wired >= n {
            return n.saturating_sub(1);
        }
        wired + self.now() % (n - wired)
    }

    pub fn tlb_write(&mut self, idx: usize, entry: TlbEntry) {
        let asid = self.asid();
        self.tlb.write(&mut self.page_table, idx, entry, asid);
    }

    pub fn image(&self) -> StateImage {
        StateImage {
            regs: self.regs.clone(),
            tlb: self.tlb.clone(),
            timer_deadline: self.timer_deadline,
        }
    }

    /// Load a saved image; the page table is derived from its TLB.
    pub fn restore(&mut self, image: StateImage) {
        self.regs = image.regs;
        self.tlb = image.tlb;
        self.timer_deadline = image.timer_deadline;
        self.rebuild_page_table();
    }

    /// Rebuild the page table from the TLB, e.g. after a state load.
    pub fn rebuild_page_table(&mut self) {
        let asid = self.asid();
        self.page_table = PageTable::new();
        self.tlb.remap_all(&mut self.page_table, asid);
    }

    fn native(&mut self, call: NativeCall) {
        let arg = self.reg(cpu::ARG0);
        match call {
            NativeCall::ReadCount => {
                let count = self.count_at(self.now());
                self.set_reg(cpu::ARG0, count as u64);
            }
            NativeCall::WriteCount => self.set_count(arg as u32, self.now()),
            NativeCall::WriteCompare => self.set_compare(arg as u32, self.now()),
            NativeCall::WriteStatus => {
                self.set_cop0(cop0::STATUS, arg & 0xffff_ffff);
                self.update_mode();
            }
            NativeCall::WriteEntryHi => {
                let old = self.asid();
                self.set_cop0(cop0::ENTRY_HI, arg);
                if old != arg as u8 {
                    self.tlb.remap_all(&mut self.page_table, arg as u8);
                }
            }
            NativeCall::ReadRandom => {
                let r = self.random();
                self.set_reg(cpu::ARG0, r);
            }
            NativeCall::TlbRead => {
                let idx = (self.cop0(cop0::INDEX) & 0x3f) as usize;
                if let Some(e) = self.tlb.entry(idx).copied() {
                    let g = e.global() as u64;
                    self.set_cop0(cop0::PAGE_MASK, e.page_mask);
                    self.set_cop0(cop0::ENTRY_HI, e.entry_hi);
                    self.set_cop0(cop0::ENTRY_LO0, (e.entry_lo[0] & !1) | g);
                    self.set_cop0(cop0::ENTRY_LO1, (e.entry_lo[1] & !1) | g);
                }
            }
            NativeCall::TlbWriteIndexed => {
                let idx = (self.cop0(cop0::INDEX) & 0x3f) as usize;
                let e = self.tlb_entry_from_cop0();
                self.tlb_write(idx, e);
            }
            NativeCall::TlbWriteRandom => {
                let idx = self.random() as usize;
                let e = self.tlb_entry_from_cop0();
                self.tlb_write(idx, e);
            }
            NativeCall::TlbProbe => {
                let hi = self.cop0(cop0::ENTRY_HI);
                let index = match self.tlb.probe(hi, hi as u8) {
                    Some(i) => i as u64,
                    None => 0x8000_0000,
                };
                self.set_cop0(cop0::INDEX, index);
            }
        }
    }

    // -- Memory --

    fn fast_region(&self, paddr: u32, size: MemSize) -> Option<&FastRamRegion> {
        self.fastram.iter().find(|r| r.contains(paddr, size))
    }

    /// Fetch the instruction at `vaddr` as the describer sees it.
    pub fn fetch_code(&mut self, mode: u8, vaddr: u32) -> Result<Fetched, FetchError> {
        let p = Privilege::from_mode(mode);
        let paddr = self
            .page_table
            .translate(p, vaddr, Intent::Fetch)
            .map_err(FetchError::PageFault)?;
        let pte = self.page_table.entry(vaddr);
        let word = match self.fast_region(paddr, MemSize::Word) {
            Some(r) => Some(r.read(paddr - r.start, MemSize::Word) as u32),
            None => self.memory.fetch(paddr),
        };
        match word {
            Some(word) => Ok(Fetched { paddr, word, pte }),
            None => Err(FetchError::Unmapped { paddr }),
        }
    }

    /// Translate an address the way compiled code would.
    pub fn translate(&self, vaddr: u32, intent: Intent) -> Result<u32, Fault> {
        self.page_table.translate(self.privilege(), vaddr, intent)
    }
}

impl Machine for Mips3State {
    fn state(&self) -> &[u64] {
        &self.regs
    }

    fn state_mut(&mut self) -> &mut [u64] {
        &mut self.regs
    }

    fn tlb_entry(&self, vaddr: u32) -> u32 {
        self.page_table.entry(vaddr)
    }

    fn fetch(&mut self, paddr: u32) -> u32 {
        match self.fast_region(paddr, MemSize::Word) {
            Some(r) => r.read(paddr - r.start, MemSize::Word) as u32,
            None => match self.memory.fetch(paddr) {
                Some(word) => word,
                None => {
                    // Compiled code only fetches what `fetch_code` saw.
                    tracing::warn!(paddr, "fetch from unbacked memory reads as zero");
                    0
                }
            },
        }
    }

    fn read(&mut self, paddr: u32, size: MemSize) -> u64 {
        self.memory.read(paddr, size)
    }

    fn write(&mut self, paddr: u32, size: MemSize, value: u64, mask: u64) {
        self.memory.write(paddr, size, value, mask);
    }

    fn fast_read(&self, region: usize, offset: u32, size: MemSize) -> u64 {
        self.fastram.get(region).map_or(0, |r| r.read(offset, size))
    }

    fn fast_write(&mut self, region: usize, offset: u32, size: MemSize, value: u64, mask: u64) {
        if let Some(r) = self.fastram.get_mut(region) {
            r.write(offset, size, value, mask);
        }
    }

    fn call(&mut self, func: u32) {
        match NativeCall::from_u32(func) {
            Some(call) => self.native(call),
            None => tracing::error!(func, "unknown native call"),
        }
    }
}
