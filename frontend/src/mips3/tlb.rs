//! TLB and the direct-mapped page table generated code consults.
//!
//! Each of the 48 TLB entries maps a pair of pages (even + odd) whose
//! size is set by PageMask. Rather than search the TLB on every
//! access, every entry is expanded into a flat table with one word per
//! 4 KiB virtual page:
//!
//!   [31:12] physical page
//!   [3]     FIXED   (unmapped kseg0/kseg1 window)
//!   [2]     PRESENT (some TLB entry covers the page)
//!   [1]     WRITE   (valid and dirty)
//!   [0]     READ    (valid)

use serde::{Deserialize, Serialize};

use super::cpu::Privilege;

pub mod pte {
    pub const READ: u32 = 1 << 0;
    pub const WRITE: u32 = 1 << 1;
    pub const PRESENT: u32 = 1 << 2;
    pub const FIXED: u32 = 1 << 3;
    pub const FLAGS_MASK: u32 = 0xf;
    pub const PAGE_MASK: u32 = 0xffff_f000;
}

pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_COUNT: usize = 1 << (32 - PAGE_SHIFT);

/// Kind of access being translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Read,
    Write,
    Fetch,
}

/// Translation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// A TLB entry covers the page but is not valid: reload.
    TlbMissExisting,
    /// No TLB entry covers the page: refill.
    TlbMissNoMapping,
    /// Address not reachable from the current privilege level.
    AddressError,
    /// Write to a valid page whose dirty bit is clear.
    TlbModify,
}

/// Whether `vaddr` is reachable at privilege `p`.
///
/// User mode may only touch the low 2 GiB. Supervisor mode adds the
/// window whose top three address bits are `110`.
pub fn address_allowed(p: Privilege, vaddr: u32) -> bool {
    match p {
        Privilege::Kernel => true,
        Privilege::User => vaddr & 0x8000_0000 == 0,
        Privilege::Supervisor => vaddr & 0x8000_0000 == 0 || vaddr >> 29 == 6,
    }
}

/// Classify a page table entry for an access.
pub fn check_entry(entry: u32, intent: Intent) -> Result<(), Fault> {
    let need = match intent {
        Intent::Write => pte::WRITE,
        Intent::Read | Intent::Fetch => pte::READ,
    };
    if entry & need != 0 {
        Ok(())
    } else if intent == Intent::Write && entry & pte::READ != 0 {
        Err(Fault::TlbModify)
    } else if entry & pte::PRESENT != 0 {
        Err(Fault::TlbMissExisting)
    } else {
        Err(Fault::TlbMissNoMapping)
    }
}

/// Flat page table, one word per 4 KiB virtual page.
#[derive(Clone)]
pub struct PageTable {
    entries: Vec<u32>,
}

impl PageTable {
    pub fn new() -> Self {
        let mut t = Self {
            entries: vec![0; PAGE_COUNT],
        };
        t.map_fixed();
        t
    }

    /// Map kseg0 and kseg1 onto the low 512 MiB of physical memory.
    fn map_fixed(&mut self) {
        let flags = pte::READ | pte::WRITE | pte::PRESENT | pte::FIXED;
        for vpn in (0x8000_0000u32 >> PAGE_SHIFT)..(0xc000_0000u32 >> PAGE_SHIFT) {
            let paddr = (vpn << PAGE_SHIFT) & 0x1fff_ffff;
            self.entries[vpn as usize] = paddr | flags;
        }
    }

    #[inline]
    pub fn entry(&self, vaddr: u32) -> u32 {
        self.entries[(vaddr >> PAGE_SHIFT) as usize]
    }

    fn set(&mut self, vpn: u32, val: u32) {
        let e = &mut self.entries[vpn as usize];
        if *e & pte::FIXED == 0 {
            *e = val;
        }
    }

    /// Drop every TLB-derived mapping, keeping the fixed windows.
    pub fn clear(&mut self) {
        for e in self.entries.iter_mut() {
            if *e & pte::FIXED == 0 {
                *e = 0;
            }
        }
    }

    /// Translate `vaddr` for an access at privilege `p`.
    pub fn translate(&self, p: Privilege, vaddr: u32, intent: Intent) -> Result<u32, Fault> {
        if !address_allowed(p, vaddr) {
            return Err(Fault::AddressError);
        }
        let entry = self.entry(vaddr);
        check_entry(entry, intent)?;
        Ok((entry & pte::PAGE_MASK) | (vaddr & !pte::PAGE_MASK))
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

/// One TLB entry as written by TLBWI/TLBWR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlbEntry {
    pub page_mask: u64,
    pub entry_hi: u64,
    pub entry_lo: [u64; 2],
}

impl TlbEntry {
    /// Both halves must carry G for the entry to ignore ASID.
    pub fn global(&self) -> bool {
        self.entry_lo[0] & self.entry_lo[1] & 1 != 0
    }

    pub fn asid(&self) -> u8 {
        self.entry_hi as u8
    }

    /// Size in bytes of each of the two pages.
    pub fn page_size(&self) -> u64 {
        ((self.page_mask | 0x1fff) + 1) >> 1
    }

    /// First virtual address of the even page.
    pub fn vbase(&self) -> u64 {
        let mask = self.page_mask | 0x1fff;
        self.entry_hi & !mask & 0xffff_ffff
    }

    /// Whether the entry matches `vaddr` under `asid`.
    pub fn matches(&self, vaddr: u64, asid: u8) -> bool {
        let mask = self.page_mask | 0x1fff;
        (vaddr & !mask & 0xffff_ffff) == self.vbase() && (self.global() || self.asid() == asid)
    }
}

/// The TLB plus the bookkeeping that keeps the page table in sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tlb {
    entries: Vec<TlbEntry>,
}

impl Tlb {
    pub fn new(count: usize) -> Self {
        Self {
            entries: vec![TlbEntry::default(); count],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, idx: usize) -> Option<&TlbEntry> {
        self.entries.get(idx)
    }

    pub fn entries(&self) -> &[TlbEntry] {
        &self.entries
    }

    /// Pages of entry `idx` in the page table, as (vpn, page count).
    fn pages(e: &TlbEntry, half: usize) -> (u64, u64) {
        let size = e.page_size();
        let start = e.vbase() + half as u64 * size;
        (start >> PAGE_SHIFT, size >> PAGE_SHIFT)
    }

    fn unmap(&self, table: &mut PageTable, idx: usize) {
        let e = self.entries[idx];
        for half in 0..2 {
            let (vpn, count) = Self::pages(&e, half);
            for i in 0..count {
                let page = vpn + i;
                if page < PAGE_COUNT as u64 {
                    table.set(page as u32, 0);
                }
            }
        }
    }

    fn map(&self, table: &mut PageTable, idx: usize, asid: u8) {
        let e = self.entries[idx];
        if !e.global() && e.asid() != asid {
            return;
        }
        for half in 0..2 {
            let lo = e.entry_lo[half];
            let valid = lo & 2 != 0;
            let dirty = lo & 4 != 0;
            let mut flags = pte::PRESENT;
            if valid {
                flags |= pte::READ;
                if dirty {
                    flags |= pte::WRITE;
                }
            }
            let pfn = ((lo >> 6) & 0x00ff_ffff) as u32;
            let (vpn, count) = Self::pages(&e, half);
            for i in 0..count {
                let page = vpn + i;
                if page < PAGE_COUNT as u64 {
                    let paddr = pfn.wrapping_add(i as u32) << PAGE_SHIFT;
                    table.set(page as u32, paddr | flags);
                }
            }
        }
    }

    /// Replace entry `idx` and update the page table.
    pub fn write(&mut self, table: &mut PageTable, idx: usize, entry: TlbEntry, asid: u8) {
        if idx >= self.entries.len() {
            return;
        }
        self.unmap(table, idx);
        self.entries[idx] = entry;
        self.map(table, idx, asid);
        tracing::trace!(idx, hi = entry.entry_hi, "tlb write");
    }

    /// Rebuild every mapping, e.g. after the current ASID changed.
    pub fn remap_all(&self, table: &mut PageTable, asid: u8) {
        table.clear();
        for idx in 0..self.entries.len() {
            self.map(table, idx, asid);
        }
    }

    /// Index of the entry matching `vaddr`, as TLBP computes it.
    pub fn probe(&self, vaddr: u64, asid: u8) -> Option<usize> {
        self.entries.iter().position(|e| e.matches(vaddr, asid))
    }
}
