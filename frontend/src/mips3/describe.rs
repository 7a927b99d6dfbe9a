//! Basic block describer.
//!
//! Walks guest code forward from a starting pc and produces one
//! descriptor per instruction. Branch delay slots hang off their
//! branch as a side-chain rather than appearing in the main list.

use std::collections::HashSet;

use super::state::{FetchError, Mips3State};
use super::tlb::{pte, PAGE_SHIFT};

/// Descriptor flags.
pub mod descflags {
    pub const IS_BRANCH_TARGET: u32 = 1 << 0;
    pub const IS_CONDITIONAL_BRANCH: u32 = 1 << 1;
    pub const IS_UNCONDITIONAL_BRANCH: u32 = 1 << 2;
    pub const IS_BRANCH: u32 = IS_CONDITIONAL_BRANCH | IS_UNCONDITIONAL_BRANCH;
    pub const IN_DELAY_SLOT: u32 = 1 << 3;
    pub const END_SEQUENCE: u32 = 1 << 4;
    pub const CAN_CAUSE_EXCEPTION: u32 = 1 << 5;
    pub const VIRTUAL_NOOP: u32 = 1 << 6;
    pub const VALIDATE_TLB: u32 = 1 << 7;
    /// Changes the mode or the address map; code after it must be
    /// dispatched again.
    pub const MODIFIES_TRANSLATION: u32 = 1 << 8;
    pub const COMPILER_PAGE_FAULT: u32 = 1 << 9;
    pub const COMPILER_UNMAPPED: u32 = 1 << 10;
    pub const READS_MEMORY: u32 = 1 << 11;
    pub const WRITES_MEMORY: u32 = 1 << 12;
    /// Falls through to the head of its own sequence instead of the
    /// next pc.
    pub const RETURN_TO_START: u32 = 1 << 13;
    /// Branch-likely: the delay slot is annulled when not taken.
    pub const LIKELY: u32 = 1 << 14;
}

use descflags::*;

/// Target pc of a branch whose destination is computed at run time.
pub const BRANCH_TARGET_DYNAMIC: u32 = u32::MAX;

/// One described guest instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionDescriptor {
    pub pc: u32,
    pub physpc: u32,
    pub opcode: u32,
    pub flags: u32,
    /// Declared cycle cost.
    pub cycles: u32,
    pub target_pc: u32,
    /// Page table entry observed when the instruction was fetched.
    pub pte: u32,
    pub delay: Option<Box<InstructionDescriptor>>,
}

impl InstructionDescriptor {
    #[inline]
    pub fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// Pc following this instruction and its delay slot.
    pub fn next_pc(&self) -> u32 {
        let len = if self.delay.is_some() { 8 } else { 4 };
        self.pc.wrapping_add(len)
    }

    /// Total declared cycles including the delay slot.
    pub fn total_cycles(&self) -> u32 {
        self.cycles + self.delay.as_ref().map_or(0, |d| d.cycles)
    }
}

/// Static properties of one opcode.
#[derive(Debug, Clone, Copy, Default)]
struct OpInfo {
    flags: u32,
    cycles: u32,
    target: u32,
}

fn branch_target(pc: u32, op: u32) -> u32 {
    let off = ((op & 0xffff) as u16 as i16 as i32) << 2;
    pc.wrapping_add(4).wrapping_add(off as u32)
}

fn analyze(pc: u32, op: u32) -> OpInfo {
    let rs = (op >> 21) & 31;
    let rt = (op >> 16) & 31;
    let mut info = OpInfo {
        flags: 0,
        cycles: 1,
        target: 0,
    };
    if op == 0 {
        info.flags |= VIRTUAL_NOOP;
        return info;
    }
    match op >> 26 {
        0x00 => match op & 0x3f {
            0x08 | 0x09 => {
                info.flags |= IS_UNCONDITIONAL_BRANCH | END_SEQUENCE;
                info.target = BRANCH_TARGET_DYNAMIC;
            }
            0x0c | 0x0d => info.flags |= CAN_CAUSE_EXCEPTION | END_SEQUENCE,
            0x18 | 0x19 => info.cycles = 5,
            0x1a | 0x1b => info.cycles = 36,
            0x1c | 0x1d => info.cycles = 8,
            0x1e | 0x1f => info.cycles = 68,
            0x20 | 0x22 | 0x2c | 0x2e => info.flags |= CAN_CAUSE_EXCEPTION,
            0x30..=0x36 => info.flags |= CAN_CAUSE_EXCEPTION,
            _ => {}
        },
        0x01 => match rt {
            0x00..=0x03 | 0x10..=0x13 => {
                info.flags |= IS_CONDITIONAL_BRANCH;
                if rt & 2 != 0 {
                    info.flags |= LIKELY;
                }
                info.target = branch_target(pc, op);
            }
            _ => info.flags |= CAN_CAUSE_EXCEPTION,
        },
        0x02 | 0x03 => {
            info.flags |= IS_UNCONDITIONAL_BRANCH | END_SEQUENCE;
            info.target = (pc.wrapping_add(4) & 0xf000_0000) | ((op & 0x03ff_ffff) << 2);
        }
        0x04 if rs == rt => {
            info.flags |= IS_UNCONDITIONAL_BRANCH | END_SEQUENCE;
            info.target = branch_target(pc, op);
        }
        0x04..=0x07 | 0x14..=0x17 => {
            info.flags |= IS_CONDITIONAL_BRANCH;
            if op >> 26 >= 0x14 {
                info.flags |= LIKELY;
            }
            info.target = branch_target(pc, op);
        }
        0x08 | 0x18 => info.flags |= CAN_CAUSE_EXCEPTION,
        0x10 => {
            info.flags |= CAN_CAUSE_EXCEPTION;
            match rs {
                0x04 | 0x05 => info.flags |= MODIFIES_TRANSLATION | END_SEQUENCE,
                0x10..=0x1f => match op & 0x3f {
                    0x02 | 0x06 => info.flags |= MODIFIES_TRANSLATION | END_SEQUENCE,
                    0x18 => {
                        info.flags |= MODIFIES_TRANSLATION | END_SEQUENCE;
                        info.target = BRANCH_TARGET_DYNAMIC;
                    }
                    // WAIT idles in place until an interrupt.
                    0x20 => info.flags |= RETURN_TO_START | END_SEQUENCE,
                    _ => {}
                },
                _ => {}
            }
        }
        0x11 => {
            info.flags |= CAN_CAUSE_EXCEPTION;
            if rs == 0x08 {
                info.flags |= IS_CONDITIONAL_BRANCH;
                if rt & 2 != 0 {
                    info.flags |= LIKELY;
                }
                info.target = branch_target(pc, op);
            }
        }
        0x13 => {
            info.flags |= CAN_CAUSE_EXCEPTION;
            match op & 0x3f {
                0x00 | 0x01 | 0x05 => info.flags |= READS_MEMORY,
                0x08 | 0x09 | 0x0d => info.flags |= WRITES_MEMORY,
                _ => {}
            }
        }
        0x1a | 0x1b | 0x20..=0x27 | 0x30 | 0x31 | 0x34 | 0x35 | 0x37 => {
            info.flags |= CAN_CAUSE_EXCEPTION | READS_MEMORY;
        }
        0x2c..=0x2e | 0x28..=0x2b | 0x38 | 0x39 | 0x3c | 0x3d | 0x3f => {
            info.flags |= CAN_CAUSE_EXCEPTION | WRITES_MEMORY;
        }
        0x09..=0x0f | 0x19 | 0x2f | 0x33 => {}
        _ => info.flags |= CAN_CAUSE_EXCEPTION,
    }
    info
}

/// Forward-walking describer.
#[derive(Debug, Clone)]
pub struct Mips3Describer {
    /// Bytes described ahead of the starting pc.
    pub window_end: u32,
    /// Instructions per sequence.
    pub max_sequence: u32,
    /// Instructions per request.
    pub max_instructions: u32,
}

impl Mips3Describer {
    pub fn new(window_end: u32, max_sequence: u32, max_instructions: u32) -> Self {
        Self {
            window_end,
            max_sequence: max_sequence.max(1),
            max_instructions: max_instructions.max(1),
        }
    }

    fn describe_one(
        &self,
        state: &mut Mips3State,
        mode: u8,
        pc: u32,
        validate: bool,
    ) -> InstructionDescriptor {
        let mut desc = InstructionDescriptor {
            pc,
            physpc: pc,
            opcode: 0,
            flags: 0,
            cycles: 1,
            target_pc: 0,
            pte: 0,
            delay: None,
        };
        match state.fetch_code(mode, pc) {
            Ok(f) => {
                let info = analyze(pc, f.word);
                desc.physpc = f.paddr;
                desc.opcode = f.word;
                desc.flags = info.flags;
                desc.cycles = info.cycles;
                desc.target_pc = info.target;
                desc.pte = f.pte;
                if validate && f.pte & pte::FIXED == 0 {
                    desc.flags |= VALIDATE_TLB;
                }
            }
            Err(FetchError::PageFault(_)) => {
                desc.flags = COMPILER_PAGE_FAULT | CAN_CAUSE_EXCEPTION | END_SEQUENCE;
                desc.pte = state.page_table.entry(pc);
            }
            Err(FetchError::Unmapped { paddr }) => {
                desc.physpc = paddr;
                desc.flags = COMPILER_UNMAPPED | END_SEQUENCE;
            }
        }
        desc
    }

    /// Describe code starting at `pc` in `mode`.
    ///
    /// The last descriptor always carries `END_SEQUENCE`.
    pub fn describe(
        &self,
        state: &mut Mips3State,
        mode: u8,
        start: u32,
    ) -> Vec<InstructionDescriptor> {
        let limit = start.saturating_add(self.window_end.max(4));
        let mut list: Vec<InstructionDescriptor> = Vec::new();
        let mut pc = start;
        let mut count = 0;
        let mut in_sequence = 0;
        let mut last_page = None;

        while count < self.max_instructions && pc >= start && pc < limit {
            let page = pc >> PAGE_SHIFT;
            let mut desc = self.describe_one(state, mode, pc, last_page != Some(page));
            last_page = Some(page);
            count += 1;
            in_sequence += 1;

            // A sequence that returns to its start holds nothing else.
            if desc.has(RETURN_TO_START) && in_sequence > 1 {
                if let Some(prev) = list.last_mut() {
                    prev.flags |= END_SEQUENCE;
                }
                in_sequence = 1;
            }

            if desc.has(IS_BRANCH) {
                let dpc = pc.wrapping_add(4);
                let dpage = dpc >> PAGE_SHIFT;
                let mut slot = self.describe_one(state, mode, dpc, dpage != page);
                last_page = Some(dpage);
                slot.flags |= IN_DELAY_SLOT;
                // The delay slot cannot end a sequence on its own.
                let slot_ends = slot.has(COMPILER_PAGE_FAULT | COMPILER_UNMAPPED);
                slot.flags &= !(END_SEQUENCE | RETURN_TO_START);
                if slot_ends || slot.has(IS_BRANCH) {
                    desc.flags |= END_SEQUENCE;
                }
                slot.flags &= !IS_BRANCH;
                desc.delay = Some(Box::new(slot));
                count += 1;
            }

            // Anything that ends a sequence by itself also ends the walk.
            let stop = desc.has(END_SEQUENCE);
            if in_sequence >= self.max_sequence {
                desc.flags |= END_SEQUENCE;
            }
            if desc.has(END_SEQUENCE) {
                in_sequence = 0;
            }
            pc = desc.next_pc();
            list.push(desc);
            if stop {
                break;
            }
        }

        mark_branch_targets(&mut list);
        if let Some(last) = list.last_mut() {
            last.flags |= END_SEQUENCE;
        }
        tracing::trace!(start, count = list.len(), "described");
        list
    }
}

/// Flag static branch targets that start a described instruction, and
/// end the sequence just before each of them.
fn mark_branch_targets(list: &mut [InstructionDescriptor]) {
    let targets: HashSet<u32> = list
        .iter()
        .filter(|d| d.has(IS_BRANCH) && d.target_pc != BRANCH_TARGET_DYNAMIC)
        .map(|d| d.target_pc)
        .collect();
    for i in 0..list.len() {
        if targets.contains(&list[i].pc) {
            list[i].flags |= IS_BRANCH_TARGET;
            if i > 0 {
                list[i - 1].flags |= END_SEQUENCE;
            }
        }
    }
}
