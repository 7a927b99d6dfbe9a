//! Block compiler: turns described sequences into UML.

use std::collections::HashSet;

use drc_core::{Block, Cond, HashTable, Label, MapVar, Operand, Type};

use super::config::Mips3Config;
use super::cpu::{self, exit, mem, Exception, Privilege, ARG0, ARG1, I0, I1, ICOUNT, MODE, PC};
use super::describe::{descflags::*, InstructionDescriptor};
use super::handlers::{gen_interrupt_pending, StaticHandles};
use super::memory::Hotspot;
use super::regmap::RegisterMap;
use super::tlb::address_allowed;

/// Per-request compiler state.
#[derive(Debug, Clone, Default)]
pub struct CompilerState {
    /// Cycles accumulated but not yet charged to ICOUNT.
    pub cycles: u32,
    pub check_interrupts: bool,
    pub check_soft_interrupts: bool,
    pub next_local_label: u32,
}

impl CompilerState {
    pub fn new() -> Self {
        Self {
            next_local_label: 1,
            ..Self::default()
        }
    }

    pub fn new_label(&mut self) -> Label {
        let l = Label(self.next_local_label);
        self.next_local_label += 1;
        l
    }
}

/// Label placed at a branch target sequence head.
pub fn branch_label(pc: u32) -> Label {
    Label(pc | 0x8000_0000)
}

/// Everything needed to emit one compiled block.
pub struct Translator<'a> {
    pub b: &'a mut Block,
    pub h: &'a StaticHandles,
    pub regmap: &'a RegisterMap,
    pub config: &'a Mips3Config,
    pub hotspots: &'a [Hotspot],
    pub mode: u8,
    /// Sequence heads labelled in this block.
    labels: HashSet<u32>,
}

/// Shared, per-cache inputs to the compiler.
#[derive(Clone, Copy)]
pub struct CompileContext<'a> {
    pub handles: &'a StaticHandles,
    pub regmap: &'a RegisterMap,
    pub config: &'a Mips3Config,
    pub hotspots: &'a [Hotspot],
}

/// Whether control never falls out of `d`.
fn transfers_control(d: &InstructionDescriptor) -> bool {
    if d.has(IS_UNCONDITIONAL_BRANCH | COMPILER_PAGE_FAULT | COMPILER_UNMAPPED) {
        return true;
    }
    let op = d.opcode;
    let syscall_or_break = op >> 26 == 0 && matches!(op & 0x3f, 0x0c | 0x0d);
    let eret = op >> 26 == 0x10 && op & (1 << 25) != 0 && op & 0x3f == 0x18;
    syscall_or_break || eret
}

/// Compile the described code into `block`.
///
/// Sequences whose head already has a hash entry become redispatch
/// stubs, unless the first sequence of the request is already present,
/// in which case every sequence is compiled and re-registered.
pub fn compile_block(
    block: &mut Block,
    hash: &HashTable,
    ctx: CompileContext<'_>,
    mode: u8,
    descs: &[InstructionDescriptor],
) {
    let labels = descs
        .iter()
        .filter(|d| d.has(IS_BRANCH_TARGET))
        .map(|d| d.pc)
        .collect();
    let mut t = Translator {
        b: block,
        h: ctx.handles,
        regmap: ctx.regmap,
        config: ctx.config,
        hotspots: ctx.hotspots,
        mode,
        labels,
    };
    let mut compiler = CompilerState::new();
    let mut override_hash = false;

    let mut start = 0;
    while start < descs.len() {
        let end = descs[start..]
            .iter()
            .position(|d| d.has(END_SEQUENCE))
            .map_or(descs.len() - 1, |i| start + i);
        let seq = &descs[start..=end];
        let head = &seq[0];
        let first = start == 0;
        start = end + 1;

        if override_hash || !hash.exists(mode, head.pc) {
            t.b.gen_hash(mode, head.pc);
        } else if first {
            override_hash = true;
            t.b.gen_hash(mode, head.pc);
        } else {
            if head.has(IS_BRANCH_TARGET) {
                t.b.gen_label(branch_label(head.pc));
            }
            t.b.gen_hashjmp(Operand::Imm(mode as u64), Operand::Imm(head.pc as u64), t.h.nocode);
            continue;
        }

        t.gen_checksum(seq);
        if head.has(IS_BRANCH_TARGET) {
            t.b.gen_label(branch_label(head.pc));
        }

        compiler.cycles = 0;
        compiler.check_interrupts = false;
        compiler.check_soft_interrupts = false;
        for d in seq {
            t.gen_instruction(&mut compiler, d);
        }

        let last = &seq[seq.len() - 1];
        if !transfers_control(last) {
            let next = if last.has(RETURN_TO_START) {
                head.pc
            } else {
                last.next_pc()
            };
            let next = Operand::Imm(next as u64);
            t.update_cycles(&mut compiler, next, true);
            t.b.gen_hashjmp(mem(MODE), next, t.h.nocode);
        }
    }
}

impl Translator<'_> {
    pub fn privilege(&self) -> Privilege {
        Privilege::from_mode(self.mode)
    }

    pub fn has_label(&self, pc: u32) -> bool {
        self.labels.contains(&pc)
    }

    /// Check that guest memory still holds what was compiled.
    fn gen_checksum(&mut self, seq: &[InstructionDescriptor]) {
        let head = seq[0].pc;
        let words: Vec<&InstructionDescriptor> = seq
            .iter()
            .flat_map(|d| std::iter::once(d).chain(d.delay.as_deref()))
            .filter(|d| !d.has(COMPILER_PAGE_FAULT | COMPILER_UNMAPPED))
            .collect();
        if words.is_empty() {
            return;
        }

        if !self.config.strict_verify || seq.len() == 1 {
            if let Some(d) = words.iter().find(|d| !d.has(VIRTUAL_NOOP)) {
                self.b.gen_loadcode(I0, Operand::Imm(d.physpc as u64));
                self.b.gen_cmp(Type::I32, I0, Operand::Imm(d.opcode as u64));
                self.b.gen_exhc(Cond::Ne, self.h.nocode, Operand::Imm(head as u64));
            }
            return;
        }

        let mut sum = 0u32;
        for (i, d) in words.iter().enumerate() {
            let dst = if i == 0 { I0 } else { I1 };
            self.b.gen_loadcode(dst, Operand::Imm(d.physpc as u64));
            if i > 0 {
                self.b.gen_add(Type::I32, I0, I0, I1);
            }
            sum = sum.wrapping_add(d.opcode);
        }
        self.b.gen_cmp(Type::I32, I0, Operand::Imm(sum as u64));
        self.b.gen_exhc(Cond::Ne, self.h.nocode, Operand::Imm(head as u64));
    }

    /// Charge pending cycles, taking pending interrupts first. `param`
    /// is the pc execution resumes at.
    pub fn update_cycles(&mut self, c: &mut CompilerState, param: Operand, allow_exception: bool) {
        if c.check_soft_interrupts {
            c.check_soft_interrupts = false;
            self.gen_take_interrupt(c, param, true);
        }
        if c.check_interrupts {
            c.check_interrupts = false;
            self.gen_take_interrupt(c, param, false);
        }
        if c.cycles > 0 {
            self.b.gen_sub(Type::I64, mem(ICOUNT), mem(ICOUNT), Operand::Imm(c.cycles as u64));
            self.b.gen_mapvar(MapVar::Cycles, 0);
            if allow_exception {
                self.b.gen_exhc(Cond::Neg, self.h.out_of_cycles, param);
            }
        }
        c.cycles = 0;
    }

    fn gen_take_interrupt(&mut self, c: &mut CompilerState, param: Operand, soft_only: bool) {
        let skip = c.new_label();
        gen_interrupt_pending(self.b, skip, soft_only);
        if c.cycles > 0 {
            self.b.gen_sub(Type::I64, mem(ICOUNT), mem(ICOUNT), Operand::Imm(c.cycles as u64));
        }
        self.b.gen_exh(self.h.exception_norecover(Exception::Interrupt), param);
        self.b.gen_label(skip);
    }

    /// Emit one instruction, its map variables and TLB validation.
    pub fn gen_instruction(&mut self, c: &mut CompilerState, d: &InstructionDescriptor) {
        self.b.gen_comment(d.pc);
        c.cycles += d.cycles;
        for hs in self.hotspots {
            if hs.pc == d.pc && hs.opcode == d.opcode {
                c.cycles += hs.cycles;
            }
        }

        let flag = if d.has(IN_DELAY_SLOT) { cpu::DELAY_SLOT_FLAG } else { 0 };
        self.b.gen_mapvar(MapVar::Pc, d.pc as u64 | flag);
        self.b.gen_mapvar(MapVar::Cycles, c.cycles as u64);

        if d.has(VALIDATE_TLB) {
            self.b.gen_tlblookup(I0, Operand::Imm(d.pc as u64));
            self.b.gen_cmp(Type::I32, I0, Operand::Imm(d.pte as u64));
            self.b.gen_exhc(Cond::Ne, self.h.tlb_mismatch, Operand::Imm(0));
        }

        if d.has(COMPILER_UNMAPPED) {
            self.b.gen_mov(Type::I32, mem(PC), Operand::Imm(d.pc as u64));
            self.regmap.save_fast_regs(self.b);
            self.b.gen_exit(Operand::Imm(exit::UNMAPPED_CODE as u64));
        } else if d.has(COMPILER_PAGE_FAULT) {
            if address_allowed(self.privilege(), d.pc) {
                self.b.gen_exh(self.h.tlb_mismatch, Operand::Imm(0));
            } else {
                let h = self.h.exception(Exception::AddressLoad);
                self.b.gen_exh(h, Operand::Imm(d.pc as u64));
            }
        } else if !self.gen_opcode(c, d) {
            self.b.gen_mov(Type::I32, mem(PC), Operand::Imm(d.pc as u64));
            self.b.gen_mov(Type::I64, mem(ARG0), Operand::Imm(d.pc as u64));
            self.b.gen_mov(Type::I64, mem(ARG1), Operand::Imm(d.opcode as u64));
            self.regmap.save_fast_regs(self.b);
            self.b.gen_exit(Operand::Imm(exit::UNIMPLEMENTED as u64));
        }
    }

    /// Execute the delay slot, then transfer to `target` (or to the
    /// address captured in JMPDEST when dynamic).
    ///
    /// The delay slot runs against a copy of the compiler state so its
    /// cycles and interrupt checks stay on the taken path.
    pub fn gen_delay_slot_and_branch(
        &mut self,
        c: &mut CompilerState,
        d: &InstructionDescriptor,
        target: Option<u32>,
    ) {
        let mut taken = c.clone();
        if let Some(slot) = d.delay.as_deref() {
            self.gen_instruction(&mut taken, slot);
        }
        match target {
            Some(pc) => {
                let dest = Operand::Imm(pc as u64);
                self.update_cycles(&mut taken, dest, true);
                if self.has_label(pc) {
                    self.b.gen_jmp(branch_label(pc));
                } else {
                    self.b.gen_hashjmp(mem(MODE), dest, self.h.nocode);
                }
            }
            None => {
                let dest = mem(cpu::JMPDEST);
                self.update_cycles(&mut taken, dest, true);
                self.b.gen_hashjmp(mem(MODE), dest, self.h.nocode);
            }
        }
        c.next_local_label = taken.next_local_label;
    }

    /// Conditional branch epilogue: emits the not-taken delay slot
    /// unless the branch is a likely form.
    pub fn gen_fallthrough_delay(&mut self, c: &mut CompilerState, d: &InstructionDescriptor) {
        if d.has(LIKELY) {
            return;
        }
        if let Some(slot) = d.delay.as_deref() {
            self.gen_instruction(c, slot);
        }
    }

    /// Set ARG1 to the uncharged cycles and call a native function.
    pub fn gen_native(&mut self, c: &CompilerState, call: cpu::NativeCall) {
        self.b.gen_mov(Type::I64, mem(ARG1), Operand::Imm(c.cycles as u64));
        self.b.gen_callc(call as u32);
    }
}
