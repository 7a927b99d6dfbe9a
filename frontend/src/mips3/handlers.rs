//! Static handlers shared by all compiled code.
//!
//! Handles are allocated once per code cache and survive resets; the
//! bodies are regenerated after every flush by [`generate_static`].
//!
//! Register conventions for the memory accessors, which are entered
//! with `Callh`:
//!
//!   I0  virtual address in, loaded value out
//!   I1  value to store
//!   I2  byte mask for masked stores
//!   I3  scratch
//!
//! Exception handlers are entered with `Exh`. The recoverable flavour
//! takes the faulting address (or coprocessor number for `BadCop`) as
//! its parameter and recovers PC and CYCLES from the map variables of
//! the faulting call site. The non-recoverable flavour takes the pc to
//! report as its parameter and charges no cycles.

use drc_backend::{CacheError, HandleTable};
use drc_core::{Block, Cond, Handle, Label, MapVar, MemSize, Operand, Type};

use super::cpu::{
    self, cause, cop0, cpr0_slot, exit, mem, sr, Exception, Privilege, DELAY_SLOT_FLAG,
    EXCEPTIONS, EXCEPTION_COUNT, FCR31, I0, I1, I2, I3, ICOUNT, MODE, PC, VECTOR_BASE,
    WAIT_RESUME,
};
use super::memory::FastRamRegion;
use super::regmap::RegisterMap;
use super::tlb::pte;

/// Transfer widths served by the memory accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Byte,
    Half,
    Word,
    WordMasked,
    Dword,
    DwordMasked,
}

pub const ACCESS_COUNT: usize = 6;

pub const ACCESSES: [Access; ACCESS_COUNT] = [
    Access::Byte,
    Access::Half,
    Access::Word,
    Access::WordMasked,
    Access::Dword,
    Access::DwordMasked,
];

impl Access {
    pub const fn size(self) -> MemSize {
        match self {
            Access::Byte => MemSize::Byte,
            Access::Half => MemSize::Half,
            Access::Word | Access::WordMasked => MemSize::Word,
            Access::Dword | Access::DwordMasked => MemSize::Dword,
        }
    }

    pub const fn masked(self) -> bool {
        matches!(self, Access::WordMasked | Access::DwordMasked)
    }
}

const READ_NAMES: [[&str; ACCESS_COUNT]; 3] = [
    [
        "read8_kernel",
        "read16_kernel",
        "read32_kernel",
        "read32m_kernel",
        "read64_kernel",
        "read64m_kernel",
    ],
    [
        "read8_supervisor",
        "read16_supervisor",
        "read32_supervisor",
        "read32m_supervisor",
        "read64_supervisor",
        "read64m_supervisor",
    ],
    [
        "read8_user",
        "read16_user",
        "read32_user",
        "read32m_user",
        "read64_user",
        "read64m_user",
    ],
];

const WRITE_NAMES: [[&str; ACCESS_COUNT]; 3] = [
    [
        "write8_kernel",
        "write16_kernel",
        "write32_kernel",
        "write32m_kernel",
        "write64_kernel",
        "write64m_kernel",
    ],
    [
        "write8_supervisor",
        "write16_supervisor",
        "write32_supervisor",
        "write32m_supervisor",
        "write64_supervisor",
        "write64m_supervisor",
    ],
    [
        "write8_user",
        "write16_user",
        "write32_user",
        "write32m_user",
        "write64_user",
        "write64m_user",
    ],
];

/// Every handle compiled code may reference.
#[derive(Debug, Clone)]
pub struct StaticHandles {
    pub entry: Handle,
    pub nocode: Handle,
    pub out_of_cycles: Handle,
    pub tlb_mismatch: Handle,
    pub exception: [Handle; EXCEPTION_COUNT],
    pub exception_norecover: [Handle; EXCEPTION_COUNT],
    pub read: [[Handle; ACCESS_COUNT]; 3],
    pub write: [[Handle; ACCESS_COUNT]; 3],
}

impl StaticHandles {
    /// Allocate the full set of handles.
    pub fn alloc(table: &mut HandleTable) -> Result<Self, CacheError> {
        let entry = table.alloc("entry")?;
        let nocode = table.alloc("nocode")?;
        let out_of_cycles = table.alloc("out_of_cycles")?;
        let tlb_mismatch = table.alloc("tlb_mismatch")?;

        let mut exception = [Handle(0); EXCEPTION_COUNT];
        let mut exception_norecover = [Handle(0); EXCEPTION_COUNT];
        for e in EXCEPTIONS {
            exception[e as usize] = table.alloc(e.name())?;
            exception_norecover[e as usize] = table.alloc("exception_norecover")?;
        }

        let mut read = [[Handle(0); ACCESS_COUNT]; 3];
        let mut write = [[Handle(0); ACCESS_COUNT]; 3];
        for p in 0..3 {
            for a in 0..ACCESS_COUNT {
                read[p][a] = table.alloc(READ_NAMES[p][a])?;
                write[p][a] = table.alloc(WRITE_NAMES[p][a])?;
            }
        }

        Ok(Self {
            entry,
            nocode,
            out_of_cycles,
            tlb_mismatch,
            exception,
            exception_norecover,
            read,
            write,
        })
    }

    pub fn exception(&self, e: Exception) -> Handle {
        self.exception[e as usize]
    }

    pub fn exception_norecover(&self, e: Exception) -> Handle {
        self.exception_norecover[e as usize]
    }

    pub fn read(&self, p: Privilege, a: Access) -> Handle {
        self.read[p as usize][a as usize]
    }

    pub fn write(&self, p: Privilege, a: Access) -> Handle {
        self.write[p as usize][a as usize]
    }
}

fn imm(v: u64) -> Operand {
    Operand::Imm(v)
}

fn cpr0(reg: usize) -> Operand {
    mem(cpr0_slot(reg))
}

/// Build the body of every static handler.
pub fn generate_static(
    h: &StaticHandles,
    regmap: &RegisterMap,
    fastram: &[FastRamRegion],
) -> Vec<Block> {
    let mut blocks = vec![
        gen_entry(h, regmap),
        gen_exit_handler(h.nocode, exit::MISSING_CODE, regmap),
        gen_exit_handler(h.out_of_cycles, exit::OUT_OF_CYCLES, regmap),
        gen_tlb_mismatch(h),
    ];
    for e in EXCEPTIONS {
        blocks.push(gen_exception(h, e, true));
        blocks.push(gen_exception(h, e, false));
    }
    for p in cpu::PRIVILEGES {
        for a in ACCESSES {
            blocks.push(gen_accessor(h, p, a, false, fastram));
            blocks.push(gen_accessor(h, p, a, true, fastram));
        }
    }
    blocks
}

/// Emit a check that jumps to `skip` unless an interrupt is pending,
/// enabled and not blocked by EXL/ERL. With `soft_only` only the two
/// software interrupt bits are considered.
pub fn gen_interrupt_pending(b: &mut Block, skip: Label, soft_only: bool) {
    let mask = if soft_only { sr::IM_SOFT } else { sr::IM_MASK };
    b.gen_and(Type::I64, I0, cpr0(cop0::CAUSE), cpr0(cop0::STATUS));
    b.gen_and(Type::I64, I0, I0, imm(mask));
    b.gen_jmpc(Cond::Eq, skip);
    b.gen_and(Type::I64, I0, cpr0(cop0::STATUS), imm(sr::IE | sr::EXL | sr::ERL));
    b.gen_cmp(Type::I64, I0, imm(sr::IE));
    b.gen_jmpc(Cond::Ne, skip);
}

fn gen_entry(h: &StaticHandles, regmap: &RegisterMap) -> Block {
    let mut b = Block::new();
    b.gen_handle(h.entry);
    regmap.load_fast_regs(&mut b);

    b.gen_and(Type::I32, I0, mem(FCR31), imm(cpu::fcr31::RM_MASK));
    b.gen_setfmod(I0);

    let skip = b.new_label();
    gen_interrupt_pending(&mut b, skip, false);
    b.gen_exh(h.exception_norecover(Exception::Interrupt), mem(PC));
    b.gen_label(skip);

    b.gen_hashjmp(mem(MODE), mem(PC), h.nocode);
    b
}

/// Store the pc parameter, persist fast registers and leave.
fn gen_exit_handler(handle: Handle, code: u32, regmap: &RegisterMap) -> Block {
    let mut b = Block::new();
    b.gen_handle(handle);
    b.gen_getexp(I0);
    b.gen_mov(Type::I32, mem(PC), I0);
    regmap.save_fast_regs(&mut b);
    b.gen_exit(imm(code as u64));
    b
}

/// The page holding compiled code no longer has the entry it was
/// compiled against.
fn gen_tlb_mismatch(h: &StaticHandles) -> Block {
    let mut b = Block::new();
    b.gen_handle(h.tlb_mismatch);
    b.gen_recover(I0, MapVar::Pc);
    b.gen_and(Type::I32, I1, I0, imm(!3u32 as u64));
    b.gen_tlblookup(I2, I1);

    let retranslate = b.new_label();
    b.gen_test(Type::I32, I2, imm(pte::READ as u64));
    b.gen_jmpc(Cond::Ne, retranslate);
    b.gen_test(Type::I32, I2, imm(pte::PRESENT as u64));
    b.gen_exhc(Cond::Ne, h.exception(Exception::TlbLoad), I1);
    b.gen_exh(h.exception(Exception::TlbLoadFill), I1);

    // Still mapped but to something else: translate again, from the
    // branch when the fault was in a delay slot.
    b.gen_label(retranslate);
    let nodelay = b.new_label();
    b.gen_test(Type::I32, I0, imm(DELAY_SLOT_FLAG));
    b.gen_jmpc(Cond::Eq, nodelay);
    b.gen_sub(Type::I32, I1, I1, imm(4));
    b.gen_label(nodelay);
    b.gen_exh(h.nocode, I1);
    b
}

fn gen_exception(h: &StaticHandles, e: Exception, recover: bool) -> Block {
    let mut b = Block::new();
    b.gen_handle(if recover {
        h.exception(e)
    } else {
        h.exception_norecover(e)
    });

    b.gen_getexp(I1);
    if recover {
        b.gen_recover(I0, MapVar::Pc);
        b.gen_recover(I2, MapVar::Cycles);
    } else {
        b.gen_mov(Type::I64, I0, I1);
    }

    // An interrupt taken while idling in WAIT returns past it.
    if e == Exception::Interrupt {
        let awake = b.new_label();
        b.gen_add(Type::I64, I3, I0, imm(4));
        b.gen_cmp(Type::I64, I3, mem(WAIT_RESUME));
        b.gen_jmpc(Cond::Ne, awake);
        b.gen_mov(Type::I64, I0, I3);
        b.gen_label(awake);
        b.gen_mov(Type::I64, mem(WAIT_RESUME), imm(0));
    }

    if recover && e.has_bad_vaddr() {
        b.gen_sext(Type::I64, cpr0(cop0::BAD_VADDR), I1, MemSize::Word);
        if e.is_tlb() {
            let context = cpr0(cop0::CONTEXT);
            b.gen_and(Type::I64, context, context, imm(!0x007f_fff0u64));
            b.gen_shr(Type::I32, I3, I1, imm(9));
            b.gen_and(Type::I32, I3, I3, imm(0x007f_fff0));
            b.gen_or(Type::I64, context, context, I3);

            let entry_hi = cpr0(cop0::ENTRY_HI);
            b.gen_and(Type::I64, entry_hi, entry_hi, imm(0xff));
            b.gen_and(Type::I32, I3, I1, imm(0xffff_e000));
            b.gen_sext(Type::I64, I3, I3, MemSize::Word);
            b.gen_or(Type::I64, entry_hi, entry_hi, I3);
        }
    }

    // Cause: exception code, coprocessor unit, branch delay.
    b.gen_and(
        Type::I64,
        I3,
        cpr0(cop0::CAUSE),
        imm(!(cause::EXCCODE_MASK | cause::BD | cause::CE_MASK)),
    );
    b.gen_or(Type::I64, I3, I3, imm(e.code() << cause::EXCCODE_SHIFT));
    if recover && e == Exception::BadCop {
        b.gen_shl(Type::I64, I1, I1, imm(cause::CE_SHIFT as u64));
        b.gen_and(Type::I64, I1, I1, imm(cause::CE_MASK));
        b.gen_or(Type::I64, I3, I3, I1);
    }

    // EPC and BD are only written when not already at exception level.
    let in_exl = b.new_label();
    b.gen_test(Type::I64, cpr0(cop0::STATUS), imm(sr::EXL));
    b.gen_jmpc(Cond::Ne, in_exl);
    let nodelay = b.new_label();
    b.gen_test(Type::I32, I0, imm(DELAY_SLOT_FLAG));
    b.gen_jmpc(Cond::Eq, nodelay);
    b.gen_sub(Type::I32, I0, I0, imm(4 + DELAY_SLOT_FLAG));
    b.gen_or(Type::I64, I3, I3, imm(cause::BD));
    b.gen_label(nodelay);
    b.gen_sext(Type::I64, cpr0(cop0::EPC), I0, MemSize::Word);
    b.gen_label(in_exl);
    b.gen_mov(Type::I64, cpr0(cop0::CAUSE), I3);

    // Vector, chosen before EXL is raised.
    let offset = e.vector_offset();
    b.gen_mov(Type::I32, I1, imm((VECTOR_BASE + offset) as u64));
    if offset == 0 {
        b.gen_test(Type::I64, cpr0(cop0::STATUS), imm(sr::EXL));
        b.gen_movc(Cond::Ne, Type::I32, I1, imm((VECTOR_BASE + 0x180) as u64));
    }
    let nobev = b.new_label();
    b.gen_test(Type::I64, cpr0(cop0::STATUS), imm(sr::BEV));
    b.gen_jmpc(Cond::Eq, nobev);
    b.gen_add(
        Type::I32,
        I1,
        I1,
        imm((cpu::BEV_VECTOR_BASE - VECTOR_BASE) as u64),
    );
    b.gen_label(nobev);

    // Enter kernel mode.
    let status = cpr0(cop0::STATUS);
    b.gen_or(Type::I64, status, status, imm(sr::EXL));
    b.gen_shr(Type::I64, I3, status, imm(sr::FR_SHIFT as u64));
    b.gen_and(Type::I64, mem(MODE), I3, imm(1));

    // Charge the cycles of the faulting sequence, then dispatch.
    if recover {
        b.gen_sub(Type::I64, mem(ICOUNT), mem(ICOUNT), I2);
        b.gen_exhc(Cond::Neg, h.out_of_cycles, I1);
    }
    b.gen_hashjmp(mem(MODE), I1, h.nocode);
    b
}

fn gen_accessor(
    h: &StaticHandles,
    p: Privilege,
    a: Access,
    write: bool,
    fastram: &[FastRamRegion],
) -> Block {
    let size = a.size();
    let bytes = size.bytes();
    let (addr_exc, tlb_exc, fill_exc) = if write {
        (
            Exception::AddressStore,
            Exception::TlbStore,
            Exception::TlbStoreFill,
        )
    } else {
        (
            Exception::AddressLoad,
            Exception::TlbLoad,
            Exception::TlbLoadFill,
        )
    };

    let mut b = Block::new();
    b.gen_handle(if write { h.write(p, a) } else { h.read(p, a) });

    match p {
        Privilege::Kernel => {}
        Privilege::User => {
            b.gen_test(Type::I32, I0, imm(0x8000_0000));
            b.gen_exhc(Cond::Ne, h.exception(addr_exc), I0);
        }
        Privilege::Supervisor => {
            let ok = b.new_label();
            b.gen_test(Type::I32, I0, imm(0x8000_0000));
            b.gen_jmpc(Cond::Eq, ok);
            b.gen_shr(Type::I32, I3, I0, imm(29));
            b.gen_cmp(Type::I32, I3, imm(6));
            b.gen_exhc(Cond::Ne, h.exception(addr_exc), I0);
            b.gen_label(ok);
        }
    }

    if bytes > 1 {
        b.gen_test(Type::I32, I0, imm((bytes - 1) as u64));
        b.gen_exhc(Cond::Ne, h.exception(addr_exc), I0);
    }

    // Translate through the page table.
    let mapped = b.new_label();
    let need = if write { pte::WRITE } else { pte::READ };
    b.gen_tlblookup(I3, I0);
    b.gen_test(Type::I32, I3, imm(need as u64));
    b.gen_jmpc(Cond::Ne, mapped);
    if write {
        b.gen_test(Type::I32, I3, imm(pte::READ as u64));
        b.gen_exhc(Cond::Ne, h.exception(Exception::TlbMod), I0);
    }
    b.gen_test(Type::I32, I3, imm(pte::PRESENT as u64));
    b.gen_exhc(Cond::Ne, h.exception(tlb_exc), I0);
    b.gen_exh(h.exception(fill_exc), I0);
    b.gen_label(mapped);
    b.gen_and(Type::I32, I3, I3, imm(pte::PAGE_MASK as u64));
    b.gen_and(Type::I32, I0, I0, imm(!pte::PAGE_MASK as u64));
    b.gen_or(Type::I32, I0, I0, I3);

    // Direct access to fast RAM.
    for (i, r) in fastram.iter().enumerate() {
        if write && r.readonly {
            continue;
        }
        let Some(last) = r.end.checked_sub(bytes - 1) else {
            continue;
        };
        if last < r.start {
            continue;
        }
        let skip = b.new_label();
        b.gen_cmp(Type::I32, I0, imm(r.start as u64));
        b.gen_jmpc(Cond::Ltu, skip);
        b.gen_cmp(Type::I32, I0, imm(last as u64));
        b.gen_jmpc(Cond::Gtu, skip);
        b.gen_sub(Type::I32, I3, I0, imm(r.start as u64));
        if write {
            let mask = if a.masked() { I2 } else { imm(size.mask()) };
            b.gen_fastwrite(I3, I1, mask, i, size);
        } else {
            b.gen_fastread(I0, I3, i, size);
        }
        b.gen_ret();
        b.gen_label(skip);
    }

    if !write {
        b.gen_read(I0, I0, size);
    } else if a.masked() {
        b.gen_writem(I0, I1, I2, size);
    } else {
        b.gen_write(I0, I1, size);
    }
    b.gen_ret();
    b
}
